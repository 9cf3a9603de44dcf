//! Runner that writes jobs to disk for an external scheduler.

use super::{ExperimentRunner, Trial, TrialStatus};
use crate::encoding::{to_canonical_json, to_json_value};
use crate::experiment::{ClusterConfig, ExperimentSpec, Experiments};
use crate::registry::EnvRegistry;
use crate::{FlowError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Experiment description written under each experiment directory.
pub const EXPERIMENT_FILE: &str = "experiment.json";
/// Trainer config written under each trial directory.
pub const PARAMS_FILE: &str = "params.json";

/// Hands experiments off as a directory of JSON manifests.
///
/// Layout:
///
/// ```text
/// <local_dir>/<exp_tag>/experiment.json
/// <local_dir>/<exp_tag>/<run>_<env>_<i>/params.json
/// ```
///
/// Every experiment is checked before anything is written, so a rejected
/// submission leaves the directory untouched. Experiment tags and
/// environment names become directory names and must each be a single
/// plain path component.
#[derive(Debug)]
pub struct ManifestRunner {
    local_dir: PathBuf,
    cluster: Option<ClusterConfig>,
}

impl ManifestRunner {
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            cluster: None,
        }
    }

    /// Get the results directory path.
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn cluster(&self) -> Option<&ClusterConfig> {
        self.cluster.as_ref()
    }

    fn check(
        &self,
        cluster: &ClusterConfig,
        tag: &str,
        spec: &ExperimentSpec,
        registry: &EnvRegistry,
    ) -> Result<()> {
        if !registry.contains(&spec.env) {
            return Err(FlowError::UnregisteredEnv(spec.env.clone()));
        }
        check_component(tag, "experiment tag", tag)?;
        check_component(tag, "environment name", &spec.env)?;
        if spec.repeat == 0 {
            return Err(FlowError::InvalidJob {
                experiment: tag.to_string(),
                reason: "repeat must be at least 1".to_string(),
            });
        }

        let resources = &spec.trial_resources;
        if resources.total_cpu() > cluster.num_cpus {
            return Err(FlowError::InsufficientResources {
                experiment: tag.to_string(),
                resource: "cpu",
                requested: resources.total_cpu(),
                available: cluster.num_cpus,
            });
        }
        if resources.gpu > cluster.num_gpus {
            return Err(FlowError::InsufficientResources {
                experiment: tag.to_string(),
                resource: "gpu",
                requested: resources.gpu,
                available: cluster.num_gpus,
            });
        }

        // Everything written must encode; catches NaN hyperparameters.
        to_json_value(tag, spec)?;
        Ok(())
    }

    fn write_experiment(&self, tag: &str, spec: &ExperimentSpec) -> Result<Vec<Trial>> {
        let exp_dir = self.local_dir.join(tag);
        fs::create_dir_all(&exp_dir)?;
        fs::write(exp_dir.join(EXPERIMENT_FILE), to_canonical_json(spec)?)?;

        let params = to_canonical_json(&spec.config)?;
        let mut trials = Vec::with_capacity(spec.repeat as usize);
        for i in 0..spec.repeat {
            let id = format!("{}_{}_{}", spec.run, spec.env, i);
            let logdir = exp_dir.join(&id);
            fs::create_dir_all(&logdir)?;
            fs::write(logdir.join(PARAMS_FILE), &params)?;
            tracing::debug!(trial = %id, path = %logdir.display(), "Wrote trial params");

            trials.push(Trial {
                id,
                experiment: tag.to_string(),
                logdir,
                status: TrialStatus::Pending,
            });
        }

        tracing::info!(
            experiment = %tag,
            env = %spec.env,
            trials = trials.len(),
            path = %exp_dir.display(),
            "Submitted experiment"
        );
        Ok(trials)
    }
}

impl ExperimentRunner for ManifestRunner {
    fn init(&mut self, cluster: &ClusterConfig) -> Result<()> {
        tracing::info!(
            num_cpus = cluster.num_cpus,
            num_gpus = cluster.num_gpus,
            redirect_output = cluster.redirect_output,
            "Initialized runner"
        );
        self.cluster = Some(cluster.clone());
        Ok(())
    }

    fn run_experiments(
        &mut self,
        experiments: &Experiments,
        registry: &EnvRegistry,
    ) -> Result<Vec<Trial>> {
        let cluster = self.cluster.as_ref().ok_or(FlowError::NotInitialized)?;
        for (tag, spec) in experiments {
            self.check(cluster, tag, spec, registry)?;
        }

        let mut trials = Vec::new();
        for (tag, spec) in experiments {
            trials.extend(self.write_experiment(tag, spec)?);
        }
        Ok(trials)
    }
}

/// `name` must stay inside the directory it is joined onto.
fn check_component(experiment: &str, what: &str, name: &str) -> Result<()> {
    let mut parts = Path::new(name).components();
    let single = matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None));
    if single && !name.contains(['/', '\\']) {
        return Ok(());
    }
    Err(FlowError::InvalidJob {
        experiment: experiment.to_string(),
        reason: format!("{} {:?} is not a single path component", what, name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{PpoConfig, StopCriteria, TrialResources};
    use crate::registry::EnvCreator;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn registry(name: &str) -> EnvRegistry {
        let creator: EnvCreator = Arc::new(|| Err(FlowError::BackendUnavailable("test".into())));
        let mut registry = EnvRegistry::new();
        registry.register(name, creator).unwrap();
        registry
    }

    fn spec(env: &str, resources: TrialResources, repeat: u32) -> ExperimentSpec {
        ExperimentSpec::new(env, PpoConfig::default().with_flow_params("{}"))
            .with_stop(StopCriteria::iterations(5))
            .with_repeat(repeat)
            .with_resources(resources)
    }

    fn experiments(resources: TrialResources, repeat: u32) -> Experiments {
        Experiments::from([("ring".to_string(), spec("ring-v0", resources, repeat))])
    }

    fn resources(cpu: u32, gpu: u32, extra_cpu: u32) -> TrialResources {
        TrialResources {
            cpu,
            gpu,
            extra_cpu,
        }
    }

    #[test]
    fn test_requires_init() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        let err = runner
            .run_experiments(&experiments(resources(1, 0, 0), 1), &registry("ring-v0"))
            .unwrap_err();
        assert!(matches!(err, FlowError::NotInitialized));
    }

    #[test]
    fn test_writes_layout() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        runner.init(&ClusterConfig::new(2)).unwrap();

        let trials = runner
            .run_experiments(&experiments(resources(1, 0, 1), 3), &registry("ring-v0"))
            .unwrap();

        assert_eq!(trials.len(), 3);
        assert_eq!(trials[2].id, "PPO_ring-v0_2");
        assert!(trials.iter().all(|t| t.status == TrialStatus::Pending));
        assert!(dir.path().join("ring").join(EXPERIMENT_FILE).is_file());
        for trial in &trials {
            let text = fs::read_to_string(trial.logdir.join(PARAMS_FILE)).unwrap();
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["env_config"]["flow_params"], "{}");
        }
    }

    #[test]
    fn test_unregistered_env() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        runner.init(&ClusterConfig::new(2)).unwrap();
        let err = runner
            .run_experiments(&experiments(resources(1, 0, 0), 1), &registry("other-v0"))
            .unwrap_err();
        assert!(matches!(err, FlowError::UnregisteredEnv(ref n) if n == "ring-v0"));
    }

    #[test]
    fn test_insufficient_cpu_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        runner.init(&ClusterConfig::new(2)).unwrap();
        let err = runner
            .run_experiments(&experiments(resources(1, 0, 2), 1), &registry("ring-v0"))
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::InsufficientResources {
                resource: "cpu",
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert!(!dir.path().join("ring").exists());
    }

    #[test]
    fn test_insufficient_gpu() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        runner.init(&ClusterConfig::new(2)).unwrap();
        let err = runner
            .run_experiments(&experiments(resources(1, 1, 0), 1), &registry("ring-v0"))
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::InsufficientResources { resource: "gpu", .. }
        ));
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        runner.init(&ClusterConfig::new(2)).unwrap();
        let err = runner
            .run_experiments(&experiments(resources(1, 0, 0), 0), &registry("ring-v0"))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidJob { .. }));
    }

    #[test]
    fn test_escaping_names_rejected() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results");
        let mut runner = ManifestRunner::new(&results);
        runner.init(&ClusterConfig::new(2)).unwrap();

        for tag in ["../outside", "/abs", "a/b", "..", ".", ""] {
            let experiments =
                Experiments::from([(tag.to_string(), spec("ring-v0", resources(1, 0, 0), 1))]);
            let err = runner
                .run_experiments(&experiments, &registry("ring-v0"))
                .unwrap_err();
            assert!(matches!(err, FlowError::InvalidJob { .. }), "tag {tag:?}");
        }

        let experiments = Experiments::from([(
            "ring".to_string(),
            spec("../ring-v0", resources(1, 0, 0), 1),
        )]);
        let err = runner
            .run_experiments(&experiments, &registry("../ring-v0"))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidJob { ref reason, .. } if reason.contains("environment name")));

        assert!(!results.exists());
        assert!(!dir.path().join("outside").exists());
    }

    #[test]
    fn test_nan_hyperparameter_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        runner.init(&ClusterConfig::new(2)).unwrap();

        let mut nan_spec = spec("ring-v0", resources(1, 0, 0), 1);
        nan_spec.config = nan_spec.config.with_gamma(f64::NAN);
        let experiments = Experiments::from([("ring".to_string(), nan_spec)]);
        let err = runner
            .run_experiments(&experiments, &registry("ring-v0"))
            .unwrap_err();
        assert!(matches!(err, FlowError::Encode(ref m) if m.contains("gamma")));
        assert!(!dir.path().join("ring").exists());
    }

    #[test]
    fn test_overflowing_cpu_request_rejected() {
        let dir = tempdir().unwrap();
        let mut runner = ManifestRunner::new(dir.path());
        runner.init(&ClusterConfig::new(2)).unwrap();
        let err = runner
            .run_experiments(
                &experiments(resources(u32::MAX, 0, 1), 1),
                &registry("ring-v0"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::InsufficientResources {
                resource: "cpu",
                requested: u32::MAX,
                ..
            }
        ));
    }
}
