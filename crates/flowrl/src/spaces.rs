//! Bounded continuous space used for observations and actions.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Box space with one scalar bound pair shared by every element.
///
/// Serialized into job manifests so external trainers can size their
/// policy networks without building an environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub low: f32,
    pub high: f32,
    pub shape: Vec<usize>,
}

impl BoxSpace {
    /// Create a new box space; `low` must not exceed `high`.
    pub fn new(shape: &[usize], low: f32, high: f32) -> Self {
        assert!(low <= high, "Box low bound {} exceeds high bound {}", low, high);
        Self {
            low,
            high,
            shape: shape.to_vec(),
        }
    }

    /// Unit box [0, 1]
    pub fn unit(shape: &[usize]) -> Self {
        Self::new(shape, 0.0, 1.0)
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check shape and bounds
    pub fn contains(&self, value: &ArrayD<f32>) -> bool {
        value.shape() == self.shape.as_slice()
            && value.iter().all(|&v| v >= self.low && v <= self.high)
    }

    /// Clamp every element into the bounds. NaN elements become `low`.
    pub fn clip(&self, value: &ArrayD<f32>) -> ArrayD<f32> {
        value.mapv(|v| if v.is_nan() { self.low } else { v.clamp(self.low, self.high) })
    }

    /// Array of zeros with this space's shape
    pub fn zeros(&self) -> ArrayD<f32> {
        ArrayD::zeros(IxDyn(&self.shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_contains() {
        let space = BoxSpace::unit(&[2]);
        let valid = ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.5, 0.5]).unwrap();
        let invalid = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.5, 0.5]).unwrap();
        let wrong_shape = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0.5; 3]).unwrap();

        assert!(space.contains(&valid));
        assert!(!space.contains(&invalid));
        assert!(!space.contains(&wrong_shape));
    }

    #[test]
    fn test_box_clip() {
        let space = BoxSpace::new(&[3], -1.0, 1.0);
        let action = ArrayD::from_shape_vec(IxDyn(&[3]), vec![-3.0, 0.25, f32::NAN]).unwrap();
        let clipped = space.clip(&action);
        assert_eq!(clipped.as_slice().unwrap(), &[-1.0, 0.25, -1.0]);
    }

    #[test]
    #[should_panic]
    fn test_inverted_bounds_panic() {
        BoxSpace::new(&[1], 1.0, -1.0);
    }
}
