//! Deterministic JSON encoding.
//!
//! Every JSON artifact this crate writes goes through [`to_canonical_json`]:
//! object keys sorted, four-space indentation. Identical inputs produce
//! byte-identical output, so snapshots can be diffed across runs. Values
//! JSON cannot hold (NaN, infinities) fail with `FlowError::Encode`.

mod finite;

use crate::params::FlowParams;
use crate::{FlowError, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

const INDENT: &[u8] = b"    ";

/// Convert to a JSON value, failing on non-finite floats.
///
/// `field` prefixes the location reported in the error.
pub fn to_json_value<T: Serialize + ?Sized>(field: &str, value: &T) -> Result<Value> {
    finite::check_finite(field, value)?;
    serde_json::to_value(value).map_err(|e| FlowError::Encode(e.to_string()))
}

/// Serialize any value as sorted, indented JSON.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    // Going through `Value` sorts object keys (serde_json's map is ordered).
    let value = to_json_value("", value)?;
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    value
        .serialize(&mut ser)
        .map_err(|e| FlowError::Encode(e.to_string()))?;
    String::from_utf8(out).map_err(|e| FlowError::Encode(e.to_string()))
}

/// Encode the flow-parameter bundle for storage alongside checkpoints.
///
/// Fails when a parameter is not representable in JSON.
pub fn encode_flow_params(params: &FlowParams) -> Result<String> {
    params.validate()?;
    to_canonical_json(params)
}

/// Rebuild a flow-parameter bundle from its encoded form.
pub fn decode_flow_params(json: &str) -> Result<FlowParams> {
    let params: FlowParams =
        serde_json::from_str(json).map_err(|e| FlowError::Decode(e.to_string()))?;
    params.validate()?;
    Ok(params)
}
