//! ---
//! emc_section: "02-message-model"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message records, typed parameters and the parameter codec."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Parameter codec.
//!
//! Payloads are JSON objects of scalar values. Decoding never fails: anything
//! it cannot interpret is reported as a [`DecodeAnomaly`] next to the best-effort
//! mapping. The codec has no side effects; callers decide how to surface anomalies.

use serde_json::Value as JsonValue;

use crate::params::{ParamValue, ParameterMap, Parameters};
use crate::types::{EmitterId, MessageRecord};
use crate::Result;

/// Non-fatal problem found while decoding a parameter payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeAnomaly {
    /// The payload is not valid JSON. All parameters are discarded.
    #[error("malformed parameter payload: {0}")]
    Malformed(String),
    /// The payload is valid JSON but not an object. All parameters are discarded.
    #[error("parameter payload is not an object")]
    NotAnObject,
    /// A single field held a nested value; only that field is discarded.
    #[error("unsupported value for parameter `{0}`")]
    UnsupportedValue(String),
}

/// Result of decoding a raw payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// Best-effort parameter mapping.
    pub map: ParameterMap,
    /// Problems encountered while decoding.
    pub anomalies: Vec<DecodeAnomaly>,
}

impl Decoded {
    /// Whether the payload decoded without anomalies.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Decode a raw parameter payload.
///
/// An empty or whitespace-only payload decodes to an empty mapping without an
/// anomaly. Explicit `null` fields are treated as absent.
pub fn decode(raw: &str) -> Decoded {
    if raw.trim().is_empty() {
        return Decoded::default();
    }

    let value: JsonValue = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            return Decoded {
                map: ParameterMap::new(),
                anomalies: vec![DecodeAnomaly::Malformed(err.to_string())],
            }
        }
    };

    let JsonValue::Object(object) = value else {
        return Decoded {
            map: ParameterMap::new(),
            anomalies: vec![DecodeAnomaly::NotAnObject],
        };
    };

    let mut decoded = Decoded::default();
    for (key, value) in object {
        let scalar = match value {
            JsonValue::Null => continue,
            JsonValue::Bool(flag) => ParamValue::Flag(flag),
            JsonValue::String(text) => ParamValue::Text(text),
            JsonValue::Number(number) => match number.as_f64() {
                Some(number) => ParamValue::Number(number),
                None => {
                    decoded.anomalies.push(DecodeAnomaly::UnsupportedValue(key));
                    continue;
                }
            },
            JsonValue::Array(_) | JsonValue::Object(_) => {
                decoded.anomalies.push(DecodeAnomaly::UnsupportedValue(key));
                continue;
            }
        };
        decoded.map.insert(key, scalar);
    }
    decoded
}

/// Encode a parameter mapping into its stored form.
pub fn encode(map: &ParameterMap) -> Result<String> {
    Ok(serde_json::to_string(map)?)
}

/// A record's parameters in typed form, with any decode anomalies.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Typed parameters; empty when the payload was malformed.
    pub parameters: Parameters,
    /// Problems encountered while decoding.
    pub anomalies: Vec<DecodeAnomaly>,
}

impl DecodedMessage {
    /// Emitter the message acts upon, when resolvable.
    pub fn target(&self) -> Option<&EmitterId> {
        self.parameters.target.as_ref()
    }
}

/// Decode a record's payload into typed parameters.
pub fn decode_record(record: &MessageRecord) -> DecodedMessage {
    let Decoded { map, anomalies } = decode(record.raw_parameters());
    DecodedMessage {
        parameters: Parameters::from_map(record.message_type(), &map),
        anomalies,
    }
}
