//! ---
//! emc_section: "02-message-model"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message records, typed parameters and the parameter codec."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{EmitterId, MessageType};

/// Wire keys used inside the parameter payload.
pub mod keys {
    /// Emitter the message acts upon.
    pub const TARGET_ID: &str = "targetId";
    /// Emitter display name.
    pub const NAME: &str = "name";
    /// Emitter amplitude.
    pub const AMPLITUDE: &str = "amplitude";
    /// Emitter direction in degrees.
    pub const DIRECTION: &str = "direction";
    /// Pulse repetition interval.
    pub const PRI: &str = "pri";
    /// Pulse width.
    pub const PULSE_WIDTH: &str = "pulseWidth";
    /// Replacement direction carried by `updateDirection`.
    pub const NEW_DIRECTION: &str = "newDirection";
    /// Replacement amplitude carried by `updateAmplitude`.
    pub const NEW_AMPLITUDE: &str = "newAmplitude";
    /// Scenario ramp end amplitude.
    pub const FINAL_AMPLITUDE: &str = "finalAmplitude";
    /// Scenario ramp end direction.
    pub const FINAL_DIRECTION: &str = "finalDirection";
    /// Scenario ramp duration in seconds.
    pub const DURATION: &str = "duration";
    /// Scenario ramp update period in seconds.
    pub const UPDATE_FREQUENCY: &str = "updateFrequency";
}

/// Scalar value carried in a parameter payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Numeric value.
    Number(f64),
    /// Textual value.
    Text(String),
    /// Boolean value.
    Flag(bool),
}

impl ParamValue {
    /// Numeric view; numeric text such as `"12.5"` is accepted as well.
    /// Non-finite values (`"NaN"`, `"inf"`) are rejected.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            ParamValue::Number(value) => Some(*value),
            ParamValue::Text(text) => text.trim().parse::<f64>().ok(),
            ParamValue::Flag(_) => None,
        };
        value.filter(|value| value.is_finite())
    }

    /// Textual view; integral numbers render without a fractional part.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ParamValue::Text(text) => Some(text.clone()),
            ParamValue::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                Some(format!("{}", *value as i64))
            }
            ParamValue::Number(value) => Some(value.to_string()),
            ParamValue::Flag(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Decoded key/value parameter mapping. Ordered so encoding is deterministic.
pub type ParameterMap = BTreeMap<String, ParamValue>;

/// Emitter settings shared by `addEmitter` and `updateEmitter`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmitterSettings {
    /// Display name.
    pub name: Option<String>,
    /// Amplitude.
    pub amplitude: Option<f64>,
    /// Direction in degrees.
    pub direction: Option<f64>,
    /// Pulse repetition interval.
    pub pri: Option<f64>,
    /// Pulse width.
    pub pulse_width: Option<f64>,
}

impl EmitterSettings {
    fn from_map(map: &ParameterMap) -> Self {
        Self {
            name: text(map, keys::NAME),
            amplitude: number(map, keys::AMPLITUDE),
            direction: number(map, keys::DIRECTION),
            pri: number(map, keys::PRI),
            pulse_width: number(map, keys::PULSE_WIDTH),
        }
    }

    fn write_into(&self, map: &mut ParameterMap) {
        put_text(map, keys::NAME, self.name.as_deref());
        put_number(map, keys::AMPLITUDE, self.amplitude);
        put_number(map, keys::DIRECTION, self.direction);
        put_number(map, keys::PRI, self.pri);
        put_number(map, keys::PULSE_WIDTH, self.pulse_width);
    }
}

/// Amplitude/direction ramp requested by a `scenario` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRamp {
    /// Amplitude at the end of the ramp.
    pub final_amplitude: Option<f64>,
    /// Direction at the end of the ramp.
    pub final_direction: Option<f64>,
    /// Ramp length in seconds.
    pub duration: Option<f64>,
    /// Seconds between intermediate updates.
    pub update_frequency: Option<f64>,
}

/// Type-specific part of a message's parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Initial emitter settings.
    Add(EmitterSettings),
    /// No additional fields.
    Start,
    /// No additional fields.
    Stop,
    /// No additional fields.
    Remove,
    /// Replacement direction.
    Direction {
        /// New direction in degrees.
        new_direction: Option<f64>,
    },
    /// Replacement amplitude.
    Amplitude {
        /// New amplitude.
        new_amplitude: Option<f64>,
    },
    /// Partial settings update.
    Update(EmitterSettings),
    /// Ramp definition.
    Scenario(ScenarioRamp),
    /// Fields of a type unknown to this build, without the target id.
    Other(ParameterMap),
}

/// Typed parameters of a message: the target emitter plus the per-type payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Emitter the message acts upon, when resolvable.
    pub target: Option<EmitterId>,
    /// Type-specific fields.
    pub payload: Payload,
}

impl Parameters {
    /// Build typed parameters from a decoded mapping.
    ///
    /// Missing fields become `None`; the target is `None` when `targetId` is
    /// absent, empty or not a scalar identifier.
    pub fn from_map(message_type: &MessageType, map: &ParameterMap) -> Self {
        let target = map
            .get(keys::TARGET_ID)
            .and_then(ParamValue::as_text)
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .map(EmitterId::new);

        let payload = match message_type {
            MessageType::AddEmitter => Payload::Add(EmitterSettings::from_map(map)),
            MessageType::StartEmitter => Payload::Start,
            MessageType::StopEmitter => Payload::Stop,
            MessageType::RemoveEmitter => Payload::Remove,
            MessageType::UpdateDirection => Payload::Direction {
                new_direction: number(map, keys::NEW_DIRECTION),
            },
            MessageType::UpdateAmplitude => Payload::Amplitude {
                new_amplitude: number(map, keys::NEW_AMPLITUDE),
            },
            MessageType::UpdateEmitter => Payload::Update(EmitterSettings::from_map(map)),
            MessageType::Scenario => Payload::Scenario(ScenarioRamp {
                final_amplitude: number(map, keys::FINAL_AMPLITUDE),
                final_direction: number(map, keys::FINAL_DIRECTION),
                duration: number(map, keys::DURATION),
                update_frequency: number(map, keys::UPDATE_FREQUENCY),
            }),
            MessageType::Other(_) => {
                let mut rest = map.clone();
                rest.remove(keys::TARGET_ID);
                Payload::Other(rest)
            }
        };

        Self { target, payload }
    }

    /// Parameters for a type with no payload beyond the target.
    pub fn targeting(message_type: &MessageType, target: impl Into<EmitterId>) -> Self {
        let mut params = Self::from_map(message_type, &ParameterMap::new());
        params.target = Some(target.into());
        params
    }

    /// Convert back into the wire mapping; inverse of [`Parameters::from_map`]
    /// for the fields each type declares.
    pub fn to_map(&self) -> ParameterMap {
        let mut map = ParameterMap::new();
        if let Some(target) = &self.target {
            map.insert(keys::TARGET_ID.to_owned(), ParamValue::from(target.as_str()));
        }
        match &self.payload {
            Payload::Add(settings) | Payload::Update(settings) => settings.write_into(&mut map),
            Payload::Start | Payload::Stop | Payload::Remove => {}
            Payload::Direction { new_direction } => {
                put_number(&mut map, keys::NEW_DIRECTION, *new_direction)
            }
            Payload::Amplitude { new_amplitude } => {
                put_number(&mut map, keys::NEW_AMPLITUDE, *new_amplitude)
            }
            Payload::Scenario(ramp) => {
                put_number(&mut map, keys::FINAL_AMPLITUDE, ramp.final_amplitude);
                put_number(&mut map, keys::FINAL_DIRECTION, ramp.final_direction);
                put_number(&mut map, keys::DURATION, ramp.duration);
                put_number(&mut map, keys::UPDATE_FREQUENCY, ramp.update_frequency);
            }
            Payload::Other(fields) => {
                map.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        map
    }
}

fn number(map: &ParameterMap, key: &str) -> Option<f64> {
    map.get(key).and_then(ParamValue::as_f64)
}

fn text(map: &ParameterMap, key: &str) -> Option<String> {
    map.get(key).and_then(ParamValue::as_text)
}

fn put_number(map: &mut ParameterMap, key: &str, value: Option<f64>) {
    if let Some(value) = value {
        map.insert(key.to_owned(), ParamValue::Number(value));
    }
}

fn put_text(map: &mut ParameterMap, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_owned(), ParamValue::from(value));
    }
}
