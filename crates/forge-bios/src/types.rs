use std::collections::BTreeMap;
use std::fmt;

/// A setting value as read from or pushed to a vendor tool. `Scalar` is
/// the common case; `Opaque` retains an XML/JSON node this workspace has
/// no model for, so round-tripping a full push never drops vendor state
/// it doesn't understand.
#[derive(Debug, Clone, PartialEq)]
pub enum BiosValue {
    Scalar(String),
    Opaque(serde_json::Value),
}

impl BiosValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BiosValue::Scalar(value) => Some(value.as_str()),
            BiosValue::Opaque(_) => None,
        }
    }
}

impl fmt::Display for BiosValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiosValue::Scalar(value) => write!(f, "{value}"),
            BiosValue::Opaque(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for BiosValue {
    fn from(value: &str) -> Self {
        BiosValue::Scalar(value.to_string())
    }
}

impl From<String> for BiosValue {
    fn from(value: String) -> Self {
        BiosValue::Scalar(value)
    }
}

pub type LiveConfig = BTreeMap<String, BiosValue>;
pub type TargetConfig = BTreeMap<String, BiosValue>;

/// One setting whose live value differs from its target.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaEntry {
    pub live: BiosValue,
    pub target: BiosValue,
}

pub type Delta = BTreeMap<String, DeltaEntry>;

#[derive(Debug, Clone, PartialEq)]
pub enum BiosResult {
    NoChange,
    Planned { delta: Delta },
    Applied { delta: Delta },
    Degraded { reason: String },
}
