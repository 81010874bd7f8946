use super::OrderDeclaration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// How many passes a strategy makes over its orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCount {
    /// Run exactly this many cycles (always > 0)
    Finite(u64),
    /// Repeat until cancelled
    Unbounded,
}

impl CycleCount {
    /// Wire sentinel for an unbounded run
    pub const UNBOUNDED_SENTINEL: i64 = -1;

    pub fn from_i64(value: i64) -> Result<Self, String> {
        match value {
            Self::UNBOUNDED_SENTINEL => Ok(CycleCount::Unbounded),
            n if n > 0 => Ok(CycleCount::Finite(n as u64)),
            n => Err(format!(
                "cycles must be a positive integer or -1 for unbounded, got {}",
                n
            )),
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            CycleCount::Finite(n) => *n as i64,
            CycleCount::Unbounded => Self::UNBOUNDED_SENTINEL,
        }
    }

    /// Whether another cycle should start after `completed` cycles
    pub fn allows(&self, completed: u64) -> bool {
        match self {
            CycleCount::Finite(n) => completed < *n,
            CycleCount::Unbounded => true,
        }
    }

    /// Whether `cycle` (1-based) is the final one
    pub fn is_last(&self, cycle: u64) -> bool {
        match self {
            CycleCount::Finite(n) => cycle >= *n,
            CycleCount::Unbounded => false,
        }
    }
}

impl Default for CycleCount {
    fn default() -> Self {
        CycleCount::Unbounded
    }
}

impl fmt::Display for CycleCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleCount::Finite(n) => write!(f, "{}", n),
            CycleCount::Unbounded => write!(f, "infinite"),
        }
    }
}

impl Serialize for CycleCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for CycleCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        CycleCount::from_i64(raw).map_err(serde::de::Error::custom)
    }
}

/// Named, ordered sequence of order declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Target network; falls back to the main config when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub cycles: CycleCount,
    #[serde(default)]
    pub orders: Vec<OrderDeclaration>,
}

impl Strategy {
    /// Label used in logs: display name, else the key it was registered under
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        if self.name.is_empty() {
            key
        } else {
            &self.name
        }
    }
}
