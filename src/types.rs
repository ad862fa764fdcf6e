use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

/// Unique identifier for a node within a sensor's status map
pub type NodeId = String;

/// Generic JSON value for flexible data passing
pub type JsonValue = serde_json::Value;

/// Phase of a node in the sensor's state machine.
///
/// The empty string is the zero value and marks a node that has been
/// created but not yet touched by any event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NodePhase {
    #[serde(rename = "")]
    #[default]
    New,
    Active,
    Complete,
    Error,
}

impl NodePhase {
    /// Whether the node has reached an end state for the current round
    pub fn is_terminal(self) -> bool {
        matches!(self, NodePhase::Complete | NodePhase::Error)
    }
}

/// Kind of node tracked in the sensor's status map
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeType {
    EventDependency,
    Trigger,
    DependencyGroup,
}

/// Outcome of the last trigger cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TriggerCycleState {
    Success,
    Failure,
}

/// Comparator for a data filter entry. The empty string means equality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Comparator {
    #[serde(rename = ">=")]
    GreaterThanOrEqualTo,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "=")]
    EqualTo,
    #[serde(rename = "!=")]
    NotEqualTo,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqualTo,
    #[serde(rename = "")]
    #[default]
    Empty,
}

/// JSON types supported by data filters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Bool,
    Number,
    String,
}

/// 32-bit FNV-1a hash.
///
/// Node IDs are `{sensor}-{fnv32a(name)}` and status maps are keyed by
/// them, so this exact hash is part of the persistence contract.
pub fn fnv32a(input: &str) -> u32 {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;

    let mut hash = OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
