use crate::event::Event;
use crate::types::{JsonValue, NodeId, NodePhase, NodeType, TriggerCycleState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status for an individual node in the sensor's state machine.
///
/// A node represents one event dependency, dependency group, or trigger;
/// the map key is the deterministic node ID derived from the name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// Hash-derived unique identifier of the node within the sensor
    pub id: NodeId,

    /// Name used to generate the node ID
    pub name: String,

    /// Human readable representation of the node
    pub display_name: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    #[serde(default)]
    pub phase: NodePhase,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last event accepted for this node within the current round
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
}

impl NodeStatus {
    pub fn new(id: NodeId, name: String, node_type: NodeType) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: name.clone(),
            name,
            node_type,
            phase: NodePhase::New,
            started_at: Some(now),
            completed_at: None,
            updated_at: Some(now),
            resolved_at: None,
            message: String::new(),
            event: None,
        }
    }

    /// Move the node to a new phase, stamping the transition times
    pub fn transition(&mut self, phase: NodePhase, message: impl Into<String>) {
        let now = Utc::now();
        self.phase = phase;
        self.message = message.into();
        self.updated_at = Some(now);
        if phase.is_terminal() {
            self.completed_at = Some(now);
            self.resolved_at = Some(now);
        }
    }

    /// Reset the node for the next round. Clears the attached event and
    /// any completion stamps, keeping the node itself.
    pub fn reset(&mut self) {
        self.phase = NodePhase::New;
        self.message = String::new();
        self.event = None;
        self.completed_at = None;
        self.resolved_at = None;
        self.updated_at = Some(Utc::now());
    }
}

/// Metadata of the platform resources provisioned for a sensor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<JsonValue>,
}

/// Persisted status of a sensor: overall phase, per-node phases, and
/// trigger-cycle accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatus {
    #[serde(default)]
    pub phase: NodePhase,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Node ID to node status; the record of the sensor's state machine
    #[serde(default)]
    pub nodes: HashMap<NodeId, NodeStatus>,

    /// Count of completed trigger cycles
    #[serde(default)]
    pub trigger_cycle_count: u32,

    /// Outcome of the most recent trigger cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_cycle_status: Option<TriggerCycleState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<SensorResources>,
}

impl SensorStatus {
    /// Whether the sensor has reached an end state and must not fire
    /// further triggers
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Move the sensor to a new phase, stamping completion when terminal
    pub fn transition(&mut self, phase: NodePhase, message: impl Into<String>) {
        self.phase = phase;
        self.message = message.into();
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if phase.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// All nodes of the given type
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &NodeStatus> {
        self.nodes
            .values()
            .filter(move |node| node.node_type == node_type)
    }
}
