use crate::artifact::{ArtifactLocation, SecretKeySelector};
use crate::backoff::Backoff;
use crate::circuit;
use crate::error::ValidationError;
use crate::state::{NodeStatus, SensorStatus};
use crate::types::{fnv32a, Comparator, JsonType, NodeId, NodePhase, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[cfg(test)]
#[path = "sensor_test.rs"]
mod sensor_test;

/// A sensor resource: immutable spec plus mutable status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub spec: SensorSpec,
    #[serde(default)]
    pub status: SensorStatus,
}

/// Desired sensor state: what to wait for and what to fire
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorSpec {
    /// Events this sensor depends on
    pub dependencies: Vec<EventDependency>,

    /// Actions the sensor evokes once its circuit is satisfied
    pub triggers: Vec<Trigger>,

    /// How the sensor consumes events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,

    /// Boolean expression over dependency group names. Empty means
    /// "every dependency is complete".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub circuit: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_groups: Vec<DependencyGroup>,

    /// When true, a failed trigger round moves the sensor to Error and
    /// no further rounds run.
    #[serde(default)]
    pub error_on_failed_round: bool,
}

/// A single event dependency
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventDependency {
    /// Unique name of this dependency within the sensor
    pub name: String,

    /// Name of the gateway producing the event.
    /// DEPRECATED: use `event_source_name` instead.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_source_name: String,

    pub event_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<EventDependencyFilter>,
}

impl EventDependency {
    /// The event source to match. `event_source_name` is authoritative;
    /// the deprecated `gateway_name` only applies when it is empty.
    pub fn resolved_source(&self) -> &str {
        if self.event_source_name.is_empty() {
            &self.gateway_name
        } else {
            &self.event_source_name
        }
    }
}

/// Named group of dependencies usable as a circuit atom
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    pub name: String,
    pub dependencies: Vec<String>,
}

/// Filters and constraints applied to a candidate event
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventDependencyFilter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeFilter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextFilter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<DataFilter>,
}

/// A window in the event's UTC time-of-day, `hh:mm:ss` bounds.
/// Only events in `[start, stop)` pass; `stop < start` wraps midnight.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeFilter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stop: String,
}

/// Equality constraints on the event context. Empty fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextFilter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub specversion: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datacontenttype: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
}

/// Typed constraint on one path of the event's JSON data.
///
/// Regular expressions are purposefully not supported here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilter {
    /// Dotted path into the decoded event data
    pub path: String,

    #[serde(rename = "type")]
    pub json_type: JsonType,

    /// Allowed values; an event passes the entry when any one matches
    pub value: Vec<String>,

    #[serde(default)]
    pub comparator: Comparator,
}

/// An action taken when a round is satisfied
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub template: TriggerTemplate,

    /// Parameters applied to the trigger template definition
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<TriggerPolicy>,
}

/// Template describing a trigger: a unique name, an optional execution
/// condition, and exactly one backend body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerTemplate {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch: Option<TriggerSwitch>,

    #[serde(flatten)]
    pub body: TriggerBody,
}

/// Condition on dependency-group phases gating a trigger.
/// `any` is an OR over groups, `all` an AND.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSwitch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<String>,
}

/// The one-of body of a trigger template, keyed the way the resource
/// JSON spells it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerBody {
    K8s(StandardK8sTrigger),
    ArgoWorkflow(ArgoWorkflowTrigger),
    Http(HttpTrigger),
    AwsLambda(AwsLambdaTrigger),
    Custom(CustomTrigger),
    Kafka(KafkaTrigger),
    Nats(NatsTrigger),
    Slack(SlackTrigger),
    OpenWhisk(OpenWhiskTrigger),
}

impl TriggerBody {
    /// Backend registry key for this body
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerBody::K8s(_) => "k8s",
            TriggerBody::ArgoWorkflow(_) => "argoWorkflow",
            TriggerBody::Http(_) => "http",
            TriggerBody::AwsLambda(_) => "awsLambda",
            TriggerBody::Custom(_) => "custom",
            TriggerBody::Kafka(_) => "kafka",
            TriggerBody::Nats(_) => "nats",
            TriggerBody::Slack(_) => "slack",
            TriggerBody::OpenWhisk(_) => "openWhisk",
        }
    }

    /// Artifact source for bodies materialized from an external template
    pub fn source(&self) -> Option<&ArtifactLocation> {
        match self {
            TriggerBody::K8s(t) => t.source.as_ref(),
            TriggerBody::ArgoWorkflow(t) => t.source.as_ref(),
            _ => None,
        }
    }

    /// Payload parameters for bodies that carry a constructed payload
    pub fn payload(&self) -> Option<&[TriggerParameter]> {
        match self {
            TriggerBody::Http(t) => Some(&t.payload),
            TriggerBody::AwsLambda(t) => Some(&t.payload),
            TriggerBody::Custom(t) => Some(&t.payload),
            TriggerBody::Kafka(t) => Some(&t.payload),
            TriggerBody::Nats(t) => Some(&t.payload),
            TriggerBody::OpenWhisk(t) => Some(&t.payload),
            TriggerBody::Slack(_) | TriggerBody::K8s(_) | TriggerBody::ArgoWorkflow(_) => None,
        }
    }

    /// Parameters applied to the resolved trigger resource itself
    pub fn resource_parameters(&self) -> &[TriggerParameter] {
        match self {
            TriggerBody::K8s(t) => &t.parameters,
            TriggerBody::ArgoWorkflow(t) => &t.parameters,
            TriggerBody::Http(t) => &t.parameters,
            TriggerBody::AwsLambda(t) => &t.parameters,
            TriggerBody::Custom(t) => &t.parameters,
            TriggerBody::Kafka(t) => &t.parameters,
            TriggerBody::Nats(t) => &t.parameters,
            TriggerBody::Slack(t) => &t.parameters,
            TriggerBody::OpenWhisk(t) => &t.parameters,
        }
    }
}

/// Operation performed on a cluster resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KubernetesResourceOperation {
    /// Deprecated; treated as an idempotent create-or-update
    #[default]
    Create,
    Update,
    Patch,
}

/// Patch strategy for the `patch` resource operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PatchStrategy {
    #[serde(rename = "application/json-patch+json")]
    JsonPatch,
    #[default]
    #[serde(rename = "application/merge-patch+json")]
    MergePatch,
    #[serde(rename = "application/strategic-merge-patch+json")]
    StrategicMergePatch,
    #[serde(rename = "application/apply-patch+yaml")]
    ServerSideApply,
}

/// Operation performed on an Argo Workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArgoWorkflowOperation {
    #[default]
    Submit,
    Suspend,
    Resubmit,
    Retry,
    Resume,
}

/// Kind coordinates for a cluster resource
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// Generic cluster resource trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardK8sTrigger {
    #[serde(flatten)]
    pub group_version_resource: GroupVersionResource,

    pub source: Option<ArtifactLocation>,

    #[serde(default)]
    pub operation: KubernetesResourceOperation,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,

    #[serde(default)]
    pub patch_strategy: PatchStrategy,

    /// Fetch the live object instead of materializing the artifact.
    /// Only valid for the `update` operation.
    #[serde(default)]
    pub live_object: bool,
}

/// Argo Workflow trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoWorkflowTrigger {
    pub source: Option<ArtifactLocation>,

    #[serde(default)]
    pub operation: ArgoWorkflowOperation,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,

    #[serde(flatten)]
    pub group_version_resource: GroupVersionResource,
}

/// TLS configuration for outbound trigger connections
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub ca_cert_path: String,
    #[serde(default)]
    pub client_cert_path: String,
    #[serde(default)]
    pub client_key_path: String,
}

/// Basic auth credentials resolved through the secret store
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    pub username: Option<SecretKeySelector>,
    pub password: Option<SecretKeySelector>,
    #[serde(default)]
    pub namespace: String,
}

/// HTTP request trigger with an on-the-fly constructable payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTrigger {
    pub url: String,

    #[serde(default)]
    pub payload: Vec<TriggerParameter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    /// HTTP method; defaults to POST
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,

    /// Request timeout in seconds; defaults to 60
    #[serde(default)]
    pub timeout: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// AWS Lambda invocation trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsLambdaTrigger {
    pub function_name: String,
    pub access_key: Option<SecretKeySelector>,
    pub secret_key: Option<SecretKeySelector>,
    #[serde(default)]
    pub namespace: String,
    pub region: String,
    #[serde(default)]
    pub payload: Vec<TriggerParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,
}

/// Custom trigger executed by an external trigger server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTrigger {
    pub server_url: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub cert_file_path: String,
    #[serde(default)]
    pub server_name_override: String,
    /// Opaque spec the trigger server knows how to interpret
    #[serde(default)]
    pub spec: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,
    #[serde(default)]
    pub payload: Vec<TriggerParameter>,
}

/// Kafka topic producer trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaTrigger {
    pub url: String,
    pub topic: String,
    #[serde(default)]
    pub partition: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,
    #[serde(default)]
    pub required_acks: i32,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub flush_frequency: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub payload: Vec<TriggerParameter>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub partitioning_key: String,
}

/// NATS subject publisher trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsTrigger {
    pub url: String,
    pub subject: String,
    #[serde(default)]
    pub payload: Vec<TriggerParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

/// Slack notification trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackTrigger {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,
    pub slack_token: Option<SecretKeySelector>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub message: String,
}

/// OpenWhisk action trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenWhiskTrigger {
    pub host: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub namespace: String,
    pub auth_token: Option<SecretKeySelector>,
    pub action_name: String,
    #[serde(default)]
    pub payload: Vec<TriggerParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,
}

/// What to do with the existing value at a parameter destination
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerParameterOperation {
    #[serde(rename = "")]
    #[default]
    None,
    Append,
    Overwrite,
    Prepend,
}

/// A parameter passed into a trigger document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerParameter {
    pub src: TriggerParameterSource,

    /// Destination path within the trigger document
    pub dest: String,

    #[serde(default)]
    pub operation: TriggerParameterOperation,
}

/// Where a parameter value comes from. Resolution precedence:
/// `data_template` > `data_key` > `context_template` > `context_key` >
/// literal `value`; a failing source falls through to the next one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TriggerParameterSource {
    /// Dependency whose snapshot event supplies the value
    pub dependency_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_template: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_template: String,

    /// Default literal used when no other source resolves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Post-dispatch success predicate for a trigger
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k8s: Option<K8sResourcePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusPolicy>,
}

/// Probe the dispatched resource's labels under a backoff schedule
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct K8sResourcePolicy {
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub backoff: Backoff,
    /// Whether exhausting the backoff is terminal for the sensor
    #[serde(default)]
    pub error_on_backoff_timeout: bool,
}

/// Accept the dispatch when its status code is in the allow list
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusPolicy {
    pub allow: Vec<u16>,
}

/// Modes of event subscription for the sensor
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpSubscription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nats: Option<NatsSubscription>,
}

/// HTTP push subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSubscription {
    pub port: u16,
}

/// NATS subject subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsSubscription {
    #[serde(rename = "serverURL")]
    pub server_url: String,
    pub subject: String,
}

impl Sensor {
    pub fn new(name: impl Into<String>, spec: SensorSpec) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            spec,
            status: SensorStatus::default(),
        }
    }

    /// Deterministic node ID for a node name.
    ///
    /// The sensor's own name maps to itself; everything else gets
    /// `{sensor}-{fnv32a(name)}`. Reloading the sensor object yields
    /// identical IDs.
    pub fn node_id(&self, name: &str) -> NodeId {
        if name == self.name {
            return self.name.clone();
        }
        format!("{}-{}", self.name, fnv32a(name))
    }

    /// Create the node for `name` if it does not exist yet
    pub fn init_node(&mut self, name: &str, node_type: NodeType) -> &mut NodeStatus {
        let id = self.node_id(name);
        self.status
            .nodes
            .entry(id.clone())
            .or_insert_with(|| NodeStatus::new(id, name.to_string(), node_type))
    }

    pub fn node(&self, name: &str) -> Option<&NodeStatus> {
        self.status.nodes.get(&self.node_id(name))
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeStatus> {
        let id = self.node_id(name);
        self.status.nodes.get_mut(&id)
    }

    /// Whether every dependency in the group is complete this round
    pub fn group_is_complete(&self, group: &DependencyGroup) -> bool {
        group
            .dependencies
            .iter()
            .all(|dep| matches!(self.node(dep).map(|n| n.phase), Some(NodePhase::Complete)))
    }

    /// Whether every event dependency is complete this round
    pub fn all_dependencies_complete(&self) -> bool {
        self.spec
            .dependencies
            .iter()
            .all(|dep| matches!(self.node(&dep.name).map(|n| n.phase), Some(NodePhase::Complete)))
    }

    /// The dependency matching an incoming `(source, event name)` pair
    pub fn dependency_for(&self, source: &str, event_name: &str) -> Option<&EventDependency> {
        self.spec
            .dependencies
            .iter()
            .find(|dep| dep.resolved_source() == source && dep.event_name == event_name)
    }

    /// Reset every event-dependency and group node for the next round
    pub fn reset_round_nodes(&mut self) {
        for node in self.status.nodes.values_mut() {
            if matches!(
                node.node_type,
                NodeType::EventDependency | NodeType::DependencyGroup
            ) {
                node.reset();
            }
        }
    }

    /// Check the spec for internal consistency before admitting it
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.spec.dependencies.is_empty() {
            return Err(ValidationError::NoDependencies);
        }
        if self.spec.triggers.is_empty() {
            return Err(ValidationError::NoTriggers);
        }

        let mut dep_names = HashSet::new();
        for dep in &self.spec.dependencies {
            if !dep_names.insert(dep.name.as_str()) {
                return Err(ValidationError::DuplicateDependency(dep.name.clone()));
            }
            if dep.resolved_source().is_empty() {
                return Err(ValidationError::MissingEventSource {
                    name: dep.name.clone(),
                });
            }
        }

        let mut group_names = HashSet::new();
        for group in &self.spec.dependency_groups {
            group_names.insert(group.name.as_str());
            for dep in &group.dependencies {
                if !dep_names.contains(dep.as_str()) {
                    return Err(ValidationError::UnknownGroupDependency {
                        group: group.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if !self.spec.circuit.is_empty() {
            if self.spec.dependency_groups.is_empty() {
                return Err(ValidationError::CircuitWithoutGroups);
            }
            let expr = circuit::parse(&self.spec.circuit)
                .map_err(|e| ValidationError::InvalidCircuit(e.to_string()))?;
            for atom in expr.atoms() {
                if !group_names.contains(atom) {
                    return Err(ValidationError::UnknownCircuitGroup(atom.to_string()));
                }
            }
        }

        let mut trigger_names = HashSet::new();
        for trigger in &self.spec.triggers {
            let name = &trigger.template.name;
            if !trigger_names.insert(name.as_str()) {
                return Err(ValidationError::DuplicateTrigger(name.clone()));
            }

            if let Some(switch) = &trigger.template.switch {
                for group in switch.any.iter().chain(switch.all.iter()) {
                    if !group_names.contains(group.as_str()) {
                        return Err(ValidationError::UnknownSwitchGroup {
                            trigger: name.clone(),
                            group: group.clone(),
                        });
                    }
                }
            }

            let payload = trigger.template.body.payload().unwrap_or(&[]);
            let resource_params = trigger.template.body.resource_parameters();
            for param in trigger
                .parameters
                .iter()
                .chain(resource_params.iter())
                .chain(payload.iter())
            {
                if param.dest.is_empty() {
                    return Err(ValidationError::EmptyParameterDest {
                        trigger: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
