use crate::types::JsonType;
use thiserror::Error;

/// Main error type for the sensor runtime
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("event codec error: {0}")]
    Event(#[from] EventCodecError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("circuit error: {0}")]
    Circuit(#[from] CircuitError),

    #[error("parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while admitting a sensor specification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("sensor has no event dependencies")]
    NoDependencies,

    #[error("sensor has no triggers")]
    NoTriggers,

    #[error("duplicate dependency name '{0}'")]
    DuplicateDependency(String),

    #[error("duplicate trigger name '{0}'")]
    DuplicateTrigger(String),

    #[error("dependency '{name}' has no event source name")]
    MissingEventSource { name: String },

    #[error("dependency group '{group}' references unknown dependency '{dependency}'")]
    UnknownGroupDependency { group: String, dependency: String },

    #[error("circuit references unknown dependency group '{0}'")]
    UnknownCircuitGroup(String),

    #[error("circuit does not parse: {0}")]
    InvalidCircuit(String),

    #[error("circuit is set but sensor has no dependency groups")]
    CircuitWithoutGroups,

    #[error("trigger '{trigger}' parameter has empty destination path")]
    EmptyParameterDest { trigger: String },

    #[error("trigger '{trigger}' switch references unknown dependency group '{group}'")]
    UnknownSwitchGroup { trigger: String, group: String },
}

/// Errors decoding or encoding CloudEvent payloads
#[derive(Debug, Error)]
pub enum EventCodecError {
    #[error("event payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("event data is not JSON (content type '{content_type}')")]
    NotJson { content_type: String },
}

/// Filter evaluation failures. These reject the candidate event; they
/// never fail the sensor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("no value at data filter path '{path}'")]
    PathMissing { path: String },

    #[error("comparator '{comparator}' is not applicable to {json_type:?} at '{path}'")]
    TypeMismatch {
        path: String,
        json_type: JsonType,
        comparator: String,
    },

    #[error("event value at '{path}' is not a {expected:?}")]
    ValueMismatch { path: String, expected: JsonType },

    #[error("filter value '{value}' does not parse as {expected:?}")]
    MalformedFilterValue { value: String, expected: JsonType },

    #[error("time filter bound '{0}' is not in hh:mm:ss format")]
    MalformedTime(String),

    #[error("event data is not filterable JSON: {0}")]
    DataNotJson(String),
}

/// Circuit parse and evaluation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CircuitError {
    #[error("circuit parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("circuit references unresolved group '{0}'")]
    Unresolved(String),
}

/// Trigger parameter resolution failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("parameter for dest '{dest}' has no resolvable source and no default value")]
    Unresolved { dest: String },

    #[error("parameter source references unknown dependency '{dependency}'")]
    UnknownDependency { dependency: String },

    #[error("invalid destination path '{dest}': {message}")]
    InvalidDest { dest: String, message: String },
}

/// Trigger dispatch and policy failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("no backend registered for trigger kind '{0}'")]
    NoBackend(String),

    #[error("trigger '{name}' dispatch failed: {reason}")]
    DispatchFailed { name: String, reason: String },

    #[error("trigger '{name}' returned status {status}, not in allow list")]
    StatusNotAllowed { name: String, status: u16 },

    #[error("trigger '{name}' resource policy never reached success within backoff")]
    PolicyTimeout { name: String },

    #[error("trigger '{name}' has no resource probe configured for its policy")]
    NoResourceProbe { name: String },
}

/// Artifact fetch failures
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact source '{0}' has no fetcher configured")]
    Unsupported(&'static str),

    #[error("failed to read artifact file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch artifact url '{url}': {reason}")]
    Url { url: String, reason: String },

    #[error("artifact fetch failed: {0}")]
    Fetch(String),
}

/// State store failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no status recorded under key '{0}'")]
    NotFound(String),

    #[error("status write conflict for key '{key}' after {attempts} attempts")]
    WriteConflict { key: String, attempts: u32 },

    #[error("state store is closed")]
    Closed,
}

/// Event intake failures
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("event source '{name}' rejected: {reason}")]
    SourceInvalid { name: String, reason: String },

    #[error("failed to connect to gateway: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::Status),

    #[error("failed to decode event payload from source '{source_name}': {reason}")]
    Decode { source_name: String, reason: String },

    #[error("subscription for dependency '{dependency}' failed: {reason}")]
    Subscription { dependency: String, reason: String },

    #[error("intake queue closed")]
    QueueClosed,
}

/// Configuration validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {reason}")]
    FileNotFound { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Canonical reason string for an event source whose declared type does
/// not match the listener. Surfaced through `ValidEventSource.reason`.
pub fn event_source_type_mismatch(expected: &str) -> String {
    format!("event source type mismatch, expected {}", expected)
}
