// Core modules
pub mod artifact;
pub mod backoff;
pub mod circuit;
pub mod config;
pub mod error;
pub mod event;
pub mod eventing;
pub mod filter;
pub mod fsm;
pub mod intake;
pub mod logging;
pub mod params;
pub mod path;
pub mod runtime;
pub mod sensor;
pub mod state;
pub mod store;
pub mod trigger;
pub mod types;

// Re-exports for convenience
pub use artifact::{
    ArtifactLocation, ArtifactReader, DefaultArtifactReader, RemoteFetcher, SecretKeySelector,
    SecretResolver,
};
pub use backoff::Backoff;
pub use circuit::CircuitExpr;
pub use config::{IntakeConfig, LoggingConfig, RuntimeConfig, StoreConfig};
pub use error::{
    CircuitError, ConfigError, EventCodecError, FilterError, IntakeError, ParameterError,
    SensorError, StoreError, TriggerError, ValidationError,
};
pub use event::{Event, EventContext};
pub use eventing::{new_event_source, EventingService, GatewayClient, SourceListener};
pub use filter::apply_filter;
pub use fsm::RoundEngine;
pub use intake::IntakeManager;
pub use logging::FileLogger;
pub use params::{apply_parameters, build_payload, resolve_parameter_value};
pub use path::{select, set, SetOperation};
pub use runtime::{SensorHandle, SensorRuntime};
pub use sensor::{
    ContextFilter, DataFilter, DependencyGroup, EventDependency, EventDependencyFilter,
    HttpTrigger, K8sResourcePolicy, Sensor, SensorSpec, StatusPolicy, TimeFilter, Trigger,
    TriggerBody, TriggerParameter, TriggerParameterOperation, TriggerParameterSource,
    TriggerPolicy, TriggerSwitch, TriggerTemplate,
};
pub use state::{NodeStatus, SensorResources, SensorStatus};
pub use store::{InMemoryStateStore, StateStore, StatusRecorder, VersionedStatus};
pub use trigger::{
    switch_allows, CycleOutcome, HttpTriggerBackend, ResourceLabelProbe, TriggerBackend,
    TriggerDispatcher, TriggerOutcome, TriggerOutcomeStatus, TriggerResult,
};
pub use types::{fnv32a, Comparator, JsonType, NodeId, NodePhase, NodeType, TriggerCycleState};

// Prelude module for convenient imports in tests and embedders
pub mod prelude {
    pub use crate::error::SensorError;
    pub use crate::event::{Event, EventContext};
    pub use crate::fsm::RoundEngine;
    pub use crate::runtime::{SensorHandle, SensorRuntime};
    pub use crate::sensor::{
        DependencyGroup, EventDependency, Sensor, SensorSpec, Trigger, TriggerBody,
        TriggerTemplate,
    };
    pub use crate::store::{InMemoryStateStore, StateStore};
    pub use crate::trigger::{TriggerBackend, TriggerDispatcher, TriggerResult};
    pub use crate::types::{NodePhase, NodeType, TriggerCycleState};
}
