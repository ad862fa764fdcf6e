use crate::circuit::{self, CircuitExpr};
use crate::error::{CircuitError, SensorError};
use crate::event::Event;
use crate::filter;
use crate::logging::FileLogger;
use crate::sensor::Sensor;
use crate::store::StatusRecorder;
use crate::trigger::{CycleOutcome, TriggerDispatcher, TriggerOutcomeStatus};
use crate::types::{NodePhase, NodeType};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "fsm_test.rs"]
mod fsm_test;

/// The round actor: owns the sensor's node state, serializes round
/// transitions, and hands satisfied rounds to the trigger dispatcher.
///
/// One engine per sensor; events enter through a single queue, so a
/// cycle in flight delays later events into the next round.
pub struct RoundEngine {
    sensor: Sensor,
    circuit: Option<CircuitExpr>,
    dispatcher: Arc<TriggerDispatcher>,
    recorder: Option<StatusRecorder>,
    logger: Option<FileLogger>,
    filtered: HashMap<String, u64>,
}

impl RoundEngine {
    /// Validate the sensor and build an engine for it. The circuit is
    /// parsed once here; an unparsable circuit never reaches event time.
    pub fn new(sensor: Sensor, dispatcher: Arc<TriggerDispatcher>) -> Result<Self, SensorError> {
        sensor.validate()?;
        let circuit = if sensor.spec.circuit.is_empty() {
            None
        } else {
            Some(circuit::parse(&sensor.spec.circuit)?)
        };
        Ok(Self {
            sensor,
            circuit,
            dispatcher,
            recorder: None,
            logger: None,
            filtered: HashMap::new(),
        })
    }

    pub fn with_recorder(mut self, recorder: StatusRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_logger(mut self, logger: FileLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn sensor(&self) -> &Sensor {
        &self.sensor
    }

    /// Events rejected by the dependency's filter, per dependency name
    pub fn filtered_count(&self, dependency: &str) -> u64 {
        self.filtered.get(dependency).copied().unwrap_or(0)
    }

    fn log(&self, message: impl AsRef<str>) {
        if let Some(logger) = &self.logger {
            logger.log(message);
        }
    }

    /// Create all nodes lazily-known from the spec and mark the sensor
    /// active. Runs once before any event is consumed.
    pub async fn initialize(&mut self) -> Result<(), SensorError> {
        let dependency_names: Vec<String> = self
            .sensor
            .spec
            .dependencies
            .iter()
            .map(|d| d.name.clone())
            .collect();
        for name in dependency_names {
            self.sensor.init_node(&name, NodeType::EventDependency);
        }

        let group_names: Vec<String> = self
            .sensor
            .spec
            .dependency_groups
            .iter()
            .map(|g| g.name.clone())
            .collect();
        for name in group_names {
            self.sensor.init_node(&name, NodeType::DependencyGroup);
        }

        let trigger_names: Vec<String> = self
            .sensor
            .spec
            .triggers
            .iter()
            .map(|t| t.template.name.clone())
            .collect();
        for name in trigger_names {
            self.sensor.init_node(&name, NodeType::Trigger);
        }

        self.sensor.status.transition(NodePhase::Active, "");
        self.log(format!("sensor {} active", self.sensor.name));
        self.record().await?;
        Ok(())
    }

    async fn record(&self) -> Result<(), SensorError> {
        if let Some(recorder) = &self.recorder {
            recorder.record(&self.sensor.status).await?;
        }
        Ok(())
    }

    /// Consume one event. Returns the cycle outcome when this event
    /// satisfied the circuit and a trigger round ran.
    pub async fn handle_event(
        &mut self,
        event: Event,
    ) -> Result<Option<CycleOutcome>, SensorError> {
        // A finished sensor fires no further triggers
        if self.sensor.status.is_complete() {
            return Ok(None);
        }

        let source = event.context.source.clone();
        let event_name = event.context.subject.clone();

        let Some(dependency) = self.sensor.dependency_for(&source, &event_name) else {
            // Unmatched events are dropped, not errors
            return Ok(None);
        };
        let dep_name = dependency.name.clone();
        let filters = dependency.filters.clone();

        if let Some(filters) = &filters {
            let accepted = match filter::apply_filter(filters, &event) {
                Ok(accepted) => accepted,
                Err(e) => {
                    self.log(format!("dependency {}: filter error: {}", dep_name, e));
                    false
                }
            };
            if !accepted {
                // Rejected events only bump the counter; the node is
                // left untouched
                *self.filtered.entry(dep_name.clone()).or_insert(0) += 1;
                return Ok(None);
            }
        }

        let node = self.sensor.init_node(&dep_name, NodeType::EventDependency);
        node.event = Some(event);
        node.transition(NodePhase::Complete, "");
        self.log(format!("dependency {} complete", dep_name));

        self.refresh_group_nodes();

        let satisfied = match self.round_ready() {
            Ok(satisfied) => satisfied,
            Err(e) => {
                // An unresolved circuit is a sensor-level failure
                self.sensor.status.transition(NodePhase::Error, e.to_string());
                self.record().await?;
                return Err(SensorError::Circuit(e));
            }
        };

        if !satisfied {
            self.record().await?;
            return Ok(None);
        }

        let outcome = self.run_cycle().await;
        self.record().await?;
        Ok(Some(outcome))
    }

    /// Recompute dependency-group node phases from their members
    fn refresh_group_nodes(&mut self) {
        let groups: Vec<(String, bool)> = self
            .sensor
            .spec
            .dependency_groups
            .iter()
            .map(|g| (g.name.clone(), self.sensor.group_is_complete(g)))
            .collect();
        for (name, complete) in groups {
            let node = self.sensor.init_node(&name, NodeType::DependencyGroup);
            if complete && node.phase != NodePhase::Complete {
                node.transition(NodePhase::Complete, "");
            }
        }
    }

    /// Whether the current round satisfies the circuit. An empty
    /// circuit means every group is complete when groups are declared,
    /// otherwise every dependency.
    fn round_ready(&self) -> Result<bool, CircuitError> {
        match &self.circuit {
            None => {
                let groups = &self.sensor.spec.dependency_groups;
                if groups.is_empty() {
                    return Ok(self.sensor.all_dependencies_complete());
                }
                Ok(groups.iter().all(|g| self.sensor.group_is_complete(g)))
            }
            Some(expr) => {
                let groups = &self.sensor.spec.dependency_groups;
                expr.evaluate(&|name| {
                    groups
                        .iter()
                        .find(|g| g.name == name)
                        .map(|g| self.sensor.group_is_complete(g))
                })
            }
        }
    }

    /// One trigger cycle: snapshot, reset, dispatch, record.
    async fn run_cycle(&mut self) -> CycleOutcome {
        // Snapshot is immutable once taken; events landing during
        // trigger execution belong to the next round.
        let mut snapshot: HashMap<String, Event> = HashMap::new();
        for dep in &self.sensor.spec.dependencies {
            if let Some(node) = self.sensor.node(&dep.name) {
                if node.phase == NodePhase::Complete {
                    if let Some(event) = &node.event {
                        snapshot.insert(dep.name.clone(), event.clone());
                    }
                }
            }
        }

        let group_complete: HashMap<String, bool> = self
            .sensor
            .spec
            .dependency_groups
            .iter()
            .map(|g| (g.name.clone(), self.sensor.group_is_complete(g)))
            .collect();

        self.sensor.reset_round_nodes();
        self.sensor.status.trigger_cycle_count =
            self.sensor.status.trigger_cycle_count.saturating_add(1);
        let cycle = self.sensor.status.trigger_cycle_count;
        self.log(format!("cycle {} starting", cycle));

        let triggers = self.sensor.spec.triggers.clone();
        let outcome = self
            .dispatcher
            .dispatch_cycle(&triggers, &snapshot, &group_complete)
            .await;

        for trigger_outcome in &outcome.outcomes {
            let node = self
                .sensor
                .init_node(&trigger_outcome.name, NodeType::Trigger);
            match &trigger_outcome.status {
                TriggerOutcomeStatus::Completed { message } => {
                    node.transition(NodePhase::Complete, message.clone());
                }
                TriggerOutcomeStatus::Skipped { reason } => {
                    node.transition(NodePhase::New, reason.clone());
                }
                TriggerOutcomeStatus::Failed { error, .. } => {
                    node.transition(NodePhase::Error, error.to_string());
                }
            }
        }

        self.sensor.status.trigger_cycle_status = Some(outcome.cycle_status);
        self.sensor.status.last_cycle_time = Some(Utc::now());
        self.log(format!("cycle {} finished: {:?}", cycle, outcome.cycle_status));

        if let Some(reason) = &outcome.terminal_error {
            self.sensor.status.transition(NodePhase::Error, reason.clone());
        } else if self.sensor.spec.error_on_failed_round
            && outcome.cycle_status == crate::types::TriggerCycleState::Failure
        {
            self.sensor
                .status
                .transition(NodePhase::Error, "trigger round failed");
        }

        outcome
    }

    /// Drive the engine from an event queue until cancelled or the
    /// queue closes, then flush a final status write.
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>, cancel: CancellationToken) -> Sensor {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => {
                    match received {
                        Some(event) => {
                            if let Err(e) = self.handle_event(event).await {
                                self.log(format!("event handling failed: {}", e));
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        if let Err(e) = self.record().await {
            self.log(format!("final status write failed: {}", e));
        }
        self.sensor
    }
}
