use crate::config::RuntimeConfig;
use crate::error::{IntakeError, SensorError};
use crate::event::Event;
use crate::fsm::RoundEngine;
use crate::intake::IntakeManager;
use crate::logging::FileLogger;
use crate::sensor::Sensor;
use crate::store::{StateStore, StatusRecorder};
use crate::trigger::TriggerDispatcher;
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Wires a validated sensor to its actors: intake streams feeding one
/// bounded queue, the round engine consuming it, and the status
/// recorder persisting every material transition.
pub struct SensorRuntime {
    engine: RoundEngine,
    queue_capacity: usize,
}

impl SensorRuntime {
    pub fn new(
        sensor: Sensor,
        dispatcher: Arc<TriggerDispatcher>,
        store: Arc<dyn StateStore>,
        config: &RuntimeConfig,
    ) -> Result<Self, SensorError> {
        config.validate()?;

        let key = if sensor.namespace.is_empty() {
            sensor.name.clone()
        } else {
            format!("{}/{}", sensor.namespace, sensor.name)
        };
        let recorder = StatusRecorder::new(store, key).with_max_attempts(config.store.write_retries);

        let mut engine = RoundEngine::new(sensor, dispatcher)?.with_recorder(recorder);

        if !config.logging.directory.is_empty() {
            if let Ok(logger) =
                FileLogger::for_sensor(&config.logging.directory, &engine.sensor().name)
            {
                engine = engine.with_logger(logger);
            }
        }

        Ok(Self {
            engine,
            queue_capacity: config.intake.queue_capacity,
        })
    }

    /// Initialize status, spawn the round actor, and hand back the
    /// running sensor's handle.
    pub async fn start(mut self) -> Result<SensorHandle, SensorError> {
        self.engine.initialize().await?;

        let (queue, events) = mpsc::channel::<Event>(self.queue_capacity);
        let cancel = CancellationToken::new();
        let round_actor = tokio::spawn(self.engine.run(events, cancel.child_token()));
        let intake = IntakeManager::new(queue.clone(), cancel.child_token());

        Ok(SensorHandle {
            queue,
            cancel,
            round_actor,
            intake,
        })
    }
}

/// Handle to a running sensor
pub struct SensorHandle {
    queue: mpsc::Sender<Event>,
    cancel: CancellationToken,
    round_actor: JoinHandle<Sensor>,
    intake: IntakeManager,
}

impl SensorHandle {
    /// Sender into the round engine's queue, for push subscriptions and
    /// direct feeding in tests
    pub fn queue(&self) -> mpsc::Sender<Event> {
        self.queue.clone()
    }

    /// Subscribe one dependency to an upstream event stream (typically
    /// `GatewayClient::start`)
    pub fn subscribe<S>(&mut self, dependency_name: impl Into<String>, stream: S)
    where
        S: Stream<Item = Result<Event, IntakeError>> + Unpin + Send + 'static,
    {
        self.intake.subscribe(dependency_name, stream);
    }

    /// Cancel subscriptions and the round actor, wait for the final
    /// status flush, and return the sensor in its terminal state.
    pub async fn shutdown(self) -> Sensor {
        self.intake.shutdown().await;
        drop(self.queue);
        self.cancel.cancel();
        self.round_actor.await.expect("round actor panicked")
    }

    /// Close the intake side and wait for the round actor to drain the
    /// queue and finish. Hangs while clones of `queue()` are alive.
    pub async fn join(self) -> Sensor {
        self.intake.shutdown().await;
        drop(self.queue);
        self.round_actor.await.expect("round actor panicked")
    }
}
