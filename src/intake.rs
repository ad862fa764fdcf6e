use crate::error::IntakeError;
use crate::event::Event;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Drive one dependency's upstream event stream into the round engine's
/// queue.
///
/// `send().await` on the bounded queue is the backpressure point: when
/// the round actor is busy the producer blocks here, and nothing is
/// dropped. Returns when the stream ends, errors, or the scope cancels.
pub async fn run_intake<S>(
    dependency_name: String,
    mut stream: S,
    queue: mpsc::Sender<Event>,
    cancel: CancellationToken,
) -> Result<(), IntakeError>
where
    S: Stream<Item = Result<Event, IntakeError>> + Unpin + Send,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            item = stream.next() => match item {
                Some(Ok(event)) => {
                    if queue.send(event).await.is_err() {
                        return Err(IntakeError::QueueClosed);
                    }
                }
                Some(Err(e)) => {
                    return Err(IntakeError::Subscription {
                        dependency: dependency_name,
                        reason: e.to_string(),
                    });
                }
                None => return Ok(()),
            }
        }
    }
}

/// Owns the intake actors of a sensor: one task per subscribed
/// dependency, all feeding the single bounded queue and all sharing a
/// cancellation scope.
pub struct IntakeManager {
    queue: mpsc::Sender<Event>,
    cancel: CancellationToken,
    actors: Vec<JoinHandle<Result<(), IntakeError>>>,
}

impl IntakeManager {
    pub fn new(queue: mpsc::Sender<Event>, cancel: CancellationToken) -> Self {
        Self {
            queue,
            cancel,
            actors: Vec::new(),
        }
    }

    /// A clone of the queue sender, for push subscriptions and tests
    /// that feed events directly
    pub fn queue(&self) -> mpsc::Sender<Event> {
        self.queue.clone()
    }

    /// Spawn an intake actor for one dependency's event stream
    pub fn subscribe<S>(&mut self, dependency_name: impl Into<String>, stream: S)
    where
        S: Stream<Item = Result<Event, IntakeError>> + Unpin + Send + 'static,
    {
        let handle = tokio::spawn(run_intake(
            dependency_name.into(),
            stream,
            self.queue.clone(),
            self.cancel.child_token(),
        ));
        self.actors.push(handle);
    }

    /// Cancel every subscription and wait for the actors to wind down
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for actor in self.actors {
            let _ = actor.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventContext;
    use chrono::Utc;

    fn event(id: &str) -> Event {
        Event::new(
            EventContext {
                id: id.to_string(),
                source: "src".to_string(),
                specversion: "0.3".to_string(),
                event_type: "t".to_string(),
                datacontenttype: "application/json".to_string(),
                subject: "sub".to_string(),
                time: Utc::now(),
            },
            b"{}".to_vec(),
        )
    }

    #[tokio::test]
    async fn test_intake_forwards_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let stream = futures::stream::iter(vec![Ok(event("e1")), Ok(event("e2"))]);

        run_intake("dep-a".to_string(), stream, tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().context.id, "e1");
        assert_eq!(rx.recv().await.unwrap().context.id, "e2");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_intake_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        // a pending stream; only cancellation can end the actor
        let stream = futures::stream::pending::<Result<Event, IntakeError>>();
        let result = run_intake("dep-a".to_string(), stream, tx, cancel).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_intake_backpressure_blocks_until_consumed() {
        let (tx, mut rx) = mpsc::channel(1);
        let stream =
            futures::stream::iter((0..3).map(|i| Ok(event(&format!("e{}", i)))).collect::<Vec<_>>());

        let actor = tokio::spawn(run_intake(
            "dep-a".to_string(),
            stream,
            tx,
            CancellationToken::new(),
        ));

        // The queue holds one event; the actor can only finish once the
        // consumer drains. Nothing may be dropped.
        for i in 0..3 {
            let received = rx.recv().await.unwrap();
            assert_eq!(received.context.id, format!("e{}", i));
        }
        actor.await.unwrap().unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_manager_shutdown_ends_actors() {
        let (tx, _rx) = mpsc::channel(1);
        let mut manager = IntakeManager::new(tx, CancellationToken::new());
        manager.subscribe("dep-a", futures::stream::pending::<Result<Event, IntakeError>>());
        manager.subscribe("dep-b", futures::stream::pending::<Result<Event, IntakeError>>());
        manager.shutdown().await;
    }
}
