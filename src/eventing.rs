use crate::error::{event_source_type_mismatch, IntakeError};
use crate::event::Event;
use futures::Stream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// Generated messages and service stubs for the `gateways.Eventing`
/// wire contract.
pub mod proto {
    tonic::include_proto!("gateways");
}

use proto::eventing_client::EventingClient;
use proto::eventing_server::{Eventing, EventingServer};
use proto::{Event as ProtoEvent, EventSource, ValidEventSource};

/// Capacity of the per-stream event buffers. Small on purpose: a slow
/// consumer backpressures the producer instead of buffering.
const STREAM_BUFFER: usize = 16;

/// Build an `EventSource` message with a freshly generated ID
pub fn new_event_source(
    name: impl Into<String>,
    source_type: impl Into<String>,
    value: Vec<u8>,
) -> EventSource {
    EventSource {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.into(),
        value,
        r#type: source_type.into(),
    }
}

/// A gateway-side event source implementation.
///
/// One listener serves one source kind; the server rejects
/// configurations whose declared `type` differs.
#[async_trait::async_trait]
pub trait SourceListener: Send + Sync + 'static {
    /// Source kind this listener serves, e.g. "minio"
    fn source_type(&self) -> &str;

    /// Validate the opaque configuration value before binding
    async fn validate(&self, source: &EventSource) -> Result<(), String>;

    /// Run the source until cancellation, emitting events into `events`.
    /// Implementations must release source-side resources on cancel.
    async fn listen(
        &self,
        source: EventSource,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Result<(), IntakeError>;
}

/// gRPC server wrapping a `SourceListener`
pub struct EventingService<L> {
    listener: Arc<L>,
}

impl<L: SourceListener> EventingService<L> {
    pub fn new(listener: Arc<L>) -> Self {
        Self { listener }
    }

    /// The tonic service wrapper, ready to mount on a transport server
    pub fn into_server(self) -> EventingServer<Self> {
        EventingServer::new(self)
    }
}

#[tonic::async_trait]
impl<L: SourceListener> Eventing for EventingService<L> {
    async fn validate_event_source(
        &self,
        request: Request<EventSource>,
    ) -> Result<Response<ValidEventSource>, Status> {
        let source = request.into_inner();

        if source.r#type != self.listener.source_type() {
            return Ok(Response::new(ValidEventSource {
                is_valid: false,
                reason: event_source_type_mismatch(self.listener.source_type()),
            }));
        }

        match self.listener.validate(&source).await {
            Ok(()) => Ok(Response::new(ValidEventSource {
                is_valid: true,
                reason: String::new(),
            })),
            Err(reason) => Ok(Response::new(ValidEventSource {
                is_valid: false,
                reason,
            })),
        }
    }

    type StartEventSourceStream = ReceiverStream<Result<ProtoEvent, Status>>;

    async fn start_event_source(
        &self,
        request: Request<EventSource>,
    ) -> Result<Response<Self::StartEventSourceStream>, Status> {
        let source = request.into_inner();

        if source.r#type != self.listener.source_type() {
            return Err(Status::invalid_argument(event_source_type_mismatch(
                self.listener.source_type(),
            )));
        }
        if let Err(reason) = self.listener.validate(&source).await {
            return Err(Status::invalid_argument(reason));
        }

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(STREAM_BUFFER);
        let (out_tx, out_rx) = mpsc::channel(STREAM_BUFFER);
        let cancel = CancellationToken::new();

        let listener = self.listener.clone();
        let producer_cancel = cancel.child_token();
        let producer_source = source.clone();
        let producer_out = out_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = listener
                .listen(producer_source, event_tx, producer_cancel)
                .await
            {
                let _ = producer_out.send(Err(Status::internal(e.to_string()))).await;
            }
        });

        let name = source.name.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Client cancelled; tear the producer down even if
                    // the source is currently quiet
                    _ = out_tx.closed() => break,
                    received = event_rx.recv() => {
                        let Some(event) = received else { break };
                        let payload = match event.encode() {
                            Ok(payload) => payload,
                            Err(e) => {
                                let _ = out_tx.send(Err(Status::internal(e.to_string()))).await;
                                break;
                            }
                        };
                        let frame = ProtoEvent {
                            name: name.clone(),
                            payload,
                        };
                        if out_tx.send(Ok(frame)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            cancel.cancel();
        });

        Ok(Response::new(ReceiverStream::new(out_rx)))
    }
}

/// Client handle for a gateway's eventing endpoint. Decodes CloudEvent
/// payloads and surfaces transport failures as `IntakeError`.
pub struct GatewayClient {
    inner: EventingClient<tonic::transport::Channel>,
}

impl GatewayClient {
    pub async fn connect(endpoint: String) -> Result<Self, IntakeError> {
        let inner = EventingClient::connect(endpoint)
            .await
            .map_err(|e| IntakeError::Connect(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn from_channel(channel: tonic::transport::Channel) -> Self {
        Self {
            inner: EventingClient::new(channel),
        }
    }

    /// Validate a source configuration before binding a subscription
    pub async fn validate(&mut self, source: EventSource) -> Result<ValidEventSource, IntakeError> {
        let response = self.inner.validate_event_source(source).await?;
        Ok(response.into_inner())
    }

    /// Start a source and return its decoded event stream. Dropping the
    /// stream cancels the server-side producer.
    pub async fn start(
        &mut self,
        source: EventSource,
    ) -> Result<impl Stream<Item = Result<Event, IntakeError>> + Unpin, IntakeError> {
        let valid = self.validate(source.clone()).await?;
        if !valid.is_valid {
            return Err(IntakeError::SourceInvalid {
                name: source.name,
                reason: valid.reason,
            });
        }

        let source_name = source.name.clone();
        let stream = self.inner.start_event_source(source).await?.into_inner();
        Ok(stream.map(move |item| match item {
            Ok(frame) => Event::decode(&frame.payload).map_err(|e| IntakeError::Decode {
                source_name: source_name.clone(),
                reason: e.to_string(),
            }),
            Err(status) => Err(IntakeError::Transport(status)),
        }))
    }
}
