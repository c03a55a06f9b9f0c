//! Client side of audio delivery.
//!
//! [`AudioStreamClient`] turns a synthesized [`AudioBuffer`] into one
//! delivery session, either as a single push or as a start marker followed
//! by paced chunks. The transport underneath is swappable so the pipeline
//! can be exercised without a network.

use crate::audio::buffer::{AudioBuffer, f32_to_le_bytes};
use crate::audio::chunker::AudioChunker;
use crate::config::DeliveryConfig;
use crate::delivery::protocol::{
    self, MAX_MESSAGE_LEN, PUSH_AUDIO_METHOD, PUSH_AUDIO_STREAM_METHOD, PushAudioRequest,
    PushAudioRequestStart, PushAudioResponse, PushAudioStreamRequest,
};
use crate::error::{FacetalkError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Code;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};

/// How a buffer is handed to the animation service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// The whole buffer in one request.
    #[default]
    SinglePush,
    /// A start marker, then paced chunks.
    Streamed,
}

impl std::str::FromStr for DeliveryMode {
    type Err = FacetalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "single_push" | "push" => Ok(DeliveryMode::SinglePush),
            "streamed" | "stream" => Ok(DeliveryMode::Streamed),
            other => Err(FacetalkError::ConfigInvalidValue {
                key: "delivery.mode".to_string(),
                message: format!("unknown mode '{}'", other),
            }),
        }
    }
}

/// An open streamed session.
pub trait AudioStream: Send {
    /// Sends one stream message.
    fn send(&mut self, request: PushAudioStreamRequest) -> Result<()>;

    /// Closes the send side and waits for the session outcome.
    fn finish(self: Box<Self>) -> Result<PushAudioResponse>;
}

/// Carries delivery calls to the animation service.
pub trait AudioTransport: Send + Sync {
    /// Performs a single-push call.
    fn push_audio(&self, request: PushAudioRequest) -> Result<PushAudioResponse>;

    /// Opens a streamed session.
    fn open_stream(&self) -> Result<Box<dyn AudioStream>>;
}

impl<T: AudioTransport> AudioTransport for Arc<T> {
    fn push_audio(&self, request: PushAudioRequest) -> Result<PushAudioResponse> {
        (**self).push_audio(request)
    }

    fn open_stream(&self) -> Result<Box<dyn AudioStream>> {
        (**self).open_stream()
    }
}

/// gRPC calls to the animation service, one HTTP/2 connection per session.
///
/// Calls are driven on a small owned runtime so the transport can be used
/// from plain worker threads.
#[derive(Clone)]
pub struct GrpcTransport {
    endpoint: Endpoint,
    runtime: Arc<Runtime>,
}

impl std::fmt::Debug for GrpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcTransport")
            .field("address", &self.address())
            .finish()
    }
}

impl GrpcTransport {
    /// Creates a transport for a `host:port` address or an `http://` URL.
    ///
    /// # Errors
    /// Returns `FacetalkError::DeliveryConnection` for an unusable address.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let uri = if address.contains("://") {
            address
        } else {
            format!("http://{}", address)
        };
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| FacetalkError::DeliveryConnection {
                message: format!("Invalid service address {}: {}", uri, e),
            })?
            .connect_timeout(Duration::from_secs(5))
            .tcp_nodelay(true);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("facetalk-delivery")
            .enable_all()
            .build()
            .map_err(|e| FacetalkError::DeliveryConnection {
                message: format!("Failed to start delivery runtime: {}", e),
            })?;

        Ok(Self {
            endpoint,
            runtime: Arc::new(runtime),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint = self.endpoint.connect_timeout(timeout);
        self
    }

    pub fn address(&self) -> String {
        self.endpoint.uri().to_string()
    }

    fn connect(&self) -> Result<Grpc<Channel>> {
        let channel = self
            .runtime
            .block_on(self.endpoint.connect())
            .map_err(|e| FacetalkError::DeliveryConnection {
                message: format!("Failed to connect to {}: {}", self.address(), e),
            })?;
        Ok(Grpc::new(channel).max_encoding_message_size(MAX_MESSAGE_LEN))
    }
}

fn status_error(status: tonic::Status) -> FacetalkError {
    match status.code() {
        Code::Unavailable | Code::Cancelled | Code::DeadlineExceeded => {
            FacetalkError::DeliveryConnection {
                message: status.message().to_string(),
            }
        }
        code => FacetalkError::DeliveryProtocol {
            message: format!("{:?}: {}", code, status.message()),
        },
    }
}

async fn ready(grpc: &mut Grpc<Channel>) -> std::result::Result<(), tonic::Status> {
    grpc.ready()
        .await
        .map_err(|e| tonic::Status::unavailable(format!("Service was not ready: {}", e)))
}

impl AudioTransport for GrpcTransport {
    fn push_audio(&self, request: PushAudioRequest) -> Result<PushAudioResponse> {
        let mut grpc = self.connect()?;
        let call = async move {
            ready(&mut grpc).await?;
            grpc.unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(PUSH_AUDIO_METHOD),
                ProstCodec::<PushAudioRequest, PushAudioResponse>::default(),
            )
            .await
        };
        let response = self.runtime.block_on(call).map_err(status_error)?;
        Ok(response.into_inner())
    }

    fn open_stream(&self) -> Result<Box<dyn AudioStream>> {
        let mut grpc = self.connect()?;
        let (sender, receiver) = mpsc::channel(STREAM_BUFFER);
        let call = self.runtime.spawn(async move {
            ready(&mut grpc).await?;
            let response = grpc
                .client_streaming(
                    tonic::Request::new(ReceiverStream::new(receiver)),
                    PathAndQuery::from_static(PUSH_AUDIO_STREAM_METHOD),
                    ProstCodec::<PushAudioStreamRequest, PushAudioResponse>::default(),
                )
                .await?;
            Ok::<_, tonic::Status>(response.into_inner())
        });
        Ok(Box::new(GrpcAudioStream {
            runtime: Arc::clone(&self.runtime),
            sender,
            call: Some(call),
        }))
    }
}

/// Messages buffered ahead of the HTTP/2 stream.
const STREAM_BUFFER: usize = 16;

type StreamCall = JoinHandle<std::result::Result<PushAudioResponse, tonic::Status>>;

struct GrpcAudioStream {
    runtime: Arc<Runtime>,
    sender: mpsc::Sender<PushAudioStreamRequest>,
    call: Option<StreamCall>,
}

impl GrpcAudioStream {
    fn outcome(runtime: &Runtime, call: StreamCall) -> Result<PushAudioResponse> {
        match runtime.block_on(call) {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(status)) => Err(status_error(status)),
            Err(e) => Err(FacetalkError::DeliveryConnection {
                message: format!("Stream call aborted: {}", e),
            }),
        }
    }
}

impl AudioStream for GrpcAudioStream {
    fn send(&mut self, request: PushAudioStreamRequest) -> Result<()> {
        if self.sender.blocking_send(request).is_ok() {
            return Ok(());
        }
        // The call ended before the stream did; report how it ended.
        let Some(call) = self.call.take() else {
            return Err(FacetalkError::DeliveryConnection {
                message: "Stream already closed".to_string(),
            });
        };
        let early = Self::outcome(&self.runtime, call).and_then(check_response);
        Err(early
            .err()
            .unwrap_or_else(|| FacetalkError::DeliveryProtocol {
                message: "Server answered before the stream ended".to_string(),
            }))
    }

    fn finish(self: Box<Self>) -> Result<PushAudioResponse> {
        let GrpcAudioStream {
            runtime,
            sender,
            call,
        } = *self;
        drop(sender);
        match call {
            Some(call) => Self::outcome(&runtime, call),
            None => Err(FacetalkError::DeliveryConnection {
                message: "Stream already closed".to_string(),
            }),
        }
    }
}

/// A session recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedSession {
    Push(PushAudioRequest),
    Stream(Vec<PushAudioStreamRequest>),
}

impl RecordedSession {
    /// Samples carried by the session, in send order.
    pub fn samples(&self) -> Vec<f32> {
        use crate::delivery::protocol::push_audio_stream_request::Request;

        let bytes: Vec<u8> = match self {
            RecordedSession::Push(request) => request.audio_data.clone(),
            RecordedSession::Stream(messages) => messages
                .iter()
                .filter_map(|m| match &m.request {
                    Some(Request::AudioData(data)) => Some(data.as_slice()),
                    _ => None,
                })
                .flatten()
                .copied()
                .collect(),
        };
        crate::audio::buffer::f32_from_le_bytes(&bytes).unwrap_or_default()
    }
}

/// In-process transport that records every session.
///
/// Useful for tests and dry runs.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    sessions: Arc<Mutex<Vec<RecordedSession>>>,
    response: PushAudioResponse,
    refuse_connections: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(Vec::new())),
            response: PushAudioResponse::ok(),
            refuse_connections: false,
        }
    }

    /// Answers every session with `response`.
    pub fn with_response(mut self, response: PushAudioResponse) -> Self {
        self.response = response;
        self
    }

    /// Fails every session as if the server were unreachable.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Snapshot of the sessions recorded so far.
    pub fn sessions(&self) -> Vec<RecordedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check_connection(&self) -> Result<()> {
        if self.refuse_connections {
            return Err(FacetalkError::DeliveryConnection {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, session: RecordedSession) {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(session);
    }
}

impl AudioTransport for MemoryTransport {
    fn push_audio(&self, request: PushAudioRequest) -> Result<PushAudioResponse> {
        self.check_connection()?;
        self.record(RecordedSession::Push(request));
        Ok(self.response.clone())
    }

    fn open_stream(&self) -> Result<Box<dyn AudioStream>> {
        self.check_connection()?;
        Ok(Box::new(MemoryAudioStream {
            transport: self.clone(),
            messages: Vec::new(),
        }))
    }
}

struct MemoryAudioStream {
    transport: MemoryTransport,
    messages: Vec<PushAudioStreamRequest>,
}

impl AudioStream for MemoryAudioStream {
    fn send(&mut self, request: PushAudioStreamRequest) -> Result<()> {
        self.messages.push(request);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<PushAudioResponse> {
        let MemoryAudioStream {
            transport,
            messages,
        } = *self;
        transport.record(RecordedSession::Stream(messages));
        Ok(transport.response.clone())
    }
}

/// Delivers synthesized buffers to one animation instance.
pub struct AudioStreamClient {
    transport: Arc<dyn AudioTransport>,
    chunker: AudioChunker,
    instance_name: String,
    mode: DeliveryMode,
    block_until_playback_is_finished: bool,
}

impl AudioStreamClient {
    /// Creates a single-push client.
    pub fn new(
        transport: Arc<dyn AudioTransport>,
        chunker: AudioChunker,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            chunker,
            instance_name: instance_name.into(),
            mode: DeliveryMode::SinglePush,
            block_until_playback_is_finished: true,
        }
    }

    /// Builds a gRPC client from the delivery configuration.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self> {
        let chunker = AudioChunker::new(config.chunks_per_second, config.chunk_delay())?;
        let transport = GrpcTransport::new(config.url.trim())?;
        Ok(
            Self::new(Arc::new(transport), chunker, &config.instance_name)
                .with_mode(config.mode)
                .with_blocking(config.block_until_playback_is_finished),
        )
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_blocking(mut self, block: bool) -> Self {
        self.block_until_playback_is_finished = block;
        self
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Delivers one buffer as one session, in the configured mode.
    ///
    /// # Errors
    /// `DeliveryConnection`/`DeliveryProtocol` on transport failure,
    /// `DeliveryRejected` when the server answers `success = false`.
    pub fn deliver(&self, buffer: &AudioBuffer) -> Result<()> {
        match self.mode {
            DeliveryMode::SinglePush => self.push(buffer),
            DeliveryMode::Streamed => self.stream(buffer),
        }
    }

    /// Sends the whole buffer in one request.
    pub fn push(&self, buffer: &AudioBuffer) -> Result<()> {
        let request = PushAudioRequest {
            instance_name: self.instance_name.clone(),
            samplerate: buffer.sample_rate(),
            audio_data: f32_to_le_bytes(buffer.samples()),
            block_until_playback_is_finished: self.block_until_playback_is_finished,
        };
        protocol::check_message_size(&request)?;
        tracing::debug!(
            samples = buffer.len(),
            sample_rate = buffer.sample_rate(),
            "pushing audio"
        );
        check_response(self.transport.push_audio(request)?)
    }

    /// Sends a start marker, then each chunk, pausing between chunks.
    pub fn stream(&self, buffer: &AudioBuffer) -> Result<()> {
        let chunks = self.chunker.split(buffer);
        tracing::debug!(
            chunks = chunks.len(),
            sample_rate = buffer.sample_rate(),
            "streaming audio"
        );

        let mut session = self.transport.open_stream()?;
        session.send(PushAudioStreamRequest::start_marker(PushAudioRequestStart {
            instance_name: self.instance_name.clone(),
            samplerate: buffer.sample_rate(),
            block_until_playback_is_finished: self.block_until_playback_is_finished,
        }))?;

        for chunk in &chunks {
            if chunk.index > 0 && !self.chunker.delay().is_zero() {
                std::thread::sleep(self.chunker.delay());
            }
            let request = PushAudioStreamRequest::audio_data(f32_to_le_bytes(chunk.samples));
            protocol::check_message_size(&request)?;
            session.send(request)?;
        }

        check_response(session.finish()?)
    }
}

fn check_response(response: PushAudioResponse) -> Result<()> {
    if response.success {
        Ok(())
    } else {
        Err(FacetalkError::DeliveryRejected {
            message: response.message,
        })
    }
}
