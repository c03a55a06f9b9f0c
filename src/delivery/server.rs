//! Receiving end of audio delivery.
//!
//! A small stand-in for the animation service: a gRPC server with the
//! `PushAudio` and `PushAudioStream` methods that hands decoded audio to an
//! [`AudioPlayer`] and answers each session with one `PushAudioResponse`.
//! Useful for local testing and for `facetalk serve`.

use crate::audio::buffer::f32_from_le_bytes;
use crate::delivery::protocol::{
    MAX_MESSAGE_LEN, MISSING_START_MARKER, PUSH_AUDIO_METHOD, PUSH_AUDIO_STREAM_METHOD,
    PushAudioRequest, PushAudioResponse, PushAudioStreamRequest, SERVICE_NAME,
    push_audio_stream_request::Request,
};
use crate::error::{FacetalkError, Result};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::Streaming;
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::{Body, BoxFuture, Context, Poll, Service, StdError, http};
use tonic::server::{ClientStreamingService, Grpc, NamedService, UnaryService};
use tonic::transport::Server;

/// Metadata announced at the start of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub instance_name: String,
    pub sample_rate: u32,
    pub block_until_playback_is_finished: bool,
}

/// Consumes delivered audio.
///
/// Sessions are handed over one at a time: `audio_start`, any number of
/// `push_chunk` calls, then `audio_end`.
#[async_trait::async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn audio_start(&self, session: &SessionInfo) -> Result<()>;

    async fn push_chunk(&self, samples: Vec<f32>) -> Result<()>;

    async fn audio_end(&self) -> Result<()>;
}

/// Audio received in one completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedAudio {
    pub session: SessionInfo,
    pub samples: Vec<f32>,
    /// Number of `push_chunk` calls in the session.
    pub chunks: usize,
}

/// Keeps every completed session in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingPlayer {
    current: Arc<Mutex<Option<ReceivedAudio>>>,
    finished: Arc<Mutex<Vec<ReceivedAudio>>>,
}

impl CollectingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed sessions, oldest first.
    pub fn sessions(&self) -> Vec<ReceivedAudio> {
        self.finished
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl AudioPlayer for CollectingPlayer {
    async fn audio_start(&self, session: &SessionInfo) -> Result<()> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(ReceivedAudio {
            session: session.clone(),
            samples: Vec::new(),
            chunks: 0,
        });
        Ok(())
    }

    async fn push_chunk(&self, samples: Vec<f32>) -> Result<()> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let audio = current
            .as_mut()
            .ok_or_else(|| FacetalkError::Other("audio chunk outside of a session".to_string()))?;
        audio.samples.extend(samples);
        audio.chunks += 1;
        Ok(())
    }

    async fn audio_end(&self) -> Result<()> {
        let audio = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(audio) = audio {
            self.finished
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(audio);
        }
        Ok(())
    }
}

/// Logs session boundaries and sizes.
#[derive(Debug, Default)]
pub struct LoggingPlayer {
    samples: Mutex<usize>,
}

#[async_trait::async_trait]
impl AudioPlayer for LoggingPlayer {
    async fn audio_start(&self, session: &SessionInfo) -> Result<()> {
        *self.samples.lock().unwrap_or_else(|e| e.into_inner()) = 0;
        tracing::info!(
            instance = %session.instance_name,
            sample_rate = session.sample_rate,
            block = session.block_until_playback_is_finished,
            "audio start"
        );
        Ok(())
    }

    async fn push_chunk(&self, samples: Vec<f32>) -> Result<()> {
        *self.samples.lock().unwrap_or_else(|e| e.into_inner()) += samples.len();
        tracing::debug!(samples = samples.len(), "audio chunk");
        Ok(())
    }

    async fn audio_end(&self) -> Result<()> {
        let total = *self.samples.lock().unwrap_or_else(|e| e.into_inner());
        tracing::info!(samples = total, "audio end");
        Ok(())
    }
}

/// gRPC server offering the Audio2Face delivery calls.
pub struct AudioReceiver {
    listener: TcpListener,
    shutdown: CancellationToken,
}

impl AudioReceiver {
    /// Binds to `host:port`, moving to the next port while the current one
    /// is taken, for up to `attempts` ports.
    ///
    /// # Errors
    /// Returns `FacetalkError::ReceiverSocket` if no port in the range is free.
    pub async fn bind(host: &str, port: u16, attempts: u16) -> Result<Self> {
        let mut last_error = None;
        for offset in 0..attempts.max(1) {
            let Some(candidate) = port.checked_add(offset) else {
                break;
            };
            match TcpListener::bind((host, candidate)).await {
                Ok(listener) => {
                    if offset > 0 {
                        tracing::warn!(
                            port,
                            bound = candidate,
                            "requested port busy, using next free port"
                        );
                    }
                    return Ok(Self {
                        listener,
                        shutdown: CancellationToken::new(),
                    });
                }
                Err(e) => {
                    tracing::debug!(port = candidate, error = %e, "bind failed");
                    last_error = Some(e);
                }
            }
        }
        Err(FacetalkError::ReceiverSocket {
            message: match last_error {
                Some(e) => format!("Failed to bind {}:{}: {}", host, port, e),
                None => format!("No port available from {}", port),
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| FacetalkError::ReceiverSocket {
                message: format!("Failed to read local address: {}", e),
            })
    }

    /// Token that stops [`serve`](Self::serve) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves delivery calls until the shutdown token is cancelled.
    ///
    /// Calls are handled concurrently but sessions reach the player one at
    /// a time.
    pub async fn serve<P>(self, player: P) -> Result<()>
    where
        P: AudioPlayer + 'static,
    {
        let shutdown = self.shutdown.clone();
        Server::builder()
            .add_service(Audio2FaceServer::new(player))
            .serve_with_incoming_shutdown(TcpListenerStream::new(self.listener), async move {
                shutdown.cancelled().await;
            })
            .await
            .map_err(|e| FacetalkError::ReceiverSocket {
                message: format!("Server stopped: {}", e),
            })
    }
}

/// Call handlers shared by every connection.
struct DeliveryService<P: ?Sized> {
    playback: tokio::sync::Mutex<()>,
    player: P,
}

impl<P: AudioPlayer + ?Sized> DeliveryService<P> {
    async fn push_audio(&self, request: PushAudioRequest) -> PushAudioResponse {
        let _playback = self.playback.lock().await;
        let response = self.play_whole(request).await;
        if !response.success {
            tracing::warn!(message = %response.message, "rejecting push");
        }
        response
    }

    async fn play_whole(&self, request: PushAudioRequest) -> PushAudioResponse {
        let samples = match f32_from_le_bytes(&request.audio_data) {
            Ok(samples) => samples,
            Err(e) => return PushAudioResponse::failure(e.to_string()),
        };
        let session = SessionInfo {
            instance_name: request.instance_name,
            sample_rate: request.samplerate,
            block_until_playback_is_finished: request.block_until_playback_is_finished,
        };

        let played = async {
            self.player.audio_start(&session).await?;
            self.player.push_chunk(samples).await?;
            self.player.audio_end().await
        };
        match played.await {
            Ok(()) => PushAudioResponse::ok(),
            Err(e) => PushAudioResponse::failure(e.to_string()),
        }
    }

    async fn push_audio_stream(
        &self,
        mut stream: Streaming<PushAudioStreamRequest>,
    ) -> PushAudioResponse {
        let _playback = self.playback.lock().await;
        let response = self.play_stream(&mut stream).await;
        if !response.success {
            tracing::warn!(message = %response.message, "rejecting stream");
        }
        response
    }

    async fn play_stream(&self, stream: &mut Streaming<PushAudioStreamRequest>) -> PushAudioResponse {
        let start = match stream.message().await {
            Ok(Some(PushAudioStreamRequest {
                request: Some(Request::StartMarker(start)),
            })) => start,
            Ok(_) => return PushAudioResponse::failure(MISSING_START_MARKER),
            Err(status) => return PushAudioResponse::failure(status.message()),
        };

        let session = SessionInfo {
            instance_name: start.instance_name,
            sample_rate: start.samplerate,
            block_until_playback_is_finished: start.block_until_playback_is_finished,
        };
        if let Err(e) = self.player.audio_start(&session).await {
            return PushAudioResponse::failure(e.to_string());
        }

        let outcome = async {
            while let Some(request) = stream.message().await.map_err(|status| {
                FacetalkError::DeliveryProtocol {
                    message: status.message().to_string(),
                }
            })? {
                match request.request {
                    Some(Request::AudioData(data)) => {
                        self.player.push_chunk(f32_from_le_bytes(&data)?).await?;
                    }
                    Some(Request::StartMarker(_)) => {
                        return Err(FacetalkError::DeliveryProtocol {
                            message: "Start marker repeated within a session".to_string(),
                        });
                    }
                    None => {}
                }
            }
            Ok::<(), FacetalkError>(())
        }
        .await;

        let ended = self.player.audio_end().await;
        match outcome.and(ended) {
            Ok(()) => PushAudioResponse::ok(),
            Err(e) => PushAudioResponse::failure(e.to_string()),
        }
    }
}

/// Routes the two Audio2Face methods to a [`DeliveryService`].
struct Audio2FaceServer<P> {
    service: Arc<DeliveryService<P>>,
}

impl<P> Audio2FaceServer<P> {
    fn new(player: P) -> Self {
        Self {
            service: Arc::new(DeliveryService {
                playback: tokio::sync::Mutex::new(()),
                player,
            }),
        }
    }
}

impl<P> Clone for Audio2FaceServer<P> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<P> NamedService for Audio2FaceServer<P> {
    const NAME: &'static str = SERVICE_NAME;
}

struct PushAudioCall<P>(Arc<DeliveryService<P>>);

impl<P: AudioPlayer + 'static> UnaryService<PushAudioRequest> for PushAudioCall<P> {
    type Response = PushAudioResponse;
    type Future = BoxFuture<tonic::Response<PushAudioResponse>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<PushAudioRequest>) -> Self::Future {
        let service = Arc::clone(&self.0);
        Box::pin(async move {
            let response = service.push_audio(request.into_inner()).await;
            Ok(tonic::Response::new(response))
        })
    }
}

struct PushAudioStreamCall<P>(Arc<DeliveryService<P>>);

impl<P: AudioPlayer + 'static> ClientStreamingService<PushAudioStreamRequest>
    for PushAudioStreamCall<P>
{
    type Response = PushAudioResponse;
    type Future = BoxFuture<tonic::Response<PushAudioResponse>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<Streaming<PushAudioStreamRequest>>) -> Self::Future {
        let service = Arc::clone(&self.0);
        Box::pin(async move {
            let response = service.push_audio_stream(request.into_inner()).await;
            Ok(tonic::Response::new(response))
        })
    }
}

impl<P, B> Service<http::Request<B>> for Audio2FaceServer<P>
where
    P: AudioPlayer + 'static,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let service = Arc::clone(&self.service);
        match request.uri().path() {
            PUSH_AUDIO_METHOD => Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::<PushAudioResponse, PushAudioRequest>::default())
                    .max_decoding_message_size(MAX_MESSAGE_LEN);
                Ok(grpc.unary(PushAudioCall(service), request).await)
            }),
            PUSH_AUDIO_STREAM_METHOD => Box::pin(async move {
                let mut grpc =
                    Grpc::new(ProstCodec::<PushAudioResponse, PushAudioStreamRequest>::default())
                        .max_decoding_message_size(MAX_MESSAGE_LEN);
                Ok(grpc.client_streaming(PushAudioStreamCall(service), request).await)
            }),
            path => {
                tracing::warn!(path, "unknown delivery method");
                let status = tonic::Status::unimplemented(format!("Unknown method: {}", path));
                Box::pin(async move { Ok(status.to_http()) })
            }
        }
    }
}
