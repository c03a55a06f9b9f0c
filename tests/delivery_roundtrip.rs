//! Client and receiver talking gRPC over a real socket.

use facetalk::audio::{AudioBuffer, AudioChunker};
use facetalk::delivery::protocol::{MISSING_START_MARKER, PushAudioStreamRequest};
use facetalk::delivery::{
    AudioReceiver, AudioStream, AudioStreamClient, AudioTransport, CollectingPlayer, DeliveryMode,
    GrpcTransport,
};
use facetalk::FacetalkError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

const INSTANCE: &str = "/World/audio2face/PlayerStreaming";

struct Receiver {
    // Keeps the server's worker threads alive.
    _runtime: Runtime,
    addr: SocketAddr,
    player: CollectingPlayer,
    shutdown: CancellationToken,
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn start_receiver() -> Receiver {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let receiver = runtime
        .block_on(AudioReceiver::bind("127.0.0.1", 0, 1))
        .unwrap();
    let addr = receiver.local_addr().unwrap();
    let shutdown = receiver.shutdown_token();
    let player = CollectingPlayer::new();
    runtime.spawn(receiver.serve(player.clone()));
    Receiver {
        _runtime: runtime,
        addr,
        player,
        shutdown,
    }
}

fn client(addr: SocketAddr, chunks_per_second: u32, mode: DeliveryMode) -> AudioStreamClient {
    AudioStreamClient::new(
        Arc::new(GrpcTransport::new(addr.to_string()).unwrap()),
        AudioChunker::new(chunks_per_second, Duration::ZERO).unwrap(),
        INSTANCE,
    )
    .with_mode(mode)
}

#[test]
fn single_push_delivers_exact_samples() {
    let receiver = start_receiver();
    let client = client(receiver.addr, 10, DeliveryMode::SinglePush);
    let buffer = AudioBuffer::new(vec![0.0, 0.5, -0.5, 1.0], 16000).unwrap();

    client.deliver(&buffer).unwrap();

    let sessions = receiver.player.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].samples, vec![0.0, 0.5, -0.5, 1.0]);
    assert_eq!(sessions[0].chunks, 1);
    assert_eq!(sessions[0].session.instance_name, INSTANCE);
    assert_eq!(sessions[0].session.sample_rate, 16000);
    assert!(sessions[0].session.block_until_playback_is_finished);
}

#[test]
fn streamed_delivery_arrives_in_chunks() {
    let receiver = start_receiver();
    // 16 Hz at 4 chunks per second gives 4-sample chunks
    let client = client(receiver.addr, 4, DeliveryMode::Streamed);
    let samples: Vec<f32> = (0..8).map(|i| i as f32 / 8.0).collect();
    let buffer = AudioBuffer::new(samples.clone(), 16).unwrap();

    client.deliver(&buffer).unwrap();

    let sessions = receiver.player.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].chunks, 2);
    assert_eq!(sessions[0].samples, samples);
    assert_eq!(sessions[0].session.sample_rate, 16);
}

#[test]
fn sessions_arrive_in_delivery_order() {
    let receiver = start_receiver();
    let client = client(receiver.addr, 10, DeliveryMode::Streamed);

    for value in [0.1_f32, 0.2, 0.3] {
        let buffer = AudioBuffer::new(vec![value; 3], 16000).unwrap();
        client.deliver(&buffer).unwrap();
    }

    let firsts: Vec<f32> = receiver
        .player
        .sessions()
        .iter()
        .map(|s| s.samples[0])
        .collect();
    assert_eq!(firsts, vec![0.1, 0.2, 0.3]);
}

#[test]
fn stream_without_start_marker_is_refused() {
    let receiver = start_receiver();
    let transport = GrpcTransport::new(receiver.addr.to_string()).unwrap();

    let mut stream = transport.open_stream().unwrap();
    stream
        .send(PushAudioStreamRequest::audio_data(
            facetalk::audio::buffer::f32_to_le_bytes(&[0.25, 0.5]),
        ))
        .unwrap();
    let response = stream.finish().unwrap();

    assert!(!response.success);
    assert_eq!(response.message, MISSING_START_MARKER);
    assert!(receiver.player.sessions().is_empty());
}

#[test]
fn unreachable_service_is_a_connection_error() {
    let addr = {
        let receiver = start_receiver();
        receiver.addr
    };
    // Give the cancelled listener a moment to close.
    std::thread::sleep(Duration::from_millis(100));

    let client = client(addr, 10, DeliveryMode::SinglePush);
    let buffer = AudioBuffer::new(vec![0.0; 4], 16000).unwrap();
    let result = client.deliver(&buffer);
    assert!(matches!(result, Err(FacetalkError::DeliveryConnection { .. })));
}
