//! Audio delivery to the facial-animation service.

pub mod client;
pub mod health;
pub mod protocol;
pub mod server;

pub use client::{
    AudioStream, AudioStreamClient, AudioTransport, DeliveryMode, GrpcTransport, MemoryTransport,
    RecordedSession,
};
pub use health::{ConnectionStatus, check_status};
pub use server::{AudioPlayer, AudioReceiver, CollectingPlayer, LoggingPlayer, SessionInfo};
