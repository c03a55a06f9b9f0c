//! Wire messages of the Audio2Face delivery service.
//!
//! Messages are protobuf-encoded with the field numbers of the
//! `nvidia.audio2face.Audio2Face` service and travel as ordinary gRPC calls:
//! `PushAudio` is unary, `PushAudioStream` is client-streaming. Both answer
//! with one `PushAudioResponse`.

use crate::error::{FacetalkError, Result};
use prost::Message;

/// Fully qualified gRPC service name.
pub const SERVICE_NAME: &str = "nvidia.audio2face.Audio2Face";

/// Method path of the single-push call.
pub const PUSH_AUDIO_METHOD: &str = "/nvidia.audio2face.Audio2Face/PushAudio";

/// Method path of the streamed call.
pub const PUSH_AUDIO_STREAM_METHOD: &str = "/nvidia.audio2face.Audio2Face/PushAudioStream";

/// Rejection text for a stream that doesn't open with a start marker.
pub const MISSING_START_MARKER: &str = "First item in the request should contain start_marker";

/// Upper bound on one encoded message, in both directions.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Whole-buffer push.
#[derive(Clone, PartialEq, Message)]
pub struct PushAudioRequest {
    #[prost(string, tag = "1")]
    pub instance_name: String,
    #[prost(uint32, tag = "2")]
    pub samplerate: u32,
    /// Float32 little-endian samples.
    #[prost(bytes = "vec", tag = "3")]
    pub audio_data: Vec<u8>,
    #[prost(bool, tag = "4")]
    pub block_until_playback_is_finished: bool,
}

/// Session metadata sent before any streamed audio.
#[derive(Clone, PartialEq, Message)]
pub struct PushAudioRequestStart {
    #[prost(string, tag = "1")]
    pub instance_name: String,
    #[prost(uint32, tag = "2")]
    pub samplerate: u32,
    #[prost(bool, tag = "3")]
    pub block_until_playback_is_finished: bool,
}

/// One message of a streamed session.
#[derive(Clone, PartialEq, Message)]
pub struct PushAudioStreamRequest {
    #[prost(oneof = "push_audio_stream_request::Request", tags = "1, 2")]
    pub request: Option<push_audio_stream_request::Request>,
}

pub mod push_audio_stream_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        StartMarker(super::PushAudioRequestStart),
        /// Float32 little-endian samples.
        #[prost(bytes, tag = "2")]
        AudioData(Vec<u8>),
    }
}

/// Outcome of a whole call.
#[derive(Clone, PartialEq, Message)]
pub struct PushAudioResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl PushAudioStreamRequest {
    pub fn start_marker(start: PushAudioRequestStart) -> Self {
        Self {
            request: Some(push_audio_stream_request::Request::StartMarker(start)),
        }
    }

    pub fn audio_data(bytes: Vec<u8>) -> Self {
        Self {
            request: Some(push_audio_stream_request::Request::AudioData(bytes)),
        }
    }

    pub fn is_start_marker(&self) -> bool {
        matches!(
            self.request,
            Some(push_audio_stream_request::Request::StartMarker(_))
        )
    }
}

impl PushAudioResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Checks that `message` fits the per-message limit before it is sent.
///
/// # Errors
/// Returns `FacetalkError::DeliveryProtocol` for an oversized message.
pub fn check_message_size<M: Message>(message: &M) -> Result<()> {
    check_encoded_len(message.encoded_len())
}

fn check_encoded_len(len: usize) -> Result<()> {
    if len > MAX_MESSAGE_LEN {
        return Err(FacetalkError::DeliveryProtocol {
            message: format!(
                "Message of {} bytes exceeds limit of {}",
                len, MAX_MESSAGE_LEN
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_audio_request_field_layout() {
        let request = PushAudioRequest {
            instance_name: "/A".to_string(),
            samplerate: 16000,
            audio_data: vec![1, 2],
            block_until_playback_is_finished: true,
        };
        // tag 1 string, tag 2 varint (16000 = 0x80 0x7d), tag 3 bytes, tag 4 bool
        assert_eq!(
            request.encode_to_vec(),
            vec![
                0x0a, 0x02, b'/', b'A', 0x10, 0x80, 0x7d, 0x1a, 0x02, 1, 2, 0x20, 0x01
            ]
        );
    }

    #[test]
    fn test_stream_request_oneof_tags() {
        let marker = PushAudioStreamRequest::start_marker(PushAudioRequestStart {
            instance_name: String::new(),
            samplerate: 8,
            block_until_playback_is_finished: false,
        });
        assert!(marker.is_start_marker());
        // field 1, length-delimited, containing samplerate (tag 2) = 8
        assert_eq!(marker.encode_to_vec(), vec![0x0a, 0x02, 0x10, 0x08]);

        let data = PushAudioStreamRequest::audio_data(vec![9, 9]);
        assert!(!data.is_start_marker());
        assert_eq!(data.encode_to_vec(), vec![0x12, 0x02, 9, 9]);
    }

    #[test]
    fn test_response_decodes_from_wire() {
        // tag 1 bool false is omitted, tag 2 string "no"
        let response = PushAudioResponse::decode(&[0x12, 0x02, b'n', b'o'][..]).unwrap();
        assert_eq!(response, PushAudioResponse::failure("no"));
    }

    #[test]
    fn test_method_paths_belong_to_service() {
        for method in [PUSH_AUDIO_METHOD, PUSH_AUDIO_STREAM_METHOD] {
            assert!(method.starts_with(&format!("/{}/", SERVICE_NAME)));
        }
    }

    #[test]
    fn test_message_size_limit() {
        assert!(check_message_size(&PushAudioResponse::ok()).is_ok());
        assert!(check_encoded_len(MAX_MESSAGE_LEN).is_ok());
        assert!(matches!(
            check_encoded_len(MAX_MESSAGE_LEN + 1),
            Err(FacetalkError::DeliveryProtocol { .. })
        ));
    }
}
