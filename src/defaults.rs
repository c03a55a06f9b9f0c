//! Default configuration constants for facetalk.
//!
//! Shared by the configuration types, the pipeline and the CLI so the same
//! numbers are not repeated in several places.

/// Default capture sample rate in Hz for recognition input.
pub const SAMPLE_RATE: u32 = 16000;

/// Default recognition language tag.
pub const RECOGNITION_LANGUAGE: &str = "en-US";

/// Default synthesis language tag.
pub const SYNTHESIS_LANGUAGE: &str = "en";

/// Energy thresholds (RMS on the 16-bit sample scale) per sensitivity level.
pub const ENERGY_THRESHOLD_LOW: f32 = 300.0;
pub const ENERGY_THRESHOLD_MEDIUM: f32 = 400.0;
pub const ENERGY_THRESHOLD_HIGH: f32 = 500.0;

/// Idle polling interval of a stage worker in milliseconds.
///
/// The worker blocks on its queue for at most this long before re-checking
/// its cancellation token.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Default completion model.
pub const COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Default completion length limit in tokens.
pub const MAX_TOKENS: u32 = 150;

/// Default sampling temperature.
pub const TEMPERATURE: f32 = 0.7;

/// Default developer (system) prompt that opens every conversation.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Number of most recent messages kept after the developer message.
pub const MAX_CONTEXT_LENGTH: usize = 50;

/// Default address of the animation service audio endpoint.
pub const DELIVERY_URL: &str = "localhost:50051";

/// Default prim path of the streaming audio player instance.
pub const INSTANCE_NAME: &str = "/World/audio2face/PlayerStreaming";

/// Default status endpoint of the animation service.
pub const STATUS_URL: &str = "http://localhost:8011/status";

/// Chunks per second when streaming (10 → 100 ms chunks).
pub const CHUNKS_PER_SECOND: u32 = 10;

/// Pacing delay between streamed chunks in milliseconds.
pub const CHUNK_DELAY_MS: u64 = 40;

/// Port the receiving server tries first.
pub const RECEIVER_PORT: u16 = 50051;

/// How many successive ports the receiving server tries before giving up.
pub const RECEIVER_PORT_ATTEMPTS: u16 = 16;

/// Timeout applied to engine HTTP requests in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Timeout applied to the health check in seconds.
pub const STATUS_TIMEOUT_SECS: u64 = 3;

/// Default OpenAI-compatible API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default Ollama base URL.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Default Coqui TTS server base URL.
pub const COQUI_BASE_URL: &str = "http://localhost:5002";

/// Default Google Web Speech endpoint.
pub const GOOGLE_SPEECH_URL: &str = "http://www.google.com/speech-api/v2/recognize";

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable holding the Google Web Speech API key.
pub const GOOGLE_API_KEY_ENV: &str = "FACETALK_GOOGLE_API_KEY";
