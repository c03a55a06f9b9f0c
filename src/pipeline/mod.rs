//! Conversation pipeline.
//!
//! Three single-flight stages (recognition, completion, synthesis) each run on
//! their own worker thread behind a FIFO queue. A router thread owned by the
//! [`PipelineCoordinator`] connects them and keeps the conversation context.

pub mod completion;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod queue;
pub mod recognition;
pub mod synthesis;
pub mod types;

pub use completion::CompletionStage;
pub use context::{ChatMessage, ConversationContext, Role};
pub use coordinator::{PipelineCoordinator, PipelineHandle};
pub use error::{ErrorReporter, LogReporter, StageError};
pub use queue::{Stage, StageQueue, StageStatus};
pub use recognition::RecognitionStage;
pub use synthesis::{SynthesisStage, SynthesisState};
pub use types::{PipelineEvent, SpokenResponse, StageEvent, StageRequest, Transcript};
