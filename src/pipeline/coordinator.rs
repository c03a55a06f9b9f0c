//! Wires the three stages together around the conversation context.
//!
//! A router thread owns the [`ConversationContext`] and is its only writer.
//! It turns transcripts into completion requests (with a context snapshot)
//! and replies into synthesis requests, and republishes stage outcomes as
//! [`PipelineEvent`]s.

use crate::audio::buffer::AudioSegment;
use crate::config::Config;
use crate::delivery::client::AudioStreamClient;
use crate::error::Result;
use crate::llm::{self, CompletionEngine};
use crate::pipeline::completion::CompletionStage;
use crate::pipeline::context::{ChatMessage, ConversationContext};
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::queue::{StageQueue, StageStatus};
use crate::pipeline::recognition::RecognitionStage;
use crate::pipeline::synthesis::{SynthesisStage, SynthesisState};
use crate::pipeline::types::{PipelineEvent, SpokenResponse, StageEvent, Transcript};
use crate::stt::{self, SpeechRecognizer};
use crate::text::splitter::SentenceSplitter;
use crate::tts::{self, SpeechSynthesizer};
use crossbeam_channel::{Receiver, Sender, never, select, unbounded};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Requests to the router that don't come from a stage.
#[derive(Debug)]
enum Control {
    SubmitText(String),
    ResetContext,
}

/// Builds and starts the pipeline.
pub struct PipelineCoordinator {
    config: Config,
    recognizer: Arc<dyn SpeechRecognizer>,
    completion: Arc<dyn CompletionEngine>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    client: AudioStreamClient,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl PipelineCoordinator {
    /// Creates a coordinator from explicit engines and delivery client.
    pub fn new(
        config: Config,
        recognizer: Arc<dyn SpeechRecognizer>,
        completion: Arc<dyn CompletionEngine>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        client: AudioStreamClient,
    ) -> Self {
        Self {
            config,
            recognizer,
            completion,
            synthesizer,
            client,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Creates a coordinator with the engines and TCP delivery named in `config`.
    ///
    /// # Errors
    /// Fails on invalid configuration before any thread is started.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let recognizer = stt::build_recognizer(&config.recognition)?;
        let completion = llm::build_completion(&config.completion)?;
        let synthesizer = tts::build_synthesizer(&config.synthesis)?;
        let client = AudioStreamClient::from_config(&config.delivery)?;
        Ok(Self::new(config, recognizer, completion, synthesizer, client))
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the three stage workers and the router.
    pub fn start(self) -> Result<PipelineHandle> {
        let poll = self.config.pipeline.poll_interval();
        let splitter = SentenceSplitter::new(self.config.synthesis.splitter)?;

        let (recognition_tx, recognition_rx) = unbounded();
        let (completion_tx, completion_rx) = unbounded();
        let (synthesis_tx, synthesis_rx) = unbounded();
        let (control_tx, control_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();

        let recognition = Arc::new(StageQueue::spawn(
            RecognitionStage::new(self.recognizer, &self.config.recognition.language)
                .with_energy_threshold(self.config.recognition.sensitivity.energy_threshold()),
            recognition_tx,
            Arc::clone(&self.error_reporter),
            poll,
        ));
        let completion = Arc::new(StageQueue::spawn(
            CompletionStage::new(self.completion, &self.config.completion),
            completion_tx,
            Arc::clone(&self.error_reporter),
            poll,
        ));
        let synthesis_stage = SynthesisStage::new(
            self.synthesizer,
            splitter,
            self.client,
            &self.config.synthesis.language,
        );
        let synthesis_state = synthesis_stage.state_handle();
        let synthesis = Arc::new(StageQueue::spawn(
            synthesis_stage,
            synthesis_tx,
            Arc::clone(&self.error_reporter),
            poll,
        ));

        let cancel = CancellationToken::new();
        let router = Router {
            context: ConversationContext::new(&self.config.completion.system_prompt),
            max_context_length: self.config.completion.max_context_length,
            completion: Arc::clone(&completion),
            synthesis: Arc::clone(&synthesis),
            events: events_tx,
            cancel: cancel.clone(),
            poll,
        };
        let channels = RouterInputs {
            recognition: recognition_rx,
            completion: completion_rx,
            synthesis: synthesis_rx,
            control: control_rx,
        };
        let router_handle = thread::Builder::new()
            .name("facetalk-router".to_string())
            .spawn(move || router.run(channels))?;

        tracing::info!("pipeline started");
        Ok(PipelineHandle {
            recognition,
            completion,
            synthesis,
            synthesis_state,
            control: control_tx,
            events: events_rx,
            cancel,
            router: Some(router_handle),
        })
    }
}

struct RouterInputs {
    recognition: Receiver<StageEvent<Transcript>>,
    completion: Receiver<StageEvent<String>>,
    synthesis: Receiver<StageEvent<SpokenResponse>>,
    control: Receiver<Control>,
}

struct Router {
    context: ConversationContext,
    max_context_length: usize,
    completion: Arc<StageQueue<CompletionStage>>,
    synthesis: Arc<StageQueue<SynthesisStage>>,
    events: Sender<PipelineEvent>,
    cancel: CancellationToken,
    poll: Duration,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Recognition,
    Completion,
    Synthesis,
}

/// What the router does after handling one input.
enum Step {
    Continue,
    /// A stage worker exited and its event channel closed.
    Closed(Source),
    Exit,
}

impl Router {
    fn run(mut self, inputs: RouterInputs) {
        let RouterInputs {
            mut recognition,
            mut completion,
            mut synthesis,
            control,
        } = inputs;

        while !self.cancel.is_cancelled() {
            let step = select! {
                recv(recognition) -> event => match event {
                    Ok(StageEvent::Completed(transcript)) => self.on_user_text(transcript.text),
                    Ok(StageEvent::Failed { stage, message }) => self.on_failure(stage, message),
                    Err(_) => Step::Closed(Source::Recognition),
                },
                recv(completion) -> event => match event {
                    Ok(StageEvent::Completed(reply)) => self.on_reply(reply),
                    Ok(StageEvent::Failed { stage, message }) => self.on_failure(stage, message),
                    Err(_) => Step::Closed(Source::Completion),
                },
                recv(synthesis) -> event => match event {
                    Ok(StageEvent::Completed(spoken)) => self.emit(PipelineEvent::Spoken(spoken)),
                    Ok(StageEvent::Failed { stage, message }) => self.on_failure(stage, message),
                    Err(_) => Step::Closed(Source::Synthesis),
                },
                recv(control) -> request => match request {
                    Ok(Control::SubmitText(text)) => self.on_user_text(text),
                    Ok(Control::ResetContext) => {
                        self.context.reset();
                        tracing::info!("conversation context reset");
                        Step::Continue
                    }
                    Err(_) => Step::Exit,
                },
                default(self.poll) => Step::Continue,
            };

            match step {
                Step::Continue => {}
                Step::Closed(source) => {
                    tracing::debug!(?source, "stage event channel closed");
                    match source {
                        Source::Recognition => recognition = never(),
                        Source::Completion => completion = never(),
                        Source::Synthesis => synthesis = never(),
                    }
                }
                Step::Exit => break,
            }
        }
        tracing::debug!("router stopped");
    }

    fn on_user_text(&mut self, text: String) -> Step {
        tracing::info!(text = %text, "user");
        self.context.push(ChatMessage::user(text.clone()));
        self.context.truncate(self.max_context_length);
        self.emit(PipelineEvent::Transcript(text));
        if !self.completion.enqueue(self.context.snapshot()) {
            tracing::debug!("completion stage stopped, transcript not answered");
        }
        Step::Continue
    }

    fn on_reply(&mut self, reply: String) -> Step {
        tracing::info!(text = %reply, "assistant");
        self.context.push(ChatMessage::assistant(reply.clone()));
        self.context.truncate(self.max_context_length);
        self.emit(PipelineEvent::Response(reply.clone()));
        if !self.synthesis.enqueue(reply) {
            tracing::debug!("synthesis stage stopped, reply not spoken");
        }
        Step::Continue
    }

    fn on_failure(&self, stage: &'static str, message: String) -> Step {
        tracing::debug!(stage, message = %message, "stage failure");
        self.emit(PipelineEvent::Failed { stage, message })
    }

    fn emit(&self, event: PipelineEvent) -> Step {
        if self.events.send(event).is_err() {
            tracing::trace!("no event listener");
        }
        Step::Continue
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    recognition: Arc<StageQueue<RecognitionStage>>,
    completion: Arc<StageQueue<CompletionStage>>,
    synthesis: Arc<StageQueue<SynthesisStage>>,
    synthesis_state: Arc<RwLock<SynthesisState>>,
    control: Sender<Control>,
    events: Receiver<PipelineEvent>,
    cancel: CancellationToken,
    router: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Queues captured speech for recognition.
    pub fn submit_audio(&self, segment: AudioSegment) -> bool {
        self.recognition.enqueue(segment)
    }

    /// Feeds text into the conversation as if it had been recognized.
    pub fn submit_text(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.cancel.is_cancelled() {
            return false;
        }
        self.control
            .send(Control::SubmitText(text.to_string()))
            .is_ok()
    }

    /// Speaks `text` directly, outside the conversation.
    pub fn speak(&self, text: &str) -> bool {
        self.synthesis.enqueue(text.to_string())
    }

    /// Forgets everything but the opening developer message.
    pub fn reset_context(&self) -> bool {
        self.control.send(Control::ResetContext).is_ok()
    }

    /// Stream of pipeline events.
    pub fn events(&self) -> Receiver<PipelineEvent> {
        self.events.clone()
    }

    /// Queue state of every stage, in pipeline order.
    pub fn status(&self) -> [StageStatus; 3] {
        [
            self.recognition.status(),
            self.completion.status(),
            self.synthesis.status(),
        ]
    }

    pub fn synthesis_state(&self) -> SynthesisState {
        *self.synthesis_state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether every stage is idle with nothing queued.
    pub fn is_idle(&self) -> bool {
        self.status().iter().all(|s| !s.busy && s.pending == 0)
    }

    /// Stops the pipeline.
    ///
    /// Queued requests are dropped. In-flight requests, including an ongoing
    /// delivery session, run to completion before this returns.
    pub fn stop(mut self) {
        self.recognition.stop();
        self.completion.stop();
        self.synthesis.stop();

        for (name, result) in [
            ("recognition", self.recognition.join()),
            ("completion", self.completion.join()),
            ("synthesis", self.synthesis.join()),
        ] {
            if let Err(e) = result {
                tracing::error!(stage = name, "{}", e);
            }
        }

        self.cancel.cancel();
        if let Some(router) = self.router.take()
            && router.join().is_err()
        {
            tracing::error!("router thread panicked");
        }
        tracing::info!("pipeline stopped");
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.router.is_some() {
            // The router holds queue handles and never sees them disconnect.
            self.recognition.stop();
            self.completion.stop();
            self.synthesis.stop();
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::chunker::AudioChunker;
    use crate::delivery::client::MemoryTransport;
    use crate::llm::MockCompletion;
    use crate::stt::MockRecognizer;
    use crate::tts::MockSynthesizer;

    fn start(
        recognizer: MockRecognizer,
        completion: MockCompletion,
        transport: &MemoryTransport,
        config: Config,
    ) -> PipelineHandle {
        let client = AudioStreamClient::new(
            Arc::new(transport.clone()),
            AudioChunker::new(10, Duration::ZERO).unwrap(),
            "/World/audio2face/PlayerStreaming",
        );
        PipelineCoordinator::new(
            config,
            Arc::new(recognizer),
            Arc::new(completion),
            Arc::new(MockSynthesizer::new(16000)),
            client,
        )
        .start()
        .unwrap()
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.pipeline.poll_interval_ms = 10;
        config
    }

    fn next_event(events: &Receiver<PipelineEvent>) -> PipelineEvent {
        events.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_audio_flows_through_all_stages() {
        let transport = MemoryTransport::new();
        let handle = start(
            MockRecognizer::new().with_response("hi"),
            MockCompletion::new().with_response("Hello there. How are you?"),
            &transport,
            fast_config(),
        );
        let events = handle.events();

        let loud = AudioSegment::new(vec![2000, -2000, 2000, -2000], 16000);
        assert!(handle.submit_audio(loud));

        assert_eq!(next_event(&events), PipelineEvent::Transcript("hi".to_string()));
        assert_eq!(
            next_event(&events),
            PipelineEvent::Response("Hello there. How are you?".to_string())
        );
        assert_eq!(
            next_event(&events),
            PipelineEvent::Spoken(SpokenResponse {
                text: "Hello there. How are you?".to_string(),
                utterances: 2,
            })
        );
        assert_eq!(transport.sessions().len(), 2);
        handle.stop();
    }

    #[test]
    fn test_completion_sees_growing_truncated_context() {
        let transport = MemoryTransport::new();
        let completion = MockCompletion::new().with_response("Ok.");
        let mut config = fast_config();
        config.completion.max_context_length = 2;
        config.completion.system_prompt = "rules".to_string();
        let handle = start(MockRecognizer::new(), completion.clone(), &transport, config);
        let events = handle.events();

        for text in ["one", "two"] {
            handle.submit_text(text);
            // Transcript, Response, Spoken
            for _ in 0..3 {
                next_event(&events);
            }
        }

        let requests = completion.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].messages,
            vec![ChatMessage::developer("rules"), ChatMessage::user("one")]
        );
        // "one", "Ok." and "two" exceed two recent messages; "one" is dropped
        assert_eq!(
            requests[1].messages,
            vec![
                ChatMessage::developer("rules"),
                ChatMessage::assistant("Ok."),
                ChatMessage::user("two"),
            ]
        );
        handle.stop();
    }

    #[test]
    fn test_reset_context_keeps_developer_message() {
        let transport = MemoryTransport::new();
        let completion = MockCompletion::new().with_response("Ok.");
        let handle = start(MockRecognizer::new(), completion.clone(), &transport, fast_config());
        let events = handle.events();

        handle.submit_text("first");
        for _ in 0..3 {
            next_event(&events);
        }
        assert!(handle.reset_context());
        handle.submit_text("second");
        for _ in 0..3 {
            next_event(&events);
        }

        let last = completion.requests().pop().unwrap();
        assert_eq!(last.messages.len(), 2);
        assert_eq!(last.messages[1], ChatMessage::user("second"));
        handle.stop();
    }

    #[test]
    fn test_failures_surface_as_events() {
        let transport = MemoryTransport::new();
        let handle = start(
            MockRecognizer::new(),
            MockCompletion::new().with_failure(),
            &transport,
            fast_config(),
        );
        let events = handle.events();

        handle.submit_text("hello");
        assert_eq!(next_event(&events), PipelineEvent::Transcript("hello".to_string()));
        match next_event(&events) {
            PipelineEvent::Failed { stage, message } => {
                assert_eq!(stage, "completion");
                assert!(message.contains("mock completion failure"));
            }
            other => panic!("Expected failure, got: {:?}", other),
        }
        assert!(transport.sessions().is_empty());
        handle.stop();
    }

    #[test]
    fn test_speak_bypasses_conversation() {
        let transport = MemoryTransport::new();
        let completion = MockCompletion::new();
        let handle = start(MockRecognizer::new(), completion.clone(), &transport, fast_config());
        let events = handle.events();

        assert!(handle.speak("Just this."));
        assert!(matches!(next_event(&events), PipelineEvent::Spoken(_)));
        assert!(completion.requests().is_empty());
        handle.stop();
    }

    #[test]
    fn test_blank_text_is_not_submitted() {
        let transport = MemoryTransport::new();
        let handle = start(MockRecognizer::new(), MockCompletion::new(), &transport, fast_config());
        assert!(!handle.submit_text("   "));
        assert!(handle.is_idle());
        assert_eq!(handle.synthesis_state(), SynthesisState::Idle);
        handle.stop();
    }

    #[test]
    fn test_invalid_config_fails_before_start() {
        let mut config = Config::default();
        config.delivery.chunks_per_second = 0;
        assert!(PipelineCoordinator::from_config(config).is_err());
    }
}
