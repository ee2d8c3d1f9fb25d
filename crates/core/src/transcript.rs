//! Session transcript and the speech buffer debouncer
//!
//! Transcript fragments arrive in bursts while someone is talking. The
//! [`SpeechDebouncer`] accumulates them and hands one joined span to a
//! [`SpeechSink`] once the speaker has been quiet for the idle period, or
//! immediately when the session ends.

use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Quiet period after the last fragment before the buffer is flushed
pub const DEFAULT_SPEECH_IDLE: Duration = Duration::from_millis(8000);

/// Who produced a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The local participant
    User,
    /// The voice agent
    Agent,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Agent => "AI",
        }
    }
}

/// Full, labeled transcript of one room session. Summarized once at session end.
#[derive(Debug, Clone, Default)]
pub struct SessionTranscript {
    lines: Vec<(Speaker, String)>,
}

impl SessionTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.lines.push((speaker, text.into()));
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// One `Label: text` line per entry
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|(speaker, text)| format!("{}: {}", speaker.label(), text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Downstream consumer of flushed speech spans
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn dispatch(&self, text: String) -> Result<()>;
}

struct BufferState {
    buffer: String,
    /// Bumped by every append and flush; a timer only flushes its own generation
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct DebouncerInner {
    idle: Duration,
    sink: Arc<dyn SpeechSink>,
    state: Mutex<BufferState>,
}

/// Cancel-and-restart debouncer over a text buffer.
///
/// Cloning yields another handle to the same buffer.
#[derive(Clone)]
pub struct SpeechDebouncer {
    inner: Arc<DebouncerInner>,
}

impl SpeechDebouncer {
    pub fn new(idle: Duration, sink: Arc<dyn SpeechSink>) -> Self {
        Self {
            inner: Arc::new(DebouncerInner {
                idle,
                sink,
                state: Mutex::new(BufferState {
                    buffer: String::new(),
                    generation: 0,
                    timer: None,
                }),
            }),
        }
    }

    /// Debouncer with the default 8 second idle period
    pub fn with_default_idle(sink: Arc<dyn SpeechSink>) -> Self {
        Self::new(DEFAULT_SPEECH_IDLE, sink)
    }

    pub fn idle(&self) -> Duration {
        self.inner.idle
    }

    /// Add a fragment and restart the idle timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn append(&self, fragment: &str) {
        let mut state = self.inner.state.lock();
        if !state.buffer.is_empty() {
            state.buffer.push('\n');
        }
        state.buffer.push_str(fragment);
        state.generation += 1;

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.idle).await;
            inner.flush_generation(generation).await;
        }));
    }

    /// Dispatch whatever is buffered right now and cancel the idle timer.
    ///
    /// Returns `true` if a span was handed to the sink successfully.
    pub async fn flush_now(&self) -> bool {
        let text = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            std::mem::take(&mut state.buffer)
        };
        self.inner.dispatch(text).await
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().buffer.is_empty()
    }

    /// Snapshot of the pending text
    pub fn buffered(&self) -> String {
        self.inner.state.lock().buffer.clone()
    }
}

impl DebouncerInner {
    async fn flush_generation(&self, generation: u64) {
        let text = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            // Dropping the handle of the running task detaches it; it does not abort.
            state.timer = None;
            std::mem::take(&mut state.buffer)
        };
        debug!(generation, "Speech idle timeout reached");
        self.dispatch(text).await;
    }

    async fn dispatch(&self, text: String) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        let len = text.len();
        match self.sink.dispatch(text).await {
            Ok(()) => {
                debug!(bytes = len, "Flushed speech buffer");
                true
            }
            Err(e) => {
                warn!(bytes = len, error = %e, "Speech dispatch failed, span dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Default)]
    struct RecordingSink {
        spans: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn spans(&self) -> Vec<String> {
            self.spans.lock().clone()
        }
    }

    #[async_trait]
    impl SpeechSink for RecordingSink {
        async fn dispatch(&self, text: String) -> Result<()> {
            self.spans.lock().push(text);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl SpeechSink for FailingSink {
        async fn dispatch(&self, _text: String) -> Result<()> {
            Err(Error::Dispatch("channel closed".to_string()))
        }
    }

    fn debouncer() -> (SpeechDebouncer, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (SpeechDebouncer::with_default_idle(sink.clone()), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragments_flush_once_after_idle() {
        let (debouncer, sink) = debouncer();

        debouncer.append("Let's start");
        tokio::time::sleep(Duration::from_secs(3)).await;
        debouncer.append("with the roadmap");
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(sink.spans().is_empty());

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(sink.spans(), vec!["Let's start\nwith the roadmap".to_string()]);
        assert!(debouncer.is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sink.spans().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_at_session_end() {
        let (debouncer, sink) = debouncer();

        debouncer.append("One more thing");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(debouncer.flush_now().await);
        assert_eq!(sink.spans(), vec!["One more thing".to_string()]);

        // The cancelled timer must not fire a second dispatch
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(sink.spans().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_buffer_flush_is_noop() {
        let (debouncer, sink) = debouncer();
        assert!(!debouncer.flush_now().await);
        assert!(sink.spans().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_only_buffer_is_cleared_without_dispatch() {
        let (debouncer, sink) = debouncer();
        debouncer.append("  ");
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(sink.spans().is_empty());
        assert!(debouncer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_appends_after_flush_start_new_span() {
        let (debouncer, sink) = debouncer();
        debouncer.append("first");
        tokio::time::sleep(Duration::from_secs(9)).await;
        debouncer.append("second");
        assert_eq!(debouncer.buffered(), "second");
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(sink.spans(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_failure_drops_span() {
        let debouncer = SpeechDebouncer::new(Duration::from_millis(100), Arc::new(FailingSink));
        debouncer.append("lost");
        assert!(!debouncer.flush_now().await);
        assert!(debouncer.is_empty());
    }

    #[test]
    fn test_transcript_labels() {
        let mut transcript = SessionTranscript::new();
        transcript.push(Speaker::User, "Hello");
        transcript.push(Speaker::Agent, "Hi, how can I help?");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.render(), "You: Hello\nAI: Hi, how can I help?");
    }
}
