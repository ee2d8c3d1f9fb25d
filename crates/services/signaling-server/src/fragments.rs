//! Destination for debounced `user-speech` fragments

use crate::registry::SessionInfo;
use async_trait::async_trait;
use tracing::info;

/// Receives transcript fragments from joined sessions
#[async_trait]
pub trait FragmentSink: Send + Sync {
    async fn accept(&self, session: &SessionInfo, text: String) -> huddle_core::Result<()>;
}

/// Logs each fragment and keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFragmentSink;

#[async_trait]
impl FragmentSink for LoggingFragmentSink {
    async fn accept(&self, session: &SessionInfo, text: String) -> huddle_core::Result<()> {
        info!(
            room_id = %session.room_id,
            session_id = %session.session_id,
            chars = text.chars().count(),
            "Speech fragment received"
        );
        Ok(())
    }
}
