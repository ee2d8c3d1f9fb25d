//! Per-connection WebSocket handling
//!
//! Each accepted connection gets a fresh [`SessionId`], a writer task fed by
//! an unbounded outbox, and a read loop that dispatches text frames. When the
//! transport goes away the session leaves its room.

use crate::config::ServerConfig;
use crate::fanout::NoteBroadcaster;
use crate::fragments::FragmentSink;
use crate::registry::{Outbox, SessionRegistry};
use crate::relay::SignalingRelay;
use crate::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use huddle_core::{ClientMessage, NoteStore, ServerMessage, SessionId};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

/// Shared state across all connections
pub struct ServerState {
    pub registry: Arc<SessionRegistry>,
    pub relay: SignalingRelay,
    pub notes: NoteBroadcaster,
    pub fragments: Arc<dyn FragmentSink>,
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn NoteStore>,
        fragments: Arc<dyn FragmentSink>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            relay: SignalingRelay::new(Arc::clone(&registry)),
            notes: NoteBroadcaster::new(Arc::clone(&registry), store),
            registry,
            fragments,
            config,
        }
    }
}

/// Handle a single WebSocket connection until the peer goes away
#[instrument(skip_all, fields(session_id = tracing::field::Empty))]
pub async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) -> Result<()> {
    let addr = stream.peer_addr()?;
    let ws_stream = accept_async(stream).await?;

    let session_id = SessionId::generate();
    tracing::Span::current().record("session_id", tracing::field::display(&session_id));
    info!(%addr, "WebSocket connection established");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let forward_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {}: {}", message.event_name(), e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_frame(&text, &session_id, &state, &tx).await {
                    warn!("Rejected frame: {}", e);
                    reply_error(&tx, &e);
                }
            }
            Ok(Message::Binary(_)) => {
                let e = Error::FrameRejected("binary frames are not supported".to_string());
                warn!("Rejected frame: {}", e);
                reply_error(&tx, &e);
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket connection closed by client");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    if let Some(left) = state.registry.leave(&session_id) {
        info!(room_id = %left.room_id, "Cleaned up session");
    }
    forward_task.abort();

    Ok(())
}

fn reply_error(outbox: &Outbox, error: &Error) {
    let _ = outbox.send(ServerMessage::Error {
        message: error.to_string(),
    });
}

async fn handle_frame(
    text: &str,
    session_id: &SessionId,
    state: &ServerState,
    outbox: &Outbox,
) -> Result<()> {
    let limit = state.config.max_message_bytes;
    if text.len() > limit {
        return Err(Error::FrameRejected(format!(
            "frame of {} bytes exceeds limit of {}",
            text.len(),
            limit
        )));
    }

    let message = ClientMessage::from_json(text)?;
    debug!(event = message.event_name(), "Frame received");

    match message {
        ClientMessage::JoinRoom {
            room_id,
            user_id,
            display_name,
        } => {
            state
                .registry
                .join(session_id.clone(), room_id, user_id, display_name, outbox.clone());
        }
        ClientMessage::Offer { to, sdp } => {
            state.relay.relay_offer(session_id, &to, sdp);
        }
        ClientMessage::Answer { to, sdp } => {
            state.relay.relay_answer(session_id, &to, sdp);
        }
        ClientMessage::IceCandidate { to, candidate } => {
            state.relay.relay_candidate(session_id, &to, candidate);
        }
        ClientMessage::UserSpeech { text } => match state.registry.lookup(session_id) {
            Some(session) => {
                if let Err(e) = state.fragments.accept(&session, text).await {
                    warn!("Speech fragment lost: {}", e);
                }
            }
            None => debug!("Speech fragment before join dropped"),
        },
        ClientMessage::SendNotes { room_id, notes } => {
            state.notes.handle_send_notes(session_id, &room_id, &notes).await;
        }
    }

    Ok(())
}
