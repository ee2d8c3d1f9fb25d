//! WebSocket signaling server
//!
//! Binds a TCP listener and spawns one [`handle_connection`] task per accepted
//! connection until shut down through the returned [`ServerHandle`].

use crate::config::ServerConfig;
use crate::fragments::{FragmentSink, LoggingFragmentSink};
use crate::handler::{handle_connection, ServerState};
use crate::registry::SessionRegistry;
use crate::Result;
use huddle_core::{InMemoryNoteStore, NoteStore, RoomNote, UserId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// WebSocket signaling server
pub struct SignalingServer {
    state: Arc<ServerState>,
}

impl SignalingServer {
    /// Server with in-memory note storage and logged speech fragments
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryNoteStore::new()),
            Arc::new(LoggingFragmentSink),
        )
    }

    /// Server with caller-supplied note storage and fragment sink
    pub fn with_collaborators(
        config: ServerConfig,
        store: Arc<dyn NoteStore>,
        fragments: Arc<dyn FragmentSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(ServerState::new(config, store, fragments)),
        })
    }

    /// Room membership shared by every connection
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Bind and start accepting connections
    pub async fn start(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind(self.state.config.bind_address).await?;
        let local_addr = listener.local_addr()?;
        info!("Signaling server listening on ws://{}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let state = self.state;

        let handle_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                debug!("Accepted connection from {}", peer_addr);
                                let state = Arc::clone(&state);
                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, state).await {
                                        debug!("Connection from {} ended with error: {}", peer_addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Signaling server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(ServerHandle {
            local_addr,
            state: handle_state,
            shutdown_tx,
            task,
        })
    }
}

/// Handle to a running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound, useful with port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Note records persisted for `user_id`, oldest first
    pub async fn notes_for_user(&self, user_id: &UserId) -> Result<Vec<RoomNote>> {
        Ok(self.state.notes.notes_for_user(user_id).await?)
    }

    /// Stop accepting connections and wait for the accept loop to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Accept loop ended abnormally: {}", e);
        }
    }
}
