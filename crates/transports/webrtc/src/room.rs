//! Room session orchestration
//!
//! A [`RoomSession`] owns everything one participant keeps for one room: the
//! peer links, the roster, the full transcript and the speech debouncer. A
//! single [`RoomClient`] task drives it by selecting over server messages,
//! link signals and application commands, so none of that state is shared.

use crate::config::ClientConfig;
use crate::peer::{LinkSignal, LinkState, PeerConnector, PeerManager, RemoteMedia, RtcConnector};
use crate::signaling::{SignalSender, SignalingClient};
use crate::summarizer::HttpSummarizer;
use crate::{Error, Result};
use huddle_core::{
    ClientMessage, MemberInfo, NoteContent, RoomId, RoomNote, ServerMessage, SessionId,
    SessionTranscript, Speaker, SpeechDebouncer, SpeechSink, Summarizer, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Identity used when joining a room
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub display_name: String,
}

/// Notifications surfaced to the application
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Members present before us, in join order
    Joined(Vec<MemberInfo>),
    MemberJoined(MemberInfo),
    MemberLeft(SessionId),
    /// A member started sending media to us
    RemoteTrack {
        remote: SessionId,
        media: RemoteMedia,
    },
    /// One batch of note records from a distribution
    NotesReceived(Vec<RoomNote>),
    /// The server rejected one of our frames
    ServerError(String),
    /// Signaling connection lost; all links were torn down
    Disconnected,
}

/// State of one participant in one room
pub struct RoomSession {
    request: JoinRequest,
    peers: PeerManager,
    roster: Vec<MemberInfo>,
    transcript: SessionTranscript,
    debouncer: SpeechDebouncer,
    summarizer: Arc<dyn Summarizer>,
    signaling: Arc<dyn SignalSender>,
    events: mpsc::UnboundedSender<RoomEvent>,
    ended: bool,
}

impl RoomSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request: JoinRequest,
        connector: Arc<dyn PeerConnector>,
        signaling: Arc<dyn SignalSender>,
        speech_sink: Arc<dyn SpeechSink>,
        summarizer: Arc<dyn Summarizer>,
        speech_idle: Duration,
        link_signals: mpsc::UnboundedSender<LinkSignal>,
        events: mpsc::UnboundedSender<RoomEvent>,
    ) -> Self {
        Self {
            request,
            peers: PeerManager::new(connector, Arc::clone(&signaling), link_signals),
            roster: Vec::new(),
            transcript: SessionTranscript::new(),
            debouncer: SpeechDebouncer::new(speech_idle, speech_sink),
            summarizer,
            signaling,
            events,
            ended: false,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.request.room_id
    }

    /// Announce ourselves to the room
    pub fn join(&self) -> Result<()> {
        info!(room_id = %self.request.room_id, "Joining room");
        self.signaling.send(ClientMessage::JoinRoom {
            room_id: self.request.room_id.clone(),
            user_id: self.request.user_id.clone(),
            display_name: self.request.display_name.clone(),
        })
    }

    fn emit(&self, event: RoomEvent) {
        if self.events.send(event).is_err() {
            debug!("Room event receiver dropped");
        }
    }

    fn remember(&mut self, member: MemberInfo) {
        if !self.roster.iter().any(|m| m.session_id == member.session_id) {
            self.roster.push(member);
        }
    }

    pub async fn handle_server_message(&mut self, message: ServerMessage) {
        let event = message.event_name();
        if let Err(e) = self.dispatch_server_message(message).await {
            warn!(room_id = %self.request.room_id, event, "Failed to handle server message: {}", e);
        }
    }

    async fn dispatch_server_message(&mut self, message: ServerMessage) -> Result<()> {
        match message {
            ServerMessage::ExistingUsers(members) => {
                info!(count = members.len(), "Joined room");
                for member in members.iter().cloned() {
                    self.remember(member);
                }
                // The newcomer never offers; existing members offer to us.
                self.emit(RoomEvent::Joined(members));
                Ok(())
            }
            ServerMessage::UserJoined(member) => {
                self.remember(member.clone());
                self.emit(RoomEvent::MemberJoined(member.clone()));
                if self.ended {
                    debug!(remote = %member.session_id, "Session ended, not offering");
                    return Ok(());
                }
                self.peers.initiate_offer(&member.session_id).await
            }
            ServerMessage::Offer {
                from,
                sdp,
                display_name,
            } => {
                self.remember(MemberInfo {
                    session_id: from.clone(),
                    display_name,
                });
                if self.ended {
                    debug!(remote = %from, "Session ended, ignoring offer");
                    return Ok(());
                }
                self.peers.handle_inbound_offer(&from, sdp).await
            }
            ServerMessage::Answer { from, sdp } => self.peers.handle_inbound_answer(&from, sdp).await,
            ServerMessage::IceCandidate { from, candidate } => {
                if self.ended {
                    debug!(remote = %from, "Session ended, dropping ICE candidate");
                    return Ok(());
                }
                self.peers.handle_inbound_candidate(&from, candidate).await
            }
            ServerMessage::UserLeft { session_id } => {
                self.peers.teardown(&session_id).await;
                self.roster.retain(|m| m.session_id != session_id);
                self.emit(RoomEvent::MemberLeft(session_id));
                Ok(())
            }
            ServerMessage::ReceiveNotes(notes) => {
                info!(count = notes.len(), "Received room notes");
                self.emit(RoomEvent::NotesReceived(notes));
                Ok(())
            }
            ServerMessage::Error { message } => {
                warn!(room_id = %self.request.room_id, "Server error: {}", message);
                self.emit(RoomEvent::ServerError(message));
                Ok(())
            }
        }
    }

    pub async fn handle_link_signal(&mut self, signal: LinkSignal) {
        let remote = signal.remote().clone();
        match self.peers.handle_link_signal(signal).await {
            Ok(Some(media)) => self.emit(RoomEvent::RemoteTrack { remote, media }),
            Ok(None) => {}
            Err(e) => {
                warn!(room_id = %self.request.room_id, "Failed to handle link signal: {}", e);
            }
        }
    }

    /// Add one transcript fragment to the session transcript and the speech
    /// buffer. Ignored once the session has ended.
    pub fn record_transcript(&mut self, speaker: Speaker, text: &str) {
        if self.ended {
            debug!(?speaker, "Session ended, ignoring transcript fragment");
            return;
        }
        self.transcript.push(speaker, text);
        self.debouncer.append(text);
    }

    /// Flush speech, summarize the session once, request note distribution,
    /// close every link and leave the room.
    ///
    /// Returns the generated notes, or `None` if there was nothing to
    /// summarize or the session had already ended.
    #[instrument(skip(self), fields(room_id = %self.request.room_id))]
    pub async fn end_session(&mut self) -> Result<Option<NoteContent>> {
        if self.ended {
            return Ok(None);
        }
        self.ended = true;

        self.debouncer.flush_now().await;
        let result = self.request_notes().await;
        self.peers.teardown_all().await;
        self.close_signaling();

        info!("Session ended");
        result
    }

    /// Leave without summarizing: flush speech, drop links, close signaling
    async fn leave(&mut self) {
        let already_ended = self.ended;
        self.ended = true;

        self.debouncer.flush_now().await;
        self.peers.teardown_all().await;
        if !already_ended {
            self.close_signaling();
        }
    }

    fn close_signaling(&self) {
        if let Err(e) = self.signaling.close() {
            debug!("Signaling already closed: {}", e);
        }
    }

    async fn request_notes(&self) -> Result<Option<NoteContent>> {
        if self.transcript.is_empty() {
            debug!("Empty transcript, skipping notes");
            return Ok(None);
        }

        let notes = self.summarizer.summarize(&self.transcript.render()).await?;
        self.signaling.send(ClientMessage::SendNotes {
            room_id: self.request.room_id.clone(),
            notes: notes.clone(),
        })?;
        Ok(Some(notes))
    }

    /// Signaling is gone: drop every link and forget the roster
    pub async fn handle_disconnect(&mut self) {
        self.ended = true;
        self.peers.teardown_all().await;
        self.roster.clear();
        self.emit(RoomEvent::Disconnected);
    }

    pub fn roster(&self) -> &[MemberInfo] {
        &self.roster
    }

    pub fn transcript(&self) -> &SessionTranscript {
        &self.transcript
    }

    pub fn link_state(&self, remote: &SessionId) -> Option<LinkState> {
        self.peers.link_state(remote)
    }

    pub fn link_count(&self) -> usize {
        self.peers.link_count()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

enum RoomCommand {
    RecordTranscript {
        speaker: Speaker,
        text: String,
    },
    EndSession {
        reply: oneshot::Sender<Result<Option<NoteContent>>>,
    },
    Roster {
        reply: oneshot::Sender<Vec<MemberInfo>>,
    },
    LinkState {
        remote: SessionId,
        reply: oneshot::Sender<Option<LinkState>>,
    },
}

/// Application handle to a running [`RoomClient`]
#[derive(Clone)]
pub struct RoomHandle {
    commands: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    fn send(&self, command: RoomCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::SessionClosed)
    }

    pub fn record_transcript(&self, speaker: Speaker, text: impl Into<String>) -> Result<()> {
        self.send(RoomCommand::RecordTranscript {
            speaker,
            text: text.into(),
        })
    }

    /// End the session; resolves once buffered speech is flushed and notes are requested
    pub async fn end_session(&self) -> Result<Option<NoteContent>> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::EndSession { reply })?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    pub async fn roster(&self) -> Result<Vec<MemberInfo>> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Roster { reply })?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    pub async fn link_state(&self, remote: &SessionId) -> Result<Option<LinkState>> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::LinkState {
            remote: remote.clone(),
            reply,
        })?;
        rx.await.map_err(|_| Error::SessionClosed)
    }
}

/// Task that owns a [`RoomSession`]
pub struct RoomClient {
    session: RoomSession,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    link_signals: mpsc::UnboundedReceiver<LinkSignal>,
    commands: mpsc::UnboundedReceiver<RoomCommand>,
}

impl RoomClient {
    /// Connect with the production stack: WebRTC links carrying a local
    /// audio track and the HTTP summarizer from `config`.
    pub async fn connect(
        config: &ClientConfig,
        request: JoinRequest,
    ) -> Result<(RoomHandle, mpsc::UnboundedReceiver<RoomEvent>, JoinHandle<()>)> {
        config.validate()?;
        let url = config.summarizer_url.clone().ok_or_else(|| {
            Error::InvalidConfig("summarizer_url is required to generate notes".to_string())
        })?;

        let connector = Arc::new(RtcConnector::with_local_audio(config));
        let summarizer = Arc::new(HttpSummarizer::new(url));
        Self::connect_with(config, request, connector, summarizer).await
    }

    /// Connect to the signaling server with caller-supplied collaborators
    pub async fn connect_with(
        config: &ClientConfig,
        request: JoinRequest,
        connector: Arc<dyn PeerConnector>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<(RoomHandle, mpsc::UnboundedReceiver<RoomEvent>, JoinHandle<()>)> {
        let (client, inbound) = SignalingClient::connect(&config.signaling_url).await?;
        let client = Arc::new(client);
        Ok(Self::spawn(
            request,
            connector,
            client.clone(),
            client,
            summarizer,
            config.speech_idle(),
            inbound,
        ))
    }

    /// Start the session task over an already-open signaling channel
    pub fn spawn(
        request: JoinRequest,
        connector: Arc<dyn PeerConnector>,
        signaling: Arc<dyn SignalSender>,
        speech_sink: Arc<dyn SpeechSink>,
        summarizer: Arc<dyn Summarizer>,
        speech_idle: Duration,
        inbound: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> (RoomHandle, mpsc::UnboundedReceiver<RoomEvent>, JoinHandle<()>) {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let session = RoomSession::new(
            request,
            connector,
            signaling,
            speech_sink,
            summarizer,
            speech_idle,
            link_tx,
            event_tx,
        );

        let client = RoomClient {
            session,
            inbound,
            link_signals: link_rx,
            commands: command_rx,
        };
        let task = tokio::spawn(client.run());

        (RoomHandle { commands: command_tx }, event_rx, task)
    }

    async fn run(mut self) {
        if let Err(e) = self.session.join() {
            warn!("Failed to send join request: {}", e);
            self.session.handle_disconnect().await;
            return;
        }

        loop {
            tokio::select! {
                message = self.inbound.recv() => match message {
                    Some(message) => self.session.handle_server_message(message).await,
                    None => {
                        info!(room_id = %self.session.room_id(), "Signaling connection closed");
                        self.session.handle_disconnect().await;
                        break;
                    }
                },
                Some(signal) = self.link_signals.recv() => {
                    self.session.handle_link_signal(signal).await;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All room handles dropped");
                        self.session.leave().await;
                        break;
                    }
                },
            }
        }

        debug!("Room client task terminated");
    }

    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::RecordTranscript { speaker, text } => {
                self.session.record_transcript(speaker, &text);
            }
            RoomCommand::EndSession { reply } => {
                let result = self.session.end_session().await;
                let _ = reply.send(result);
            }
            RoomCommand::Roster { reply } => {
                let _ = reply.send(self.session.roster().to_vec());
            }
            RoomCommand::LinkState { remote, reply } => {
                let _ = reply.send(self.session.link_state(&remote));
            }
        }
    }
}
