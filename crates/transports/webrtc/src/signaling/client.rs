//! WebSocket signaling client for room membership and SDP exchange

use super::SignalSender;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientMessage, ServerMessage, SpeechSink};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket signaling client
///
/// Cheap to clone; every clone feeds the same outbound queue. Inbound frames
/// are decoded into [`ServerMessage`]s and delivered on the receiver returned
/// by [`connect`](Self::connect), which closes when the socket does.
#[derive(Clone)]
pub struct SignalingClient {
    url: String,
    tx: mpsc::UnboundedSender<Message>,
}

impl SignalingClient {
    /// Connect to the signaling server
    ///
    /// Establishes the WebSocket connection and starts background tasks for
    /// sending and receiving messages.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>)> {
        info!("Connecting to signaling server: {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocketError(format!("Failed to connect: {}", e)))?;

        info!("Connected to signaling server");

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, inbound_tx));

        Ok((
            Self {
                url: url.to_string(),
                tx,
            },
            inbound_rx,
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sender task: sends messages from channel to WebSocket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
            if closing {
                break;
            }
        }

        debug!("Sender task terminated");
    }

    /// Receiver task: decodes frames and forwards them to the session
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        inbound: mpsc::UnboundedSender<ServerMessage>,
    ) {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                    Ok(message) => {
                        debug!(event = message.event_name(), "Received signaling message");
                        if inbound.send(message).is_err() {
                            debug!("Room session gone, dropping inbound signaling");
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to handle signaling message: {}", e),
                },
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        debug!("Receiver task terminated");
    }
}

impl SignalSender for SignalingClient {
    fn send(&self, message: ClientMessage) -> Result<()> {
        let json = message.to_json()?;
        debug!(event = message.event_name(), "Sending signaling message");
        self.tx
            .send(Message::Text(json))
            .map_err(|_| Error::SignalingError("Signaling connection closed".to_string()))
    }

    /// Queue a close frame; the receiver channel ends once the server acknowledges
    fn close(&self) -> Result<()> {
        info!(url = %self.url, "Closing signaling connection");
        self.tx
            .send(Message::Close(None))
            .map_err(|_| Error::SignalingError("Signaling connection already closed".to_string()))
    }
}

#[async_trait]
impl SpeechSink for SignalingClient {
    async fn dispatch(&self, text: String) -> huddle_core::Result<()> {
        SignalSender::send(self, ClientMessage::UserSpeech { text })
            .map_err(|e| huddle_core::Error::Dispatch(e.to_string()))
    }
}
