//! A room client against a real signaling server: leaving must reach the
//! other members.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use huddle_core::{NoteContent, RoomId, Speaker, Summarizer, UserId};
use huddle_signaling_server::{ServerConfig, ServerHandle, SignalingServer};
use huddle_webrtc::{ClientConfig, JoinRequest, RoomClient, RoomEvent, RtcConnector};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct FixedSummarizer;

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, _transcript: &str) -> huddle_core::Result<NoteContent> {
        Ok(NoteContent {
            summary_points: vec!["Shipped".to_string()],
            action_items: vec![],
            recap: "Short sync.".to_string(),
        })
    }
}

/// Plain WebSocket member used to observe what the server broadcasts
struct Observer {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Observer {
    async fn join(url: &str, room: &str) -> Self {
        let (ws, _) = connect_async(url).await.unwrap();
        let mut observer = Self { ws };
        let join = json!({
            "event": "join-room",
            "data": {"roomId": room, "userId": "u-obs", "displayName": "Obs"}
        });
        observer
            .ws
            .send(Message::Text(join.to_string()))
            .await
            .unwrap();
        observer.recv_event("existing-users").await;
        observer
    }

    async fn recv_event(&mut self, event: &str) -> Value {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("no message from server")
                .expect("server closed the connection")
                .unwrap();
            if let Message::Text(text) = frame {
                let msg: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(msg["event"], event, "unexpected message {}", msg);
                return msg["data"].clone();
            }
        }
    }
}

async fn start_server() -> (ServerHandle, ClientConfig) {
    let handle = SignalingServer::new(ServerConfig::local())
        .unwrap()
        .start()
        .await
        .unwrap();
    let config = ClientConfig {
        signaling_url: format!("ws://{}", handle.local_addr()),
        ..Default::default()
    };
    (handle, config)
}

async fn connect(
    config: &ClientConfig,
) -> (
    huddle_webrtc::RoomHandle,
    tokio::sync::mpsc::UnboundedReceiver<RoomEvent>,
    tokio::task::JoinHandle<()>,
) {
    let request = JoinRequest {
        room_id: RoomId::from("r1"),
        user_id: UserId::from("u-ada"),
        display_name: "Ada".to_string(),
    };
    RoomClient::connect_with(
        config,
        request,
        Arc::new(RtcConnector::new(config)),
        Arc::new(FixedSummarizer),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_end_session_leaves_the_room() {
    let (server, config) = start_server().await;
    let mut observer = Observer::join(&config.signaling_url, "r1").await;

    let (room, mut events, task) = connect(&config).await;
    let joined = observer.recv_event("user-joined").await;
    let ada = joined["sessionId"].as_str().unwrap().to_string();

    room.record_transcript(Speaker::User, "We shipped it").unwrap();
    let notes = room.end_session().await.unwrap().unwrap();
    assert_eq!(notes.recap, "Short sync.");

    let batch = observer.recv_event("receive-notes").await;
    assert_eq!(batch.as_array().unwrap().len(), 2);
    let left = observer.recv_event("user-left").await;
    assert_eq!(left["sessionId"], ada.as_str());

    let disconnected = tokio::time::timeout(RECV_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            if event == RoomEvent::Disconnected {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(disconnected);
    tokio::time::timeout(RECV_TIMEOUT, task).await.unwrap().unwrap();

    server.shutdown().await;
}

#[tokio::test]
async fn test_dropping_the_handle_leaves_the_room() {
    let (server, config) = start_server().await;
    let mut observer = Observer::join(&config.signaling_url, "r1").await;

    let (room, _events, task) = connect(&config).await;
    let joined = observer.recv_event("user-joined").await;
    let ada = joined["sessionId"].as_str().unwrap().to_string();

    drop(room);
    tokio::time::timeout(RECV_TIMEOUT, task).await.unwrap().unwrap();

    let left = observer.recv_event("user-left").await;
    assert_eq!(left["sessionId"], ada.as_str());

    server.shutdown().await;
}
