//! webrtc-rs backed peer connections

use super::connection::{LinkSignal, PeerConnection, PeerConnector, RemoteMedia, TransportState};
use super::link::LinkId;
use crate::config::ClientConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use huddle_core::{IceCandidate, SdpType, SessionDescription, SessionId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Shared local microphone track with a mute switch.
///
/// Muting drops samples before they reach any link; the track stays
/// negotiated, so unmuting needs no renegotiation.
#[derive(Clone)]
pub struct LocalAudio {
    track: Arc<TrackLocalStaticSample>,
    muted: Arc<AtomicBool>,
}

impl LocalAudio {
    /// Opus, 48 kHz stereo, on a fresh media stream
    pub fn opus() -> Self {
        let track = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            "audio".to_string(),
            format!("huddle-{}", uuid::Uuid::new_v4()),
        );

        Self {
            track: Arc::new(track),
            muted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        info!(muted, "Local audio mute changed");
    }

    /// Flip the mute switch; returns whether audio is now muted
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.muted.fetch_xor(true, Ordering::SeqCst);
        info!(muted, "Local audio mute changed");
        muted
    }

    /// Send one encoded sample on every link. Returns `false` if it was
    /// dropped because audio is muted.
    pub async fn write_sample(&self, sample: &Sample) -> Result<bool> {
        if self.is_muted() {
            return Ok(false);
        }

        self.track
            .write_sample(sample)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to write sample: {}", e)))?;
        Ok(true)
    }
}

/// Creates [`RtcPeerConnection`]s with the configured ICE servers.
///
/// The connector owns the local microphone track; every link sends the same
/// track, and tearing a link down leaves the track alive. Remote tracks are
/// reported as [`LinkSignal::RemoteTrack`].
pub struct RtcConnector {
    ice_servers: Vec<RTCIceServer>,
    local_audio: Option<LocalAudio>,
}

impl RtcConnector {
    /// Connector without local media (receive-only links)
    pub fn new(config: &ClientConfig) -> Self {
        let ice_servers = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| RTCIceServer {
                urls: vec![turn.url.clone()],
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            }))
            .collect();

        Self {
            ice_servers,
            local_audio: None,
        }
    }

    /// Connector that sends one shared Opus microphone track on every link
    pub fn with_local_audio(config: &ClientConfig) -> Self {
        Self {
            local_audio: Some(LocalAudio::opus()),
            ..Self::new(config)
        }
    }

    /// Local audio to write encoded Opus samples into and mute
    pub fn local_audio(&self) -> Option<LocalAudio> {
        self.local_audio.clone()
    }
}

#[async_trait]
impl PeerConnector for RtcConnector {
    #[instrument(skip(self, signals), fields(remote = %remote, link_id = %link_id))]
    async fn connect(
        &self,
        remote: &SessionId,
        link_id: LinkId,
        signals: mpsc::UnboundedSender<LinkSignal>,
    ) -> Result<Box<dyn PeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::WebRtcError(format!("Failed to create peer connection: {}", e))
        })?);

        let candidate_tx = signals.clone();
        let candidate_remote = remote.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate| {
            let tx = candidate_tx.clone();
            let remote = candidate_remote.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!(remote = %remote, "ICE gathering complete");
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx.send(LinkSignal::LocalCandidate {
                            remote,
                            link_id,
                            candidate: IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_m_line_index: init.sdp_mline_index,
                                username_fragment: init.username_fragment,
                            },
                        });
                    }
                    Err(e) => warn!(remote = %remote, "Failed to convert ICE candidate to JSON: {}", e),
                }
            })
        }));

        let track_tx = signals.clone();
        let track_remote = remote.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let media = RemoteMedia::from_track(track);
            debug!(
                remote = %track_remote,
                track_id = %media.track_id,
                kind = %media.kind,
                "Remote track started"
            );
            let _ = track_tx.send(LinkSignal::RemoteTrack {
                remote: track_remote.clone(),
                link_id,
                media,
            });
            Box::pin(async {})
        }));

        let state_tx = signals;
        let state_remote = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let state = match s {
                    RTCPeerConnectionState::New => Some(TransportState::New),
                    RTCPeerConnectionState::Connecting => Some(TransportState::Connecting),
                    RTCPeerConnectionState::Connected => Some(TransportState::Connected),
                    RTCPeerConnectionState::Disconnected => Some(TransportState::Disconnected),
                    RTCPeerConnectionState::Failed => Some(TransportState::Failed),
                    RTCPeerConnectionState::Closed => Some(TransportState::Closed),
                    _ => None,
                };
                if let Some(state) = state {
                    let _ = state_tx.send(LinkSignal::StateChanged {
                        remote: state_remote.clone(),
                        link_id,
                        state,
                    });
                }
                Box::pin(async {})
            },
        ));

        info!("Created WebRTC peer connection");

        Ok(Box::new(RtcPeerConnection {
            remote: remote.clone(),
            peer_connection,
            local_audio: self.local_audio.as_ref().map(LocalAudio::track),
            media_attached: AtomicBool::new(false),
        }))
    }
}

/// webrtc::RTCPeerConnection wrapper for one remote session
pub struct RtcPeerConnection {
    remote: SessionId,
    peer_connection: Arc<RTCPeerConnection>,
    local_audio: Option<Arc<TrackLocalStaticSample>>,
    media_attached: AtomicBool,
}

impl RtcPeerConnection {
    async fn local_description(&self) -> Result<String> {
        self.peer_connection
            .local_description()
            .await
            .map(|desc| desc.sdp)
            .ok_or_else(|| Error::SdpError("No local description after setting it".to_string()))
    }
}

#[async_trait]
impl PeerConnection for RtcPeerConnection {
    async fn attach_local_media(&self) -> Result<()> {
        let Some(track) = &self.local_audio else {
            return Ok(());
        };
        if self.media_attached.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.peer_connection
            .add_track(Arc::clone(track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to add audio track: {}", e)))?;

        debug!(remote = %self.remote, "Attached local audio track");
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        Ok(SessionDescription::offer(self.local_description().await?))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;

        self.peer_connection
            .set_local_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        Ok(SessionDescription::answer(self.local_description().await?))
    }

    async fn apply_remote_description(&self, description: SessionDescription) -> Result<()> {
        let remote = match description.kind {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp),
            SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        }
        .map_err(|e| Error::SdpError(format!("Failed to parse remote description: {}", e)))?;

        self.peer_connection
            .set_remote_description(remote)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };

        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::PeerConnectionError(format!("Failed to close connection: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> Sample {
        Sample {
            duration: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_muted_audio_drops_samples() {
        let audio = LocalAudio::opus();
        assert!(!audio.is_muted());
        assert!(audio.write_sample(&sample()).await.unwrap());

        assert!(audio.toggle_mute());
        assert!(!audio.write_sample(&sample()).await.unwrap());

        assert!(!audio.toggle_mute());
        assert!(audio.write_sample(&sample()).await.unwrap());
    }

    #[test]
    fn test_mute_is_shared_across_handles() {
        let connector = RtcConnector::with_local_audio(&ClientConfig::default());
        let first = connector.local_audio().unwrap();
        let second = connector.local_audio().unwrap();

        first.set_muted(true);
        assert!(second.is_muted());
        assert!(Arc::ptr_eq(&first.track(), &second.track()));
    }

    #[test]
    fn test_receive_only_connector_has_no_audio() {
        let connector = RtcConnector::new(&ClientConfig::default());
        assert!(connector.local_audio().is_none());
    }
}
