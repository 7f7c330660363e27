use crate::error::{Error, Result};
use crate::logger::dump_candidate;
use crate::media::{LocalTrack, RemoteTrack};
use crate::peer::connection::{
    OnIceCandidateFn, OnStateChangeFn, OnTrackFn, PeerConnection, PeerConnector,
};
use crate::peer::ice::rtc_ice_servers;
use crate::peer::types::{IceCandidate, SdpType, ServerConfig, SessionDescription, TransportState};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

/// Создаёт peer connection поверх webrtc-rs
pub struct RtcConnector {
    api: API,
    config: RTCConfiguration,
}

impl RtcConnector {
    pub fn new(ice_servers: &[ServerConfig]) -> Result<Self> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            config: rtc_config(ice_servers),
        })
    }
}

/// Конфигурация для peer connection
fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: rtc_ice_servers(servers),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

#[async_trait]
impl PeerConnector for RtcConnector {
    async fn connect(&self, member_id: &str) -> Result<Arc<dyn PeerConnection>> {
        let pc = self.api.new_peer_connection(self.config.clone()).await?;
        debug!(member = %member_id, "peer connection created");
        Ok(Arc::new(RtcPeer {
            pc: Arc::new(pc),
            member_id: member_id.to_string(),
        }))
    }
}

pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    member_id: String,
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        other => return Err(Error::Peer(format!("unsupported sdp type {other}"))),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

fn transport_state(st: RTCPeerConnectionState) -> TransportState {
    match st {
        RTCPeerConnectionState::Connecting => TransportState::Connecting,
        RTCPeerConnectionState::Connected => TransportState::Connected,
        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
        RTCPeerConnectionState::Failed => TransportState::Failed,
        RTCPeerConnectionState::Closed => TransportState::Closed,
        _ => TransportState::New,
    }
}

#[async_trait]
impl PeerConnection for RtcPeer {
    fn on_ice_candidate(&self, mut f: OnIceCandidateFn) {
        let member = self.member_id.clone();
        self.pc
            .on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
                // cand == None означает конец сбора
                match cand.map(|c| c.to_json()) {
                    Some(Ok(init)) => {
                        let candidate = IceCandidate::from(init);
                        dump_candidate("LOCAL", &member, &candidate);
                        f(candidate);
                    }
                    Some(Err(e)) => warn!(member = %member, error = %e, "candidate to_json failed"),
                    None => debug!(member = %member, "ICE candidate gathering completed"),
                }
                Box::pin(async {})
            }));
    }

    fn on_track(&self, mut f: OnTrackFn) {
        self.pc
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                f(RemoteTrack::from_rtp(track));
                Box::pin(async {})
            }));
    }

    fn on_connection_state_change(&self, mut f: OnStateChangeFn) {
        let member = self.member_id.clone();
        self.pc
            .on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
                debug!(member = %member, state = %st, "peer connection state changed");
                f(transport_state(st));
                Box::pin(async {})
            }));
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        let rtp = track
            .rtp()
            .ok_or_else(|| Error::Peer(format!("track {} has no rtp binding", track.id())))?;
        self.pc
            .add_track(Arc::clone(rtp) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        from_rtc(self.pc.create_offer(None).await?)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        from_rtc(self.pc.create_answer(None).await?)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc.set_local_description(to_rtc(desc)?).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc.set_remote_description(to_rtc(desc)?).await?;
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.pc.remote_description().await.is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pc.add_ice_candidate(candidate.into()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }
}
