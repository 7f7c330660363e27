//! Фейковые peer connection и захват медиа для тестов

use crate::error::{Error, MediaError, Result};
use crate::media::{LocalTrack, MediaCapture, MediaConstraints, RemoteTrack};
use crate::peer::connection::{
    OnIceCandidateFn, OnStateChangeFn, OnTrackFn, PeerConnection, PeerConnector,
};
use crate::peer::types::{IceCandidate, SessionDescription, TrackKind, TransportState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Общая "сеть": какие треки опубликовал каждый участник
#[derive(Clone, Default)]
pub struct FakeNetwork {
    published: Arc<Mutex<HashMap<String, Vec<(String, TrackKind)>>>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, owner: &str, id: &str, kind: TrackKind) {
        let mut published = self.published.lock().unwrap();
        let tracks = published.entry(owner.to_string()).or_default();
        if !tracks.iter().any(|(t, _)| t == id) {
            tracks.push((id.to_string(), kind));
        }
    }

    fn tracks_of(&self, owner: &str) -> Vec<(String, TrackKind)> {
        self.published
            .lock()
            .unwrap()
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }
}

pub struct FakeConnector {
    network: FakeNetwork,
    owner: String,
    candidates: Mutex<Vec<String>>,
    offer_sdp: Mutex<Option<String>>,
    answer_sdp: Mutex<Option<String>>,
    reject_tracks: AtomicBool,
    peers: Mutex<Vec<Arc<FakePeer>>>,
}

impl FakeConnector {
    pub fn new(network: FakeNetwork, owner: &str) -> Self {
        Self {
            network,
            owner: owner.to_string(),
            candidates: Mutex::new(Vec::new()),
            offer_sdp: Mutex::new(None),
            answer_sdp: Mutex::new(None),
            reject_tracks: AtomicBool::new(false),
            peers: Mutex::new(Vec::new()),
        }
    }

    /// Кандидаты, которые каждое соединение "найдёт" после set_local_description
    pub fn set_candidates(&self, candidates: Vec<String>) {
        *self.candidates.lock().unwrap() = candidates;
    }

    pub fn set_offer_sdp(&self, sdp: &str) {
        *self.offer_sdp.lock().unwrap() = Some(sdp.to_string());
    }

    pub fn set_answer_sdp(&self, sdp: &str) {
        *self.answer_sdp.lock().unwrap() = Some(sdp.to_string());
    }

    /// Новые соединения будут отклонять add_track
    pub fn reject_tracks(&self) {
        self.reject_tracks.store(true, Ordering::SeqCst);
    }

    pub fn last_peer(&self) -> Option<Arc<FakePeer>> {
        self.peers.lock().unwrap().last().cloned()
    }

    pub fn connections(&self) -> usize {
        self.peers.lock().unwrap().len()
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(&self, member_id: &str) -> Result<Arc<dyn PeerConnection>> {
        let offer = self.offer_sdp.lock().unwrap().clone();
        let answer = self.answer_sdp.lock().unwrap().clone();
        let peer = Arc::new(FakePeer {
            owner: self.owner.clone(),
            remote: member_id.to_string(),
            network: self.network.clone(),
            candidates: self.candidates.lock().unwrap().clone(),
            offer_sdp: offer.unwrap_or_else(|| format!("offer-from-{}", self.owner)),
            answer_sdp: answer.unwrap_or_else(|| format!("answer-from-{}", self.owner)),
            reject_tracks: self.reject_tracks.load(Ordering::SeqCst),
            added: Mutex::new(Vec::new()),
            local: Mutex::new(None),
            remote_desc: Mutex::new(None),
            remote_sets: AtomicUsize::new(0),
            remote_candidates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            on_candidate: Mutex::new(None),
            on_track: Mutex::new(None),
            on_state: Mutex::new(None),
        });
        self.peers.lock().unwrap().push(peer.clone());
        Ok(peer)
    }
}

/// Соединяется, когда применены обе половины SDP и пришёл хотя бы один
/// удалённый кандидат; затем отдаёт треки, опубликованные удалённой стороной.
pub struct FakePeer {
    owner: String,
    remote: String,
    network: FakeNetwork,
    candidates: Vec<String>,
    offer_sdp: String,
    answer_sdp: String,
    reject_tracks: bool,
    added: Mutex<Vec<String>>,
    local: Mutex<Option<SessionDescription>>,
    remote_desc: Mutex<Option<SessionDescription>>,
    remote_sets: AtomicUsize,
    remote_candidates: Mutex<Vec<IceCandidate>>,
    closed: AtomicBool,
    connected: AtomicBool,
    on_candidate: Mutex<Option<OnIceCandidateFn>>,
    on_track: Mutex<Option<OnTrackFn>>,
    on_state: Mutex<Option<OnStateChangeFn>>,
}

impl FakePeer {
    pub fn added_tracks(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().unwrap().clone()
    }

    pub fn remote_description_now(&self) -> Option<SessionDescription> {
        self.remote_desc.lock().unwrap().clone()
    }

    pub fn remote_description_sets(&self) -> usize {
        self.remote_sets.load(Ordering::SeqCst)
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.remote_candidates.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Peer("connection closed".into()))
        } else {
            Ok(())
        }
    }

    fn check_connected(&self) {
        let ready = self.local.lock().unwrap().is_some()
            && self.remote_desc.lock().unwrap().is_some()
            && !self.remote_candidates.lock().unwrap().is_empty();
        if !ready || self.connected.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(f) = self.on_track.lock().unwrap().as_mut() {
            for (id, kind) in self.network.tracks_of(&self.remote) {
                f(RemoteTrack::new(id, kind, self.remote.clone()));
            }
        }
        if let Some(f) = self.on_state.lock().unwrap().as_mut() {
            f(TransportState::Connected);
        }
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn on_ice_candidate(&self, f: OnIceCandidateFn) {
        *self.on_candidate.lock().unwrap() = Some(f);
    }

    fn on_track(&self, f: OnTrackFn) {
        *self.on_track.lock().unwrap() = Some(f);
    }

    fn on_connection_state_change(&self, f: OnStateChangeFn) {
        *self.on_state.lock().unwrap() = Some(f);
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        self.ensure_open()?;
        if self.reject_tracks {
            return Err(Error::Peer(format!("track {} rejected", track.id())));
        }
        self.added.lock().unwrap().push(track.id().to_string());
        self.network.publish(&self.owner, track.id(), track.kind());
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ensure_open()?;
        Ok(SessionDescription::offer(self.offer_sdp.clone()))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.ensure_open()?;
        if self.remote_desc.lock().unwrap().is_none() {
            return Err(Error::Peer("answer requires a remote offer".into()));
        }
        Ok(SessionDescription::answer(self.answer_sdp.clone()))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.ensure_open()?;
        *self.local.lock().unwrap() = Some(desc);
        if let Some(f) = self.on_candidate.lock().unwrap().as_mut() {
            for c in &self.candidates {
                f(IceCandidate::new(format!("{c} ({})", self.owner)));
            }
        }
        self.check_connected();
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.ensure_open()?;
        *self.remote_desc.lock().unwrap() = Some(desc);
        self.remote_sets.fetch_add(1, Ordering::SeqCst);
        self.check_connected();
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.remote_desc.lock().unwrap().is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.ensure_open()?;
        if self.remote_desc.lock().unwrap().is_none() {
            return Err(Error::Peer("remote description not set".into()));
        }
        self.remote_candidates.lock().unwrap().push(candidate);
        self.check_connected();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Захват медиа с заранее заданным результатом
pub struct FakeCapture {
    prefix: String,
    failure: Mutex<Option<MediaError>>,
    calls: AtomicUsize,
}

impl FakeCapture {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(prefix: &str, err: MediaError) -> Self {
        let capture = Self::new(prefix);
        *capture.failure.lock().unwrap() = Some(err);
        capture
    }

    pub fn allow(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaCapture for FakeCapture {
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> std::result::Result<Vec<LocalTrack>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        let mut tracks = vec![LocalTrack::new(
            format!("{}-video", self.prefix),
            TrackKind::Video,
        )];
        if constraints.audio {
            tracks.push(LocalTrack::new(
                format!("{}-audio", self.prefix),
                TrackKind::Audio,
            ));
        }
        Ok(tracks)
    }
}
