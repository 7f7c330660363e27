use crate::media::MediaStream;
use crate::peer::connection::PeerConnection;
use crate::peer::state::{NegotiationState, Role};
use crate::peer::types::{IceCandidate, MemberId, TrackKind};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Один звонок с удалённым участником
pub struct Session {
    pub(crate) member_id: MemberId,
    pub(crate) role: Role,
    pub(crate) state: NegotiationState,
    pub(crate) peer: Option<Arc<dyn PeerConnection>>,
    pub(crate) remote_stream: MediaStream,
    // номер текущего peer connection; события старых соединений отбрасываются
    pub(crate) generation: u64,
    pub(crate) local_candidates: Vec<IceCandidate>,
    pub(crate) started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(member_id: impl Into<MemberId>, role: Role) -> Self {
        Self {
            member_id: member_id.into(),
            role,
            state: NegotiationState::Idle,
            peer: None,
            remote_stream: MediaStream::new(),
            generation: 0,
            local_candidates: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn remote_stream(&self) -> &MediaStream {
        &self.remote_stream
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    pub fn local_candidates(&self) -> &[IceCandidate] {
        &self.local_candidates
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Уведомления для UI: локальный и удалённый потоки, mute, состояние звонка
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LocalMediaReady { track_ids: Vec<String> },
    MediaFailed { reason: String },
    RemoteTrack {
        member_id: MemberId,
        track_id: String,
        kind: TrackKind,
    },
    TrackToggled { kind: TrackKind, enabled: bool },
    PeerConnected { member_id: MemberId },
    ConnectionProblem { member_id: MemberId },
    PeerLeft { member_id: MemberId },
    Left,
}
