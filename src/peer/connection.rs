use crate::error::Result;
use crate::media::{LocalTrack, RemoteTrack};
use crate::peer::types::{IceCandidate, SessionDescription, TransportState};
use async_trait::async_trait;
use std::sync::Arc;

pub type OnIceCandidateFn = Box<dyn FnMut(IceCandidate) + Send + Sync>;
pub type OnTrackFn = Box<dyn FnMut(RemoteTrack) + Send + Sync>;
pub type OnStateChangeFn = Box<dyn FnMut(TransportState) + Send + Sync>;

/// Примитив peer connection: SDP, ICE и медиа живут за этим интерфейсом.
///
/// Обработчики `on_*` могут вызываться асинхронно и сколько угодно раз
/// после регистрации, в том числе из другой задачи.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn on_ice_candidate(&self, f: OnIceCandidateFn);
    fn on_track(&self, f: OnTrackFn);
    fn on_connection_state_change(&self, f: OnStateChangeFn);

    async fn add_track(&self, track: &LocalTrack) -> Result<()>;
    async fn create_offer(&self) -> Result<SessionDescription>;
    async fn create_answer(&self) -> Result<SessionDescription>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;
    /// Установлен ли remote description любого типа, включая pranswer
    async fn has_remote_description(&self) -> bool;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Фабрика peer connection, по одному на удалённого участника
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, member_id: &str) -> Result<Arc<dyn PeerConnection>>;
}
