use crate::peer::types::TrackKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("signaling error: {0}")]
    Signaling(String),
    #[error("peer connection error: {0}")]
    Peer(String),
    #[error("local media unavailable: {0}")]
    Media(#[from] MediaError),
    #[error("malformed signaling payload: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("webrtc error: {0}")]
    Webrtc(#[from] webrtc::Error),
}

/// Ошибки захвата локальных треков
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission to capture {0} was denied")]
    PermissionDenied(TrackKind),
    #[error("no {0} capture device available")]
    NoDevice(TrackKind),
    #[error("constraints cannot be satisfied: {0}")]
    Unsatisfiable(String),
}
