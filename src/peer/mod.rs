pub mod connection;
pub mod ice;
pub mod rtc;
pub mod state;
pub mod types;

pub use connection::{PeerConnection, PeerConnector};
pub use rtc::RtcConnector;
pub use state::{NegotiationState, Role};
pub use types::{IceCandidate, MemberId, SdpType, ServerConfig, SessionDescription, TrackKind};
