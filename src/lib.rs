pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod logger;
pub mod media;
pub mod negotiation;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use controller::SessionController;
pub use error::{Error, MediaError, Result};
pub use negotiation::NegotiationStateMachine;
pub use session::{Session, SessionEvent};
pub use signaling::{ChannelEvent, NegotiationMessage, SignalingChannel};
