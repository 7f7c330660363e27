use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::peer::types::IceCandidate;
use tracing::debug;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// Формат временных меток в логах
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Логирование с временными метками
pub fn init(config: &LoggingConfig) -> Result<()> {
    // Проверяем конфигурацию логирования
    if !config.enabled {
        return Ok(());
    }
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| Error::Config(format!("invalid log filter {:?}: {e}", config.filter)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Config(format!("logger already installed: {e}")))
}

/// Печать ICE-candidate при появлении (Trickle-ICE)
pub fn dump_candidate(label: &str, member: &str, cand: &IceCandidate) {
    debug!(
        member,
        candidate = %cand.candidate,
        sdp_mid = ?cand.sdp_mid,
        sdp_mline_index = ?cand.sdp_mline_index,
        "trickle {label}"
    );
}
