// Конфигурация приложения
// Логирование по умолчанию включено только в режиме разработки

use crate::error::{Error, Result};
use crate::media::MediaConstraints;
use crate::peer::types::ServerConfig;
use serde::{Deserialize, Serialize};

pub const ROOM_ENV: &str = "SSC_ROOM";
pub const ICE_SERVERS_ENV: &str = "SSC_ICE_SERVERS";
pub const LOG_FILTER_ENV: &str = "SSC_LOG";
pub const LOGGING_ENV: &str = "SSC_LOGGING";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Комната (канал), в которой встречаются два участника
    pub room: String,
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<ServerConfig>,
    #[serde(default)]
    pub media: MediaConstraints,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            // В режиме отладки логирование включено, в продакшене выключено
            enabled: cfg!(debug_assertions),
            filter: "info".into(),
        }
    }
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig::stun("default-stun-1", "stun:stun1.l.google.com:19302"),
        ServerConfig::stun("default-stun-2", "stun:stun2.l.google.com:19302"),
    ]
}

impl Config {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            ice_servers: default_ice_servers(),
            media: MediaConstraints::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Читает конфигурацию из переменных окружения
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let room = lookup(ROOM_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config(format!("{ROOM_ENV} is not set, no room to join")))?;

        let mut config = Self::new(room);

        if let Some(raw) = lookup(ICE_SERVERS_ENV).filter(|v| !v.trim().is_empty()) {
            config.ice_servers = serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid {ICE_SERVERS_ENV}: {e}")))?;
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|v| !v.trim().is_empty()) {
            config.logging.filter = filter;
        }
        if let Some(flag) = lookup(LOGGING_ENV) {
            config.logging.enabled = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.room.trim().is_empty() {
            return Err(Error::Config("room id cannot be empty".into()));
        }
        validate_ice_servers(&self.ice_servers)?;
        self.media.validate()?;
        Ok(())
    }
}

/// Валидация списка ICE серверов
pub fn validate_ice_servers(servers: &[ServerConfig]) -> Result<()> {
    for server in servers {
        if server.url.is_empty() {
            return Err(Error::Config(format!(
                "ice server {} has an empty url",
                server.id
            )));
        }
        if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none()) {
            return Err(Error::Config(format!(
                "turn server {} requires username and credential",
                server.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn room_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[(ROOM_ENV, "   ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[(ROOM_ENV, "lobby-42")])).unwrap();
        assert_eq!(cfg.room, "lobby-42");
        assert_eq!(cfg.ice_servers, default_ice_servers());
        assert_eq!(cfg.media, MediaConstraints::default());
        assert_eq!(cfg.logging.filter, "info");
    }

    #[test]
    fn env_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            (ROOM_ENV, "r"),
            (
                ICE_SERVERS_ENV,
                r#"[{"id":"t","type":"turn","url":"turn.example.org","username":"u","credential":"p"}]"#,
            ),
            (LOG_FILTER_ENV, "ssc_call=debug"),
            (LOGGING_ENV, "on"),
        ]))
        .unwrap();
        assert_eq!(cfg.ice_servers.len(), 1);
        assert_eq!(cfg.ice_servers[0].r#type, "turn");
        assert_eq!(cfg.logging.filter, "ssc_call=debug");
        assert!(cfg.logging.enabled);
    }

    #[test]
    fn turn_without_credentials_rejected() {
        let err = Config::from_lookup(lookup(&[
            (ROOM_ENV, "r"),
            (ICE_SERVERS_ENV, r#"[{"id":"t","type":"turn","url":"turn:x"}]"#),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_url_rejected() {
        let servers = vec![ServerConfig::stun("s", "")];
        assert!(validate_ice_servers(&servers).is_err());
    }
}
