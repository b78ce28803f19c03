use std::time::Duration;

use crate::client::consts::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be a ws:// or wss:// URL, got {value:?}")]
    InvalidUrl { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Full socket base (`ws://host/ws`); wins over `origin` when set.
    ws_url: Option<String>,
    /// Origin of the page hosting the client, e.g. `https://coach.example`.
    origin: String,
    reconnect_delay: Duration,
    frame_interval: Duration,
    capacity: usize,
    welcome_message: String,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_ws_url(mut self, ws_url: &str) -> Self {
        self.config.ws_url = Some(ws_url.to_string());
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.config.origin = origin.to_string();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        // A zero period would make the tick spin.
        self.config.frame_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn with_welcome_message(mut self, message: &str) -> Self {
        self.config.welcome_message = message.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            ws_url: None,
            origin: DEFAULT_ORIGIN.to_string(),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            frame_interval: Duration::from_millis(FRAME_INTERVAL_MS),
            capacity: CHANNEL_CAPACITY,
            welcome_message: WELCOME_MESSAGE.to_string(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Reopens a loaded config for further overrides.
    pub fn into_builder(self) -> ConfigBuilder {
        ConfigBuilder { config: self }
    }

    /// Loads `.env` when present, then reads the `POLLY_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(ws_url) = lookup(WS_URL_VAR).filter(|v| !v.trim().is_empty()) {
            let ws_url = ws_url.trim();
            if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
                return Err(ConfigError::InvalidUrl {
                    var: WS_URL_VAR,
                    value: ws_url.to_string(),
                });
            }
            builder = builder.with_ws_url(ws_url);
        }
        if let Some(origin) = lookup(ORIGIN_VAR).filter(|v| !v.trim().is_empty()) {
            builder = builder.with_origin(origin.trim());
        }
        if let Some(ms) = parse_number(&lookup, RECONNECT_DELAY_VAR)? {
            builder = builder.with_reconnect_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_number(&lookup, FRAME_INTERVAL_VAR)? {
            builder = builder.with_frame_interval(Duration::from_millis(ms));
        }
        if let Some(capacity) = parse_number(&lookup, CHANNEL_CAPACITY_VAR)? {
            builder = builder.with_capacity(capacity as usize);
        }

        Ok(builder.build())
    }

    pub fn ws_url(&self) -> Option<&str> {
        self.ws_url.as_deref()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn welcome_message(&self) -> &str {
        &self.welcome_message
    }
}

fn parse_number<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
