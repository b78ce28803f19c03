pub const WS_URL_VAR: &str = "POLLY_WS_URL";
pub const ORIGIN_VAR: &str = "POLLY_ORIGIN";
pub const RECONNECT_DELAY_VAR: &str = "POLLY_RECONNECT_DELAY_MS";
pub const FRAME_INTERVAL_VAR: &str = "POLLY_FRAME_INTERVAL_MS";
pub const CHANNEL_CAPACITY_VAR: &str = "POLLY_CHANNEL_CAPACITY";

pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";
pub const WS_PATH: &str = "/ws";

pub const RECONNECT_DELAY_MS: u64 = 3000;
pub const FRAME_INTERVAL_MS: u64 = 1000;
pub const CHANNEL_CAPACITY: usize = 64;
/// Upper bound on flushing the close frame during teardown.
pub const CLOSE_TIMEOUT_MS: u64 = 1000;

pub const WELCOME_MESSAGE: &str = "Connected to Polly AI. Send a chat message to begin coaching.";
