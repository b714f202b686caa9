//! Process-level configuration (§6.5): everything comes from the
//! environment, read once at startup. No other process-wide mutable state.

/// Default reconnection window for stale seats (§4.2).
pub const STALE_SEAT_RECLAMATION_SECS: u64 = 60;

/// Delay between a hand ending and the next one starting (§4.3.1).
pub const INTER_HAND_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// Connection string for the Store (unused by the in-memory stand-in,
    /// but read so a real deployment can swap it in without touching code).
    pub database_url: Option<String>,
    /// Signing secret for the Auth service's bearer tokens.
    pub token_signing_secret: Option<String>,
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            token_signing_secret: std::env::var("TOKEN_SIGNING_SECRET").ok(),
            http_port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}
