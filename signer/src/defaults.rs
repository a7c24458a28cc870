//! Default values for [crate::Config] fields.

/// Timeout for the initial nonce fetch made when a session is created.
pub const DEFAULT_NONCE_FETCH_TIMEOUT_MS: u64 = 10_000;

/// The venue rejects auth tokens whose deadline is further out than this.
pub const DEFAULT_MAX_AUTH_TOKEN_LIFETIME_SECS: u64 = 7 * 60 * 60;

pub const DEFAULT_LOG_LEVEL: &str = "info";
