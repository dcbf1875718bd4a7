//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default length of generated strings (characters, or bytes with the `b` suffix)
pub const DEFAULT_SECRET_LENGTH: usize = 40;

/// Default encoding of generated strings
pub const DEFAULT_SECRET_ENCODING: &str = "base64";

/// Default RSA modulus size for generated SSH keypairs (bits)
pub const DEFAULT_SSH_KEY_LENGTH: usize = 4096;

/// Largest accepted length annotation for string and basic-auth values
/// (characters, or random bytes with the `b` suffix)
pub const MAX_SECRET_LENGTH: usize = 16_384;

/// Largest accepted RSA modulus size for ssh-keypair Secrets (bits)
pub const MAX_SSH_KEY_LENGTH: usize = 8_192;

/// Default bcrypt cost for basic-auth hashes
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Fixed requeue delay after a failed value generation (seconds)
pub const GENERATION_RETRY_SECS: u64 = 30;

/// Default requeue interval when the backoff state cannot be read (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Minimum error backoff (seconds), first two steps of the Fibonacci sequence
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;
