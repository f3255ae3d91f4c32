//! System-wide default constants.
//!
//! Grouped by subsystem. Values match the stock `healer.toml`.

// ============================================================================
// Device link
// ============================================================================

/// Poll interval when `[device].poll_interval_ms` is omitted.
pub const POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound on a single `DeviceLink::read` (ms).
pub const READ_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// Remediation
// ============================================================================

pub const COOLDOWN_SECONDS: u64 = 30;

pub const MAX_RETRIES: u32 = 3;

// ============================================================================
// Automation platform
// ============================================================================

/// HTTP client timeout for automation platform requests (seconds).
pub const AUTOMATION_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Interval between job status polls (ms).
pub const STATUS_POLL_INTERVAL_MS: u64 = 2_000;

/// Give up waiting on a job after this long (seconds).
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// Delay before a simulated job reaches a terminal state (ms).
pub const SIMULATED_JOB_DURATION_MS: u64 = 3_000;

// ============================================================================
// Chaos
// ============================================================================

pub const INJECTION_RATE: f64 = 0.05;

pub const NETWORK_TIMEOUT_MS: u64 = 5_000;

pub const CONNECTION_LOSS_SECONDS: u64 = 10;

/// Random injections are suppressed this long after startup.
pub const CHAOS_STARTUP_GRACE_SECONDS: u64 = 10;

/// Minimum quiet period before the same type/target may be re-injected.
pub const CHAOS_REARM_SECONDS: u64 = 5;

/// Bounds (inclusive, seconds) for value-anomaly durations.
pub const VALUE_ANOMALY_MIN_SECS: u64 = 1;
pub const VALUE_ANOMALY_MAX_SECS: u64 = 180;

/// Injection records kept for the status report.
pub const CHAOS_HISTORY_SIZE: usize = 10;

// ============================================================================
// History
// ============================================================================

/// Readings kept per tag.
pub const TAG_HISTORY_SIZE: usize = 100;

/// Resolved violations kept for queries.
pub const VIOLATION_HISTORY_SIZE: usize = 500;

/// EventLog ring buffer capacity.
pub const EVENT_CAPACITY: usize = 1_000;

/// Per-subscriber broadcast buffer before a slow subscriber starts lagging.
pub const SUBSCRIBER_BUFFER: usize = 256;

// ============================================================================
// Server
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "healer.toml";

/// Environment variable naming an explicit config path.
pub const CONFIG_ENV_VAR: &str = "PLC_HEALER_CONFIG";

/// How long shutdown waits for tasks to finish after cancellation.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
