//! Global constants for the upload pipeline.
//!
//! Compression brackets, session defaults and remote layout values live
//! here so the pipeline, the config loader and the tests agree on them.

// Image sniffing
/// Number of leading bytes inspected when classifying a stream
pub const SNIFF_LEN: usize = 8;

// Compression policy
/// Bytes per kilobyte used by the size brackets
pub const BYTES_PER_KB: u64 = 1024;

/// Upper bound (exclusive, KB) of the lightest compression bracket
pub const SMALL_IMAGE_KB: u64 = 900;

/// Upper bound (exclusive, KB) of the medium bracket
pub const MEDIUM_IMAGE_KB: u64 = 2047;

/// Upper bound (exclusive, KB) of the large bracket
pub const LARGE_IMAGE_KB: u64 = 3275;

pub const SMALL_IMAGE_QUALITY: f32 = 0.85;
pub const MEDIUM_IMAGE_QUALITY: f32 = 0.6;
pub const LARGE_IMAGE_QUALITY: f32 = 0.44;
pub const HUGE_IMAGE_QUALITY: f32 = 0.4;

// Remote session defaults
/// Default SFTP port
pub const SFTP_DEFAULT_PORT: u16 = 22;

/// The only sub-channel protocol the store knows how to open
pub const SFTP_PROTOCOL: &str = "sftp";

/// Default connect / blocking-operation timeout in milliseconds
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30_000;

/// Default base directory on the remote host
pub const DEFAULT_BASE_PATH: &str = "/data";

/// Session option toggling host key verification
pub const OPTION_STRICT_HOST_KEY_CHECKING: &str = "StrictHostKeyChecking";

/// Session option overriding the known_hosts location
pub const OPTION_KNOWN_HOSTS_FILE: &str = "KnownHostsFile";

/// Session option toggling SSH transport compression
pub const OPTION_COMPRESSION: &str = "Compression";

// Remote layout
/// Format of the dated directory inserted under every logical path
pub const DATE_DIR_FORMAT: &str = "%Y%m%d";

/// Permission bits for directories created on the remote host
pub const REMOTE_DIR_MODE: i32 = 0o755;

// Status codes shared with API response envelopes
pub const STATUS_SUCCESS: u16 = 200;
pub const STATUS_ERROR: u16 = 500;
pub const STATUS_VALIDATE_PARAM: u16 = 100;

/// Overall deadline applied by the async facade when none is given (60s)
pub const DEFAULT_ASYNC_DEADLINE_SECS: u64 = 60;
