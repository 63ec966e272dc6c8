/// Access-log parsing module
///
/// Converts raw log lines into structured, validated records, driven by a
/// declarative format template.
///
/// # Architecture
///
/// - `model.rs`: record model and parse error types
/// - `scan.rs`: delimiter-terminated token scanner
/// - `specifier.rs`: one decoder per format letter
/// - `xff.rs`: the `~h{...}` X-Forwarded-For specifier
/// - `driver.rs`: template walker and the per-line entry point
/// - `json.rs`: JSON log driver (key-indexed sub-formats)
/// - `filter.rs`: post-parse ignore chain
/// - `datetime.rs`, `url.rs`, `http.rs`, `mime.rs`, `tls.rs`: field decoding
pub mod datetime;
pub mod driver;
pub mod filter;
pub mod http;
pub mod json;
pub mod mime;
pub mod model;
pub mod scan;
pub mod specifier;
pub mod tls;
pub mod url;
pub mod xff;

// Re-export commonly used types
pub use driver::{parse_line, LineStatus};
pub use model::{IgnoreLevel, IpType, LogRecord, SpecError};

// Constants
pub const READ_BYTES: usize = 4096; // snippet fingerprint size
pub const MAX_LOG_ERRORS: usize = 20; // per-file error ring cap
pub const LINE_BUFFER: usize = 4096; // initial read buffer
pub const REF_SITE_LEN: usize = 511; // referrer host cap
pub const MIME_OUT_LEN: usize = 128; // normalized mime-type cap
pub const NUM_TESTS: u32 = 20; // default sniff and dry-run budget
pub const MILS: u64 = 1_000;
pub const SECS: u64 = 1_000_000;
