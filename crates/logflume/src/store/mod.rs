//! Capability seams consumed by the parser: the persisted-state store, the
//! aggregate sink, and the user-agent classifier.

pub mod memory;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::conf::Config;
use crate::logs::LastParse;
use crate::parser::model::LogRecord;

pub use memory::{CollectSink, CountingSink, HeuristicClassifier, MemoryStore, NullSink};

/// Keyed state that survives across runs: last-parse checkpoints by inode
/// and the JSON key to sub-template map.
pub trait ParseStore: Send + Sync {
    /// Checkpoint for an inode; a zeroed value when none was persisted.
    fn last_parse(&self, inode: u64) -> LastParse;
    fn insert_last_parse(&self, inode: u64, lp: LastParse);

    fn json_logfmt(&self, key: &str) -> Option<String>;
    fn set_json_logfmt(&self, key: String, fmt: String);

    /// Restore persisted aggregates; returns whether anything was restored.
    fn rebuild_rawdata_cache(&self) -> bool {
        false
    }
}

/// Consumes validated records. Runs on the reader thread between buffer
/// swaps, but implementations must still synchronize internally.
pub trait RecordSink: Send + Sync {
    fn process(&self, rec: Box<LogRecord>);
}

/// Browser/OS classification and crawler detection.
pub trait UaClassifier: Send + Sync {
    fn classify(&self, rec: &mut LogRecord);
    fn is_crawler(&self, agent: &str) -> bool;
}

/// Process-wide flags shared by all workers. `bandwidth` and `serve_usecs`
/// are set-once; `stop_processing` breaks the pipeline at the next swap
/// boundary.
#[derive(Debug)]
pub struct RuntimeFlags {
    bandwidth: AtomicBool,
    serve_usecs: AtomicBool,
    stop_processing: AtomicBool,
}

impl Default for RuntimeFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeFlags {
    pub const fn new() -> Self {
        Self {
            bandwidth: AtomicBool::new(false),
            serve_usecs: AtomicBool::new(false),
            stop_processing: AtomicBool::new(false),
        }
    }

    pub fn mark_bandwidth(&self) {
        let _ = self
            .bandwidth
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn has_bandwidth(&self) -> bool {
        self.bandwidth.load(Ordering::SeqCst)
    }

    pub fn mark_serve_usecs(&self) {
        let _ = self
            .serve_usecs
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn has_serve_usecs(&self) -> bool {
        self.serve_usecs.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stop_processing.store(true, Ordering::SeqCst);
    }

    pub fn stopped(&self) -> bool {
        self.stop_processing.load(Ordering::SeqCst)
    }
}

/// Read-only parse context handed to the driver and every decoder.
#[derive(Clone, Copy)]
pub struct ParseCtx<'a> {
    pub conf: &'a Config,
    pub store: &'a dyn ParseStore,
    pub sink: &'a dyn RecordSink,
    pub classifier: &'a dyn UaClassifier,
    pub flags: &'a RuntimeFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_set_once() {
        let flags = RuntimeFlags::new();
        assert!(!flags.has_bandwidth());
        flags.mark_bandwidth();
        flags.mark_bandwidth();
        assert!(flags.has_bandwidth());
        assert!(!flags.has_serve_usecs());
    }

    #[test]
    fn test_stop_flag() {
        let flags = RuntimeFlags::new();
        assert!(!flags.stopped());
        flags.request_stop();
        assert!(flags.stopped());
    }
}
