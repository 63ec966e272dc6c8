//! Per-file parse state and the file-set registry.

pub mod restore;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::Config;
use crate::parser::{MAX_LOG_ERRORS, READ_BYTES};
use crate::store::ParseStore;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unable to open the specified log file '{path}': {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("No valid records found in '{file}' within {tested} lines. Verify your log/date/time format.")]
    FormatMismatch { file: String, tested: u32 },

    #[error("'{pattern}' did not match the filename '{fname}'")]
    VhostRegex { pattern: String, fname: String },

    #[error("Invalid fname_as_vhost regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("{0}")]
    Config(String),
}

/// Persisted checkpoint for one log: enough to tell "same file, newer
/// lines" apart from "rotated, truncated, or different file".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastParse {
    pub ts: i64,
    pub line: u64,
    pub size: u64,
    /// Leading bytes of the file at open time, capped at `READ_BYTES`.
    pub snippet: Vec<u8>,
}

/// Per-input parse state. Counters are atomics because parsing workers
/// update them concurrently; everything else is fixed once the file has
/// been opened.
#[derive(Debug)]
pub struct LogFile {
    pub path: String,
    pub fname: String,
    pub fname_as_vhost: Option<String>,

    pub inode: u64,
    pub size: u64,
    pub snippet: Vec<u8>,
    pub piping: bool,
    pub start_time: NaiveDateTime,

    /// Bytes handed to the pipeline in the current run.
    pub bytes: AtomicU64,
    /// Lines consumed so far (the resume line counter).
    pub read: AtomicU64,
    pub processed: AtomicU64,
    pub invalid: AtomicU64,

    /// Live maximum record timestamp; monotonically non-decreasing.
    pub lp_ts: AtomicI64,
    /// File size snapshot taken at open, persisted with the checkpoint.
    pub lp_size: u64,

    errors: Mutex<Vec<String>>,
}

impl LogFile {
    pub fn new(path: &str) -> Self {
        let fname = Path::new(path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        Self {
            path: path.to_string(),
            fname,
            fname_as_vhost: None,
            inode: 0,
            size: 0,
            snippet: Vec::new(),
            piping: false,
            start_time: chrono::Local::now().naive_local(),
            bytes: AtomicU64::new(0),
            read: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            lp_ts: AtomicI64::new(0),
            lp_size: 0,
            errors: Mutex::new(Vec::new()),
        }
    }

    fn with_config(path: &str, conf: &Config) -> Result<Self, EngineError> {
        let mut glog = Self::new(path);
        if let Some(pattern) = &conf.fname_as_vhost {
            let re = regex::Regex::new(pattern)?;
            let caps = re.captures(&glog.fname).ok_or_else(|| EngineError::VhostRegex {
                pattern: pattern.clone(),
                fname: glog.fname.clone(),
            })?;
            let vhost = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string());
            glog.fname_as_vhost = vhost;
        }
        Ok(glog)
    }

    /// Record the inode, the size, and the leading `READ_BYTES` of the file
    /// as its fingerprint, then rewind.
    pub fn stat_and_snippet(&mut self, file: &mut File) -> Result<(), EngineError> {
        let meta = file.metadata()?;
        {
            use std::os::unix::fs::MetadataExt;
            self.inode = meta.ino();
        }
        self.size = meta.len();
        self.lp_size = meta.len();

        self.snippet.clear();
        if self.size > 0 {
            let len = (self.size as usize).min(READ_BYTES);
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf)?;
            self.snippet = buf;
            file.seek(SeekFrom::Start(0))?;
        }
        self.start_time = chrono::Local::now().naive_local();
        Ok(())
    }

    pub fn count_process(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count_process_and_invalid(&self, errstr: Option<&str>, line: &str) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.invalid.fetch_add(1, Ordering::SeqCst);
        if let Some(errstr) = errstr {
            let mut errors = self.errors.lock().unwrap();
            if errors.len() < MAX_LOG_ERRORS {
                errors.push(format!("{} [{}]", errstr, line.trim_end()));
            }
        }
    }

    pub fn uncount_processed(&self) {
        self.processed.store(0, Ordering::SeqCst);
    }

    pub fn uncount_invalid(&self) {
        self.invalid.store(0, Ordering::SeqCst);
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn invalid_count(&self) -> u64 {
        self.invalid.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    /// Persist the checkpoint for this run. Pipes checkpoint under inode 0
    /// with the timestamp alone.
    pub fn persist_last_parse(&self, store: &dyn ParseStore) {
        if self.inode != 0 && self.size != 0 {
            store.insert_last_parse(
                self.inode,
                LastParse {
                    ts: self.lp_ts.load(Ordering::SeqCst),
                    line: self.read.load(Ordering::SeqCst),
                    size: self.lp_size,
                    snippet: self.snippet.clone(),
                },
            );
        } else if self.inode == 0 {
            store.insert_last_parse(
                0,
                LastParse {
                    ts: self.lp_ts.load(Ordering::SeqCst),
                    ..LastParse::default()
                },
            );
        }
    }
}

/// The set of input files for one run.
#[derive(Debug, Default)]
pub struct LogSet {
    pub files: Vec<LogFile>,
    pub restored: bool,
    pub load_from_disk_only: bool,
    /// Index of the file currently being parsed, for progress reporting.
    pub current: Option<usize>,
}

impl LogSet {
    /// Build the set from the configured filenames.
    pub fn from_config(conf: &Config) -> Result<Self, EngineError> {
        let mut logs = Self::default();
        for filename in &conf.filenames {
            logs.add(filename, conf)?;
        }
        Ok(logs)
    }

    pub fn add(&mut self, filename: &str, conf: &Config) -> Result<(), EngineError> {
        let mut glog = LogFile::with_config(filename, conf)?;
        glog.piping = filename == "-";
        self.files.push(glog);
        Ok(())
    }

    pub fn total_processed(&self) -> u64 {
        self.files.iter().map(|g| g.processed_count()).sum()
    }

    pub fn total_invalid(&self) -> u64 {
        self.files.iter().map(|g| g.invalid_count()).sum()
    }

    /// Dump every file's error ring to stderr.
    pub fn output_logerrors(&self, conf: &Config) {
        if self.files.iter().all(|g| g.errors().is_empty()) {
            return;
        }
        let pid = std::process::id();
        for glog in &self.files {
            let errors = glog.errors();
            if errors.is_empty() {
                continue;
            }
            eprintln!("=={}== logflume - version {}", pid, env!("CARGO_PKG_VERSION"));
            eprintln!(
                "=={}== Config file: {}",
                pid,
                conf.config_file.as_deref().unwrap_or("none")
            );
            eprintln!("=={}==", pid);
            eprintln!("=={}== FILE: {}", pid, glog.path);
            eprintln!(
                "=={}== {} lines failed to parse with the following errors:",
                pid,
                errors.len()
            );
            eprintln!("=={}==", pid);
            for err in &errors {
                eprintln!("=={}== {}", pid, err);
            }
        }
        eprintln!("=={}==", pid);
        eprintln!(
            "=={}== Verify your log format against the format specifier documentation.",
            pid
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::io::Write;

    #[test]
    fn test_basename() {
        let glog = LogFile::new("/var/log/nginx/access.log");
        assert_eq!(glog.fname, "access.log");
        assert_eq!(glog.path, "/var/log/nginx/access.log");
    }

    #[test]
    fn test_fname_as_vhost() {
        let conf = Config {
            fname_as_vhost: Some(r"(\w+)\.access\.log".to_string()),
            ..Config::default()
        };
        let glog = LogFile::with_config("/var/log/shop.access.log", &conf).unwrap();
        assert_eq!(glog.fname_as_vhost.as_deref(), Some("shop"));
    }

    #[test]
    fn test_fname_as_vhost_no_match_is_fatal() {
        let conf = Config {
            fname_as_vhost: Some(r"^(\d+)$".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            LogFile::with_config("access.log", &conf),
            Err(EngineError::VhostRegex { .. })
        ));
    }

    #[test]
    fn test_stat_and_snippet() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "first line\nsecond line\n").unwrap();

        let mut glog = LogFile::new(tmp.path().to_str().unwrap());
        let mut f = File::open(tmp.path()).unwrap();
        glog.stat_and_snippet(&mut f).unwrap();

        assert!(glog.inode != 0);
        assert_eq!(glog.size, 23);
        assert_eq!(glog.snippet, b"first line\nsecond line\n");
        // file was rewound
        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        assert!(s.starts_with("first line"));
    }

    #[test]
    fn test_snippet_capped_at_read_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let big = "x".repeat(READ_BYTES * 2);
        write!(tmp, "{}", big).unwrap();

        let mut glog = LogFile::new(tmp.path().to_str().unwrap());
        let mut f = File::open(tmp.path()).unwrap();
        glog.stat_and_snippet(&mut f).unwrap();
        assert_eq!(glog.snippet.len(), READ_BYTES);
    }

    #[test]
    fn test_error_ring_is_capped() {
        let glog = LogFile::new("access.log");
        for i in 0..(MAX_LOG_ERRORS + 10) {
            glog.count_process_and_invalid(Some("bad token"), &format!("line {}", i));
        }
        assert_eq!(glog.errors().len(), MAX_LOG_ERRORS);
        assert_eq!(glog.invalid_count(), (MAX_LOG_ERRORS + 10) as u64);
    }

    #[test]
    fn test_persist_skips_empty_file() {
        let store = MemoryStore::new();
        let mut glog = LogFile::new("access.log");
        glog.inode = 99;
        glog.size = 0;
        glog.persist_last_parse(&store);
        assert_eq!(store.last_parse(99).ts, 0);
    }

    #[test]
    fn test_persist_pipe_under_inode_zero() {
        let store = MemoryStore::new();
        let glog = LogFile::new("-");
        glog.lp_ts.store(12345, Ordering::SeqCst);
        glog.persist_last_parse(&store);
        assert_eq!(store.last_parse(0).ts, 12345);
    }
}
