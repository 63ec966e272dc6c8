//! In-memory capability implementations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;

use super::{ParseStore, RecordSink, UaClassifier};
use crate::logs::LastParse;
use crate::parser::model::LogRecord;

/// DashMap-backed store. Each map is keyed independently so lookups stay
/// single-shard.
#[derive(Debug, Default)]
pub struct MemoryStore {
    last_parse: DashMap<u64, LastParse>,
    json_logfmt: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParseStore for MemoryStore {
    fn last_parse(&self, inode: u64) -> LastParse {
        self.last_parse
            .get(&inode)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    fn insert_last_parse(&self, inode: u64, lp: LastParse) {
        self.last_parse.insert(inode, lp);
    }

    fn json_logfmt(&self, key: &str) -> Option<String> {
        self.json_logfmt.get(key).map(|r| r.value().clone())
    }

    fn set_json_logfmt(&self, key: String, fmt: String) {
        self.json_logfmt.insert(key, fmt);
    }
}

/// Sink that only keeps running totals.
#[derive(Debug, Default)]
pub struct CountingSink {
    hits: AtomicU64,
    bytes: AtomicU64,
}

impl CountingSink {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

impl RecordSink for CountingSink {
    fn process(&self, rec: Box<LogRecord>) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(rec.resp_size, Ordering::SeqCst);
    }
}

/// Sink that keeps every record; used by tests and embedders that want the
/// raw stream.
#[derive(Debug, Default)]
pub struct CollectSink {
    records: Mutex<Vec<LogRecord>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut self.records.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for CollectSink {
    fn process(&self, rec: Box<LogRecord>) {
        self.records.lock().unwrap().push(*rec);
    }
}

#[derive(Debug, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn process(&self, _rec: Box<LogRecord>) {}
}

const CRAWLER_MARKERS: &[&str] = &[
    "bot",
    "crawl",
    "spider",
    "slurp",
    "archiver",
    "mediapartners",
    "facebookexternalhit",
    "feedfetcher",
    "python-requests",
    "headlesschrome",
];

// Ordered: more specific tokens first (Edge and Opera identify as Chrome,
// Chrome identifies as Safari).
const BROWSERS: &[(&str, &str, &str)] = &[
    ("Edg", "Edge", "Browser"),
    ("OPR", "Opera", "Browser"),
    ("Opera", "Opera", "Browser"),
    ("Firefox", "Firefox", "Browser"),
    ("Chrome", "Chrome", "Browser"),
    ("Safari", "Safari", "Browser"),
    ("MSIE", "MSIE", "Browser"),
    ("Trident", "MSIE", "Browser"),
    ("curl", "curl", "Tool"),
    ("Wget", "Wget", "Tool"),
];

const OSES: &[(&str, &str, &str)] = &[
    ("Windows", "Windows", "Windows"),
    ("Android", "Android", "Android"),
    ("iPhone", "iOS", "iOS"),
    ("iPad", "iOS", "iOS"),
    ("Mac OS X", "macOS", "macOS"),
    ("Macintosh", "macOS", "macOS"),
    ("Linux", "Linux", "Linux"),
    ("FreeBSD", "FreeBSD", "BSD"),
];

/// Token-table classifier. Deliberately small; a real browser database can
/// be plugged in through the same trait.
#[derive(Debug, Default)]
pub struct HeuristicClassifier;

impl UaClassifier for HeuristicClassifier {
    fn classify(&self, rec: &mut LogRecord) {
        let Some(agent) = rec.agent.clone() else {
            return;
        };
        if self.is_crawler(&agent) {
            rec.browser = Some("Crawler".to_string());
            rec.browser_type = Some("Crawler".to_string());
        } else if let Some((_, name, kind)) =
            BROWSERS.iter().find(|(tok, _, _)| agent.contains(tok))
        {
            rec.browser = Some(name.to_string());
            rec.browser_type = Some(kind.to_string());
        }
        if let Some((_, name, kind)) = OSES.iter().find(|(tok, _, _)| agent.contains(tok)) {
            rec.os = Some(name.to_string());
            rec.os_type = Some(kind.to_string());
        }
    }

    fn is_crawler(&self, agent: &str) -> bool {
        let agent = agent.to_ascii_lowercase();
        CRAWLER_MARKERS.iter().any(|m| agent.contains(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_last_parse() {
        let store = MemoryStore::new();
        assert_eq!(store.last_parse(42).ts, 0);

        store.insert_last_parse(
            42,
            LastParse {
                ts: 100,
                line: 7,
                size: 1024,
                snippet: b"head".to_vec(),
            },
        );
        let lp = store.last_parse(42);
        assert_eq!(lp.ts, 100);
        assert_eq!(lp.line, 7);
        assert_eq!(lp.snippet, b"head");
    }

    #[test]
    fn test_memory_store_json_logfmt() {
        let store = MemoryStore::new();
        assert!(store.json_logfmt("host").is_none());
        store.set_json_logfmt("host".to_string(), "%h".to_string());
        assert_eq!(store.json_logfmt("host").as_deref(), Some("%h"));
    }

    #[test]
    fn test_classifier_crawler() {
        let c = HeuristicClassifier;
        assert!(c.is_crawler("Mozilla/5.0 (compatible; Googlebot/2.1)"));
        assert!(!c.is_crawler("Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0"));
    }

    #[test]
    fn test_classifier_browser_os() {
        let c = HeuristicClassifier;
        let mut rec = LogRecord::new(chrono::NaiveDateTime::default());
        rec.agent = Some("Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Firefox/120.0".to_string());
        c.classify(&mut rec);
        assert_eq!(rec.browser.as_deref(), Some("Firefox"));
        assert_eq!(rec.os.as_deref(), Some("Linux"));
    }

    #[test]
    fn test_counting_sink() {
        let sink = CountingSink::default();
        let mut rec = LogRecord::new(chrono::NaiveDateTime::default());
        rec.resp_size = 2326;
        sink.process(Box::new(rec));
        assert_eq!(sink.hits(), 1);
        assert_eq!(sink.bytes(), 2326);
    }
}
