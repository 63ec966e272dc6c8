//! Shared test fixtures.

use crate::conf::Config;
use crate::logs::LogFile;
use crate::store::{CollectSink, HeuristicClassifier, MemoryStore, ParseCtx, RuntimeFlags};

pub(crate) struct TestEnv {
    pub conf: Config,
    pub store: MemoryStore,
    pub sink: CollectSink,
    pub classifier: HeuristicClassifier,
    pub flags: RuntimeFlags,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            conf: Config::default(),
            store: MemoryStore::new(),
            sink: CollectSink::new(),
            classifier: HeuristicClassifier,
            flags: RuntimeFlags::new(),
        }
    }

    /// Environment preconfigured with a text log format.
    pub fn with_format(fmt: &str) -> Self {
        let mut env = Self::new();
        env.conf.log_format = fmt.to_string();
        env
    }

    pub fn ctx(&self) -> ParseCtx<'_> {
        ParseCtx {
            conf: &self.conf,
            store: &self.store,
            sink: &self.sink,
            classifier: &self.classifier,
            flags: &self.flags,
        }
    }
}

pub(crate) fn glog() -> LogFile {
    LogFile::new("access.log")
}
