//! Dynamic line reading with pipe-aware backoff.

use std::io::{self, BufRead};
use std::time::Duration;

/// Reads one line at a time, keeping the trailing newline. On a drained
/// non-blocking pipe the reader either backs off and retries (process-and-
/// exit mode) or reports end-of-stream and remembers that it would have
/// blocked.
pub struct LineReader<R> {
    inner: R,
    pipe_retry: bool,
    would_block: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, pipe_retry: bool) -> Self {
        Self {
            inner,
            pipe_retry,
            would_block: false,
        }
    }

    /// Whether the last end-of-stream was really a drained pipe.
    pub fn would_block(&self) -> bool {
        self.would_block
    }

    /// Next line, or None at end of stream.
    pub fn next_line(&mut self) -> Option<String> {
        let mut line = String::new();
        loop {
            match self.inner.read_line(&mut line) {
                Ok(0) => {
                    return if line.is_empty() { None } else { Some(line) };
                }
                Ok(_) => return Some(line),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.pipe_retry {
                        std::thread::sleep(Duration::from_millis(100));
                        continue;
                    }
                    self.would_block = true;
                    return None;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return None,
            }
        }
    }
}
