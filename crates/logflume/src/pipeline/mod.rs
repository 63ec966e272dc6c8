//! Double-buffered parallel parsing pipeline.
//!
//! A `2 x jobs` matrix of job slots is filled by a single reader. While the
//! workers of the active row parse their chunks, the reader drains the
//! records the other row produced on the previous turn, then joins the
//! workers and flips rows. With one job everything runs inline.

pub mod reader;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::Ordering;
use std::thread;

use tracing::{debug, info, warn};

use crate::logs::{EngineError, LogFile, LogSet};
use crate::parser::driver::{parse_line, LineStatus};
use crate::parser::model::LogRecord;
use crate::parser::{LINE_BUFFER, NUM_TESTS};
use crate::store::ParseCtx;

use reader::LineReader;

/// One worker's slot: a chunk of lines in, a chunk of records out.
struct Job {
    lines: Vec<String>,
    records: Vec<Option<Box<LogRecord>>>,
    cnt: u32,
    test: bool,
    dry_run: bool,
}

impl Job {
    fn new(chunk_size: usize, test: bool, dry_run: bool) -> Self {
        Self {
            lines: Vec::with_capacity(chunk_size),
            records: Vec::with_capacity(chunk_size),
            cnt: 0,
            test,
            dry_run,
        }
    }
}

/// Parse one line, maintaining the format-test state and the per-file line
/// counter. Returns the record when one survives all the gates.
fn read_line(
    glog: &LogFile,
    line: &str,
    test: &mut bool,
    cnt: &mut u32,
    dry_run: bool,
    ctx: &ParseCtx<'_>,
) -> Option<Box<LogRecord>> {
    let status = parse_line(glog, line, dry_run, ctx);

    // the format test passes once a single valid record shows up
    if matches!(status, LineStatus::Valid(_)) {
        *test = false;
    }
    if matches!(status, LineStatus::Ignored) {
        return None;
    }

    // out of test lines without a single valid record: the format is
    // likely wrong, roll the counters back
    if ctx.conf.num_tests > 0 {
        *cnt += 1;
        if *cnt >= ctx.conf.num_tests && *test {
            glog.uncount_processed();
            glog.uncount_invalid();
            return None;
        }
    }
    glog.read.fetch_add(1, Ordering::SeqCst);

    match status {
        LineStatus::Valid(rec) => rec,
        _ => None,
    }
}

/// Worker body: parse the job's chunk in input order.
fn parse_chunk(job: &mut Job, glog: &LogFile, ctx: &ParseCtx<'_>) {
    let mut test = job.test;
    let mut cnt = job.cnt;
    for line in &job.lines {
        let rec = read_line(glog, line, &mut test, &mut cnt, job.dry_run, ctx);
        job.records.push(rec);
    }
    job.test = test;
    job.cnt = cnt;
}

/// Feed a row's parsed records to the sink and reset its slots.
fn process_jobs(row: &mut [Job], ctx: &ParseCtx<'_>, cnt: &mut u32, test: &mut bool) {
    for job in row {
        for rec in job.records.drain(..).flatten() {
            if !job.dry_run {
                ctx.sink.process(rec);
            }
        }
        job.lines.clear();
        *cnt += job.cnt;
        job.cnt = 0;
        *test &= job.test;
    }
}

/// Fill a row's chunks from the reader. Returns true when the stream ended
/// during the fill.
fn fill_jobs<R: BufRead>(
    reader: &mut LineReader<R>,
    glog: &LogFile,
    row: &mut [Job],
    chunk_size: usize,
) -> bool {
    for job in row.iter_mut() {
        while job.lines.len() < chunk_size {
            match reader.next_line() {
                Some(line) => {
                    glog.bytes
                        .fetch_add(line.len() as u64, Ordering::SeqCst);
                    job.lines.push(line);
                }
                None => return true,
            }
        }
    }
    false
}

enum Sniff {
    Verified,
    Mismatch,
    Insufficient,
}

/// Single-threaded format sniff over the first `num_tests` lines. Valid
/// records are fed straight to the sink; the file is not rewound.
fn initial_sniff<R: BufRead>(
    reader: &mut LineReader<R>,
    glog: &LogFile,
    dry_run: bool,
    ctx: &ParseCtx<'_>,
) -> Sniff {
    let mut test = true;
    let mut cnt = 0u32;

    while cnt < ctx.conf.num_tests {
        let Some(line) = reader.next_line() else {
            break;
        };
        if let Some(rec) = read_line(glog, &line, &mut test, &mut cnt, dry_run, ctx) {
            if !dry_run {
                ctx.sink.process(rec);
            }
        }
    }

    if test {
        glog.uncount_processed();
        glog.uncount_invalid();
        if reader.would_block() && cnt < ctx.conf.num_tests {
            return Sniff::Insufficient;
        }
        return Sniff::Mismatch;
    }
    debug!(file = %glog.path, tested = cnt, "log format verified");
    Sniff::Verified
}

/// Read the whole stream through the double-buffered worker matrix.
fn read_lines<R: BufRead>(
    reader: &mut LineReader<R>,
    glog: &LogFile,
    dry_run: bool,
    ctx: &ParseCtx<'_>,
) -> Result<(), EngineError> {
    let njobs = ctx.conf.jobs.max(1);
    let chunk_size = ctx.conf.chunk_size.max(1);
    let mut test = ctx.conf.num_tests > 0;
    let mut cnt = 0u32;

    glog.bytes.store(0, Ordering::SeqCst);

    if test {
        match initial_sniff(reader, glog, dry_run, ctx) {
            Sniff::Verified => {}
            Sniff::Mismatch => {
                return Err(EngineError::FormatMismatch {
                    file: glog.path.clone(),
                    tested: ctx.conf.num_tests,
                });
            }
            Sniff::Insufficient => {
                warn!(file = %glog.path, "insufficient data to verify the log format");
                return Ok(());
            }
        }
        test = false;
        cnt = 0;
    }

    let mut rows: [Vec<Job>; 2] = [
        (0..njobs).map(|_| Job::new(chunk_size, test, dry_run)).collect(),
        (0..njobs).map(|_| Job::new(chunk_size, test, dry_run)).collect(),
    ];

    let mut b = 0usize;
    loop {
        let eof = fill_jobs(reader, glog, &mut rows[b], chunk_size);

        // nothing ever read from this log, skip it for now
        if glog.bytes.load(Ordering::SeqCst) == 0 {
            break;
        }

        if njobs == 1 {
            parse_chunk(&mut rows[b][0], glog, ctx);
            process_jobs(&mut rows[b], ctx, &mut cnt, &mut test);
        } else {
            let [row0, row1] = &mut rows;
            let (active, idle) = if b == 0 { (row0, row1) } else { (row1, row0) };
            // workers parse the just-filled row while the previous row's
            // records are handed to the sink
            thread::scope(|s| {
                for job in active.iter_mut() {
                    s.spawn(move || parse_chunk(job, glog, ctx));
                }
                process_jobs(idle, ctx, &mut cnt, &mut test);
            });
        }

        if dry_run && cnt >= NUM_TESTS {
            break;
        }
        if ctx.flags.stopped() {
            debug!(file = %glog.path, "stop requested, draining");
            break;
        }
        if eof {
            break;
        }
        if njobs > 1 {
            b ^= 1;
        }
    }

    // drain whatever is still pending in both rows
    for row in rows.iter_mut() {
        process_jobs(row, ctx, &mut cnt, &mut test);
    }

    Ok(())
}

/// Open one log (or stdin), fingerprint it, run the pipeline over it, and
/// checkpoint the result.
pub fn read_log(glog: &mut LogFile, dry_run: bool, ctx: &ParseCtx<'_>) -> Result<(), EngineError> {
    let boxed: Box<dyn BufRead> = if glog.piping {
        Box::new(io::stdin().lock())
    } else {
        let mut file = File::open(&glog.path).map_err(|source| EngineError::Open {
            path: glog.path.clone(),
            source,
        })?;
        glog.stat_and_snippet(&mut file)?;
        Box::new(BufReader::with_capacity(LINE_BUFFER, file))
    };

    info!(file = %glog.path, inode = glog.inode, size = glog.size, "parsing log");
    let mut reader = LineReader::new(boxed, ctx.conf.process_and_exit);

    read_lines(&mut reader, glog, dry_run, ctx)?;

    glog.persist_last_parse(ctx.store);
    info!(
        file = %glog.path,
        processed = glog.processed_count(),
        invalid = glog.invalid_count(),
        "log complete"
    );
    Ok(())
}

/// Parse every configured log in order.
pub fn parse_log(logs: &mut LogSet, dry_run: bool, ctx: &ParseCtx<'_>) -> Result<(), EngineError> {
    ctx.conf.verify_formats().map_err(EngineError::Config)?;

    if ctx.conf.restore && !logs.restored {
        logs.restored = ctx.store.rebuild_rawdata_cache();
    }
    // nothing piped and no files: load persisted aggregates only
    if ctx.conf.restore && ctx.conf.filenames.is_empty() && !ctx.conf.read_stdin {
        logs.load_from_disk_only = true;
        return Ok(());
    }

    for idx in 0..logs.files.len() {
        logs.current = Some(idx);
        read_log(&mut logs.files[idx], dry_run, ctx)?;
    }
    logs.current = None;
    Ok(())
}

/// Dry-run all inputs, returning the accumulated error strings on failure.
pub fn test_format(logs: &mut LogSet, ctx: &ParseCtx<'_>) -> Result<(), Vec<String>> {
    match parse_log(logs, true, ctx) {
        Ok(()) => Ok(()),
        Err(err) => {
            let mut errors: Vec<String> = Vec::new();
            for glog in &logs.files {
                let errs = glog.errors();
                if !errs.is_empty() {
                    errors = errs;
                    break;
                }
            }
            if errors.is_empty() {
                errors.push(err.to_string());
            }
            Err(errors)
        }
    }
}
