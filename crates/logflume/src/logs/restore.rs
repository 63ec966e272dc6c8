//! Resume detector: decide whether a record is a duplicate of previously
//! persisted data or fresh input.

use std::sync::atomic::Ordering;

use chrono::NaiveDateTime;

use crate::parser::model::LogRecord;
use crate::store::ParseCtx;

use super::{LastParse, LogFile};

/// Compare the leading snippet bytes to decide whether the handle still
/// points at the content that was checkpointed.
pub fn is_likely_same_log(glog: &LogFile, lp: &LastParse) -> bool {
    if lp.size == 0 {
        return true;
    }
    let size = glog.snippet.len().min(lp.snippet.len());
    size > 0 && glog.snippet[..size] == lp.snippet[..size]
}

/// True means the current record replays persisted data and must be
/// skipped. The decision is deliberately conservative: when in doubt,
/// under-count rather than double-count.
pub fn should_restore_from_disk(glog: &LogFile, ctx: &ParseCtx<'_>) -> bool {
    if !ctx.conf.restore {
        return false;
    }

    let lp = ctx.store.last_parse(glog.inode);
    // nothing to compare against
    if lp.ts == 0 {
        return false;
    }

    // Same log by inode and snippet: replay up to the checkpointed line,
    // and only when the file has actually grown.
    if glog.inode != 0 && is_likely_same_log(glog, &lp) {
        if glog.size > lp.size && glog.read.load(Ordering::SeqCst) >= lp.line {
            return false;
        }
        return true;
    }

    let cur_ts = glog.lp_ts.load(Ordering::SeqCst);

    // A pipe has no inode; prior or equal timestamps replay persisted data.
    if glog.inode == 0 && lp.ts >= cur_ts {
        return true;
    }

    // Different content: fall back to timestamps alone.
    if cur_ts > lp.ts {
        return false;
    }
    // A shrunken file was likely truncated or rotated; equal timestamps are
    // then still fresh input.
    if glog.size < lp.size && cur_ts == lp.ts {
        return false;
    }

    true
}

/// CAS-max update of the live handle timestamp. Returns the record's own
/// timestamp.
pub fn atomic_lpts_update(glog: &LogFile, dt: NaiveDateTime) -> i64 {
    let newts = dt.and_utc().timestamp();
    let mut oldts = glog.lp_ts.load(Ordering::SeqCst);
    while oldts < newts {
        match glog
            .lp_ts
            .compare_exchange(oldts, newts, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => break,
            Err(current) => oldts = current,
        }
    }
    newts
}

/// Count an invalid line, gated by the same resume predicate that gates
/// record processing.
pub fn process_invalid(glog: &LogFile, rec: &LogRecord, line: &str, ctx: &ParseCtx<'_>) {
    if !ctx.conf.restore {
        glog.count_process_and_invalid(rec.errstr.as_deref(), line);
        return;
    }

    let lp = ctx.store.last_parse(glog.inode);

    if glog.inode != 0 && is_likely_same_log(glog, &lp) {
        // only count invalids past the checkpointed line
        if glog.size > lp.size && glog.read.load(Ordering::SeqCst) >= lp.line {
            glog.count_process_and_invalid(rec.errstr.as_deref(), line);
        }
        return;
    }

    // no timestamp to compare against, count it
    if rec.numdate == 0 {
        glog.count_process_and_invalid(rec.errstr.as_deref(), line);
        return;
    }

    atomic_lpts_update(glog, rec.dt);
    if !should_restore_from_disk(glog, ctx) {
        glog.count_process_and_invalid(rec.errstr.as_deref(), line);
    }
}
