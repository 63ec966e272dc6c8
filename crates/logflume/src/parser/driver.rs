//! Template walker and the per-line parse entry point.

use crate::logs::restore::{atomic_lpts_update, process_invalid, should_restore_from_disk};
use crate::logs::LogFile;
use crate::store::ParseCtx;

use super::filter::{self, verify_static_content};
use super::json::parse_json_format;
use super::model::{
    IgnoreLevel, LogRecord, SpecError, ERR_MISSING_DATE, ERR_MISSING_HOST, ERR_MISSING_REQ,
};
use super::scan::Cursor;
use super::specifier::{parse_specifier, spec_err};
use super::xff::special_specifier;

/// Walk the format template over one line. `%X` dispatches a specifier
/// decoder with the following template literal as its delimiter, `~X`
/// dispatches a special specifier, and any other template character
/// consumes one input character.
pub fn parse_format(
    rec: &mut LogRecord,
    line: &str,
    lfmt: &str,
    ctx: &ParseCtx<'_>,
) -> Result<(), SpecError> {
    if line.is_empty() {
        return Err(SpecError::EarlyLineEnd);
    }

    let tpl = lfmt.as_bytes();
    let mut cur = Cursor::new(line);
    let mut perc = false;
    let mut tilde = false;
    let mut tp = 0usize;

    while tp < tpl.len() {
        let p = tpl[tp];
        if p == b'%' {
            perc = true;
            tp += 1;
            continue;
        }
        if p == b'~' && !perc {
            tilde = true;
            tp += 1;
            continue;
        }
        if cur.is_empty() {
            return Err(spec_err(rec, SpecError::EarlyLineEnd));
        }
        // a newline terminates the line successfully
        if cur.peek() == Some(b'\n') {
            return Ok(());
        }

        if tilde {
            special_specifier(rec, &mut cur, tpl, &mut tp)?;
            tilde = false;
        } else if perc {
            // the template literal right after the specifier delimits the field
            let delim: &[u8] = match tpl.get(tp + 1) {
                Some(d) => std::slice::from_ref(d),
                None => &[],
            };
            parse_specifier(rec, &mut cur, p, delim, ctx)?;
            perc = false;
        } else {
            cur.bump();
        }
        tp += 1;
    }

    Ok(())
}

/// Comments and blank lines are soft ignored.
fn valid_line(line: &str) -> bool {
    !(line.is_empty() || line.starts_with('#') || line.starts_with('\n'))
}

fn verify_missing_fields(rec: &mut LogRecord) -> Result<(), SpecError> {
    let missing = if rec.host.is_none() {
        Some(ERR_MISSING_HOST)
    } else if rec.date.is_none() {
        Some(ERR_MISSING_DATE)
    } else if rec.request.is_none() {
        Some(ERR_MISSING_REQ)
    } else {
        None
    };
    match missing {
        Some(msg) => {
            rec.errstr = Some(msg.to_string());
            Err(SpecError::MissingField(msg))
        }
        None => Ok(()),
    }
}

/// Outcome of parsing one line.
#[derive(Debug)]
pub enum LineStatus {
    /// Comment or blank line; neither counted nor an error.
    Ignored,
    /// Valid format. Carries the record unless it was suppressed by the
    /// resume gate, the ignore filter, or a dry run.
    Valid(Option<Box<LogRecord>>),
    /// Format or validation failure; counted subject to the resume gate.
    Invalid,
}

/// Parse one line against the configured format, validate it, apply the
/// resume gate and the ignore filter, and enrich the surviving record.
pub fn parse_line(glog: &LogFile, line: &str, dry_run: bool, ctx: &ParseCtx<'_>) -> LineStatus {
    if !valid_line(line) {
        return LineStatus::Ignored;
    }

    let mut rec = Box::new(LogRecord::new(glog.start_time));

    let parsed = if ctx.conf.is_json_log_format {
        parse_json_format(&mut rec, line, ctx)
    } else {
        parse_format(&mut rec, line, &ctx.conf.log_format, ctx)
    };
    if parsed.is_err() {
        process_invalid(glog, &rec, line, ctx);
        return LineStatus::Invalid;
    }

    if !glog.piping {
        if let Some(vhost) = &glog.fname_as_vhost {
            rec.vhost = Some(vhost.clone());
        }
    }

    if verify_missing_fields(&mut rec).is_err() {
        process_invalid(glog, &rec, line, ctx);
        return LineStatus::Invalid;
    }

    // from here on the format is valid; lines may still be suppressed
    atomic_lpts_update(glog, rec.dt);

    if should_restore_from_disk(glog, ctx) {
        return LineStatus::Valid(None);
    }

    glog.count_process();

    if dry_run {
        return LineStatus::Valid(None);
    }

    // agent is absent when %u is not part of the format
    if rec.agent.is_none() {
        rec.agent = Some("-".to_string());
        rec.set_agent_hash();
    }

    rec.ignore_level = filter::ignore_line(&mut rec, ctx);
    if rec.ignore_level == IgnoreLevel::Panel {
        return LineStatus::Valid(None);
    }

    if filter::is_404(&rec, ctx.conf) {
        rec.is_404 = true;
    } else if verify_static_content(ctx.conf, rec.request.as_deref().unwrap_or("")) {
        rec.is_static = true;
    }

    if let (Some(version), Some(cipher)) = (&rec.tls_version, &rec.tls_cipher) {
        rec.tls_version_cipher = Some(format!("{}/{}", version, cipher));
    }

    rec.set_uniq_key();
    LineStatus::Valid(Some(rec))
}
