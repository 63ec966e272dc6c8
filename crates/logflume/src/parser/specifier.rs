//! One decoder per format letter.
//!
//! Every decoder pulls its token from the cursor using the template
//! delimiter, validates it, and stores it on the record. A decoder whose
//! target field is already set skips the field instead of erroring.

use chrono::NaiveDateTime;

use crate::store::ParseCtx;
use crate::util::valid_ipaddr;

use super::datetime::{format_datetime, str_to_time};
use super::filter::hide_referer;
use super::http::{extract_method, extract_protocol, is_cache_hit, is_valid_http_status, parse_req};
use super::mime::normalize_mime_type;
use super::model::{IpType, LogRecord, SpecError};
use super::scan::Cursor;
use super::tls::extract_tls_version_cipher;
use super::url::{decode_url, extract_keyphrase, extract_referer_site};
use super::{MILS, SECS};

/// Store the error message on the record and hand the error back.
pub(crate) fn spec_err(rec: &mut LogRecord, err: SpecError) -> SpecError {
    rec.errstr = Some(err.to_string());
    err
}

fn skip_field(cur: &mut Cursor<'_>, delim: &[u8]) {
    cur.advance_to(delim.first().copied());
}

/// Decode one `%X` specifier at the cursor.
pub(crate) fn parse_specifier(
    rec: &mut LogRecord,
    cur: &mut Cursor<'_>,
    spec: u8,
    delim: &[u8],
    ctx: &ParseCtx<'_>,
) -> Result<(), SpecError> {
    match spec {
        // date
        b'd' => {
            if rec.date.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let dfmt = &ctx.conf.date_format;
            // A date format with spaces (syslog style) may be padded in the
            // input, e.g. "Dec  2" vs "Nov 22"; look ahead and absorb the
            // widest run.
            let fmtspcs = dfmt.matches(' ').count();
            let dspc = if fmtspcs > 0 { cur.space_padding() } else { 0 };
            let Some(tkn) = cur.token(delim, dspc.max(fmtspcs) + 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'd' }));
            };
            let parsed = str_to_time(&tkn, dfmt, rec.dt)
                .and_then(|tm| {
                    format_datetime(tm, &ctx.conf.date_num_format).map(|date| (tm, date))
                })
                .and_then(|(tm, date)| date.parse::<u32>().ok().map(|num| (tm, date, num)));
            let Some((tm, date, numdate)) = parsed else {
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'd', token: tkn }));
            };
            rec.date = Some(date);
            rec.numdate = numdate;
            rec.dt = NaiveDateTime::new(tm.date(), rec.dt.time());
        }
        // time
        b't' => {
            if rec.time.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 't' }));
            };
            let Some(tm) = str_to_time(&tkn, &ctx.conf.time_format, rec.dt) else {
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 't', token: tkn }));
            };
            rec.time = format_datetime(tm, "%H:%M:%S");
            rec.dt = NaiveDateTime::new(rec.dt.date(), tm.time());
        }
        // date and time in a single token, e.g. timestamps
        b'x' => {
            if rec.time.is_some() && rec.date.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'x' }));
            };
            let parsed = str_to_time(&tkn, &ctx.conf.time_format, rec.dt)
                .and_then(|tm| {
                    format_datetime(tm, &ctx.conf.date_num_format).map(|date| (tm, date))
                })
                .and_then(|(tm, date)| date.parse::<u32>().ok().map(|num| (tm, date, num)));
            let Some((tm, date, numdate)) = parsed else {
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'x', token: tkn }));
            };
            rec.date = Some(date);
            rec.numdate = numdate;
            rec.time = format_datetime(tm, "%H:%M:%S");
            rec.dt = tm;
        }
        // virtual host
        b'v' => {
            if rec.vhost.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'v' }));
            };
            rec.vhost = Some(tkn);
        }
        // remote user
        b'e' => {
            if rec.userid.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'e' }));
            };
            rec.userid = Some(tkn);
        }
        // cache status; unknown tokens are dropped, not errors
        b'C' => {
            if rec.cache_status.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'C' }));
            };
            if is_cache_hit(&tkn) {
                rec.cache_status = Some(tkn);
            }
        }
        // remote hostname (IP only)
        b'h' => {
            if rec.host.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            // RFC 3986 allows a bracketed IPv6 host
            let mut end = delim;
            if cur.peek() == Some(b'[') {
                cur.bump();
                if !cur.is_empty() {
                    end = b"]";
                }
            }
            let Some(tkn) = cur.token(end, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'h' }));
            };
            if !ctx.conf.no_ip_validation {
                let ip = valid_ipaddr(&tkn);
                if ip == IpType::Invalid {
                    return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'h', token: tkn }));
                }
                rec.type_ip = ip;
            } else if tkn.is_empty() {
                // still require a host token when not validating the IP
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'h', token: tkn }));
            }
            rec.host = Some(tkn);
        }
        // request method
        b'm' => {
            if rec.method.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'm' }));
            };
            let Some(meth) = extract_method(&tkn) else {
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'm', token: tkn }));
            };
            rec.method = Some(meth.to_string());
        }
        // request path, no method or protocol
        b'U' => {
            if rec.request.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let tkn = match cur.token(delim, 1) {
                Some(t) if !t.is_empty() => t,
                _ => return Err(spec_err(rec, SpecError::TokenNull { spec: 'U' })),
            };
            let Some(req) = decode_url(&tkn, ctx.conf.double_decode) else {
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'U', token: tkn }));
            };
            rec.request = Some(req);
        }
        // query string alone; absent is not an error
        b'q' => {
            if rec.qstr.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let tkn = match cur.token(delim, 1) {
                Some(t) if !t.is_empty() => t,
                _ => return Ok(()),
            };
            let Some(q) = decode_url(&tkn, ctx.conf.double_decode) else {
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'q', token: tkn }));
            };
            rec.qstr = Some(q);
        }
        // request protocol
        b'H' => {
            if rec.protocol.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'H' }));
            };
            let Some(proto) = extract_protocol(&tkn) else {
                return Err(spec_err(rec, SpecError::TokenInvalid { spec: 'H', token: tkn }));
            };
            rec.protocol = Some(proto.to_string());
        }
        // full request line, method and protocol included
        b'r' => {
            if rec.request.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'r' }));
            };
            let (req, method, protocol) = parse_req(&tkn, ctx.conf);
            rec.request = Some(req);
            if method.is_some() {
                rec.method = method;
            }
            if protocol.is_some() {
                rec.protocol = protocol;
            }
        }
        // status code
        b's' => {
            if rec.status >= 0 {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 's' }));
            };
            match tkn.parse::<i32>() {
                Ok(status) if ctx.conf.no_strict_status || is_valid_http_status(status) => {
                    rec.status = status;
                }
                _ => {
                    return Err(spec_err(rec, SpecError::TokenInvalid { spec: 's', token: tkn }));
                }
            }
        }
        // response size in bytes; invalid numbers count as zero
        b'b' => {
            if rec.resp_size != 0 {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'b' }));
            };
            rec.resp_size = tkn.parse::<u64>().unwrap_or(0);
            ctx.flags.mark_bandwidth();
        }
        // referrer
        b'R' => {
            if rec.referrer.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let tkn = match cur.token(delim, 1) {
                Some(t) if !t.is_empty() => t,
                _ => "-".to_string(),
            };
            if tkn != "-" {
                if let Some(keyphrase) = extract_keyphrase(&tkn, ctx.conf.double_decode) {
                    rec.keyphrase = Some(keyphrase);
                }
                if let Some(site) = extract_referer_site(&tkn) {
                    rec.site = site;
                }
                if hide_referer(ctx.conf, &rec.site) {
                    rec.site.clear();
                } else {
                    rec.referrer = Some(tkn);
                }
            } else {
                rec.referrer = Some(tkn);
            }
        }
        // user agent
        b'u' => {
            if rec.agent.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            match cur.token(delim, 1) {
                Some(tkn) if !tkn.is_empty() => {
                    // CloudFront logs URL-encode the agent
                    rec.agent = decode_url(&tkn, ctx.conf.double_decode);
                    ctx.classifier.classify(rec);
                    rec.set_agent_hash();
                }
                _ => {
                    rec.agent = Some("-".to_string());
                    rec.set_agent_hash();
                }
            }
        }
        // serve time in milliseconds
        b'L' => {
            if rec.serve_time != 0 {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'L' }));
            };
            let millis = tkn.parse::<u64>().unwrap_or(0);
            rec.serve_time = millis.saturating_mul(MILS);
            ctx.flags.mark_serve_usecs();
        }
        // serve time in seconds with optional decimals
        b'T' => {
            if rec.serve_time != 0 {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'T' }));
            };
            let secs: f64 = if tkn.contains('.') {
                tkn.parse().unwrap_or(0.0)
            } else {
                tkn.parse::<u64>().map(|v| v as f64).unwrap_or(0.0)
            };
            rec.serve_time = if secs > 0.0 { (secs * SECS as f64) as u64 } else { 0 };
            ctx.flags.mark_serve_usecs();
        }
        // serve time in microseconds
        b'D' => {
            if rec.serve_time != 0 {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'D' }));
            };
            rec.serve_time = tkn.parse::<u64>().unwrap_or(0);
            ctx.flags.mark_serve_usecs();
        }
        // serve time in nanoseconds
        b'n' => {
            if rec.serve_time != 0 {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'n' }));
            };
            rec.serve_time = tkn.parse::<u64>().unwrap_or(0) / MILS;
            ctx.flags.mark_serve_usecs();
        }
        // TLS cipher, either a name or a decimal IANA code
        b'k' => {
            if rec.tls_cipher.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'k' }));
            };
            if tkn.bytes().all(|b| b.is_ascii_digit()) {
                if let Some((cipher, version)) = extract_tls_version_cipher(&tkn) {
                    rec.tls_cipher = Some(cipher.to_string());
                    rec.tls_version = Some(version.to_string());
                }
            } else {
                rec.tls_cipher = Some(tkn);
            }
        }
        // TLS version, e.g. "TLSv1.2"
        b'K' => {
            if rec.tls_version.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'K' }));
            };
            rec.tls_version = Some(tkn);
        }
        // mime type, e.g. "text/html"
        b'M' => {
            if rec.mime_type.is_some() {
                skip_field(cur, delim);
                return Ok(());
            }
            let Some(tkn) = cur.token(delim, 1) else {
                return Err(spec_err(rec, SpecError::TokenNull { spec: 'M' }));
            };
            rec.mime_type = normalize_mime_type(&tkn);
        }
        // move forward until not a space
        b'~' => cur.skip_spaces(),
        // everything else is skipped up to the next literal
        _ => skip_field(cur, delim),
    }

    Ok(())
}
