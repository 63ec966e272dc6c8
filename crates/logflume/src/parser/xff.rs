//! The `~h{...}` special specifier: pull the client IP out of an
//! X-Forwarded-For style field.
//!
//! The braces on the template side carry the set of separator bytes found
//! inside the field. When the template character right after `}` occurs in
//! the input but not in that set, the field is isolated by that hard
//! delimiter first; otherwise the walk runs over the open input and stops
//! once it leaves the XFF region.

use crate::util::{trim_bytes, valid_ipaddr};

use super::model::{IpType, LogRecord, SpecError};
use super::scan::Cursor;
use super::specifier::spec_err;

/// Extract the `{...}` reject set from the template, advancing the template
/// index past the closing brace. Escaped braces do not count.
pub(crate) fn extract_braces(tpl: &[u8], tp: &mut usize) -> Option<String> {
    let mut b1 = None;
    let mut b2 = None;
    let mut esc = false;
    let mut i = *tp;
    while i < tpl.len() {
        match tpl[i] {
            b'\\' => esc = true,
            b'{' if !esc => b1 = Some(i),
            b'}' if !esc => {
                b2 = Some(i);
                break;
            }
            _ => esc = false,
        }
        i += 1;
    }
    let (b1, b2) = (b1?, b2?);
    if b2 <= b1 + 1 {
        return None;
    }
    let set = String::from_utf8_lossy(&tpl[b1 + 1..b2]).into_owned();
    *tp = b2 + 1;
    Some(set)
}

/// Walk separator-delimited runs, keeping the first valid IP as the client
/// host. Returns how many input bytes the walk consumed.
///
/// Once a host is set, the walk ends at the first non-IP run, and also when
/// a run is preceded by fewer consecutive separators than the separator-set
/// length (the field has been left behind).
fn set_xff_host(rec: &mut LogRecord, region: &[u8], skips: &[u8], stop_at_first: bool) -> usize {
    let skips_len = skips.len();
    let mut ptr = 0usize; // scan position
    let mut base = 0usize; // consumed position
    let mut idx = 0usize; // separators seen since the last run

    while ptr < region.len() {
        let len = region[ptr..]
            .iter()
            .position(|b| skips.contains(b))
            .unwrap_or(region.len() - ptr);
        if len == 0 {
            ptr += 1;
            idx += 1;
            base += 1;
            continue;
        }
        if idx < skips_len && rec.host.is_some() {
            break;
        }
        ptr += len;

        let tkn = String::from_utf8_lossy(trim_bytes(&region[base..ptr])).into_owned();
        let ip = valid_ipaddr(&tkn);
        if rec.host.is_some() && ip == IpType::Invalid {
            break;
        }
        if rec.host.is_none() && ip != IpType::Invalid {
            rec.host = Some(tkn);
            rec.type_ip = ip;
        }
        idx = 0;

        if rec.host.is_some() && stop_at_first {
            base += len;
            break;
        }
        base += len;
    }

    base
}

/// Handle `~h{...}` at the current template position (pointing at the `h`).
pub(crate) fn find_xff_host(
    rec: &mut LogRecord,
    cur: &mut Cursor<'_>,
    tpl: &[u8],
    tp: &mut usize,
) -> Result<(), SpecError> {
    let Some(skips) = extract_braces(tpl, tp) else {
        return Err(spec_err(rec, SpecError::MissingBraces { spec: 'h' }));
    };

    let bound = tpl.get(*tp).copied();
    let hard = match bound {
        Some(b) => !skips.as_bytes().contains(&b) && cur.rest().contains(&b),
        None => false,
    };

    if hard {
        let delim = [bound.unwrap_or(0)];
        let Some(extract) = cur.token(&delim, 1) else {
            return Ok(());
        };
        set_xff_host(rec, extract.as_bytes(), skips.as_bytes(), true);
        // step over the trailing delimiter
        cur.bump();
    } else {
        let consumed = set_xff_host(rec, cur.rest(), skips.as_bytes(), false);
        cur.advance(consumed);
    }

    if rec.host.is_none() {
        return Err(spec_err(rec, SpecError::TokenNull { spec: 'h' }));
    }
    Ok(())
}

/// Dispatch a `~X` template directive. Only `~h` is special today.
pub(crate) fn special_specifier(
    rec: &mut LogRecord,
    cur: &mut Cursor<'_>,
    tpl: &[u8],
    tp: &mut usize,
) -> Result<(), SpecError> {
    match tpl.get(*tp) {
        Some(b'h') => find_xff_host(rec, cur, tpl, tp),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn rec() -> LogRecord {
        LogRecord::new(NaiveDateTime::default())
    }

    #[test]
    fn test_extract_braces() {
        let tpl = b"h{, } %d";
        let mut tp = 0;
        assert_eq!(extract_braces(tpl, &mut tp).unwrap(), ", ");
        assert_eq!(tpl[tp], b' ');
    }

    #[test]
    fn test_extract_braces_missing() {
        let mut tp = 0;
        assert!(extract_braces(b"h no braces", &mut tp).is_none());
        let mut tp = 0;
        assert!(extract_braces(b"h{}", &mut tp).is_none());
    }

    #[test]
    fn test_unbounded_takes_first_valid_ip() {
        let mut r = rec();
        let mut cur = Cursor::new("10.0.0.1, 203.0.113.5, 8.8.8.8 - rest");
        let tpl = b"h{, } ";
        let mut tp = 0;
        find_xff_host(&mut r, &mut cur, tpl, &mut tp).unwrap();
        assert_eq!(r.host.as_deref(), Some("10.0.0.1"));
        assert_eq!(r.type_ip, IpType::V4);
        // the walk stopped on the run after the XFF region
        assert!(cur.rest().starts_with(b"-"));
    }

    #[test]
    fn test_hard_bounded() {
        let mut r = rec();
        let mut cur = Cursor::new("203.0.113.5, 10.0.0.1|rest");
        let tpl = b"h{, }|";
        let mut tp = 0;
        find_xff_host(&mut r, &mut cur, tpl, &mut tp).unwrap();
        assert_eq!(r.host.as_deref(), Some("203.0.113.5"));
        assert_eq!(cur.rest(), b"rest");
    }

    #[test]
    fn test_skips_leading_garbage_run() {
        let mut r = rec();
        let mut cur = Cursor::new("unknown, 203.0.113.5|rest");
        let tpl = b"h{, }|";
        let mut tp = 0;
        find_xff_host(&mut r, &mut cur, tpl, &mut tp).unwrap();
        assert_eq!(r.host.as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_no_valid_ip_is_an_error() {
        let mut r = rec();
        let mut cur = Cursor::new("unknown, nothing|rest");
        let tpl = b"h{, }|";
        let mut tp = 0;
        let err = find_xff_host(&mut r, &mut cur, tpl, &mut tp).unwrap_err();
        assert_eq!(err, SpecError::TokenNull { spec: 'h' });
        assert!(r.errstr.is_some());
    }

    #[test]
    fn test_ipv6_in_xff() {
        let mut r = rec();
        let mut cur = Cursor::new("2001:db8::1, 10.0.0.1|rest");
        let tpl = b"h{, }|";
        let mut tp = 0;
        find_xff_host(&mut r, &mut cur, tpl, &mut tp).unwrap();
        assert_eq!(r.host.as_deref(), Some("2001:db8::1"));
        assert_eq!(r.type_ip, IpType::V6);
    }
}
