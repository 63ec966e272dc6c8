//! Canonical HTTP method and protocol tables, request-line splitting, and
//! status validation.

use crate::conf::Config;

use super::url::decode_url;

/// Known methods, matched as a case-insensitive prefix of the token.
pub const HTTP_METHODS: &[&str] = &[
    "OPTIONS",
    "GET",
    "HEAD",
    "POST",
    "PUT",
    "DELETE",
    "TRACE",
    "CONNECT",
    "PATCH",
    "SEARCH",
    // WebDAV
    "PROPFIND",
    "PROPPATCH",
    "MKCOL",
    "COPY",
    "MOVE",
    "LOCK",
    "UNLOCK",
    "VERSION-CONTROL",
    "REPORT",
    "CHECKOUT",
    "CHECKIN",
    "UNCHECKOUT",
    "MKWORKSPACE",
    "UPDATE",
    "LABEL",
    "MERGE",
    "BASELINE-CONTROL",
    "MKACTIVITY",
];

pub const HTTP_PROTOCOLS: &[&str] = &["HTTP/1.0", "HTTP/1.1", "HTTP/2", "HTTP/3"];

fn starts_ignore_case(token: &str, pat: &str) -> bool {
    let (t, p) = (token.as_bytes(), pat.as_bytes());
    t.len() >= p.len() && t[..p.len()].eq_ignore_ascii_case(p)
}

/// Return the canonical method the token begins with.
pub fn extract_method(token: &str) -> Option<&'static str> {
    HTTP_METHODS
        .iter()
        .copied()
        .find(|m| starts_ignore_case(token, m))
}

/// Return the canonical protocol the token begins with.
pub fn extract_protocol(token: &str) -> Option<&'static str> {
    HTTP_PROTOCOLS
        .iter()
        .copied()
        .find(|p| starts_ignore_case(token, p))
}

pub fn is_valid_http_status(code: i32) -> bool {
    (100..=599).contains(&code)
}

/// Cache statuses worth keeping.
pub fn is_cache_hit(token: &str) -> bool {
    [
        "MISS",
        "BYPASS",
        "EXPIRED",
        "STALE",
        "UPDATING",
        "REVALIDATED",
        "HIT",
    ]
    .iter()
    .any(|s| token.eq_ignore_ascii_case(s))
}

/// Split a full request line into `(request, method, protocol)`.
///
/// Without a recognizable method prefix the whole line becomes the request.
/// With a method but no trailing valid protocol the request collapses to
/// `"-"`. Method and protocol are only surfaced when the corresponding
/// append flag is set.
pub fn parse_req(line: &str, conf: &Config) -> (String, Option<String>, Option<String>) {
    let Some(meth) = extract_method(line) else {
        return (decode_or_keep(line.to_string(), conf), None, None);
    };

    let after = &line[meth.len()..];
    let Some(sp) = after.rfind(' ') else {
        return ("-".to_string(), None, None);
    };
    let Some(proto) = extract_protocol(&after[sp + 1..]) else {
        return ("-".to_string(), None, None);
    };
    // the URL sits between the single space after the method and the
    // protocol token
    let url = match after.get(1..sp) {
        Some(u) if !u.is_empty() => u,
        _ => return ("-".to_string(), None, None),
    };

    let method = conf.append_method.then(|| meth.to_ascii_uppercase());
    let protocol = conf.append_protocol.then(|| proto.to_ascii_uppercase());

    (decode_or_keep(url.to_string(), conf), method, protocol)
}

fn decode_or_keep(request: String, conf: &Config) -> String {
    match decode_url(&request, conf.double_decode) {
        Some(d) if !d.is_empty() => d,
        _ => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf_append() -> Config {
        Config {
            append_method: true,
            append_protocol: true,
            ..Config::default()
        }
    }

    #[test]
    fn test_extract_method() {
        assert_eq!(extract_method("GET /x HTTP/1.1"), Some("GET"));
        assert_eq!(extract_method("get /x"), Some("GET"));
        assert_eq!(extract_method("PROPPATCH /x"), Some("PROPPATCH"));
        assert_eq!(extract_method("FETCH /x"), None);
    }

    #[test]
    fn test_extract_protocol() {
        assert_eq!(extract_protocol("HTTP/1.0"), Some("HTTP/1.0"));
        assert_eq!(extract_protocol("http/2"), Some("HTTP/2"));
        assert_eq!(extract_protocol("SPDY/3"), None);
    }

    #[test]
    fn test_parse_req_full_line() {
        let (req, m, p) = parse_req("GET /apache_pb.gif HTTP/1.0", &conf_append());
        assert_eq!(req, "/apache_pb.gif");
        assert_eq!(m.as_deref(), Some("GET"));
        assert_eq!(p.as_deref(), Some("HTTP/1.0"));
    }

    #[test]
    fn test_parse_req_no_append() {
        let conf = Config {
            append_method: false,
            append_protocol: false,
            ..Config::default()
        };
        let (req, m, p) = parse_req("GET /x HTTP/1.1", &conf);
        assert_eq!(req, "/x");
        assert!(m.is_none() && p.is_none());
    }

    #[test]
    fn test_parse_req_without_method() {
        let (req, m, p) = parse_req("/just/a/path", &conf_append());
        assert_eq!(req, "/just/a/path");
        assert!(m.is_none() && p.is_none());
    }

    #[test]
    fn test_parse_req_missing_protocol() {
        let (req, _, _) = parse_req("GET /no-protocol", &conf_append());
        assert_eq!(req, "-");
    }

    #[test]
    fn test_parse_req_decodes_url() {
        let (req, _, _) = parse_req("GET /a%20b HTTP/1.1", &Config::default());
        assert_eq!(req, "/a b");
    }

    #[test]
    fn test_status_range() {
        assert!(is_valid_http_status(200));
        assert!(is_valid_http_status(599));
        assert!(!is_valid_http_status(99));
        assert!(!is_valid_http_status(600));
        assert!(!is_valid_http_status(-1));
    }

    #[test]
    fn test_cache_hit_tokens() {
        assert!(is_cache_hit("HIT"));
        assert!(is_cache_hit("miss"));
        assert!(!is_cache_hit("PARTIAL"));
    }
}
