//! URL decoding plus referrer post-processing: Google keyphrase extraction
//! and referrer-host extraction.

use super::REF_SITE_LEN;

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// Percent-decode one pass. Invalid escapes are copied through untouched.
fn decode_hex(s: &str) -> Vec<u8> {
    let b = s.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'%'
            && i + 2 < b.len()
            && b[i + 1].is_ascii_hexdigit()
            && b[i + 2].is_ascii_hexdigit()
        {
            out.push((hex_val(b[i + 1]) << 4) | hex_val(b[i + 2]));
            i += 3;
        } else {
            out.push(b[i]);
            i += 1;
        }
    }
    out
}

/// Decode a URL-encoded string: percent escapes, an optional second pass for
/// double-encoded input, newline stripping, and whitespace trimming.
pub fn decode_url(url: &str, double_decode: bool) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    let mut out = decode_hex(url);
    if double_decode {
        out = decode_hex(&String::from_utf8_lossy(&out));
    }
    let mut s = String::from_utf8_lossy(&out).into_owned();
    s.retain(|c| c != '\n' && c != '\r');
    Some(s.trim().to_string())
}

const GOOGLE_REFERRERS: [&str; 6] = [
    "http://www.google.",
    "http://webcache.googleusercontent.com/",
    "http://translate.googleusercontent.com/",
    "https://www.google.",
    "https://webcache.googleusercontent.com/",
    "https://translate.googleusercontent.com/",
];

/// Extract the search keyphrase from Google search, cache, and translate
/// referrers. The referrer must not be decoded before this point since the
/// query itself may contain '&'.
pub fn extract_keyphrase(referrer: &str, double_decode: bool) -> Option<String> {
    if !GOOGLE_REFERRERS.iter().any(|h| referrer.contains(h)) {
        return None;
    }

    let mut encoded = false;
    let rest = if referrer.contains("/+&") {
        return None;
    } else if let Some(i) = referrer.find("/+") {
        &referrer[i + 2..]
    } else if let Some(i) = referrer.find("q=cache:") {
        match referrer[i..].find('+') {
            Some(p) => &referrer[i + p + 1..],
            None => &referrer[i..],
        }
    } else if let Some(i) = referrer.find("&q=").or_else(|| referrer.find("?q=")) {
        &referrer[i + 3..]
    } else if let Some(i) = referrer.find("%26q%3D").or_else(|| referrer.find("%3Fq%3D")) {
        encoded = true;
        &referrer[i + 7..]
    } else {
        return None;
    };

    let cut = if encoded {
        rest.find("%26")
    } else {
        rest.find('&')
    };
    let rest = match cut {
        Some(i) => &rest[..i],
        None => rest,
    };

    let decoded = decode_url(rest, double_decode)?;
    if decoded.is_empty() {
        return None;
    }
    Some(decoded.replace('+', " ").trim().to_string())
}

/// Extract the host part from a referrer URI,
/// i.e. `//www.example.com/path?q` yields `www.example.com`.
pub fn extract_referer_site(referrer: &str) -> Option<String> {
    let i = referrer.find("//")?;
    let begin = &referrer[i + 2..];
    if begin.is_empty() {
        return None;
    }
    let end = begin
        .find(|c| c == '/' || c == '?')
        .unwrap_or(begin.len());
    if end == 0 {
        return None;
    }
    let mut len = end.min(REF_SITE_LEN);
    while !begin.is_char_boundary(len) {
        len -= 1;
    }
    Some(begin[..len].to_string())
}
