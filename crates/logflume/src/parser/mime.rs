//! Mime-type normalization.

use super::MIME_OUT_LEN;

/// Split on `;` and `,`, trim and lowercase each token, rejoin the
/// non-empty ones with `"; "`, and cap the output length.
pub fn normalize_mime_type(mime: &str) -> Option<String> {
    let mut out = String::new();
    for token in mime.split([';', ',']) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("; ");
        }
        out.push_str(&token.to_ascii_lowercase());
    }
    if out.is_empty() {
        return None;
    }
    if out.len() > MIME_OUT_LEN {
        let mut cut = MIME_OUT_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mixed_separators() {
        assert_eq!(
            normalize_mime_type(" Text/HTML ; charset=UTF-8 , Application/JSON ").unwrap(),
            "text/html; charset=utf-8; application/json"
        );
    }

    #[test]
    fn test_normalize_single() {
        assert_eq!(normalize_mime_type("text/plain").unwrap(), "text/plain");
    }

    #[test]
    fn test_normalize_empty_tokens() {
        assert_eq!(normalize_mime_type(";;,text/css;").unwrap(), "text/css");
        assert!(normalize_mime_type(" ; , ").is_none());
        assert!(normalize_mime_type("").is_none());
    }

    #[test]
    fn test_normalize_caps_length() {
        let long = "text/html;".repeat(40);
        let out = normalize_mime_type(&long).unwrap();
        assert!(out.len() <= MIME_OUT_LEN);
    }
}
