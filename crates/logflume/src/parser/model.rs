use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpType {
    V4,
    V6,
    #[default]
    Invalid,
}

/// How far a record is suppressed by the ignore filter.
///
/// `Panel` drops the record entirely; `Request` keeps it out of
/// request-centric aggregations while still counting it as served traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreLevel {
    #[default]
    None,
    Panel,
    Request,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("Token for '%{spec}' specifier is NULL.")]
    TokenNull { spec: char },

    #[error("Token '{token}' doesn't match specifier '%{spec}'")]
    TokenInvalid { spec: char, token: String },

    #[error("Missing braces '{{}}' and ignore chars for specifier '%{spec}'")]
    MissingBraces { spec: char },

    #[error("Incompatible format due to early parsed line ending '\\0'.")]
    EarlyLineEnd,

    #[error("Malformed JSON line: {0}")]
    Json(String),

    #[error("{0}")]
    MissingField(&'static str),
}

pub const ERR_MISSING_HOST: &str = "IPv4/6 is required. You have to add format specifier '%h' \
     [host (the client IP address, either IPv4 or IPv6)] to your log-format.";
pub const ERR_MISSING_DATE: &str = "A valid date is required. You have to add format specifier \
     '%x' [Datetime] or '%d' [Date] and '%t' [Time] to your log-format.";
pub const ERR_MISSING_REQ: &str = "A request is required. Your log-format is missing format \
     specifier '%r' [The request line from the client] or combination of special format \
     specifiers such as '%m', '%U', '%q' and '%H' to parse individual fields.";

/// One parsed log line.
///
/// Field contracts after a successful parse: `host`, `date` and `request`
/// are set, `method`/`protocol` hold canonical uppercased table entries or
/// nothing, `numdate` is the numeric rendering of `date`, and `serve_time`
/// is in microseconds regardless of the source unit.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub host: Option<String>,
    pub type_ip: IpType,

    pub date: Option<String>,
    pub time: Option<String>,
    pub numdate: u32,
    /// Broken-down datetime, seeded from the handle's open time so partial
    /// formats inherit the missing half.
    pub dt: NaiveDateTime,

    pub vhost: Option<String>,
    pub userid: Option<String>,
    pub cache_status: Option<String>,

    pub method: Option<String>,
    pub protocol: Option<String>,
    pub request: Option<String>,
    pub qstr: Option<String>,

    pub referrer: Option<String>,
    /// Host part extracted from the referrer.
    pub site: String,
    pub keyphrase: Option<String>,

    /// HTTP status; -1 means unset.
    pub status: i32,
    pub resp_size: u64,
    /// Time taken to serve the request, in microseconds.
    pub serve_time: u64,

    pub agent: Option<String>,
    pub agent_hash: u32,
    pub agent_hex: String,

    // Filled by the user-agent classifier.
    pub browser: Option<String>,
    pub browser_type: Option<String>,
    pub os: Option<String>,
    pub os_type: Option<String>,
    pub continent: Option<String>,
    pub country: Option<String>,
    pub asn: Option<String>,

    pub mime_type: Option<String>,
    pub tls_cipher: Option<String>,
    pub tls_version: Option<String>,
    pub tls_version_cipher: Option<String>,

    /// `date|host|agent_hex`, identifies a unique visitor.
    pub uniq_key: Option<String>,

    pub is_404: bool,
    pub is_static: bool,
    pub ignore_level: IgnoreLevel,

    /// Set iff parsing failed; human-readable reason with the offending token.
    pub errstr: Option<String>,
}

impl LogRecord {
    pub fn new(start_time: NaiveDateTime) -> Self {
        Self {
            host: None,
            type_ip: IpType::Invalid,
            date: None,
            time: None,
            numdate: 0,
            dt: start_time,
            vhost: None,
            userid: None,
            cache_status: None,
            method: None,
            protocol: None,
            request: None,
            qstr: None,
            referrer: None,
            site: String::new(),
            keyphrase: None,
            status: -1,
            resp_size: 0,
            serve_time: 0,
            agent: None,
            agent_hash: 0,
            agent_hex: String::new(),
            browser: None,
            browser_type: None,
            os: None,
            os_type: None,
            continent: None,
            country: None,
            asn: None,
            mime_type: None,
            tls_cipher: None,
            tls_version: None,
            tls_version_cipher: None,
            uniq_key: None,
            is_404: false,
            is_static: false,
            ignore_level: IgnoreLevel::None,
            errstr: None,
        }
    }

    pub(crate) fn set_agent_hash(&mut self) {
        self.agent_hash = crate::util::djb2(self.agent.as_deref().unwrap_or(""));
        self.agent_hex = format!("{:x}", self.agent_hash);
    }

    /// `date|host|agent_hex`
    pub(crate) fn set_uniq_key(&mut self) {
        let date = self.date.as_deref().unwrap_or("");
        let host = self.host.as_deref().unwrap_or("");
        self.uniq_key = Some(format!("{}|{}|{}", date, host, self.agent_hex));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_messages() {
        let e = SpecError::TokenNull { spec: 'h' };
        assert_eq!(e.to_string(), "Token for '%h' specifier is NULL.");

        let e = SpecError::TokenInvalid {
            spec: 's',
            token: "abc".into(),
        };
        assert_eq!(e.to_string(), "Token 'abc' doesn't match specifier '%s'");

        let e = SpecError::MissingBraces { spec: 'h' };
        assert!(e.to_string().contains("Missing braces '{}'"));
    }

    #[test]
    fn test_agent_hash_hex() {
        let mut rec = LogRecord::new(chrono::NaiveDateTime::default());
        rec.agent = Some("curl/8.5.0".into());
        rec.set_agent_hash();
        assert_eq!(rec.agent_hex, format!("{:x}", rec.agent_hash));
        assert_ne!(rec.agent_hash, 0);
    }

    #[test]
    fn test_uniq_key_layout() {
        let mut rec = LogRecord::new(chrono::NaiveDateTime::default());
        rec.date = Some("20001010".into());
        rec.host = Some("127.0.0.1".into());
        rec.agent = Some("-".into());
        rec.set_agent_hash();
        rec.set_uniq_key();
        let key = rec.uniq_key.unwrap();
        assert!(key.starts_with("20001010|127.0.0.1|"));
        assert_eq!(key.matches('|').count(), 2);
    }
}
