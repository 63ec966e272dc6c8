//! Model — the engine configuration.

use serde::{Deserialize, Serialize};

use crate::parser::model::IgnoreLevel;
use crate::parser::NUM_TESTS;

pub const FMT_COMMON: &str = "%h %^[%d:%t %^] \"%r\" %s %b";
pub const FMT_COMBINED: &str = "%h %^[%d:%t %^] \"%r\" %s %b \"%R\" \"%u\"";
pub const FMT_VCOMBINED: &str = "%v:%^ %h %^[%d:%t %^] \"%r\" %s %b \"%R\" \"%u\"";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Format template, or a JSON map from key to sub-template.
    pub log_format: String,
    /// Set explicitly, or inferred when `log_format` starts with `{`.
    pub is_json_log_format: bool,

    pub date_format: String,
    pub time_format: String,
    /// Canonical numeric rendering for parsed dates.
    pub date_num_format: String,

    /// Also populate `method`/`protocol` when parsing `%r`.
    pub append_method: bool,
    pub append_protocol: bool,

    pub double_decode: bool,
    pub no_strict_status: bool,
    pub no_ip_validation: bool,

    /// Match static extensions anywhere before a `?`, not only as suffix.
    pub all_static_files: bool,
    pub static_files: Vec<String>,

    pub ignore_crawlers: bool,
    pub crawlers_only: bool,
    /// `panel` drops static-file hits entirely, `request` keeps them out of
    /// request aggregations only.
    pub ignore_statics: IgnoreLevel,
    pub code444_as_404: bool,
    /// Strip the query string from accepted requests.
    pub ignore_qstr: bool,
    pub ignore_status: Vec<i32>,

    /// Hosts to exclude, as exact addresses or `a-b` ranges.
    pub ignore_ips: Vec<String>,
    /// Referrers excluded from processing (wildcards allowed).
    pub ignore_referers: Vec<String>,
    /// Referrers hidden from records while the hit still counts.
    pub hide_referers: Vec<String>,

    /// Regex applied to each file's basename; capture 1 (or the whole
    /// match) becomes the vhost of every record from that file.
    pub fname_as_vhost: Option<String>,

    /// Resume from a previously persisted dataset.
    pub restore: bool,

    pub jobs: usize,
    pub chunk_size: usize,
    /// Lines to sniff before trusting the format; 0 disables the preflight.
    pub num_tests: u32,
    /// Keep retrying a drained pipe instead of treating it as EOF.
    pub process_and_exit: bool,
    pub read_stdin: bool,
    pub filenames: Vec<String>,

    #[serde(skip)]
    pub config_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_format: String::new(),
            is_json_log_format: false,
            date_format: "%d/%b/%Y".to_string(),
            time_format: "%H:%M:%S".to_string(),
            date_num_format: "%Y%m%d".to_string(),
            append_method: true,
            append_protocol: true,
            double_decode: false,
            no_strict_status: false,
            no_ip_validation: false,
            all_static_files: false,
            static_files: default_static_files(),
            ignore_crawlers: false,
            crawlers_only: false,
            ignore_statics: IgnoreLevel::None,
            code444_as_404: false,
            ignore_qstr: false,
            ignore_status: Vec::new(),
            ignore_ips: Vec::new(),
            ignore_referers: Vec::new(),
            hide_referers: Vec::new(),
            fname_as_vhost: None,
            restore: false,
            jobs: 1,
            chunk_size: 1024,
            num_tests: NUM_TESTS,
            process_and_exit: false,
            read_stdin: false,
            filenames: Vec::new(),
            config_file: None,
        }
    }
}

fn default_static_files() -> Vec<String> {
    [
        ".css", ".js", ".mjs", ".map", ".jpg", ".jpeg", ".png", ".gif", ".ico", ".svg", ".bmp",
        ".webp", ".avif", ".tif", ".tiff", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".pdf",
        ".txt", ".csv", ".xml", ".zip", ".gz", ".tgz", ".rar", ".7z", ".iso", ".mp3", ".mp4",
        ".avi", ".webm", ".mov", ".flv", ".swf", ".exe", ".dmg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// Expand a named format preset. Returns false for unknown names.
    pub fn apply_preset(&mut self, name: &str) -> bool {
        let fmt = match name.to_ascii_uppercase().as_str() {
            "COMMON" => FMT_COMMON,
            "COMBINED" => FMT_COMBINED,
            "VCOMBINED" => FMT_VCOMBINED,
            _ => return false,
        };
        self.log_format = fmt.to_string();
        self.date_format = "%d/%b/%Y".to_string();
        self.time_format = "%H:%M:%S".to_string();
        true
    }

    /// Derive settings that depend on other settings.
    pub fn finalize(&mut self) {
        if !self.is_json_log_format && self.log_format.trim_start().starts_with('{') {
            self.is_json_log_format = true;
        }
        if self.filenames.iter().any(|f| f == "-") {
            self.read_stdin = true;
        }
    }

    /// The formats a parse cannot run without.
    pub fn verify_formats(&self) -> Result<(), String> {
        if self.log_format.is_empty() {
            return Err("a log format is required".to_string());
        }
        if self.date_format.is_empty() {
            return Err("a date format is required".to_string());
        }
        if self.time_format.is_empty() {
            return Err("a time format is required".to_string());
        }
        Ok(())
    }

    /// Validate configuration values are sane.
    pub fn validate(&self) -> Result<(), String> {
        if self.jobs == 0 {
            return Err("jobs must be > 0".to_string());
        }
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }
        let probe = chrono::NaiveDateTime::default();
        if crate::parser::datetime::format_datetime(probe, &self.date_num_format).is_none() {
            return Err(format!(
                "date_num_format '{}' cannot render a date",
                self.date_num_format
            ));
        }
        if let Some(pattern) = &self.fname_as_vhost {
            regex::Regex::new(pattern)
                .map_err(|e| format!("invalid fname_as_vhost regex: {}", e))?;
        }
        if self.filenames.iter().any(|f| f == "-") && !self.read_stdin {
            return Err("'-' requires read_stdin".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf = Config::default();
        assert_eq!(conf.jobs, 1);
        assert_eq!(conf.chunk_size, 1024);
        assert_eq!(conf.num_tests, NUM_TESTS);
        assert_eq!(conf.date_num_format, "%Y%m%d");
        assert!(conf.static_files.contains(&".css".to_string()));
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let mut conf = Config::default();
        assert!(conf.apply_preset("combined"));
        assert!(conf.log_format.contains("\"%R\" \"%u\""));
        assert!(conf.apply_preset("VCOMBINED"));
        assert!(conf.log_format.starts_with("%v:"));
        assert!(!conf.apply_preset("nonsense"));
    }

    #[test]
    fn test_finalize_infers_json() {
        let mut conf = Config {
            log_format: r#"{"host": "%h"}"#.to_string(),
            ..Config::default()
        };
        conf.finalize();
        assert!(conf.is_json_log_format);
    }

    #[test]
    fn test_finalize_stdin() {
        let mut conf = Config {
            filenames: vec!["-".to_string()],
            ..Config::default()
        };
        conf.finalize();
        assert!(conf.read_stdin);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let conf = Config {
            jobs: 0,
            ..Config::default()
        };
        assert!(conf.validate().is_err());

        let conf = Config {
            fname_as_vhost: Some("([unclosed".to_string()),
            ..Config::default()
        };
        assert!(conf.validate().is_err());
    }

    #[test]
    fn test_verify_formats() {
        let conf = Config::default();
        assert!(conf.verify_formats().is_err());

        let mut conf = Config::default();
        conf.apply_preset("COMMON");
        assert!(conf.verify_formats().is_ok());
    }
}
