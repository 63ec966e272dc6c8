//! Load — config loading from file and environment variables.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::Config;

impl Config {
    /// Load configuration from file or fall back to defaults.
    /// Priority: environment variables > config file > defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.map(|p| p.to_path_buf()).or_else(|| {
            std::env::var("LOGFLUME_CONFIG")
                .ok()
                .map(std::path::PathBuf::from)
                .filter(|p| p.exists())
        });

        let mut config = match &path {
            Some(p) => {
                tracing::info!("Loading configuration from: {}", p.display());
                Self::from_file(p)?
            }
            None => {
                tracing::info!("No config file, using defaults");
                Self::default()
            }
        };
        config.config_file = path.map(|p| p.display().to_string());

        // Environment variables override file config for the hot knobs
        if let Some(jobs) = env_parse("LOGFLUME_JOBS") {
            config.jobs = jobs;
        }
        if let Some(chunk) = env_parse("LOGFLUME_CHUNK_SIZE") {
            config.chunk_size = chunk;
        }
        if let Some(tests) = env_parse("LOGFLUME_NUM_TESTS") {
            config.num_tests = tests;
        }
        if let Ok(fmt) = std::env::var("LOGFLUME_LOG_FORMAT") {
            if !config.apply_preset(&fmt) {
                config.log_format = fmt;
            }
        }

        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
log_format = "%h %^[%d:%t %^] \"%r\" %s %b"
jobs = 4
chunk_size = 256
ignore_crawlers = true
ignore_status = [444, 503]
ignore_statics = "request"
"#
        )
        .unwrap();

        let conf = Config::from_file(f.path()).unwrap();
        assert_eq!(conf.jobs, 4);
        assert_eq!(conf.chunk_size, 256);
        assert!(conf.ignore_crawlers);
        assert_eq!(conf.ignore_status, vec![444, 503]);
        assert_eq!(
            conf.ignore_statics,
            crate::parser::model::IgnoreLevel::Request
        );
        // untouched fields keep their defaults
        assert_eq!(conf.date_format, "%d/%b/%Y");
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "jobs = \"many\"").unwrap();
        assert!(Config::from_file(f.path()).is_err());
    }
}
