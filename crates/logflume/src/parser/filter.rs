//! Post-parse ignore chain. First match wins; `Panel` suppresses the
//! record entirely.

use crate::conf::Config;
use crate::store::ParseCtx;
use crate::util::{ip_in_range, wc_match};

use super::model::{IgnoreLevel, LogRecord};

/// Run the ignore chain in order: excluded IP, crawler policy, blocked
/// referrer, blocked status, static asset. A surviving record gets its
/// query string stripped when configured.
pub fn ignore_line(rec: &mut LogRecord, ctx: &ParseCtx<'_>) -> IgnoreLevel {
    let conf = ctx.conf;

    if is_excluded_ip(conf, rec.host.as_deref().unwrap_or("")) {
        return IgnoreLevel::Panel;
    }
    if crawler_filtered(ctx, rec.agent.as_deref().unwrap_or("")) {
        return IgnoreLevel::Panel;
    }
    if ignore_referer(conf, rec.referrer.as_deref()) {
        return IgnoreLevel::Panel;
    }
    if ignore_status_code(conf, rec.status) {
        return IgnoreLevel::Panel;
    }
    if conf.ignore_statics != IgnoreLevel::None
        && verify_static_content(conf, rec.request.as_deref().unwrap_or(""))
    {
        return conf.ignore_statics;
    }

    // query stripping never happens for filtered records
    if conf.ignore_qstr {
        if let Some(req) = rec.request.as_mut() {
            strip_qstring(req);
        }
    }

    IgnoreLevel::None
}

pub(crate) fn is_excluded_ip(conf: &Config, host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    conf.ignore_ips
        .iter()
        .any(|spec| spec == host || ip_in_range(spec, host))
}

/// With `ignore_crawlers` a crawler is filtered; with `crawlers_only`
/// everything else is.
fn crawler_filtered(ctx: &ParseCtx<'_>, agent: &str) -> bool {
    let conf = ctx.conf;
    if !conf.ignore_crawlers && !conf.crawlers_only {
        return false;
    }
    let bot = ctx.classifier.is_crawler(agent);
    (conf.ignore_crawlers && bot) || (conf.crawlers_only && !bot)
}

pub(crate) fn ignore_referer(conf: &Config, referrer: Option<&str>) -> bool {
    let Some(referrer) = referrer else {
        return false;
    };
    conf.ignore_referers.iter().any(|p| wc_match(p, referrer))
}

/// Referrers on the hide list are scrubbed from the record while the hit
/// still counts.
pub(crate) fn hide_referer(conf: &Config, site: &str) -> bool {
    if site.is_empty() {
        return false;
    }
    conf.hide_referers.iter().any(|p| wc_match(p, site))
}

fn ignore_status_code(conf: &Config, status: i32) -> bool {
    if status == 0 || conf.ignore_status.is_empty() {
        return false;
    }
    conf.ignore_status.contains(&status)
}

/// Determine whether the request points at a static asset (jpg, css, js...).
pub fn verify_static_content(conf: &Config, req: &str) -> bool {
    if req.is_empty() {
        return false;
    }
    let rb = req.as_bytes();
    for ext in &conf.static_files {
        if ext.is_empty() {
            continue;
        }
        let eb = ext.as_bytes();
        if conf.all_static_files {
            if let Some(q) = rb.iter().position(|&b| b == b'?') {
                if q > eb.len() && rb[q - eb.len()..q].eq_ignore_ascii_case(eb) {
                    return true;
                }
                continue;
            }
        }
        if rb.len() > eb.len() && rb[rb.len() - eb.len()..].eq_ignore_ascii_case(eb) {
            return true;
        }
    }
    false
}

pub(crate) fn is_404(rec: &LogRecord, conf: &Config) -> bool {
    rec.status == 404 || (rec.status == 444 && conf.code444_as_404)
}

fn strip_qstring(req: &mut String) {
    if let Some(q) = req.find('?') {
        if q > 0 {
            req.truncate(q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestEnv;

    fn rec_with(host: &str, agent: &str, status: i32, req: &str) -> LogRecord {
        let mut rec = LogRecord::new(chrono::NaiveDateTime::default());
        rec.host = Some(host.to_string());
        rec.agent = Some(agent.to_string());
        rec.status = status;
        rec.request = Some(req.to_string());
        rec
    }

    #[test]
    fn test_excluded_ip_wins_first() {
        let mut env = TestEnv::new();
        env.conf.ignore_ips = vec!["10.0.0.1".to_string()];
        env.conf.ignore_status = vec![200];
        let mut rec = rec_with("10.0.0.1", "Firefox", 200, "/x");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
    }

    #[test]
    fn test_excluded_ip_range() {
        let mut env = TestEnv::new();
        env.conf.ignore_ips = vec!["10.0.0.1-10.0.0.255".to_string()];
        let mut rec = rec_with("10.0.0.77", "Firefox", 200, "/x");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
    }

    #[test]
    fn test_ignore_crawlers() {
        let mut env = TestEnv::new();
        env.conf.ignore_crawlers = true;
        let mut rec = rec_with("1.1.1.1", "Googlebot/2.1", 200, "/x");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
        let mut rec = rec_with("1.1.1.1", "Firefox/120.0", 200, "/x");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::None);
    }

    #[test]
    fn test_crawlers_only() {
        let mut env = TestEnv::new();
        env.conf.crawlers_only = true;
        let mut rec = rec_with("1.1.1.1", "Firefox/120.0", 200, "/x");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
        let mut rec = rec_with("1.1.1.1", "Googlebot/2.1", 200, "/x");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::None);
    }

    #[test]
    fn test_referer_block() {
        let mut env = TestEnv::new();
        env.conf.ignore_referers = vec!["*.spam.example".to_string()];
        let mut rec = rec_with("1.1.1.1", "Firefox", 200, "/x");
        rec.referrer = Some("http://www.spam.example".to_string());
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
    }

    #[test]
    fn test_status_block() {
        let mut env = TestEnv::new();
        env.conf.ignore_status = vec![444];
        let mut rec = rec_with("1.1.1.1", "Firefox", 444, "/x");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
    }

    #[test]
    fn test_static_policy_levels() {
        let mut env = TestEnv::new();
        env.conf.ignore_statics = IgnoreLevel::Request;
        let mut rec = rec_with("1.1.1.1", "Firefox", 200, "/app.css");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Request);

        env.conf.ignore_statics = IgnoreLevel::Panel;
        let mut rec = rec_with("1.1.1.1", "Firefox", 200, "/app.css");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
    }

    #[test]
    fn test_qstr_stripped_only_when_kept() {
        let mut env = TestEnv::new();
        env.conf.ignore_qstr = true;
        let mut rec = rec_with("1.1.1.1", "Firefox", 200, "/index.php?ts=1454385289");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::None);
        assert_eq!(rec.request.as_deref(), Some("/index.php"));

        // a filtered record keeps its query string
        env.conf.ignore_ips = vec!["1.1.1.1".to_string()];
        let mut rec = rec_with("1.1.1.1", "Firefox", 200, "/index.php?ts=1");
        assert_eq!(ignore_line(&mut rec, &env.ctx()), IgnoreLevel::Panel);
        assert_eq!(rec.request.as_deref(), Some("/index.php?ts=1"));
    }

    #[test]
    fn test_static_suffix_match() {
        let conf = Config::default();
        assert!(verify_static_content(&conf, "/assets/app.css"));
        assert!(verify_static_content(&conf, "/IMG/photo.JPG"));
        assert!(!verify_static_content(&conf, "/api/users"));
        // query string defeats the suffix match by default
        assert!(!verify_static_content(&conf, "/app.css?v=3"));
    }

    #[test]
    fn test_static_anywhere_before_query() {
        let conf = Config {
            all_static_files: true,
            ..Config::default()
        };
        assert!(verify_static_content(&conf, "/app.css?v=3"));
        assert!(!verify_static_content(&conf, "/api?file=x"));
        // no query string still falls back to the suffix check
        assert!(verify_static_content(&conf, "/app.css"));
    }

    #[test]
    fn test_is_404() {
        let conf = Config::default();
        let mut rec = rec_with("1.1.1.1", "-", 404, "/x");
        assert!(is_404(&rec, &conf));
        rec.status = 444;
        assert!(!is_404(&rec, &conf));
        let conf = Config {
            code444_as_404: true,
            ..Config::default()
        };
        assert!(is_404(&rec, &conf));
    }
}
