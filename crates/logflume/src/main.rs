use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logflume::conf::Config;
use logflume::logs::LogSet;
use logflume::parser::json::cache_json_logfmt;
use logflume::pipeline::{parse_log, test_format};
use logflume::store::{CountingSink, HeuristicClassifier, MemoryStore, ParseCtx, RuntimeFlags};

#[derive(Parser, Debug)]
#[command(
    name = "logflume",
    version,
    about = "Parse web server access logs into structured records"
)]
struct Cli {
    /// Log files to parse. Use `-` to read from stdin.
    files: Vec<String>,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log format template, or one of COMMON, COMBINED, VCOMBINED.
    #[arg(short = 'f', long)]
    log_format: Option<String>,

    /// strftime date format for %d fields.
    #[arg(long)]
    date_format: Option<String>,

    /// strftime time format for %t and %x fields.
    #[arg(long)]
    time_format: Option<String>,

    /// Number of parsing worker threads.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Lines per worker chunk.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Resume from previously persisted data.
    #[arg(long)]
    restore: bool,

    /// Filter out records produced by crawlers and spiders.
    #[arg(long)]
    ignore_crawlers: bool,

    /// Keep retrying a drained pipe instead of treating it as EOF.
    #[arg(long)]
    process_and_exit: bool,

    /// Verify the log format against the input and exit.
    #[arg(long)]
    test_format: bool,
}

static FLAGS: RuntimeFlags = RuntimeFlags::new();

extern "C" fn on_sigint(_sig: libc::c_int) {
    FLAGS.request_stop();
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logflume=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut conf = Config::load(cli.config.as_deref())?;
    if !cli.files.is_empty() {
        conf.filenames = cli.files.clone();
    }
    if let Some(fmt) = &cli.log_format {
        if !conf.apply_preset(fmt) {
            conf.log_format = fmt.clone();
        }
    }
    if let Some(dfmt) = cli.date_format {
        conf.date_format = dfmt;
    }
    if let Some(tfmt) = cli.time_format {
        conf.time_format = tfmt;
    }
    if let Some(jobs) = cli.jobs {
        conf.jobs = jobs;
    }
    if let Some(chunk) = cli.chunk_size {
        conf.chunk_size = chunk;
    }
    conf.restore |= cli.restore;
    conf.ignore_crawlers |= cli.ignore_crawlers;
    conf.process_and_exit |= cli.process_and_exit;

    conf.finalize();
    conf.validate()?;

    let handler = on_sigint as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }

    let store = MemoryStore::new();
    let sink = CountingSink::default();
    let classifier = HeuristicClassifier;

    if conf.is_json_log_format {
        cache_json_logfmt(&conf.log_format, &store)?;
    }

    let mut logs = LogSet::from_config(&conf)?;
    let ctx = ParseCtx {
        conf: &conf,
        store: &store,
        sink: &sink,
        classifier: &classifier,
        flags: &FLAGS,
    };

    if cli.test_format {
        return match test_format(&mut logs, &ctx) {
            Ok(()) => {
                info!("log format verified against all inputs");
                Ok(())
            }
            Err(errors) => {
                for err in errors {
                    eprintln!("{}", err);
                }
                std::process::exit(1);
            }
        };
    }

    parse_log(&mut logs, false, &ctx)?;
    logs.output_logerrors(&conf);

    info!(
        processed = logs.total_processed(),
        invalid = logs.total_invalid(),
        hits = sink.hits(),
        bytes = sink.bytes(),
        "parse complete"
    );
    Ok(())
}
