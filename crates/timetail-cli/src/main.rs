#![forbid(unsafe_code)]

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::json;
use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use timetail_core::config::{self, EffectiveConfig, SINCE_ENV};
use timetail_core::error::ErrorCode;
use timetail_core::search::BoundarySearch;
use timetail_core::tail::copy_tail;
use timetail_core::threshold::{Threshold, parse_duration, parse_instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "timetail: print the recent tail of a timestamped access log",
    long_about = "Find where recent entries start in a large access log by binary search over \
                  byte offsets, then print every line from there to the end of the file.\n\n\
                  Every line must carry a `[DD/Mon/YYYY:HH:MM:SS +HHMM]` timestamp and \
                  timestamps must not decrease in file order.",
    after_help = "EXAMPLES:\n    # Last two hours (default)\n    timetail /var/log/nginx/access.log\n\n    # Last 15 minutes\n    timetail --since 15m access.log\n\n    # Everything after a fixed instant\n    timetail --after 2021-01-01T01:00:00Z access.log\n\n    # Only report where the tail starts\n    timetail --offset-only --stats access.log"
)]
struct Cli {
    /// Log file to search.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print lines newer than this window (e.g. 90s, 15m, 2h, 1h30m, 1d). Default: 2h.
    #[arg(long, value_name = "DURATION", conflicts_with = "after")]
    since: Option<String>,

    /// Print lines strictly after this instant (RFC 3339 or DD/Mon/YYYY:HH:MM:SS +HHMM).
    #[arg(long, value_name = "TIMESTAMP")]
    after: Option<String>,

    /// Size of the backward scan window in bytes.
    #[arg(long, value_name = "BYTES", hide_short_help = true)]
    window_size: Option<usize>,

    /// Resolve every probe from scratch instead of memoizing lines.
    #[arg(long, hide_short_help = true)]
    no_cache: bool,

    /// Emit search statistics as JSON to stderr.
    #[arg(long)]
    stats: bool,

    /// Print the boundary byte offset instead of the lines after it.
    #[arg(long)]
    offset_only: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TIMETAIL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "timetail=debug,timetail_core=debug,info"
        } else {
            "timetail=info,timetail_core=info,warn"
        })
    });

    let format = env::var("TIMETAIL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

/// Prefix an error with its stable code, message and hint.
fn coded<E>(code: ErrorCode, err: E) -> anyhow::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let summary = match code.hint() {
        Some(hint) => format!("{code}: {} (hint: {hint})", code.message()),
        None => format!("{code}: {}", code.message()),
    };
    anyhow::Error::new(err).context(summary)
}

fn effective_config(cli: &Cli) -> anyhow::Result<EffectiveConfig> {
    let user = config::load_user_config().map_err(|e| coded(e.code(), e))?;
    Ok(config::resolve_config(
        cli.since.as_deref(),
        cli.window_size,
        env::var(SINCE_ENV).ok(),
        &user,
    ))
}

fn resolve_threshold(
    cli: &Cli,
    config: &EffectiveConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<DateTime<Utc>> {
    let threshold = match &cli.after {
        Some(raw) => Threshold::After(parse_instant(raw).map_err(|e| coded(e.code(), e))?),
        None => Threshold::Since(
            parse_duration(&config.since)
                .map_err(|e| coded(e.code(), e))
                .with_context(|| format!("--since from {:?} source", config.since_source))?,
        ),
    };
    threshold.resolve(now).map_err(|e| coded(e.code(), e))
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = effective_config(cli)?;
    debug!(?config, "effective config");
    let threshold = resolve_threshold(cli, &config, Utc::now())?;

    let file = File::open(&cli.file)
        .map_err(|e| coded(ErrorCode::FileOpenFailed, e))
        .with_context(|| format!("open {}", cli.file.display()))?;

    info!(file = %cli.file.display(), %threshold, "searching for boundary");

    let mut search = BoundarySearch::with_window_size(file, threshold, config.window_size)
        .map_err(|e| coded(ErrorCode::ReadFailed, e))?;
    if cli.no_cache {
        search = search.without_cache();
    }

    let boundary = search.run().map_err(|e| coded(e.code(), e))?;
    if !boundary.found {
        warn!(
            offset = boundary.offset,
            "no line is newer than the threshold; starting from the last line"
        );
    }

    if cli.stats {
        let report = json!({
            "threshold": threshold.to_rfc3339(),
            "boundary": boundary,
            "search": search.stats(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    if cli.offset_only {
        println!("{}", boundary.offset);
        return Ok(());
    }

    let summary =
        copy_tail(search.into_inner(), io::stdout().lock()).map_err(|e| coded(e.code(), e))?;
    debug!(lines = summary.lines, bytes = summary.bytes, "tail written");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let result = run(&cli);
    io::stdout().flush().ok();
    result
}
