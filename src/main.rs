// Router simulation binary.
//
// Builds the router from the default configuration (optionally overridden by a JSON file and a few
// flags), starts the seven worker threads and keeps them running until Ctrl+C or the requested run
// duration, then shuts everything down and joins the workers.

use router_sim::config::{RouterConfig, StatsFormat};
use router_sim::pipeline::Router;
use router_sim::sink::ConsoleSink;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line options parsed from program arguments.
#[derive(Debug, Default)]
struct CliOptions {
    /// JSON configuration file; absent fields keep their defaults.
    config: Option<PathBuf>,
    stats_format: Option<StatsFormat>,
    /// Stop after this long instead of waiting for Ctrl+C.
    duration: Option<Duration>,
    slow: bool,
}

fn parse_stats_format(value: &str) -> Option<StatsFormat> {
    match value.to_ascii_lowercase().as_str() {
        "text" | "txt" => Some(StatsFormat::Text),
        "json" => Some(StatsFormat::Json),
        _ => None,
    }
}

/// Parse command-line arguments into `CliOptions`.
///
/// Flags accept both `--flag=value` and `--flag value`:
/// - `--config <path>`
/// - `--stats-format <text|json>`
/// - `--duration-secs <n>`
/// - `--slow`
fn parse_cli_options() -> CliOptions {
    let mut options = CliOptions::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let (key, inline) = match arg.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        match key.as_str() {
            "--slow" => options.slow = true,
            "--config" | "--stats-format" | "--duration-secs" => {
                let Some(value) = inline.or_else(|| args.next()) else {
                    warn!(flag = %key, "missing value");
                    continue;
                };
                match key.as_str() {
                    "--config" => options.config = Some(PathBuf::from(value)),
                    "--stats-format" => match parse_stats_format(&value) {
                        Some(format) => options.stats_format = Some(format),
                        None => warn!(%value, "unknown stats format, keeping default"),
                    },
                    _ => match value.parse::<u64>() {
                        Ok(secs) => options.duration = Some(Duration::from_secs(secs)),
                        Err(err) => warn!(%value, %err, "invalid duration"),
                    },
                }
            }
            other => warn!(flag = %other, "ignoring unknown argument"),
        }
    }
    options
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();

    let options = parse_cli_options();

    let mut config = match &options.config {
        Some(path) => RouterConfig::from_file(path)?,
        None => RouterConfig::default(),
    };
    if let Some(format) = options.stats_format {
        config.stats.format = format;
    }
    if options.slow {
        config.generator.slow_mode = true;
    }

    let router = Router::new(config, Arc::new(ConsoleSink::new()))?;

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();
    ctrlc::set_handler(move || {
        shutdown_flag_clone.store(true, Ordering::Relaxed);
    })?;

    router.start()?;
    let deadline = options.duration.map(|duration| Instant::now() + duration);
    while !shutdown_flag.load(Ordering::Relaxed) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("shutting down");
    router.shutdown();
    router.join();

    let final_stats = router.snapshot();
    info!(
        created = final_stats.counters.created,
        delivered = final_stats.counters.delivered,
        rejected = final_stats.counters.rejected(),
        in_flight = final_stats.counters.in_flight,
        "final counters"
    );
    Ok(())
}
