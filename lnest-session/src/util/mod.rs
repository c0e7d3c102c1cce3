use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn to_tracing_level(level: log::LevelFilter) -> LevelFilter {
    match level {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

/// A RUST_LOG based filter, with `default_level` for targets it does not mention
pub fn env_filter(default_level: log::LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(to_tracing_level(default_level).into())
        .from_env_lossy()
}

/// Initialize tracing-subscriber, printing to stdout.  Records from the
/// `log` facade are forwarded.
pub fn init_logging(default_level: log::LevelFilter) -> Result<()> {
    let format = fmt::format()
        .with_level(true)
        .with_ansi(true)
        .with_target(false)
        .with_source_location(true)
        .compact();
    let stdout_layer = fmt::layer().event_format(format).with_writer(std::io::stdout);
    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(env_filter(default_level))
        .try_init()
        .map_err(|e| anyhow!("init logging: {}", e))
}
