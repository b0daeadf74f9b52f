use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Crates whose events are shown at the chosen level.
const CRATES: &[&str] = &["trellis_cli", "trellis_lookup", "trellis_references", "trellis_config"];

/// Filter for the chosen level; `RUST_LOG` wins when set.
pub fn env_filter(level: LevelFilter) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directives = CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

/// Parses a config file level; unknown names fall back to `warn`.
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::WARN)
}

pub fn init(level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .init();
}
