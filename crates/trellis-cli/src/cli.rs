use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages (default for verbose)
    Debug,
    /// Trace-level messages, including rendered Cypher
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "trellis - evaluate lookup expressions against a knowledge graph snapshot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, uses the config file value or defaults to 'warn'
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (TOML, YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The level requested on the command line, if any.
    pub fn requested_level(&self) -> Option<LevelFilter> {
        match (self.log_level, self.verbose) {
            (Some(level), _) => Some(level.into()),
            (None, true) => Some(LevelFilter::DEBUG),
            (None, false) => None,
        }
    }
}

/// Where to read the graph from and which entry `this` refers to
#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    /// Graph snapshot (JSON)
    #[arg(short, long)]
    pub graph: PathBuf,

    /// Site to evaluate against
    #[arg(short, long)]
    pub site: String,

    /// Entry that `this` refers to
    #[arg(short, long)]
    pub entry: Option<String>,

    /// Page size for lazy results (overrides config file)
    #[arg(short, long)]
    pub page_size: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate an expression and print its value as JSON
    Eval {
        #[command(flatten)]
        graph: GraphArgs,

        /// Lookup expression
        expr: String,
    },

    /// Print the canonical form of an expression and the queries it runs
    Explain {
        #[command(flatten)]
        graph: GraphArgs,

        /// Lookup expression
        expr: String,
    },

    /// Extract the references of a markdown document and print the reference data
    Refs {
        #[command(flatten)]
        graph: GraphArgs,

        /// Markdown text, or `@path` to read it from a file
        markdown: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_means_debug_unless_a_level_is_given() {
        let cli = Cli::parse_from(["trellis", "-v", "eval", "-g", "g.json", "-s", "_site", "1"]);
        assert_eq!(cli.requested_level(), Some(LevelFilter::DEBUG));

        let cli = Cli::parse_from([
            "trellis", "-v", "--log-level", "trace", "eval", "-g", "g.json", "-s", "_site", "1",
        ]);
        assert_eq!(cli.requested_level(), Some(LevelFilter::TRACE));

        let cli = Cli::parse_from(["trellis", "eval", "-g", "g.json", "-s", "_site", "1"]);
        assert_eq!(cli.requested_level(), None);
    }

    #[test]
    fn graph_args_are_shared_by_subcommands() {
        let cli = Cli::parse_from([
            "trellis", "refs", "--graph", "g.json", "--site", "_site", "--entry", "_oak",
            "--page-size", "3", "[oak](/entry/oak)",
        ]);
        let Commands::Refs { graph, markdown } = cli.command else {
            panic!("expected refs");
        };
        assert_eq!(graph.entry.as_deref(), Some("_oak"));
        assert_eq!(graph.page_size, Some(3));
        assert_eq!(markdown, "[oak](/entry/oak)");
    }
}
