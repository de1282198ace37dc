//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// PriceWatch - concurrent competitor-analysis stream aggregator
///
/// Fan out one analysis task per competitor URL, merge the live event
/// streams into a single tagged feed, and close it with exactly one
/// terminal record. Per-target failures become tagged error records and
/// never abort the other targets.
///
/// Examples:
///   pricewatch --target https://shop-a.example --target https://shop-b.example
///   pricewatch --input request.json --output feed.sse
///   echo '{"targets": ["https://shop-a.example"]}' | pricewatch --input -
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Competitor URL to analyze (repeatable)
    #[arg(short, long = "target", value_name = "URL")]
    pub targets: Vec<String>,

    /// Read a JSON request body {"targets": [...]} from FILE ("-" for stdin)
    #[arg(short, long, value_name = "FILE", conflicts_with = "targets")]
    pub input: Option<PathBuf>,

    /// Write the outbound event stream to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Analysis engine endpoint URL
    ///
    /// One streaming request is opened against this endpoint per target.
    #[arg(
        long,
        default_value = "http://localhost:8787/analyze",
        env = "PRICEWATCH_ENGINE_URL"
    )]
    pub engine_url: String,

    /// Connect timeout for the analysis engine, in seconds
    ///
    /// Bounds only the connection phase; a running analysis stream is
    /// never cut off by the aggregator.
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pricewatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Exit with code 2 if any target fails
    ///
    /// Useful for CI pipelines; the stream itself still completes normally.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if !self.engine_url.starts_with("http://") && !self.engine_url.starts_with("https://") {
            return Err("Engine URL must start with 'http://' or 'https://'".to_string());
        }

        if let Some(timeout) = self.connect_timeout {
            if timeout == 0 {
                return Err("Connect timeout must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
