//! PriceWatch - Concurrent Competitor-Analysis Stream Aggregator
//!
//! A CLI tool that fans one analysis task out per competitor URL, merges
//! the live event streams into a single tagged SSE feed, and finishes with
//! exactly one terminal record.
//!
//! Exit codes:
//!   0 - Success (stream completed; targets may still have failed)
//!   1 - Runtime error (invalid input, config, sink failure, etc.)
//!   2 - --fail-on-error set and at least one target failed

use anyhow::{Context, Result};
use pricewatch::cli::Args;
use pricewatch::config::Config;
use pricewatch::dispatch::{parse_targets, Dispatcher};
use pricewatch::producer::HttpProducerFactory;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&args);

    info!("PriceWatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the aggregation
    match run_stream(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Aggregation failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so they never interleave with an event stream on
/// stdout.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete aggregation workflow. Returns exit code (0 or 2).
async fn run_stream(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Resolve the target list
    let targets = resolve_targets(&args).await?;

    eprintln!("📡 Aggregating {} analysis streams", targets.len());
    eprintln!("   Engine: {}", config.engine.url);

    // Step 2: Wire the dispatcher to the analysis engine
    let factory = Arc::new(HttpProducerFactory::new(
        config.engine.url.clone(),
        Duration::from_secs(config.engine.connect_timeout_seconds),
    ));
    let dispatcher = Dispatcher::new(factory);

    // Step 3: Propagate ctrl-c to every running worker
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping workers");
                cancel.cancel();
            }
        });
    }

    // Step 4: Run the aggregation against the chosen sink
    let summary = match args.output {
        Some(ref path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            dispatcher.run(targets, file, cancel).await?
        }
        None => dispatcher.run(targets, tokio::io::stdout(), cancel).await?,
    };

    // Print summary
    eprintln!("\n📊 Aggregation Summary:");
    eprintln!(
        "   Targets: {} | ✅ Completed: {} | ❌ Failed: {}",
        summary.targets, summary.completed, summary.failed
    );

    if config.general.fail_on_error && summary.failed > 0 {
        eprintln!(
            "\n⛔ {} target(s) failed. Failing (exit code 2).",
            summary.failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Resolve the target list from --target flags or a JSON request body.
async fn resolve_targets(args: &Args) -> Result<Vec<String>> {
    if let Some(ref input) = args.input {
        let body = if input.as_os_str() == "-" {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read request body from stdin")?;
            buf
        } else {
            tokio::fs::read_to_string(input)
                .await
                .with_context(|| format!("Failed to read request body: {}", input.display()))?
        };

        Ok(parse_targets(&body)?)
    } else {
        Ok(args.targets.clone())
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .pricewatch.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
