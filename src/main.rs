// Safe Commenter - Main Entry Point
//
// - CLI interface
// - Configuration and logging setup
// - Comment pipeline wiring with a dry-run console adapter
// - Graceful shutdown of pending admission waits

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use safe_commenter::bot::{
    run_posts, ChannelFilter, CommentPipeline, ConsolePublisher, TemplateGenerator,
};
use safe_commenter::config::Config;
use safe_commenter::rate_limit::AdmissionController;
use safe_commenter::{logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Safe Commenter: rate-limited channel auto-commenter
#[derive(Parser, Debug)]
#[command(name = "safe-commenter")]
#[command(author = "Safe Commenter Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Channel auto-commenter with hourly and daily rate limits", long_about = None)]
struct Args {
    /// Enable verbose logging (also logs every admission decision)
    #[arg(short, long)]
    verbose: bool,

    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read posts as JSON lines from stdin and print replies to stdout
    Run {
        /// Print Prometheus metrics to stderr on exit
        #[arg(long)]
        print_metrics: bool,
    },
    /// Show the effective rate limits
    Limits,
    /// Load and validate the configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.verbose {
        config.rate_limit.verbose = true;
    }

    logging::init(&config.logging, args.verbose)?;

    match args.command {
        Some(Commands::Run { print_metrics }) => {
            info!("Starting Safe Commenter v0.1.0...");
            if run(config, print_metrics).await? {
                // The stdin reader thread may still be blocked; do not wait for it
                std::process::exit(0);
            }
        }
        Some(Commands::Limits) => {
            print_limits(&config);
        }
        Some(Commands::CheckConfig) => {
            println!("Configuration OK");
        }
        None => {
            info!("No command specified. Use \"safe-commenter --help\" for usage.");
        }
    }

    Ok(())
}

/// Process posts from stdin until EOF or Ctrl-C
///
/// Returns `true` when the run ended because of a shutdown signal.
async fn run(config: Config, print_metrics: bool) -> Result<bool> {
    if let Err(e) = metrics::init() {
        warn!(error = %e, "Metrics registry already initialized");
    }

    info!(
        per_hour = config.rate_limit.short_window_capacity,
        per_day = config.rate_limit.long_window_capacity,
        "Rate limits configured"
    );

    let filter = ChannelFilter::new(&config.bot.channels)
        .context("Set TARGET_CHANNEL or bot.channels to the channel ids to monitor")?;
    info!("Monitoring {} channel(s)", filter.len());

    let shutdown = CancellationToken::new();
    let limiter = Arc::new(
        AdmissionController::with_shutdown(config.rate_limit.clone(), shutdown.clone())
            .context("Invalid rate limit configuration")?,
    );

    let pipeline = CommentPipeline::new(
        filter,
        Arc::clone(&limiter),
        Arc::new(TemplateGenerator::new(config.bot.reply_template.clone())),
        Arc::new(ConsolePublisher::new(tokio::io::stdout())),
    )
    .with_fallback_comment(config.bot.fallback_comment.clone());

    tokio::spawn(shutdown_signal(shutdown.clone()));

    info!("Bot is running. Press Ctrl+C to stop.");
    let summary = run_posts(BufReader::new(tokio::io::stdin()), &pipeline, shutdown.clone()).await?;

    let status = limiter.status().await;
    info!(
        received = summary.received,
        published = summary.published,
        failed = summary.failed,
        ignored = summary.ignored,
        skipped = summary.skipped,
        malformed = summary.malformed,
        short_count = status.short.count,
        short_utilization_pct = status.short.utilization_percent(),
        long_count = status.long.count,
        long_utilization_pct = status.long.utilization_percent(),
        slot_free = status.has_free_slot(),
        "Run finished"
    );

    if print_metrics {
        eprintln!("{}", metrics::gather_metrics()?);
    }

    Ok(shutdown.is_cancelled())
}

/// Cancel pending work on Ctrl-C or SIGTERM
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}

fn print_limits(config: &Config) {
    let limits = &config.rate_limit;
    println!(
        "short window: {} per {}s",
        limits.short_window_capacity, limits.short_window_secs
    );
    println!(
        "long window: {} per {}s",
        limits.long_window_capacity, limits.long_window_secs
    );
    match limits.max_wait_secs {
        Some(secs) => println!("max wait: {}s", secs),
        None => println!("max wait: unlimited"),
    }
    println!("verbose: {}", limits.verbose);
    if config.bot.channels.is_empty() {
        println!("channels: (none)");
    } else {
        println!("channels: {}", config.bot.channels.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["safe-commenter", "--verbose", "run"]);
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Some(Commands::Run {
                print_metrics: false
            })
        ));
    }

    #[test]
    fn test_args_config_path() {
        let args = Args::parse_from(["safe-commenter", "--config", "custom.toml", "limits"]);
        assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(args.command, Some(Commands::Limits)));
    }
}
