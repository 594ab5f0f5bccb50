//! index-health CLI - check that Elasticsearch agrees with the WordPress database.

mod render;

use clap::{Parser, Subcommand};
use index_health::config::validate_settings;
use index_health::{
    Config, EntityType, HealthError, Orchestrator, ValidationProgress, ValidationRange,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "index-health")]
#[command(about = "Validate that the search index is consistent with the primary database")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    /// Override ids per window
    #[arg(long)]
    page_size: Option<i64>,

    /// Override number of windows or subtypes fetched at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare post and user counts
    ValidateCounts,

    /// Compare post counts per post type
    ValidatePostsCount,

    /// Compare user counts
    ValidateUsersCount,

    /// Compare document fields window by window
    ValidateContents {
        /// Entity to scan: post or user
        #[arg(long, default_value = "post")]
        entity: EntityType,

        /// First id to validate
        #[arg(long, default_value = "1")]
        start_id: i64,

        /// Last id to validate [default: current maximum id]
        #[arg(long)]
        last_id: Option<i64>,
    },

    /// Test database and search index connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, HealthError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Some(page_size) = cli.page_size {
        config.validation.page_size = page_size;
    }
    if let Some(concurrency) = cli.concurrency {
        config.validation.concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.validation.timeout_secs = timeout;
    }
    validate_settings(&config.validation)?;

    // Argument errors must surface before any connection is attempted.
    let range = match &cli.command {
        Commands::ValidateContents {
            entity,
            start_id,
            last_id,
        } => {
            config.entity(*entity)?;
            Some(ValidationRange::new(*start_id, *last_id)?)
        }
        _ => None,
    };

    let cancel_token = setup_signal_handler();
    let mut orchestrator = Orchestrator::connect(config)
        .await?
        .with_cancellation(cancel_token);

    let printer = if cli.progress {
        let (tx, rx) = mpsc::channel(64);
        orchestrator = orchestrator.with_progress(tx);
        Some(spawn_progress_printer(rx))
    } else {
        None
    };

    let code = match cli.command {
        Commands::ValidateCounts => {
            validate_counts(&orchestrator, &EntityType::ALL, cli.output_json).await?
        }

        Commands::ValidatePostsCount => {
            validate_counts(&orchestrator, &[EntityType::Post], cli.output_json).await?
        }

        Commands::ValidateUsersCount => {
            validate_counts(&orchestrator, &[EntityType::User], cli.output_json).await?
        }

        Commands::ValidateContents { entity, .. } => {
            // Checked above.
            let range = range.ok_or_else(|| HealthError::config("missing id range"))?;
            let report = orchestrator.run_content_validation(entity, range).await?;
            emit(cli.output_json, &report, render::content_lines(&report))?;
            render::exit_code(report.outcome())
        }

        Commands::HealthCheck => {
            let result = orchestrator.health_check().await;
            emit(cli.output_json, &result, render::health_lines(&result))?;
            if result.healthy {
                index_health::error::EXIT_SUCCESS
            } else {
                index_health::error::EXIT_STORE_ERROR
            }
        }
    };

    // Closes the progress channel so the printer can drain and exit.
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    Ok(code)
}

async fn validate_counts(
    orchestrator: &Orchestrator,
    entities: &[EntityType],
    json: bool,
) -> Result<u8, HealthError> {
    let report = orchestrator.run_count_validation(entities).await?;
    emit(json, &report, render::count_sections(entities, &report))?;
    Ok(render::exit_code(report.outcome()))
}

fn emit<T: Serialize>(json: bool, value: &T, lines: Vec<String>) -> Result<(), HealthError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(())
}

fn spawn_progress_printer(mut rx: mpsc::Receiver<ValidationProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            match serde_json::to_string(&progress) {
                Ok(line) => eprintln!("{}", line),
                Err(e) => error!("Failed to serialize progress: {}", e),
            }
        }
    })
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful cancellation.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to install {} handler: {}", name, e);
                    return;
                }
            };
            stream.recv().await;
            eprintln!(
                "\nReceived {}. Finishing the current window before stopping...",
                name
            );
            token.cancel();
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
            return;
        }
        eprintln!("\nReceived Ctrl-C. Finishing the current window before stopping...");
        token.cancel();
    });

    cancel_token
}
