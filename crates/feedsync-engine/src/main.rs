//! Feedsync - feed synchronization runner

use anyhow::Result;
use clap::Parser;
use feedsync_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use feedsync_engine::progress::create_sync_progress;
use feedsync_engine::{SyncConfig, SyncEngine};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "feedsync")]
#[command(author, version, about = "Synchronize a supplier product feed into a catalog")]
struct Cli {
    /// Records per batch (overrides FEEDSYNC_BATCH_SIZE)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Search the destination but skip all writes
    #[arg(long)]
    dry_run: bool,

    /// Suppress the progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbose flag; console logs go to stderr
    // so the report on stdout stays machine-readable
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("feedsync".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    let mut config = SyncConfig::from_env()?;
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
        config.validate()?;
    }

    let engine = if cli.dry_run {
        info!("Dry run: destination writes are disabled");
        SyncEngine::new_dry_run(config)?
    } else {
        SyncEngine::new(config)?
    };

    let bar_task = if cli.quiet {
        None
    } else {
        let mut events = engine.subscribe();
        Some(tokio::spawn(async move {
            let mut bar = None;
            while let Some(event) = events.recv().await {
                let bar = bar.get_or_insert_with(|| create_sync_progress(event.total));
                bar.set_position(event.processed);
                bar.set_message(event.current_sku.clone());
            }
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
        }))
    };

    let report = engine.run().await?;

    if let Some(task) = bar_task {
        // The progress stream closes when the run ends
        task.await.ok();
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(
        created = report.stats.created,
        updated = report.stats.updated,
        ignored = report.stats.ignored,
        errors = report.stats.errors,
        "Synchronization complete"
    );
    Ok(())
}
