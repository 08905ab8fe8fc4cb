use anyhow::Context;
use clap::Parser;
use errwatch::alerts::build_notifier;
use errwatch::config::{Settings, SourceRegistry};
use errwatch::LogWatcher;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command-line arguments for the log error watcher
#[derive(Parser)]
#[command(
    name = "errwatch",
    about = "Tail log files and report same-day errors in periodic batches",
    long_about = "Follows every log file listed in a CSV source table, picks out lines that \
                  mention an error and carry today's date, and sends them as one report per \
                  flush interval. Pending errors are flushed once more on Ctrl+C."
)]
struct Cli {
    /// Path to settings file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Settings file path (TOML format, defaults to errwatch.toml if present)"
    )]
    config: Option<PathBuf>,

    /// Path to the source table
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "CSV table with MainPath and FilePath columns (overrides the settings file)"
    )]
    sources: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        for (label, path) in [("Settings", &self.config), ("Source table", &self.sources)] {
            if let Some(path) = path {
                if path.exists() && !path.is_file() {
                    return Err(format!("{} path is not a file: {}", label, path.display()));
                }
            }
        }

        if let Some(sources) = &self.sources {
            if sources.extension().map_or(true, |ext| ext != "csv") {
                warn!(
                    "Source table does not have .csv extension: {}",
                    sources.display()
                );
            }
        }

        Ok(())
    }
}

/// Load settings and the source table, then wire up the watcher
fn build_watcher(cli: &Cli) -> anyhow::Result<LogWatcher> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(sources) = &cli.sources {
        settings.sources_file = sources.clone();
    }

    let registry = SourceRegistry::from_csv(&settings.sources_file).with_context(|| {
        format!(
            "Failed to load source table {}",
            settings.sources_file.display()
        )
    })?;
    info!(
        "Loaded {} log files from {}",
        registry.paths().len(),
        settings.sources_file.display()
    );

    let notifier = build_notifier(&settings.notifier).context("Failed to create notifier")?;

    Ok(LogWatcher::from_settings(
        &settings,
        registry.paths(),
        notifier,
    ))
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting errwatch");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let watcher = match build_watcher(&cli) {
        Ok(watcher) => watcher,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        flag.store(true, Ordering::SeqCst);
    }) {
        error!("Failed to set SIGINT handler: {}", e);
        std::process::exit(1);
    }

    info!("errwatch is running. Press Ctrl+C to stop.");

    let stats = watcher.run(&shutdown);

    info!(
        "errwatch shutdown complete ({} errors detected, {} reported)",
        stats.errors_detected, stats.records_delivered
    );
}
