use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use time::{format_description::well_known, OffsetDateTime};
use tracing_subscriber::EnvFilter;

use host_watch_rs::config;
use host_watch_rs::log::{EventSink, MemorySink, TracingSink};
use host_watch_rs::render::Dashboard;
use host_watch_rs::runner::{self, RoundOptions};
use host_watch_rs::store::ResultStore;
use host_watch_rs::types::{RoundReport, Target};
use host_watch_rs::validate::{validate_target, Validation};

/// host-watch-rs — ICMP liveness and TCP/HTTP port checks for a declared
/// server list, rendered as a live terminal dashboard.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "host-watch-rs",
    version,
    about = "ICMP liveness and TCP/HTTP port checks for a declared server list, rendered as a live terminal dashboard.",
    long_about = None
)]
struct Cli {
    /// TOML server list. Defaults to ~/.config/host-watch/servers.toml.
    #[arg(long = "toml-file", short = 't')]
    toml_file: Option<PathBuf>,

    /// Per-attempt probe timeout in seconds; 0 means effectively never.
    #[arg(long, short = 'T', default_value_t = 4)]
    timeout: u64,

    /// Max concurrently running probes.
    #[arg(long = "max-in-flight", default_value_t = 64)]
    max_in_flight: usize,

    /// Write a scaffold server list to this path and exit.
    #[arg(long = "new", short = 'N')]
    new: Option<PathBuf>,

    /// Replay the round's event log after the final draw.
    #[arg(long = "print-log", short = 'v', default_value_t = false)]
    print_log: bool,

    /// Write the round's event log to this file.
    #[arg(long = "output-log", short = 'o')]
    output_log: Option<PathBuf>,

    /// Draw the dashboard on stderr instead of stdout.
    #[arg(long, default_value_t = false)]
    stderr: bool,

    /// Write the final snapshot as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Some(path) = cli.new.as_deref() {
        config::write_scaffold(path, config::SCAFFOLD_BLOCKS)?;
        println!("wrote scaffold server list to {}", path.display());
        return Ok(());
    }

    if cli.timeout < 2 && cli.timeout != 0 {
        bail!("timeout cannot be shorter than 2 seconds");
    }
    // 0 disables the timeout in practice.
    let timeout_secs = if cli.timeout == 0 { 999 } else { cli.timeout };

    let toml_path = match cli.toml_file.clone() {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let raw_targets = config::load_targets(&toml_path)
        .with_context(|| format!("failed to load server list {}", toml_path.display()))?;

    // Capture events in memory when they are replayed or dumped later;
    // otherwise emit them live through tracing.
    let memory = if cli.print_log || cli.output_log.is_some() {
        Some(Arc::new(MemorySink::new()))
    } else {
        None
    };
    let sink: Arc<dyn EventSink> = match memory.clone() {
        Some(memory) => memory,
        None => Arc::new(TracingSink),
    };

    let mut targets: Vec<Target> = Vec::new();
    for raw in &raw_targets {
        match validate_target(raw) {
            Validation::Ready(target) => {
                sink.write(&format!("[main]: {} validated", target.name));
                targets.push(target);
            }
            Validation::Degraded { target, reason } => {
                sink.error(&format!(
                    "[main]: {}: {reason}; scanning disabled",
                    target.name
                ));
                targets.push(target);
            }
            Validation::Skipped { name, reason } => {
                sink.error(&format!("[main]: {name}: {reason}; skipping"));
            }
        }
    }

    let store = ResultStore::new();
    let opts = RoundOptions {
        timeout: Duration::from_secs(timeout_secs),
        max_in_flight: cli.max_in_flight,
    };
    let out: Box<dyn Write> = if cli.stderr {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };
    let mut dashboard = Dashboard::new(out);
    runner::run_round(&store, &sink, &mut dashboard, targets, &opts).await?;

    if let Some(memory) = memory {
        if cli.print_log {
            print!("{}", memory.replay());
        }
        if let Some(path) = cli.output_log.as_deref() {
            std::fs::write(path, memory.render())
                .with_context(|| format!("failed to write log to {}", path.display()))?;
            println!("log written to {}", path.display());
        }
    }

    if let Some(path) = cli.output.as_deref() {
        let report = RoundReport {
            generated_at: now_rfc3339(),
            timeout_secs,
            targets: store.snapshot().await,
        };
        let file = File::create(path)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        println!("wrote JSON results to {}", path.display());
    }

    Ok(())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
