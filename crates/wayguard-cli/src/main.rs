//! `wayguard` – command line front end for the hazard engine.
//!
//! ```text
//! wayguard replay <scenario.jsonl> [--json]   run a recorded scenario
//! wayguard schema                             print the backend payload JSON Schema
//! wayguard config [--init]                    show (or write) ~/.wayguard/config.toml
//! ```
//!
//! Ctrl-C stops a running replay after the current tick; remaining markers
//! are torn down before exit.

mod config;
mod replay;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

const ENV_HELP: &str = "\
Environment:
  WAYGUARD_CONE_DEG, WAYGUARD_MAX_HAZARDS, WAYGUARD_EVICT_S,
  WAYGUARD_DETECT_INTERVAL_S, WAYGUARD_LOG_FORMAT=json, RUST_LOG";

/// WayGuard hazard fusion & prioritization engine
#[derive(Parser, Debug)]
#[command(name = "wayguard")]
#[command(version, after_help = ENV_HELP)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run a recorded JSON Lines scenario through the engine
    Replay {
        /// Scenario file, one frame record per line
        path: PathBuf,
        /// Print bus events as JSON Lines instead of the coloured summary
        #[arg(long)]
        json: bool,
    },
    /// Print the JSON Schema of the backend confirmation payload
    Schema,
    /// Show the effective configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = wayguard_runtime::init_tracing("wayguard");

    let result = match cli.command {
        Command::Replay { path, json } => cmd_replay(&path, json),
        Command::Schema => cmd_schema(),
        Command::Config { init } => cmd_config(init),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_replay(path: &Path, json: bool) -> Result<(), String> {
    let cfg = config::load_or_default()?;
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping replay …".yellow().bold());
        stop_handler.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; replay cannot be interrupted cleanly");
    }

    if !json {
        print_banner();
        println!("  Replaying {}\n", path.display().to_string().bold());
    }

    let mut stdout = std::io::stdout().lock();
    let summary = replay::run(BufReader::new(file), cfg.engine, &stop, json, &mut stdout)?;
    info!(
        ticks = summary.ticks,
        detector_runs = summary.detector_runs,
        throttled = summary.throttled,
        removals = summary.removals,
        interrupted = summary.interrupted,
        "replay finished"
    );

    if !json {
        println!();
        println!(
            "  {} ticks, {} detector runs ({} throttled), {} removals, at most {} hazards shown",
            summary.ticks,
            summary.detector_runs,
            summary.throttled,
            summary.removals,
            summary.max_visible
        );
        if summary.interrupted {
            println!("  {}", "Interrupted.".yellow());
        }
    }
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = wayguard_perception::backend::backend_schema();
    let pretty = serde_json::to_string_pretty(&schema).map_err(|e| e.to_string())?;
    println!("{pretty}");
    Ok(())
}

fn cmd_config(init: bool) -> Result<(), String> {
    let path = config::config_path();
    if init {
        if path.exists() {
            return Err(format!("{} already exists", path.display()));
        }
        config::save(&config::Config::default())?;
        println!(
            "  {} Config written to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        );
        return Ok(());
    }

    let cfg = match config::load()? {
        Some(cfg) => {
            println!("  # {}", path.display().to_string().dimmed());
            cfg
        }
        None => {
            println!(
                "  # {} (not found, showing defaults)",
                path.display().to_string().dimmed()
            );
            config::load_or_default()?
        }
    };
    let raw = toml::to_string_pretty(&cfg).map_err(|e| format!("Failed to serialize config: {e}"))?;
    println!("{raw}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "WayGuard".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Hazard fusion & prioritization engine");
    println!();
}
