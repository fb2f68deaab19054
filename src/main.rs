use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod controller;
mod ifctl;
mod rule;
mod singleton;
mod store;
mod window;

use controller::Controller;
use ifctl::SystemInterfaces;
use rule::Rule;
use store::RuleStore;

/// Network Curfew Daemon
///
/// Disables the host's network interfaces during a configured daily time
/// window and re-enables them outside it. The window may wrap midnight
/// (e.g. 22:00-06:00); equal start and end times mean no restriction.
#[derive(Parser, Debug)]
#[command(name = "netcurfew")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the default configuration and rule files
    Init,
    /// Run the curfew daemon in the foreground
    Run,
    /// Show the current rule and the decision for the current time
    Status,
    /// Set the blocking window (equal times clear the restriction)
    Set {
        /// Window start, HH:MM or HH:MM:SS
        #[arg(long)]
        start: String,

        /// Window end, HH:MM or HH:MM:SS
        #[arg(long)]
        end: String,
    },
    /// Dump the stored rule as JSON
    Show,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config::get_config_path()?,
    };

    match args.command {
        Commands::Init => cmd_init(&config_path),
        Commands::Run => cmd_run(&config_path),
        Commands::Status => cmd_status(&config_path),
        Commands::Set { start, end } => cmd_set(&config_path, &start, &end),
        Commands::Show => cmd_show(&config_path),
    }
}

/// Initialize logging
fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Resolve the rule file location from config, falling back to the platform
/// default
fn rule_store(config: &config::DaemonConfig) -> Result<RuleStore> {
    let path = match &config.rule_path {
        Some(path) => path.clone(),
        None => store::default_rule_path()?,
    };
    Ok(RuleStore::new(path))
}

/// Create the default configuration and rule files
fn cmd_init(config_path: &Path) -> Result<()> {
    let config = if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        config::load_config(config_path)?
    } else {
        let config = config::DaemonConfig::default();
        config::save_config(config_path, &config)?;
        println!("Created config: {}", config_path.display());
        config
    };

    let store = rule_store(&config)?;
    store.ensure_exists()?;
    println!("Rule file: {}", store.path().display());
    println!();
    println!("Next steps:");
    println!("  netcurfew set --start 22:00 --end 06:00");
    println!("  sudo netcurfew run");

    Ok(())
}

/// Run the daemon in the foreground
fn cmd_run(config_path: &Path) -> Result<()> {
    let config = config::load_or_default(config_path)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_daemon(config))
}

async fn run_daemon(config: config::DaemonConfig) -> Result<()> {
    info!("Starting netcurfew daemon");

    // One controller per host: later instance wins
    match singleton::terminate_rivals() {
        Ok(0) => {}
        Ok(n) => info!("Terminated {} rival instance(s)", n),
        Err(e) => warn!("Singleton check failed: {:#}", e),
    }

    let store = Arc::new(rule_store(&config)?);
    store
        .ensure_exists()
        .context("Failed to materialize rule file")?;

    let initial_rule = store.load();
    let interfaces = Arc::new(SystemInterfaces::new(config.exclude.clone()));

    let controller = Controller::new(
        initial_rule,
        store.clone(),
        interfaces,
        config.tick_interval(),
        config.watch_interval(),
    );
    controller.start().await;

    tokio::spawn(store::run_materializer(store, config.watch_interval()));

    // Enforcement and watching run in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

/// Show the current rule and decision
fn cmd_status(config_path: &Path) -> Result<()> {
    let config = config::load_or_default(config_path)?;
    let store = rule_store(&config)?;
    let rule = store.load();

    println!("Network Curfew Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Rule file:  {}", store.path().display());
    println!("Window:     {} - {}", rule.start, rule.end);

    if rule.is_sentinel() {
        println!("Status:     no restriction configured");
    } else {
        let now = window::local_now();
        let blocking = window::should_block(rule, now);
        println!("Time now:   {}", now.format("%H:%M:%S"));
        println!(
            "Status:     {}",
            if blocking {
                "BLOCKING (interfaces disabled while the daemon runs)"
            } else {
                "allowing"
            }
        );
    }

    Ok(())
}

/// Atomically rewrite the stored rule (the external writer path)
fn cmd_set(config_path: &Path, start: &str, end: &str) -> Result<()> {
    let start = parse_time(start).context("Invalid --start time")?;
    let end = parse_time(end).context("Invalid --end time")?;

    let config = config::load_or_default(config_path)?;
    let store = rule_store(&config)?;

    let rule = Rule::new(start, end);
    store.save(&rule)?;

    if rule.is_sentinel() {
        println!("✓ Restriction cleared (start equals end)");
    } else {
        println!("✓ Blocking window set: {} - {}", rule.start, rule.end);
        if rule.start > rule.end {
            println!("  (window wraps midnight)");
        }
    }

    Ok(())
}

/// Dump the stored rule as JSON
fn cmd_show(config_path: &Path) -> Result<()> {
    let config = config::load_or_default(config_path)?;
    let store = rule_store(&config)?;
    let rule = store.load();

    println!("{}", serde_json::to_string_pretty(&rule)?);
    Ok(())
}

/// Parse a time-of-day argument as HH:MM:SS or HH:MM
fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("Expected HH:MM or HH:MM:SS, got '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_both_formats() {
        assert_eq!(
            parse_time("22:00:00").unwrap(),
            NaiveTime::from_hms_opt(22, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("06:30").unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
    }

    #[test]
    fn parse_time_rejects_garbage() {
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("noon").is_err());
        assert!(parse_time("").is_err());
    }

    #[test]
    fn cli_parses_set_command() {
        let args = Args::parse_from(["netcurfew", "set", "--start", "22:00", "--end", "06:00"]);
        match args.command {
            Commands::Set { start, end } => {
                assert_eq!(start, "22:00");
                assert_eq!(end, "06:00");
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn cli_verbose_flag_is_global() {
        let args = Args::parse_from(["netcurfew", "status", "--verbose"]);
        assert!(args.verbose);
    }
}
