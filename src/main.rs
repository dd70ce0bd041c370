use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paneguard::app::Config;
use paneguard::cmd;
use paneguard::verdict::Risk;

#[derive(Parser)]
#[command(name = "paneguard")]
#[command(version, about = "Supervisor for tmux panes running CLI AI agents")]
struct Cli {
    /// Path to config file
    #[arg(short = 'f', long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Write debug logs to paneguard.log
    #[arg(short, long, global = true)]
    debug: bool,

    /// More logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show config file path and exit
    #[arg(long)]
    show_config_path: bool,

    /// Generate the default config file and exit
    #[arg(long)]
    init_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every pane once and print verdicts
    Scan {
        /// Print verdicts as a JSON array
        #[arg(long)]
        json: bool,

        /// Include captured pane content in each verdict
        #[arg(long)]
        content: bool,

        /// Session-name filter regex
        #[arg(short = 'F', long, value_name = "REGEX")]
        filter: Option<String>,

        /// Concurrent pane evaluations
        #[arg(short, long, value_name = "N")]
        parallel: Option<usize>,
    },
    /// Scan continuously, optionally ingesting events and auto-nudging
    Watch {
        /// Interval between scans in milliseconds
        #[arg(short, long, value_name = "MS")]
        interval: Option<u64>,

        /// Accept hook-push events on the local socket
        #[arg(short, long)]
        events: bool,

        /// Build verdicts from events alone, never polling tmux
        #[arg(long)]
        events_only: bool,

        /// Dispatch recommended actions automatically
        #[arg(short, long)]
        auto_nudge: bool,

        /// Risk ceiling for auto-nudge
        #[arg(long, value_name = "low|medium|high")]
        max_risk: Option<String>,

        /// Session-name filter regex
        #[arg(short = 'F', long, value_name = "REGEX")]
        filter: Option<String>,
    },
    /// Send a key sequence to one pane
    Nudge {
        /// Target pane (session:window.pane)
        target: String,

        /// Key string: literal text, or space-separated key tokens with --raw
        keys: String,

        /// Send as individual keypresses for a raw-mode TUI
        #[arg(short, long)]
        raw: bool,
    },
    /// Listen for hook-push events and print them
    Events {
        /// Only show events waiting on a human
        #[arg(short, long)]
        attention: bool,
    },
}

fn setup_logging(debug: bool, verbose: bool) -> Result<()> {
    if debug {
        let log_file = std::fs::File::create("paneguard.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(log_file)
            .with_ansi(false);
        tracing_subscriber::registry()
            .with(file_layer)
            .with(tracing_subscriber::filter::LevelFilter::DEBUG)
            .init();
    } else {
        let default_level = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config_path {
        match Config::default_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("config directory not found"),
        }
        return Ok(());
    }

    if cli.init_config {
        let config = Config::default();
        config.save()?;
        if let Some(path) = Config::default_path() {
            println!("config file created: {}", path.display());
        }
        return Ok(());
    }

    setup_logging(cli.debug, cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path).unwrap_or_else(|e| {
            eprintln!("failed to load config: {e:#}");
            std::process::exit(1);
        }),
        None => Config::load(),
    };
    config.verbose = config.verbose || cli.verbose;

    match cli.command {
        Some(Commands::Scan {
            json,
            content,
            filter,
            parallel,
        }) => {
            if filter.is_some() {
                config.filter = filter;
            }
            if let Some(parallel) = parallel {
                config.parallel = parallel;
            }
            fatal_on_invalid(&config);
            cmd::run_scan(&config, json, content).await
        }
        Some(Commands::Watch {
            interval,
            events,
            events_only,
            auto_nudge,
            max_risk,
            filter,
        }) => {
            if let Some(interval) = interval {
                config.refresh_interval_ms = interval;
            }
            if filter.is_some() {
                config.filter = filter;
            }
            if auto_nudge {
                config.auto_nudge = true;
            }
            if let Some(raw) = max_risk {
                let risk = Risk::parse(&raw);
                if risk == Risk::Unspecified {
                    eprintln!("invalid --max-risk {raw:?}: use low, medium, or high");
                    std::process::exit(1);
                }
                config.auto_nudge_max_risk = risk;
            }
            fatal_on_invalid(&config);
            cmd::run_watch(&config, events, events_only).await
        }
        Some(Commands::Nudge { target, keys, raw }) => cmd::run_nudge(&target, &keys, raw).await,
        Some(Commands::Events { attention }) => {
            fatal_on_invalid(&config);
            cmd::run_events(&config, attention).await
        }
        None => {
            fatal_on_invalid(&config);
            cmd::run_scan(&config, false, false).await
        }
    }
}

fn fatal_on_invalid(config: &Config) {
    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e:#}");
        std::process::exit(1);
    }
}
