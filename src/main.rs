use std::io::{Write, stdout};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use procsight::config::{Config, load_config, load_config_from_path};
use procsight::system::collector::Collector;
use procsight::system::semaphores::list_named_semaphores;
use procsight::system::sweep::SweepControl;

#[derive(Parser)]
#[command(
    name = "procsight",
    about = "Process CPU usage and open resource introspection"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root of the proc filesystem
    #[arg(long, global = true)]
    proc_root: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Abort full-system sweeps after this many milliseconds
    #[arg(long, global = true)]
    deadline_ms: Option<u64>,

    /// Print single-line JSON
    #[arg(long, global = true, default_value_t = false)]
    compact: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Per-process status, memory and CPU usage (stateful protocol)
    Snapshot,
    /// CPU usage from two paired snapshots (stateless protocol)
    Cpu,
    /// Open descriptors of one process, or of every process
    Resources {
        #[arg(long)]
        pid: Option<u32>,
    },
    /// System-wide connection table keyed by inode
    Sockets,
    /// Named POSIX semaphores in the shared-memory directory
    Semaphores,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.log_json);
    let config = load_config_for_cli(&cli);

    let mut collector = Collector::from_config(&config);
    let control = SweepControl::with_timeout(config.general.sweep_deadline());

    match cli.command {
        Command::Snapshot => {
            // The first tick only seeds the sampler.
            collector.refresh(&control)?;
            std::thread::sleep(config.general.sample_interval());
            let snapshot = collector.refresh(&control.rearm())?;
            print_json(&snapshot, cli.compact)
        }
        Command::Cpu => {
            let usages = collector.paired_usages(config.general.sample_interval(), &control)?;
            print_json(&usages, cli.compact)
        }
        Command::Resources { pid: Some(pid) } => {
            let report = collector.open_resources(pid)?;
            print_json(&report, cli.compact)
        }
        Command::Resources { pid: None } => {
            let sweep = collector.open_resources_all(&control)?;
            print_json(&sweep, cli.compact)
        }
        Command::Sockets => print_json(&collector.socket_table(), cli.compact),
        Command::Semaphores => {
            let semaphores = list_named_semaphores(&config.resources.shm_dir)?;
            print_json(&semaphores, cli.compact)
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(ref root) = cli.proc_root {
        config.general.proc_root = root.clone();
    }
    if let Some(ms) = cli.interval_ms {
        config.general.sample_interval_ms = ms;
    }
    if let Some(ms) = cli.deadline_ms {
        config.general.sweep_deadline_ms = ms;
    }

    config
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    let mut out = stdout().lock();
    writeln!(out, "{json}").map_err(|e| eyre!("failed to write output: {e}"))?;
    Ok(())
}
