mod analyze;
mod followers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ghostwatch")]
#[command(about = "Instagram follower checkpoints and ghost-follower analysis")]
struct Cli {
    /// Account to operate on (defaults to `INSTAGRAM_USERNAME`)
    #[arg(long, global = true)]
    target: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Score followers against engagement data and export ghost reports
    Analyze {
        /// Score below which a follower counts as a ghost
        #[arg(long)]
        threshold: Option<f64>,
        /// Follower snapshot to use instead of the latest checkpoint
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print follower statistics
    Stats {
        /// Follower snapshot to use instead of the latest checkpoint
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print preliminary follower categories
    Categorize {
        /// Follower snapshot to use instead of the latest checkpoint
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Merge checkpoints and snapshot files into one follower file
    Merge {
        /// Snapshot files to merge
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,
        /// Also merge the latest checkpoint of every stored session
        #[arg(long)]
        all_sessions: bool,
        /// File name written under the target's follower directory
        #[arg(long)]
        output: Option<String>,
    },
    /// List stored checkpoint sessions
    Checkpoints,
    /// Write simulated engagement source files for testing
    #[cfg(feature = "fixtures")]
    Simulate {
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ghostwatch_core::load_app_config_from_env()?;
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let target = config.resolve_target(cli.target.as_deref())?;

    match cli.command {
        Commands::Analyze {
            threshold,
            snapshot,
        } => analyze::run_analyze(&config, &target, threshold, snapshot.as_deref()),
        Commands::Stats { snapshot } => {
            followers::run_stats(&config, &target, snapshot.as_deref())
        }
        Commands::Categorize { snapshot } => {
            followers::run_categorize(&config, &target, snapshot.as_deref())
        }
        Commands::Merge {
            inputs,
            all_sessions,
            output,
        } => followers::run_merge(&config, &target, &inputs, all_sessions, output.as_deref())
            .map(|_| ()),
        Commands::Checkpoints => followers::run_checkpoints(&config, &target),
        #[cfg(feature = "fixtures")]
        Commands::Simulate { seed } => analyze::run_simulate(&config, &target, seed),
    }
}
