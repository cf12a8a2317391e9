mod bridge;
mod daemon;
mod ipc;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use xpanel_core::ConfigPaths;

#[derive(Parser)]
#[command(name = "xpanel")]
#[command(about = "Touch-free menu screen for the robot head display")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $XDG_CONFIG_HOME/xpanel/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the panel daemon (default)
    Run,
    /// Validate settings and menu configuration, then exit
    Check,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xpanel=info".parse()?)
                .add_directive("xpanel_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let paths = ConfigPaths::new();
    let settings_path = cli.settings.unwrap_or_else(|| paths.settings.clone());

    match cli.command {
        Some(Command::Run) | None => {
            info!("Starting xpanel with {:?}", settings_path);
            let code = daemon::run(&settings_path, &paths)?;
            std::process::exit(code);
        }
        Some(Command::Check) => daemon::check(&settings_path),
    }
}
