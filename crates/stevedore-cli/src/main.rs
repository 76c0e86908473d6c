#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "stevedore")]
#[command(author, version, about = "Install packages into a sandboxed dev environment and restart its dev server", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit the progress stream as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Sandbox application directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install packages that are not yet in the manifest, then restart
    /// the dev server
    Install {
        /// Packages to install (e.g. "axios@1.2.0", "@types/node")
        #[arg(required = true)]
        packages: Vec<String>,

        /// Package manager binary to drive
        #[arg(long, default_value = "pnpm")]
        pm: String,

        /// Timeout for a single install attempt, in seconds
        #[arg(long, value_name = "SECS", default_value_t = 120)]
        install_timeout: u64,

        /// Timeout for the lockfile refresh, in seconds
        #[arg(long, value_name = "SECS", default_value_t = 180)]
        refresh_timeout: u64,

        /// Budget for the whole install phase, in seconds
        #[arg(long, value_name = "SECS", default_value_t = 300)]
        overall_timeout: u64,

        /// Command used to launch the dev server
        #[arg(long, value_name = "CMD", default_value = "npm run dev")]
        server_cmd: String,

        /// Location of the dev-server pid record
        #[arg(long, value_name = "PATH")]
        pid_file: Option<PathBuf>,

        /// Pattern for the dev-server process sweep
        #[arg(long, default_value = "vite")]
        kill_pattern: String,

        /// Leave the dev server alone (caller owns its lifecycle)
        #[arg(long)]
        skip_restart: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Install {
            packages,
            pm,
            install_timeout,
            refresh_timeout,
            overall_timeout,
            server_cmd,
            pid_file,
            kill_pattern,
            skip_restart,
        } => commands::install::run(commands::install::InstallAction {
            packages,
            cwd,
            json: cli.json,
            package_manager: pm,
            install_timeout: Duration::from_secs(install_timeout),
            refresh_timeout: Duration::from_secs(refresh_timeout),
            overall_timeout: Duration::from_secs(overall_timeout),
            server_cmd,
            pid_file,
            kill_pattern,
            skip_restart,
        }),
    }
}
