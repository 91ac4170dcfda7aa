//! fpb command-line client — entry point.
//!
//! ```text
//! fpb status                          Show device and slot state
//! fpb upload <file> [remote_dir]      Upload one file
//! fpb download <remote> [-o <path>]   Download one file
//! fpb upload-dir <dir> [remote_root]  Upload a folder tree
//! fpb inject <source.c> [options]     Compile and inject a patch
//! fpb --gen-config                    Dump default config and exit
//! ```
//!
//! Ctrl-C cancels the running session; the partial outcome is still reported.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fpb_core::{Category, HttpDeviceClient, InjectOptions, Workbench};

use fpb_cli::config::CliConfig;
use fpb_cli::connection::{DeviceSnapshot, probe};
use fpb_cli::console::{ConsoleOutput, ConsoleProgress, FileSource, StdinConfirm};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fpb", about = "File transfer and patch injection client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "fpb.toml")]
    config: PathBuf,

    /// Device server URL (overrides config). Example: http://127.0.0.1:5500
    #[arg(short, long)]
    base_url: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show connection and patch slot state.
    Status,
    /// Upload a single file.
    Upload {
        local: PathBuf,
        /// Remote directory (defaults to `transfer.remote_root`).
        remote_dir: Option<String>,
    },
    /// Download a single file.
    Download {
        remote: String,
        /// Local destination (defaults to the remote file name).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a folder and everything below it.
    UploadDir {
        local: PathBuf,
        /// Remote parent directory (defaults to `transfer.remote_root`).
        remote_root: Option<String>,
    },
    /// Compile a patch source and inject it.
    Inject {
        source: PathBuf,
        /// Function to replace; the server infers it when omitted.
        #[arg(short, long)]
        target_func: Option<String>,
        #[arg(long)]
        patch_mode: Option<String>,
        /// Patch slot to use.
        #[arg(long)]
        slot: Option<u32>,
        /// Overwrite occupied slots without asking.
        #[arg(short, long)]
        yes: bool,
        /// Inject only the target function instead of every marked one.
        #[arg(long)]
        single: bool,
    },
}

impl Command {
    fn category(&self) -> Option<Category> {
        match self {
            Command::Status => None,
            Command::Inject { .. } => Some(Category::Injection),
            _ => Some(Category::Transfer),
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = CliConfig::load(&cli.config);
    if let Some(url) = cli.base_url {
        config.device.base_url = url;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("fpb v{}", env!("CARGO_PKG_VERSION"));

    let Some(command) = cli.command else {
        error!("no command given; see --help");
        return Ok(ExitCode::FAILURE);
    };

    let client = HttpDeviceClient::new(&config.device.base_url, config.device.connect_timeout())?;
    info!("device server: {}", client.base_url());
    let snapshot = Arc::new(probe(&client, &config.device).await);

    let (source, assume_yes) = match &command {
        Command::Inject { source, yes, .. } => (
            FileSource(source.clone()),
            *yes || config.inject.assume_yes,
        ),
        _ => (FileSource(PathBuf::new()), config.inject.assume_yes),
    };
    let workbench = Workbench::new(
        Arc::new(client),
        snapshot.clone(),
        snapshot.clone(),
        Arc::new(StdinConfirm { assume_yes }),
        Arc::new(source),
        Arc::new(ConsoleOutput),
    );

    // ── Ctrl-C → cancel ─────────────────────────────────────────

    if let Some(category) = command.category() {
        let gate = workbench.gate();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if gate.cancel(category) {
                    warn!("cancelling {category}");
                }
            }
        });
    }

    let progress = ConsoleProgress;
    let remote_root = config.transfer.remote_root.clone();

    let ok = match command {
        Command::Status => {
            print_status(&snapshot);
            snapshot.connected
        }
        Command::Upload { local, remote_dir } => {
            let remote_dir = remote_dir.unwrap_or(remote_root);
            workbench
                .start_upload(&local, &remote_dir, &progress)
                .await
                .success
        }
        Command::Download { remote, output } => {
            let outcome = workbench.start_download(&remote, &progress).await;
            match (outcome.success, outcome.payload) {
                (true, Some(data)) => {
                    let dest = output.unwrap_or_else(|| default_download_path(&remote));
                    tokio::fs::write(&dest, &data).await?;
                    println!("wrote {} bytes to {}", data.len(), dest.display());
                    true
                }
                _ => false,
            }
        }
        Command::UploadDir { local, remote_root: root } => {
            let root = root.unwrap_or(remote_root);
            workbench
                .start_folder_upload(&local, &root, &progress)
                .await
                .success()
        }
        Command::Inject {
            target_func,
            patch_mode,
            slot,
            single,
            ..
        } => {
            let options = InjectOptions {
                target_func,
                patch_mode: patch_mode.unwrap_or_else(|| config.inject.patch_mode.clone()),
                inject_all: !single,
                slot,
            };
            workbench.start_injection(options, &progress).await.success
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_status(snapshot: &DeviceSnapshot) {
    if !snapshot.connected {
        println!("device: not connected");
        return;
    }
    println!(
        "device: connected{}",
        snapshot
            .port
            .as_deref()
            .map(|p| format!(" ({p})"))
            .unwrap_or_default()
    );
    println!(
        "slots:  {}/{} free",
        snapshot.free_slots, snapshot.total_slots
    );
}

/// Last path segment of `remote`, or `download.bin` for a bare directory.
fn default_download_path(remote: &str) -> PathBuf {
    remote
        .rsplit('/')
        .find(|s| !s.is_empty())
        .map(|name| Path::new(name).to_path_buf())
        .unwrap_or_else(|| PathBuf::from("download.bin"))
}
