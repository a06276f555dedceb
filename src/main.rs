use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use branch_manager::branches::{BranchService, ServiceSettings};
use branch_manager::config::Config;
use branch_manager::git::{ReadMode, SystemGit};
use branch_manager::logging;
use branch_manager::rest::{self, ApiDoc, ApiState};

/// Check that a git binary is on PATH
fn check_git_available() -> Result<PathBuf> {
    let path = which::which("git").context("git executable not found on PATH")?;
    tracing::debug!(path = %path.display(), "git available");
    Ok(path)
}

/// Print a helpful error message when git is missing
fn print_git_error(err: &anyhow::Error) {
    eprintln!("Error: {}", err);
    eprintln!();
    eprintln!("git is required to run branch-manager.");
    eprintln!();
    eprintln!("Install git:");
    eprintln!("  macOS:         brew install git");
    eprintln!("  Ubuntu/Debian: sudo apt install git");
    eprintln!("  Fedora/RHEL:   sudo dnf install git");
    eprintln!("  Arch:          sudo pacman -S git");
}

#[derive(Parser)]
#[command(name = "branch-manager")]
#[command(about = "Web service for browsing and cleaning up git branches")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Print local branches with their remote status
    Branches {
        /// Re-read git instead of trusting cached output
        #[arg(long)]
        fresh: bool,
    },

    /// Print the OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let created = Config::ensure_file(&config_path)?;
    let mut config = Config::load(&config_path)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let logging_handle = logging::init_logging(&config.logging, cli.debug)?;
    if created {
        tracing::info!(path = %config_path.display(), "Created default config file");
    }

    match cli.command {
        Some(Commands::Openapi) => cmd_openapi(),
        Some(Commands::Branches { fresh }) => {
            require_git()?;
            cmd_branches(&config, fresh).await
        }
        Some(Commands::Serve) | None => {
            require_git()?;
            cmd_serve(config, logging_handle.log_file_path.as_deref()).await
        }
    }
}

fn require_git() -> Result<()> {
    if let Err(e) = check_git_available() {
        print_git_error(&e);
        bail!("git is not available");
    }
    Ok(())
}

fn cmd_openapi() -> Result<()> {
    println!("{}", ApiDoc::json()?);
    Ok(())
}

async fn cmd_branches(config: &Config, fresh: bool) -> Result<()> {
    let service = BranchService::new(Arc::new(SystemGit), ServiceSettings::from_config(config));
    let mode = if fresh {
        ReadMode::Fresh
    } else {
        ReadMode::Cached
    };
    let branches = service
        .local_branches(mode)
        .await
        .context("Failed to list branches")?;

    println!("Branches in {} ({})", config.repository_path().display(), branches.len());
    println!("{}", "─".repeat(60));

    for branch in &branches {
        let marker = if branch.is_current { "*" } else { " " };
        let remote = if branch.has_remote { "" } else { "  [gone]" };
        println!("{} {}{}", marker, branch.name, remote);
    }

    Ok(())
}

async fn cmd_serve(config: Config, log_file: Option<&Path>) -> Result<()> {
    let repo = config.repository_path();
    if !repo.join(".git").exists() {
        tracing::warn!(path = %repo.display(), "Repository path does not look like a git work tree");
    }

    let port = config.port;
    println!("Starting branch manager...");
    println!("  Repository: {}", repo.display());
    println!("  Port:       {}", port);
    if let Some(dir) = config.static_path() {
        println!("  UI:         {}", dir.display());
    }
    if let Some(log_file) = log_file {
        println!("  Log file:   {}", log_file.display());
    }
    println!();

    let state = ApiState::new(config);
    rest::run(state, port).await
}
