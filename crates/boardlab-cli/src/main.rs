use anyhow::Context;
use boardlab_broker::Broker;
use boardlab_cache::CommandCache;
use boardlab_exec::options::PROJECT_DIR;
use boardlab_exec::{Toolchain, ToolchainOptions};
use boardlab_registry::GithubReleases;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const REGISTRY_OWNER: &str = "boardlab";
const REGISTRY_REPO: &str = "boardctl";

#[derive(Parser)]
#[command(name = "boardlab")]
#[command(about = "BoardLab toolchain bridge", long_about = None)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Pass --verbose to the toolchain
    #[arg(long, global = true)]
    verbose: bool,

    /// Enable toolchain debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Give up waiting on an operation after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List published toolchain releases
    Releases,
    /// Platform catalog operations
    #[command(subcommand)]
    Core(CoreCommands),
    /// Third-party package index URLs
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Board/port discovery
    #[command(subcommand)]
    Board(BoardCommands),
    /// Validate a project configuration document
    Check {
        /// Path to the configuration document
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Assess the toolchain environment for a release
    Environment {
        #[arg(value_name = "RELEASE")]
        release: String,
    },
}

#[derive(Subcommand)]
enum CoreCommands {
    /// List platforms (installed only, or every known one with --all)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Install a platform at a version
    Install {
        #[arg(value_name = "PLATFORM_ID")]
        platform_id: String,
        #[arg(value_name = "VERSION")]
        version: String,
    },
    /// Refresh the package index (clears the result cache)
    UpdateIndex,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Register a third-party package index URL
    AddUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Unregister a third-party package index URL
    RemoveUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Probe whether a URL serves a usable package index
    ValidateUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

#[derive(Subcommand)]
enum BoardCommands {
    /// List detected serial ports
    List,
}

fn build_broker(cli: &Cli) -> Broker {
    let options = ToolchainOptions::new(&cli.project)
        .with_debug(cli.debug)
        .with_verbose(cli.verbose)
        .normalize();
    let cache_dir = cli.project.join(PROJECT_DIR).join("cache");

    let broker = Broker::new(
        Toolchain::new(options),
        CommandCache::new(cache_dir),
        Arc::new(GithubReleases::new(REGISTRY_OWNER, REGISTRY_REPO)),
    );
    match cli.timeout {
        Some(seconds) => broker.with_timeout(Duration::from_secs(seconds)),
        None => broker,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let broker = build_broker(&cli);

    match &cli.command {
        Commands::Releases => {
            let releases = broker.get_releases().await?;
            print_json(&releases)?;
        }
        Commands::Core(CoreCommands::List { all }) => {
            let filter = if *all { "--all" } else { "" };
            let platforms = broker.core_list(filter).await?;
            print_json(&platforms)?;
        }
        Commands::Core(CoreCommands::Install {
            platform_id,
            version,
        }) => {
            let data = broker.core_install(platform_id, version).await?;
            print_json(&data)?;
        }
        Commands::Core(CoreCommands::UpdateIndex) => {
            let data = broker.core_update_index().await?;
            print_json(&data)?;
        }
        Commands::Config(ConfigCommands::AddUrl { url }) => {
            let data = broker.config_add_3rd_party_url(url).await?;
            print_json(&data)?;
        }
        Commands::Config(ConfigCommands::RemoveUrl { url }) => {
            let data = broker.config_remove_3rd_party_url(url).await?;
            print_json(&data)?;
        }
        Commands::Config(ConfigCommands::ValidateUrl { url }) => {
            let steps = broker.validate_3rd_party_url(url).await?;
            print_json(&steps)?;
        }
        Commands::Board(BoardCommands::List) => {
            let ports = broker.board_list().await?;
            print_json(&ports)?;
        }
        Commands::Check { file } => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let source = file.display().to_string();
            let outcome = broker.check_document(&text, &source).await?;

            print_json(&outcome.diagnostics)?;
            if let Some(environment) = outcome.environment {
                eprintln!("environment: {:?}", environment);
            }
            if outcome
                .diagnostics
                .iter()
                .any(|d| d.severity == boardlab_broker::Severity::Error)
            {
                std::process::exit(1);
            }
        }
        Commands::Environment { release } => {
            let state = broker.assess_environment(release).await?;
            println!("{:?}", state);
        }
    }

    Ok(())
}
