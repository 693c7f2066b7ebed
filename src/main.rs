//! Solfleet - multi-wallet SOL custody and fund movement
//!
//! # WARNING
//! - This tool moves real funds and handles raw key material.
//! - Wallet files under the data directory contain unencrypted secrets.
//! - Deleting a project moves it to trash only after a verified backup.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use solfleet::cli::commands;
use solfleet::config::Config;
use solfleet::funds::MixStrategy;

/// Multi-wallet SOL custody: transfers, airdrops, mixing, consolidation
#[derive(Parser)]
#[command(name = "solfleet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Named cluster (devnet, testnet, mainnet) overriding the config
    #[arg(long, global = true)]
    cluster: Option<String>,

    /// Explicit RPC endpoint, takes precedence over --cluster
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send SOL from a caller-supplied secret to a recipient address
    Transfer {
        /// Sender secret: base58 string, JSON byte array, or keypair file path
        secret: String,

        /// Recipient base58 address
        recipient: String,

        /// Amount in SOL, decimal string (e.g. "0.001")
        amount: String,
    },

    /// Request a faucet airdrop and wait for it to land (devnet/testnet only)
    Airdrop {
        /// Recipient base58 address
        address: String,

        /// Amount in SOL
        #[arg(default_value = "1.0")]
        sol: f64,

        /// Seconds to wait for confirmation (clamped to [0, 60])
        #[arg(long, default_value = "60")]
        confirm_seconds: f64,

        /// Balance poll interval in seconds (clamped to [0.2, 5])
        #[arg(long, default_value = "1.0")]
        poll_interval: f64,

        /// Extra faucet attempts after the first (clamped to [0, 10])
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Backoff base in seconds (clamped to [0.2, 10])
        #[arg(long, default_value = "1.5")]
        backoff: f64,
    },

    /// Shuffle funds among a set of custodied wallets
    Mix {
        /// Wallet ids or addresses (at least 2 for roundrobin)
        #[arg(required = true)]
        wallets: Vec<String>,

        /// Mix strategy: random or roundrobin
        #[arg(long, default_value = "random")]
        strategy: String,
    },

    /// Drain project wallets into one target wallet
    Consolidate {
        /// Target wallet id or address
        target: String,

        /// Project to drain (default: the target's project)
        #[arg(long)]
        project: Option<String>,

        /// SOL left behind on every source
        #[arg(long)]
        min_reserve: Option<f64>,
    },

    /// Project management commands
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Wallet management commands
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project, optionally with freshly generated wallets
    Create {
        name: String,

        /// Number of wallets to generate on creation
        #[arg(long, default_value = "0")]
        wallets: usize,
    },

    /// List all projects
    List,

    /// Back up a project and move it to trash
    Delete {
        /// Project id
        project: String,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    /// Generate fresh wallets in a project (prints secrets once)
    Generate {
        /// Project id
        project: String,

        /// Number of wallets
        #[arg(default_value = "1")]
        count: usize,
    },

    /// Import wallets from a file of secret lines
    Import {
        /// Project id
        project: String,

        /// File with one secret per line (base58, JSON array, or addr;secret)
        file: String,
    },

    /// List a project's wallets (secrets redacted)
    List {
        /// Project id
        project: String,
    },

    /// Back up a wallet and remove it from its project
    Remove {
        /// Project id
        project: String,

        /// Wallet id or address (exact match)
        wallet: String,
    },

    /// Show the on-chain balance of a wallet
    Balance {
        /// Wallet id or address (exact match)
        wallet: String,

        /// Limit the lookup to one project
        #[arg(long)]
        project: Option<String>,
    },
}

fn parse_strategy(s: &str) -> Result<MixStrategy> {
    match s {
        "random" => Ok(MixStrategy::Random),
        "roundrobin" | "round-robin" => Ok(MixStrategy::RoundRobin),
        other => bail!("unknown mix strategy '{other}' (expected random or roundrobin)"),
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solfleet=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cluster = cli.cluster.as_deref();
    let rpc_url = cli.rpc_url.as_deref();

    let result = match cli.command {
        Commands::Transfer {
            secret,
            recipient,
            amount,
        } => commands::transfer(&config, &secret, &recipient, &amount, cluster, rpc_url),
        Commands::Airdrop {
            address,
            sol,
            confirm_seconds,
            poll_interval,
            retries,
            backoff,
        } => commands::airdrop(
            &config,
            &address,
            sol,
            confirm_seconds,
            poll_interval,
            retries,
            backoff,
            cluster,
            rpc_url,
        ),
        Commands::Mix { wallets, strategy } => {
            let strategy = parse_strategy(&strategy)?;
            commands::mix(&config, &wallets, strategy, cluster, rpc_url)
        }
        Commands::Consolidate {
            target,
            project,
            min_reserve,
        } => commands::consolidate(
            &config,
            &target,
            project.as_deref(),
            min_reserve,
            cluster,
            rpc_url,
        ),
        Commands::Project { action } => match action {
            ProjectAction::Create { name, wallets } => {
                commands::project_create(&config, &name, wallets)
            }
            ProjectAction::List => commands::project_list(&config),
            ProjectAction::Delete { project } => commands::project_delete(&config, &project),
        },
        Commands::Wallet { action } => match action {
            WalletAction::Generate { project, count } => {
                commands::wallet_generate(&config, &project, count)
            }
            WalletAction::Import { project, file } => {
                commands::wallet_import(&config, &project, &file)
            }
            WalletAction::List { project } => commands::wallet_list(&config, &project),
            WalletAction::Remove { project, wallet } => {
                commands::wallet_remove(&config, &project, &wallet)
            }
            WalletAction::Balance { wallet, project } => {
                commands::wallet_balance(&config, &wallet, project.as_deref(), cluster, rpc_url)
            }
        },
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
