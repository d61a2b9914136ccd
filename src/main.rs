//! autoHODL relay CLI
//!
//! Runs the webhook relay and a few helpers for operating it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use autohodl_relay::{
    config::{RelayConfig, ENV_RELAYER_KEY, ENV_WEBHOOK_SECRET},
    server,
    utils::{display_units, increment_from_units, round_up},
    webhook::signature,
};

#[derive(Parser)]
#[command(name = "autohodl")]
#[command(author = "autoHODL Team")]
#[command(version = "0.1.0")]
#[command(about = "Round-up savings relay for autoHODL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook relay
    Serve {
        /// TOML configuration file
        #[arg(short, long, default_value = "autohodl.toml")]
        config: PathBuf,
    },

    /// Show the round-up for a purchase
    RoundUp {
        /// Purchase amount in whole tokens, e.g. 4.30
        #[arg(short, long)]
        amount: String,

        /// Round-up increment in whole tokens
        #[arg(short, long, default_value = "1")]
        increment: String,

        /// Token decimals
        #[arg(short, long, default_value = "6")]
        decimals: u8,
    },

    /// Print the signature header for a webhook body
    Sign {
        /// File holding the exact body to send
        #[arg(short, long)]
        body: PathBuf,

        /// Stream secret (falls back to AUTOHODL_WEBHOOK_SECRET)
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Print the effective configuration
    Info {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Serve { config } => {
            let config = RelayConfig::from_path(&config)
                .with_context(|| format!("Failed to load config {}", config.display()))?;
            info!(
                "Relay for chain {} watching {} token(s)",
                config.chain_id,
                config.watched_tokens.len()
            );
            server::serve(config).await?;
        }

        Commands::RoundUp {
            amount,
            increment,
            decimals,
        } => {
            print_round_up(&amount, &increment, decimals)?;
        }

        Commands::Sign { body, secret } => {
            let secret = secret
                .or_else(|| std::env::var(ENV_WEBHOOK_SECRET).ok())
                .context("No secret given and AUTOHODL_WEBHOOK_SECRET is unset")?;
            let bytes = std::fs::read(&body)
                .with_context(|| format!("Failed to read {}", body.display()))?;
            println!("{}: {}", signature::SIGNATURE_HEADER, signature::sign(&bytes, &secret));
        }

        Commands::Info { config } => {
            print_info(config)?;
        }
    }

    Ok(())
}

fn print_round_up(amount: &str, increment: &str, decimals: u8) -> Result<()> {
    let amount_units = increment_from_units(amount, decimals)?;
    let increment_units = increment_from_units(increment, decimals)?;
    let r = round_up(amount_units, increment_units)?;

    println!();
    println!("  Purchase:   {}", display_units(r.amount, decimals));
    println!("  Rounded to: {}", display_units(r.rounded, decimals));
    println!("  Saved:      {}", display_units(r.savings, decimals));
    println!("  (base units: {})", r.savings);
    println!();
    Ok(())
}

fn print_info(path: Option<PathBuf>) -> Result<()> {
    let mut config = match &path {
        Some(p) => {
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read {}", p.display()))?;
            RelayConfig::from_toml(&contents)?
        }
        None => RelayConfig::default(),
    };
    config.apply_env();

    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    let set = |s: &str| if s.trim().is_empty() { "unset" } else { "set" };

    println!();
    println!("{}", rendered);
    println!("webhook_secret = <{}> ({})", set(&config.webhook_secret), ENV_WEBHOOK_SECRET);
    println!("relayer_key = <{}> ({})", set(&config.relayer_key), ENV_RELAYER_KEY);
    if let Err(e) = config.validate() {
        println!();
        println!("! {}", e);
    }
    println!();
    Ok(())
}
