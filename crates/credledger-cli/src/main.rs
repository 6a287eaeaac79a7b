//! # credledger CLI entry point
//!
//! Parses command-line arguments, connects the wallet and dispatches to
//! the subcommand handlers in [`credledger_cli::commands`].

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use credledger_chain::LedgerConfig;
use credledger_cli::commands::{
    run_approve, run_connect, run_request, run_share, run_show, run_verify, run_watch, ApproveArgs,
    RequestArgs, ShareArgs, ShowArgs, VerifyArgs,
};
use credledger_cli::Client;
use credledger_core::Address;
use credledger_projection::ViewKind;

/// Credential ledger client.
///
/// Request credentials, approve them as a verifier, share them, and verify
/// what others shared with you. All state lives on the ledger.
#[derive(Parser, Debug)]
#[command(name = "credledger", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Ledger JSON-RPC endpoint. Overrides CREDLEDGER_RPC_URL.
    #[arg(long, global = true)]
    rpc_url: Option<url::Url>,

    /// Credential contract address. Overrides CREDLEDGER_CONTRACT_ADDRESS.
    #[arg(long, global = true)]
    contract: Option<Address>,

    /// Directory for saved view snapshots.
    #[arg(
        long,
        global = true,
        env = "CREDLEDGER_CACHE_DIR",
        default_value = ".credledger-cache"
    )]
    cache_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect the wallet and print the account and network.
    Connect,

    /// Ask a verifier to certify a credential.
    Request(RequestArgs),

    /// Approve a request addressed to you.
    Approve(ApproveArgs),

    /// Share an approved credential with another address.
    Share(ShareArgs),

    /// Mark a credential shared with you as verified.
    Verify(VerifyArgs),

    /// Refresh and print a view.
    Show(ShowArgs),

    /// Print a view and re-print it on every verification until Ctrl-C.
    Watch {
        /// my-requests, pending-approvals, shared-with-me or shared-by-me.
        view: ViewKind,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .context("starting async runtime")
        .and_then(|runtime| runtime.block_on(run(cli)));

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = load_config(&cli)?;
    tracing::debug!(
        rpc_url = %config.network.rpc_url,
        contract = %config.contract_address,
        cache_dir = %cli.cache_dir.display(),
        "configuration loaded"
    );

    let client = match &cli.command {
        Commands::Show(_) | Commands::Watch { .. } => {
            Client::connect_or_offline(&config, &cli.cache_dir).await?
        }
        _ => Client::connect(&config, &cli.cache_dir).await?,
    };
    let mut out = std::io::stdout();

    match &cli.command {
        Commands::Connect => run_connect(&client, &config.network, &mut out),
        Commands::Request(args) => run_request(&client, args, &mut out).await,
        Commands::Approve(args) => run_approve(&client, args, &mut out).await,
        Commands::Share(args) => run_share(&client, args, &mut out).await,
        Commands::Verify(args) => run_verify(&client, args, &mut out).await,
        Commands::Show(args) => run_show(&client, args, &mut out).await,
        Commands::Watch { view } => {
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %err, "cannot listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            run_watch(&client, *view, shutdown, &mut out).await
        }
    }
}

/// Environment configuration with command-line overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<LedgerConfig> {
    let mut config = LedgerConfig::from_env().context("reading CREDLEDGER_* environment")?;
    if let Some(rpc_url) = &cli.rpc_url {
        if std::env::var_os("CREDLEDGER_WALLET_URL").is_none() {
            config.wallet_url = rpc_url.clone();
        }
        config.network.rpc_url = rpc_url.clone();
    }
    if let Some(contract) = cli.contract {
        config.contract_address = contract;
    }
    Ok(config)
}
