use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use solsend_common::{
    config::{ClientConfig, Cluster},
    confirmation::wait_with_config,
    crypto::{convert_base58_key, load_keypair_file},
    rpc::{prepare_transfer, send_transfer, LedgerRpc, RpcClient},
    utils::{lamports_to_sol, parse_address, sol_to_lamports},
    Error,
};

/// Send SOL from a local keypair, or convert a base58 secret key to a JSON keypair file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON keypair file ({"privateKey": [64 bytes]})
    #[arg(long)]
    keypair: Option<PathBuf>,

    /// Recipient address (base58 public key)
    #[arg(long)]
    to: Option<String>,

    /// Amount to send in SOL
    #[arg(long, allow_negative_numbers = true)]
    amount: Option<f64>,

    /// JSON-RPC endpoint (defaults to the cluster's public endpoint)
    #[arg(long, env = "SOLSEND_RPC_URL")]
    rpc_url: Option<String>,

    /// Websocket endpoint (defaults to the cluster's public endpoint)
    #[arg(long, env = "SOLSEND_WS_URL")]
    ws_url: Option<String>,

    /// Cluster whose endpoints and explorer links are used
    #[arg(long)]
    cluster: Option<Cluster>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Convert a base58 secret key to the JSON keypair format
    #[arg(long)]
    convert_key: Option<String>,

    /// Output file for --convert-key (defaults to phantom-keypair.json)
    #[arg(long)]
    convert_output: Option<PathBuf>,
}

/// Validated transfer-mode arguments
#[derive(Debug, PartialEq)]
struct TransferRequest {
    keypair: PathBuf,
    to: String,
    amount: f64,
}

/// Rewrite Go-style single-dash long flags (`-keypair`, `-to=...`) as `--keypair`, `--to=...`.
///
/// Only tokens in flag position are rewritten. A value that starts with `-` is
/// bound to its flag (`--amount=-1`) so clap never reads it as a flag.
fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut normalized: Vec<String> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        if arg == "--" {
            normalized.push(arg);
            normalized.extend(args.by_ref());
            break;
        }
        let flag = if is_single_dash_word(&arg) {
            format!("-{}", arg)
        } else {
            arg
        };
        if !takes_value(&flag) {
            normalized.push(flag);
            continue;
        }
        match args.next() {
            Some(value) if value.starts_with('-') => {
                normalized.push(format!("{}={}", flag, value))
            }
            Some(value) => {
                normalized.push(flag);
                normalized.push(value);
            }
            None => normalized.push(flag),
        }
    }
    normalized
}

fn is_single_dash_word(arg: &str) -> bool {
    let mut chars = arg.chars();
    chars.next() == Some('-')
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.next().is_some()
}

/// Every long flag except `--help` and `--version` takes a value.
fn takes_value(arg: &str) -> bool {
    arg.starts_with("--") && !arg.contains('=') && !matches!(arg, "--" | "--help" | "--version")
}

fn build_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(cluster) = args.cluster {
        config.cluster = cluster;
    }
    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = Some(rpc_url.clone());
    }
    if let Some(ws_url) = &args.ws_url {
        config.ws_url = Some(ws_url.clone());
    }
    Ok(config)
}

fn validate_transfer_args(args: &Args) -> std::result::Result<TransferRequest, String> {
    let keypair = args.keypair.clone().ok_or_else(|| {
        "the keypair file must be given with --keypair\n\
         or use --convert-key to convert a base58 key"
            .to_string()
    })?;
    let to = args
        .to
        .clone()
        .ok_or_else(|| "the recipient address must be given with --to".to_string())?;
    let amount = args.amount.unwrap_or(0.0);
    if !amount.is_finite() || amount <= 0.0 {
        return Err("amount must be greater than 0".to_string());
    }
    Ok(TransferRequest {
        keypair,
        to,
        amount,
    })
}

fn run_convert(encoded: &str, output: Option<&PathBuf>, config: &ClientConfig) -> Result<()> {
    let output = output.unwrap_or(&config.default_key_file);
    let converted = convert_base58_key(encoded, output, &config.default_key_file)
        .context("key conversion failed")?;

    println!("Private key (base58): {}", converted.keypair_base58);
    println!("Public key: {}", converted.pubkey);
    println!();
    println!("Key converted and saved to: {}", output.display());
    for copy in converted.written.iter().skip(1) {
        println!("Also created: {}", copy.display());
    }
    Ok(())
}

/// Check the sender's balance, then build, sign and submit the transfer.
///
/// Nothing is fetched beyond the balance and nothing is submitted when the
/// balance does not cover `amount` plus `fee_buffer`.
async fn submit_transfer<R: LedgerRpc + ?Sized>(
    rpc: &R,
    keypair: &Keypair,
    recipient: &Pubkey,
    amount: f64,
    fee_buffer: u64,
) -> Result<Signature> {
    let lamports = sol_to_lamports(amount);
    debug!("Transfer of {} SOL is {} lamports", amount, lamports);

    let balance = match prepare_transfer(rpc, &keypair.pubkey(), lamports, fee_buffer).await {
        Ok(balance) => balance,
        Err(e) => {
            if let Error::InsufficientFunds { available, .. } = &e {
                println!("Sender balance: {:.9} SOL", lamports_to_sol(*available));
            }
            return Err(e.into());
        }
    };
    println!("Sender balance: {:.9} SOL", lamports_to_sol(balance));

    println!("Sending {:.9} SOL...", amount);
    let signature = send_transfer(rpc, keypair, recipient, lamports).await?;
    println!("Transaction sent. Signature: {}", signature);
    Ok(signature)
}

async fn run_transfer(request: TransferRequest, config: &ClientConfig) -> Result<()> {
    let recipient = parse_address(&request.to)?;
    let keypair = load_keypair_file(&request.keypair).context("failed to load keypair")?;

    println!("Sender: {}", keypair.pubkey());
    println!("Recipient: {}", recipient);

    let rpc = RpcClient::from_config(config);
    let signature = submit_transfer(
        &rpc,
        &keypair,
        &recipient,
        request.amount,
        config.fee_buffer_lamports,
    )
    .await?;

    println!("Waiting for confirmation...");
    wait_with_config(config, &signature).await?;

    println!("Transaction confirmed!");
    println!("View transaction: {}", config.cluster.explorer_url(&signature));
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    info!(
        "Using {} (rpc {}, ws {})",
        config.cluster,
        config.rpc_url(),
        config.ws_url()
    );

    if let Some(encoded) = &args.convert_key {
        return run_convert(encoded, args.convert_output.as_ref(), &config);
    }

    let request = match validate_transfer_args(&args) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("{}", Args::command().render_help());
            bail!(message);
        }
    };
    run_transfer(request, &config).await
}

/// Help and version output exit cleanly, every other usage error exits with 1.
fn parse_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("solsend=info,solsend_common=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let args = match Args::try_parse_from(normalize_args(std::env::args())) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(parse_exit_code(&e));
        }
    };

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
