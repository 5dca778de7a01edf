//! aibtc — CLI ops entrypoint
//!
//! A thin demonstration binary over the `aibtc-core` library. The real
//! CLI "skills" (wallet-create, send-btc, call-contract, …) are separate
//! scripts built on this crate; this binary just exercises the core
//! end-to-end so the library can be smoke-tested without a full skill
//! harness.
//!
//! Run modes:
//!   cargo run                      - Show usage
//!   cargo run -- wallet new        - Generate a mnemonic and derive accounts
//!   cargo run -- wallet show       - Show addresses for CLIENT_MNEMONIC
//!   cargo run -- fee <type> <expr> - Resolve a fee expression (needs network access)

use std::env;

use aibtc_core::common::logging::LogLevel;
use aibtc_core::env::EnvConfig;
use aibtc_core::gateway::HiroClient;
use aibtc_core::{derive_account, generate_mnemonic, resolve_fee, Network, TxType};

#[tokio::main]
async fn main() {
    let _ = aibtc_core::common::logging::init_logging(LogLevel::Info, false);

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "wallet" => run_wallet(&args[2..]),
        "fee" => run_fee(&args[2..]).await,
        "help" | "--help" | "-h" => print_usage(),
        _ => print_usage(),
    }
}

fn print_usage() {
    println!("aibtc-core ops CLI");
    println!();
    println!("Usage:");
    println!("  aibtc wallet new             Generate a fresh mnemonic and print derived addresses");
    println!("  aibtc wallet show            Print addresses derived from CLIENT_MNEMONIC");
    println!("  aibtc fee <type> <expr>      Resolve a fee expression, e.g. `fee contract_call medium`");
    println!();
    println!("Environment variables:");
    println!("  NETWORK          mainnet | testnet (default: testnet)");
    println!("  HIRO_API_KEY     Hiro API key, used by `fee`");
    println!("  CLIENT_MNEMONIC  Mnemonic used by `wallet show` and `fee`");
}

fn run_wallet(args: &[String]) {
    let env_config = match EnvConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load environment: {e}");
            return;
        }
    };

    match args.first().map(String::as_str) {
        Some("new") => {
            let mnemonic = generate_mnemonic();
            print_account(&mnemonic, env_config.network);
        }
        Some("show") => match env_config.client_mnemonic {
            Some(mnemonic) => print_account(&mnemonic, env_config.network),
            None => eprintln!("CLIENT_MNEMONIC is not set"),
        },
        _ => print_usage(),
    }
}

fn print_account(mnemonic: &str, network: Network) {
    match derive_account(mnemonic, "", network) {
        Ok(account) => {
            println!("network:         {network}");
            println!("mnemonic:        {mnemonic}");
            println!("stx address:     {}", account.stx_address);
            println!("btc address:     {}", account.btc_address);
            println!("taproot address: {}", account.taproot_address);
        }
        Err(e) => eprintln!("failed to derive account: {e}"),
    }
}

async fn run_fee(args: &[String]) {
    let (Some(tx_type_arg), Some(expr)) = (args.first(), args.get(1)) else {
        eprintln!("usage: aibtc fee <token_transfer|contract_call|smart_contract|all> <low|medium|high|<integer>>");
        return;
    };

    let tx_type = match tx_type_arg.as_str() {
        "token_transfer" => TxType::TokenTransfer,
        "contract_call" => TxType::ContractCall,
        "smart_contract" => TxType::SmartContract,
        "all" => TxType::All,
        other => {
            eprintln!("unknown tx type '{other}'");
            return;
        }
    };

    let env_config = match EnvConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load environment: {e}");
            return;
        }
    };

    let gateway = HiroClient::new(env_config.network, env_config.hiro_api_key);
    match resolve_fee(Some(expr.as_str()), tx_type, &gateway).await {
        Ok(Some(fee)) => println!("resolved fee: {fee} uSTX"),
        Ok(None) => println!("resolved fee: auto (estimate at build time)"),
        Err(e) => eprintln!("fee resolution failed: {e}"),
    }
}
