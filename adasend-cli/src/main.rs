//! adasend - build and submit Cardano transfers from the command line.
//!
//! Transactions are built unsigned. Sign them with any wallet that accepts
//! CBOR, then hand the signed hex back to `adasend submit`.

mod config;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adasend_cardano::{
    codec, parse_ada, AssetId, NetworkConfig, ProtocolParameters, TransactionAssembler, Transfer,
    TransferRequest, Utxo, WalletBalance,
};
use adasend_provider::BlockfrostClient;
use adasend_traits::Submitter;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{AdasendConfig, DEFAULT_CONFIG_PATH};
use types::{parse_token, print_balance, print_parameters, print_tokens, BuildReport};

#[derive(Debug, Parser)]
#[command(name = "adasend", version, about = "Build and submit Cardano transfers")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Network name, overriding the configuration file
    #[arg(long, global = true)]
    network: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default configuration file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Show the current protocol parameters
    Params,
    /// Show what an address holds
    Balance {
        address: String,
        /// JSON array of CIP-30 UTXO hex strings to read instead of Blockfrost
        #[arg(long)]
        utxos: Option<PathBuf>,
    },
    /// Build an unsigned transfer
    Build {
        /// Receiver address
        #[arg(long)]
        to: String,
        /// Sender address; inputs come from here and change goes back here
        #[arg(long)]
        from: String,
        /// ADA to send, e.g. 1.5
        #[arg(long, value_parser = parse_ada_arg)]
        ada: Option<u64>,
        /// Token to send as asset=quantity; repeatable
        #[arg(long = "token", value_parser = parse_token)]
        tokens: Vec<(AssetId, u128)>,
        /// JSON array of CIP-30 UTXO hex strings to spend instead of Blockfrost
        #[arg(long)]
        utxos: Option<PathBuf>,
    },
    /// List native assets with their token registry details
    Tokens {
        /// Listing page, 100 assets per page
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// How many assets of the page to look up
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Submit a signed transaction given as hex or as @file
    Submit { transaction: String },
}

fn parse_ada_arg(arg: &str) -> std::result::Result<u64, String> {
    parse_ada(arg).map_err(|e| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Command::Init { force } = &cli.command {
        return init_config(&cli.config, *force);
    }

    let mut config = AdasendConfig::load(&cli.config)?;
    if let Some(network) = &cli.network {
        config.network = network.clone();
    }
    let network = config.network()?;
    tracing::debug!(network = %network.name, "configuration loaded");

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Params => {
            let params = client(&config)?.protocol_parameters().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&params)?);
            } else {
                print_parameters(&params);
            }
            Ok(())
        }
        Command::Balance { address, utxos } => {
            let utxos = match utxos {
                Some(path) => load_utxo_snapshot(&path)?,
                None => client(&config)?.address_utxos(&address).await?,
            };
            let balance = WalletBalance::from_utxos(&utxos);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&balance)?);
            } else {
                print_balance(&address, &balance);
            }
            Ok(())
        }
        Command::Build {
            to,
            from,
            ada,
            tokens,
            utxos,
        } => {
            let request = if tokens.is_empty() {
                let Some(lovelace) = ada else {
                    bail!("nothing to send: pass --ada and/or --token");
                };
                TransferRequest::ada(to, lovelace)
            } else {
                TransferRequest::tokens(to, tokens, ada)
            };

            let tx = match utxos {
                Some(path) => {
                    let utxos = load_utxo_snapshot(&path)?;
                    let params = offline_parameters(&config, &network).await?;
                    TransactionAssembler::new(params)
                        .with_network(network.clone())
                        .build(&request, &utxos, &from)?
                }
                None => {
                    let client = Arc::new(client(&config)?);
                    Transfer::read_only(client.clone(), client, from)
                        .with_network(network.clone())
                        .prepare(&request)
                        .await?
                }
            };

            let report = BuildReport::new(&tx);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
            Ok(())
        }
        Command::Tokens { page, limit } => {
            let tokens = client(&config)?.tokens(page, limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else {
                print_tokens(page, &tokens);
            }
            Ok(())
        }
        Command::Submit { transaction } => {
            let bytes = read_transaction(&transaction)?;
            let (body, _) = codec::split_transaction(&bytes)?;
            let expected = hex::encode(codec::tx_id(body));

            let hash = client(&config)?.submit(&bytes).await?;
            if hash.as_str() != expected {
                tracing::warn!(reported = %hash, computed = %expected, "hash mismatch");
            }
            if cli.json {
                println!("{}", serde_json::json!({ "tx_hash": hash }));
            } else {
                println!("Submitted {hash}");
                println!("{}", network.explorer_tx_url(hash.as_str()));
            }
            Ok(())
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    AdasendConfig::default().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn client(config: &AdasendConfig) -> Result<BlockfrostClient> {
    Ok(BlockfrostClient::new(config.blockfrost()?)?)
}

/// Live parameters when a project id is configured, the network defaults
/// otherwise.
async fn offline_parameters(
    config: &AdasendConfig,
    network: &NetworkConfig,
) -> Result<ProtocolParameters> {
    if config.project_id().is_none() {
        tracing::info!(network = %network.name, "no project id, using default parameters");
        return Ok(network.default_parameters());
    }
    Ok(client(config)?.protocol_parameters().await?)
}

fn load_utxo_snapshot(path: &Path) -> Result<Vec<Utxo>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let entries: Vec<String> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, hex)| {
            Utxo::from_cbor_hex(hex).with_context(|| format!("utxo {i} in {}", path.display()))
        })
        .collect()
}

fn read_transaction(arg: &str) -> Result<Vec<u8>> {
    let text = match arg.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?
        }
        None => arg.to_string(),
    };
    hex::decode(text.trim()).context("transaction is not hex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use adasend_cardano::{Address, UtxoRef, Value};

    fn utxo_hex(address: &Address, lovelace: u32) -> String {
        // [[h'aa..', 0], [address, lovelace]]
        let mut bytes = vec![0x82, 0x82, 0x58, 0x20];
        bytes.extend_from_slice(&[0xaa; 32]);
        bytes.extend_from_slice(&[0x00, 0x82, 0x58, address.len() as u8]);
        bytes.extend_from_slice(address.as_bytes());
        bytes.push(0x1a);
        bytes.extend_from_slice(&lovelace.to_be_bytes());
        hex::encode(bytes)
    }

    #[test]
    fn test_cli_parses_build() {
        let cli = Cli::try_parse_from([
            "adasend",
            "build",
            "--to",
            "addr1a",
            "--from",
            "addr1b",
            "--ada",
            "1.5",
            "--network",
            "mainnet",
        ])
        .unwrap();
        assert_eq!(cli.network.as_deref(), Some("mainnet"));
        match cli.command {
            Command::Build { ada, tokens, .. } => {
                assert_eq!(ada, Some(1_500_000));
                assert!(tokens.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_tokens() {
        let cli = Cli::try_parse_from(["adasend", "--json", "tokens", "--page", "3"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Tokens { page, limit } => {
                assert_eq!(page, 3);
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_ada() {
        assert!(Cli::try_parse_from(["adasend", "build", "--to", "a", "--from", "b", "--ada", "1.0000001"]).is_err());
    }

    #[test]
    fn test_load_utxo_snapshot() {
        let owner = Address::enterprise(&[9; 32], 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utxos.json");
        std::fs::write(&path, serde_json::to_string(&vec![utxo_hex(&owner, 3_000_000)]).unwrap())
            .unwrap();

        let utxos = load_utxo_snapshot(&path).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].reference, UtxoRef::new([0xaa; 32], 0));
        assert_eq!(utxos[0].owner, owner);
        assert_eq!(utxos[0].value, Value::from_coin(3_000_000));
    }

    #[test]
    fn test_read_transaction() {
        assert_eq!(read_transaction(" 84a0a0f5f6\n").unwrap(), vec![0x84, 0xa0, 0xa0, 0xf5, 0xf6]);
        assert!(read_transaction("zz").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signed.hex");
        std::fs::write(&path, "84a0a0f5f6").unwrap();
        let arg = format!("@{}", path.display());
        assert_eq!(read_transaction(&arg).unwrap().len(), 5);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adasend.json");
        init_config(&path, false).unwrap();
        assert!(init_config(&path, false).is_err());
        assert!(init_config(&path, true).is_ok());
    }
}
