//! # adasend Cardano
//!
//! Transaction assembly for Cardano (ADA) transfers.
//!
//! ## Features
//!
//! - Exact multi-asset value arithmetic (`u128`, never floating point)
//! - Minimum-UTXO computation for the Mary, Alonzo and Babbage rules
//! - First-fit input selection that covers coin and every requested asset
//! - Fee settled against the encoded transaction size
//! - Change that keeps every leftover token
//! - Bech32/hex addresses and CIP-30 UTXO decoding
//!
//! ## Example
//!
//! ```rust,no_run
//! use adasend_cardano::{build_transfer, ProtocolParameters, TransferRequest, Utxo};
//!
//! fn main() -> Result<(), adasend_cardano::TransferError> {
//!     let utxos = vec![Utxo::from_cbor_hex("82825820...")?];
//!     let request = TransferRequest::ada("addr1...", 2_000_000);
//!
//!     let tx = build_transfer(&request, &utxos, "addr1...", &ProtocolParameters::mainnet_defaults())?;
//!     println!("fee: {}", tx.fee());
//!     println!("unsigned: {}", tx.unsigned_hex());
//!     Ok(())
//! }
//! ```
//!
//! ## Collaborators
//!
//! The engine itself does no I/O. [`Transfer`] drives it with the
//! collaborator traits from `adasend-traits`: a parameter source, a UTXO
//! source, a signer and a submitter.

pub mod address;
pub mod assembler;
pub mod balance;
pub mod codec;
pub mod config;
pub mod draft;
pub mod error;
pub mod lovelace;
pub mod min_utxo;
pub mod params;
pub mod selection;
pub mod transfer;
pub mod utxo;
pub mod value;

pub use address::{Address, AddressType};
pub use assembler::{build_transfer, TransactionAssembler, TransferKind, TransferRequest};
pub use balance::{TokenBalance, WalletBalance};
pub use config::{NetworkConfig, LOVELACE_PER_ADA, MAINNET_NETWORK_ID, TESTNET_NETWORK_ID};
pub use draft::{DraftStage, SealedTransaction, TransactionDraft};
pub use error::{InvariantViolation, Stage, TransferError};
pub use lovelace::{format_ada, parse_ada};
pub use min_utxo::{min_coin_for, min_coin_for_output};
pub use params::{MinUtxoRule, ProtocolParameters};
pub use selection::{select, FeeEstimator, Selection};
pub use transfer::Transfer;
pub use utxo::{TxOutput, Utxo, UtxoRef};
pub use value::{AssetId, AssetName, MultiAsset, NegativeValue, PolicyId, Value};
