//! # adasend Testing Infrastructure
//!
//! Testing utilities for the adasend transfer engine:
//! - Fixture addresses, policies and UTXOs
//! - Edge case addresses and amounts
//! - Property-based testing strategies
//! - [`MockChain`], an in-memory implementation of every collaborator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use adasend_testing::*;
//!
//! proptest! {
//!     #[test]
//!     fn conserves_value(utxos in utxo_set_strategy(8), amount in lovelace_strategy()) {
//!         // ...
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use adasend_cardano::codec;
use adasend_cardano::{
    Address, AssetId, AssetName, PolicyId, ProtocolParameters, Utxo, UtxoRef, Value,
    MAINNET_NETWORK_ID, TESTNET_NETWORK_ID,
};
use adasend_traits::{
    CollaboratorError, CollaboratorResult, ProtocolParameterSource, Signer, Submitter, TxHash,
    UtxoSource,
};
use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

// ============================================================================
// Fixtures
// ============================================================================

/// Mainnet enterprise address derived from a repeated-byte key.
pub fn address(seed: u8) -> Address {
    Address::enterprise(&[seed; 32], MAINNET_NETWORK_ID)
}

/// Testnet enterprise address derived from a repeated-byte key.
pub fn testnet_address(seed: u8) -> Address {
    Address::enterprise(&[seed; 32], TESTNET_NETWORK_ID)
}

/// Mainnet base address with distinct payment and staking keys.
pub fn base_address(seed: u8) -> Address {
    Address::base(&[seed; 32], &[seed.wrapping_add(1); 32], MAINNET_NETWORK_ID)
}

/// The wallet most tests spend from.
pub fn owner() -> Address {
    address(0xa1)
}

/// The address most tests pay to.
pub fn receiver() -> Address {
    address(0xb2)
}

/// Policy id made of one repeated byte.
pub fn policy(seed: u8) -> PolicyId {
    PolicyId::new([seed; 28])
}

/// Asset under [`policy`] with a UTF-8 name.
pub fn asset(seed: u8, name: &str) -> AssetId {
    // Names in fixtures are short literals.
    match AssetName::new(name.as_bytes().to_vec()) {
        Ok(name) => AssetId::new(policy(seed), name),
        Err(e) => panic!("fixture asset name '{name}': {e}"),
    }
}

/// UTXO owned by [`owner`], with a reference derived from `seed` and `index`.
pub fn utxo(seed: u8, index: u32, value: Value) -> Utxo {
    utxo_at(owner(), seed, index, value)
}

/// UTXO owned by `owner`.
pub fn utxo_at(owner: Address, seed: u8, index: u32, value: Value) -> Utxo {
    Utxo::new(UtxoRef::new([seed; 32], index), owner, value)
}

/// Coin-only UTXOs, one per amount, in the order given.
pub fn ada_utxos(amounts: &[u64]) -> Vec<Utxo> {
    amounts
        .iter()
        .enumerate()
        .map(|(i, &lovelace)| utxo(i as u8, 0, Value::from_coin(lovelace as u128)))
        .collect()
}

// ============================================================================
// Edge Case Addresses
// ============================================================================

/// Edge case addresses for testing
pub struct EdgeCaseAddresses;

impl EdgeCaseAddresses {
    /// Mainnet base address (key payment, key stake)
    pub const MAINNET_BASE: &'static str = "addr1qx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3n0d3vllmyqwsx5wktcd8cc3sq835lu7drv2xwl2wywfgse35a3x";

    /// Mainnet enterprise address
    pub const MAINNET_ENTERPRISE: &'static str =
        "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl8";

    /// Testnet enterprise address
    pub const TESTNET_ENTERPRISE: &'static str =
        "addr_test1vz2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzerspjrlsz";

    /// Reward address, never a valid payment target
    pub const STAKE: &'static str = "stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw";

    /// Valid payment addresses
    pub fn valid() -> Vec<&'static str> {
        vec![
            Self::MAINNET_BASE,
            Self::MAINNET_ENTERPRISE,
            Self::TESTNET_ENTERPRISE,
        ]
    }

    /// Text that must not parse as a payment address
    pub fn invalid() -> Vec<&'static str> {
        vec![
            "",
            "addr1",
            "not_an_address",
            "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl9", // Bad checksum
            "addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jh",              // Truncated
            Self::STAKE,
            "61zz",                                                          // Invalid hex
            "0x61",                                                          // Wrong prefix
        ]
    }
}

// ============================================================================
// Edge Case Amounts
// ============================================================================

/// Edge case amounts for testing overflow and precision
pub struct EdgeCaseAmounts;

impl EdgeCaseAmounts {
    /// Zero amount
    pub const ZERO: u64 = 0;

    /// One lovelace
    pub const MIN: u64 = 1;

    /// Maximum u64
    pub const MAX_U64: u64 = u64::MAX;

    /// Total ADA supply in lovelace (45 billion ADA)
    pub const ADA_MAX_SUPPLY: u64 = 45_000_000_000 * 1_000_000;

    /// Usual minimum for a coin-only output
    pub const MIN_UTXO: u64 = 1_000_000;

    /// Fee of a small one-input, two-output transfer
    pub const TYPICAL_FEE: u64 = 170_000;

    /// Amounts that test precision
    pub fn precision_test_amounts() -> Vec<u64> {
        vec![
            1,
            999_999,
            1_000_000,
            1_000_001,
            Self::TYPICAL_FEE,
            45_000_000,
            u32::MAX as u64,
            u32::MAX as u64 + 1,
            Self::ADA_MAX_SUPPLY,
            u64::MAX - 1,
            u64::MAX,
        ]
    }
}

// ============================================================================
// Property-Based Testing Strategies
// ============================================================================

/// One of three fixed policies, so generated values share policies.
pub fn policy_strategy() -> impl Strategy<Value = PolicyId> {
    prop::sample::select(vec![policy(0x11), policy(0x22), policy(0x33)])
}

/// Asset names from empty up to the 32-byte maximum.
pub fn asset_name_strategy() -> impl Strategy<Value = AssetName> {
    prop::collection::vec(any::<u8>(), 0..=32).prop_filter_map("asset name", |bytes| {
        AssetName::new(bytes).ok()
    })
}

/// Assets drawn from a small pool so that values overlap.
pub fn asset_id_strategy() -> impl Strategy<Value = AssetId> {
    let names = prop::sample::select(vec!["", "A", "HOSKY", "TokenName1", "SUNDAE"]);
    (policy_strategy(), names).prop_map(|(policy, name)| {
        // The pool only holds valid names.
        let name = AssetName::new(name.as_bytes().to_vec()).unwrap_or_default();
        AssetId::new(policy, name)
    })
}

/// Lovelace amounts a user might send.
pub fn lovelace_strategy() -> impl Strategy<Value = u64> {
    0u64..=50_000_000_000
}

/// Values with up to four assets.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    (
        0u128..=100_000_000_000,
        prop::collection::vec((asset_id_strategy(), 1u128..=1_000_000_000), 0..=4),
    )
        .prop_map(|(coin, assets)| Value::from_parts(coin, assets))
}

/// Values a wallet UTXO could hold: always enough coin to exist on chain.
pub fn utxo_value_strategy() -> impl Strategy<Value = Value> {
    (1_000_000u128..=100_000_000_000, value_strategy())
        .prop_map(|(coin, value)| Value::from_parts(coin, value.assets().clone()))
}

/// Between one and `max_len` UTXOs owned by [`owner`], each with a
/// distinct reference.
pub fn utxo_set_strategy(max_len: usize) -> impl Strategy<Value = Vec<Utxo>> {
    prop::collection::vec(utxo_value_strategy(), 1..=max_len.max(1)).prop_map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| utxo(i as u8, i as u32, value))
            .collect()
    })
}

/// Coin-only UTXO sets with amounts between 1 and 100 ADA.
pub fn ada_utxo_set_strategy(max_len: usize) -> impl Strategy<Value = Vec<Utxo>> {
    prop::collection::vec(1_000_000u64..=100_000_000, 1..=max_len.max(1))
        .prop_map(|amounts| ada_utxos(&amounts))
}

// ============================================================================
// In-memory collaborators
// ============================================================================

/// Collaborator calls [`MockChain`] counts and can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    /// `ProtocolParameterSource::fetch_parameters`
    FetchParameters,
    /// `UtxoSource::list_utxos`
    ListUtxos,
    /// `Signer::sign`
    Sign,
    /// `Submitter::submit`
    Submit,
}

/// A chain, a wallet and a node in one value.
///
/// Submissions are recorded and answered with the id of the submitted
/// body. Any call can be made to fail with [`MockChain::fail`].
#[derive(Debug)]
pub struct MockChain {
    parameters: ProtocolParameters,
    utxos: HashMap<Address, Vec<Utxo>>,
    witness_set: Vec<u8>,
    failures: Mutex<HashMap<Call, CollaboratorError>>,
    calls: Mutex<HashMap<Call, usize>>,
    submitted: Mutex<Vec<Vec<u8>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockChain {
    /// An empty chain using `parameters`
    pub fn new(parameters: ProtocolParameters) -> Self {
        Self {
            parameters,
            utxos: HashMap::new(),
            witness_set: codec::EMPTY_WITNESS_SET.to_vec(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Adds UTXOs, keyed by their owners
    pub fn with_utxos(mut self, utxos: impl IntoIterator<Item = Utxo>) -> Self {
        for utxo in utxos {
            self.utxos.entry(utxo.owner.clone()).or_default().push(utxo);
        }
        self
    }

    /// Sets the witness set the signer hands back
    pub fn with_witness_set(mut self, witness_set: Vec<u8>) -> Self {
        self.witness_set = witness_set;
        self
    }

    /// Makes every later `call` fail with `error`
    pub fn fail(&self, call: Call, error: CollaboratorError) {
        lock(&self.failures).insert(call, error);
    }

    /// Number of times `call` was made
    pub fn calls(&self, call: Call) -> usize {
        lock(&self.calls).get(&call).copied().unwrap_or(0)
    }

    /// Signed transactions accepted so far
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        lock(&self.submitted).clone()
    }

    fn enter(&self, call: Call) -> CollaboratorResult<()> {
        *lock(&self.calls).entry(call).or_insert(0) += 1;
        match lock(&self.failures).get(&call) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProtocolParameterSource for MockChain {
    type Parameters = ProtocolParameters;

    async fn fetch_parameters(&self) -> CollaboratorResult<ProtocolParameters> {
        self.enter(Call::FetchParameters)?;
        Ok(self.parameters.clone())
    }
}

#[async_trait]
impl UtxoSource for MockChain {
    type Utxo = Utxo;

    async fn list_utxos(&self, owner: &str) -> CollaboratorResult<Vec<Utxo>> {
        self.enter(Call::ListUtxos)?;
        let owner: Address = owner
            .parse()
            .map_err(|e| CollaboratorError::Network(format!("bad address: {e}")))?;
        Ok(self.utxos.get(&owner).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl Signer for MockChain {
    async fn sign(&self, _unsigned_tx: &[u8]) -> CollaboratorResult<Vec<u8>> {
        self.enter(Call::Sign)?;
        Ok(self.witness_set.clone())
    }
}

#[async_trait]
impl Submitter for MockChain {
    async fn submit(&self, signed_tx: &[u8]) -> CollaboratorResult<TxHash> {
        self.enter(Call::Submit)?;
        let (body, _) = codec::split_transaction(signed_tx)
            .map_err(|e| CollaboratorError::SubmissionRejected { reason: e.to_string() })?;
        let id = hex::encode(codec::tx_id(body));
        lock(&self.submitted).push(signed_tx.to_vec());
        Ok(TxHash::new(id))
    }
}

// ============================================================================
// Tests
// ============================================================================
