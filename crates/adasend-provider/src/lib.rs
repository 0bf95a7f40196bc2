//! # adasend Provider
//!
//! Blockfrost access for the adasend transfer engine. [`BlockfrostClient`]
//! implements the network-facing collaborators from `adasend-traits`:
//!
//! - [`ProtocolParameterSource`] via `GET /epochs/latest/parameters`
//! - [`UtxoSource`] via the paged `GET /addresses/{address}/utxos`
//! - [`Submitter`] via `POST /tx/submit`
//!
//! It also lists the native assets known to the chain (`GET /assets`) for
//! token pickers.
//!
//! Requests share one pooled HTTP client and an optional rate limiter.
//!
//! ## Example
//!
//! ```ignore
//! use adasend_provider::{BlockfrostClient, BlockfrostConfig};
//!
//! let config = BlockfrostConfig::mainnet("mainnetXXXXXXXX").with_timeout(20);
//! let client = BlockfrostClient::new(config)?;
//!
//! let params = client.protocol_parameters().await?;
//! let utxos = client.address_utxos("addr1...").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use adasend_cardano::{
    Address, AssetId, MinUtxoRule, NetworkConfig, ProtocolParameters, Utxo, UtxoRef, Value,
};
use adasend_traits::{
    CollaboratorError, CollaboratorResult, ProtocolParameterSource, Submitter, TxHash, UtxoSource,
};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Blockfrost pages hold at most this many entries.
pub const PAGE_SIZE: usize = 100;

/// Header Blockfrost reads the project id from.
pub const PROJECT_ID_HEADER: &str = "project_id";

/// Provider-related errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration that cannot produce a working client
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from Blockfrost
    #[error("Blockfrost returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the response body
        message: String,
    },

    /// Response that does not describe valid chain data
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    fn decode(err: impl std::fmt::Display) -> Self {
        ProviderError::Decode(err.to_string())
    }

    /// Status code for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<ProviderError> for CollaboratorError {
    fn from(err: ProviderError) -> Self {
        CollaboratorError::Network(err.to_string())
    }
}

/// Configuration for a Blockfrost endpoint
#[derive(Debug, Clone)]
pub struct BlockfrostConfig {
    /// API base URL including the `/api/v0` path
    pub base_url: String,
    /// Blockfrost project id
    pub project_id: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
    /// Rate limit, `None` to disable
    pub rate_limit: Option<RateLimitConfig>,
    /// User agent string
    pub user_agent: String,
}

impl BlockfrostConfig {
    /// Creates a configuration for the given base URL and project id
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            project_id: project_id.into(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 10,
            rate_limit: Some(RateLimitConfig::default()),
            user_agent: format!("adasend/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Mainnet endpoint
    pub fn mainnet(project_id: impl Into<String>) -> Self {
        Self::for_network(&NetworkConfig::mainnet(), project_id)
    }

    /// Preprod testnet endpoint
    pub fn preprod(project_id: impl Into<String>) -> Self {
        Self::for_network(&NetworkConfig::preprod(), project_id)
    }

    /// Preview testnet endpoint
    pub fn preview(project_id: impl Into<String>) -> Self {
        Self::for_network(&NetworkConfig::preview(), project_id)
    }

    /// Endpoint configured for a network preset
    pub fn for_network(network: &NetworkConfig, project_id: impl Into<String>) -> Self {
        Self::new(network.blockfrost_url.clone(), project_id)
    }

    /// Sets the request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets or disables the rate limit
    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimitConfig>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProviderError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if self.project_id.trim().is_empty() {
            return Err(ProviderError::InvalidConfig("project id is empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ProviderError::InvalidConfig("timeout must be positive".into()));
        }
        if let Some(limit) = &self.rate_limit {
            limit.quota()?;
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub requests_per_second: u32,
    /// Burst size (max requests in a burst)
    pub burst_size: u32,
}

impl RateLimitConfig {
    fn quota(&self) -> Result<Quota> {
        let rate = NonZeroU32::new(self.requests_per_second)
            .ok_or_else(|| ProviderError::InvalidConfig("requests_per_second must be positive".into()))?;
        let burst = NonZeroU32::new(self.burst_size)
            .ok_or_else(|| ProviderError::InvalidConfig("burst_size must be positive".into()))?;
        Ok(Quota::per_second(rate).allow_burst(burst))
    }
}

impl Default for RateLimitConfig {
    // Blockfrost allows 10 requests per second with a burst of 500.
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 50,
        }
    }
}

/// `/epochs/latest/parameters`, only the fields the engine uses.
#[derive(Debug, Clone, Deserialize)]
pub struct EpochParameters {
    /// Linear fee coefficient
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub min_fee_a: u64,
    /// Linear fee constant
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub min_fee_b: u64,
    /// Maximum transaction size in bytes
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_tx_size: u32,
    /// Maximum serialized value size in bytes
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub max_val_size: Option<u32>,
    /// Stake key deposit
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub key_deposit: u64,
    /// Pool deposit
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub pool_deposit: u64,
    /// Pre-Alonzo flat minimum
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub min_utxo: Option<u64>,
    /// Babbage cost per byte
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub coins_per_utxo_size: Option<u64>,
    /// Alonzo cost per word
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub coins_per_utxo_word: Option<u64>,
}

impl EpochParameters {
    /// Converts to engine parameters.
    ///
    /// The rule is picked from the newest cost field present. Fields the
    /// response leaves out fall back to the mainnet defaults.
    pub fn into_protocol_parameters(self) -> Result<ProtocolParameters> {
        let defaults = ProtocolParameters::mainnet_defaults();
        let min_utxo = match (self.coins_per_utxo_size, self.coins_per_utxo_word) {
            (Some(coins_per_byte), _) => MinUtxoRule::Babbage { coins_per_byte },
            (None, Some(coins_per_word)) => MinUtxoRule::Alonzo { coins_per_word },
            (None, None) => MinUtxoRule::Mary,
        };
        let params = ProtocolParameters {
            min_fee_a: self.min_fee_a,
            min_fee_b: self.min_fee_b,
            min_utxo,
            min_utxo_value: self.min_utxo.unwrap_or(defaults.min_utxo_value),
            max_tx_size: self.max_tx_size,
            max_value_size: self.max_val_size.unwrap_or(defaults.max_value_size),
            pool_deposit: self.pool_deposit,
            key_deposit: self.key_deposit,
        };
        params.validate().map_err(ProviderError::decode)?;
        Ok(params)
    }
}

/// One `{ unit, quantity }` entry of an amount list.
#[derive(Debug, Clone, Deserialize)]
pub struct Amount {
    /// `lovelace` or policy id followed by hex asset name
    pub unit: String,
    /// Quantity as a decimal string
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub quantity: u128,
}

/// Folds an amount list into a [`Value`].
pub fn value_from_amounts(amounts: &[Amount]) -> Result<Value> {
    let mut value = Value::zero();
    for amount in amounts {
        if amount.unit == "lovelace" {
            value.set_coin(value.coin().saturating_add(amount.quantity));
        } else {
            let asset = AssetId::from_unit(&amount.unit).map_err(ProviderError::decode)?;
            value.add_asset(asset, amount.quantity);
        }
    }
    Ok(value)
}

/// Entry of `/addresses/{address}/utxos`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressUtxo {
    /// Owning address
    pub address: String,
    /// Transaction hash, hex
    pub tx_hash: String,
    /// Output index within the transaction
    pub output_index: u32,
    /// Coin and assets held
    pub amount: Vec<Amount>,
}

impl AddressUtxo {
    /// Converts to an engine UTXO.
    pub fn into_utxo(self) -> Result<Utxo> {
        let reference =
            UtxoRef::from_hex(&self.tx_hash, self.output_index).map_err(ProviderError::decode)?;
        let owner: Address = self.address.parse().map_err(ProviderError::decode)?;
        let value = value_from_amounts(&self.amount)?;
        Ok(Utxo::new(reference, owner, value))
    }
}

/// Entry of the `/assets` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetListing {
    /// Policy id followed by hex asset name
    pub asset: String,
    /// Circulating quantity
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub quantity: u128,
}

/// Token registry metadata attached to an asset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetMetadata {
    /// Registered display name
    pub name: Option<String>,
    /// Registered ticker
    pub ticker: Option<String>,
    /// Registered description
    pub description: Option<String>,
    /// Decimal places the registry advertises
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub decimals: Option<u8>,
    /// Project URL
    pub url: Option<String>,
}

/// `/assets/{asset}`
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDetails {
    /// Policy id followed by hex asset name
    pub asset: String,
    /// Minting policy, hex
    pub policy_id: String,
    /// Hex asset name, absent for nameless assets
    pub asset_name: Option<String>,
    /// CIP-14 fingerprint
    pub fingerprint: String,
    /// Circulating quantity
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub quantity: u128,
    /// Token registry entry, if any
    #[serde(default)]
    pub metadata: Option<AssetMetadata>,
}

impl AssetDetails {
    /// Summary for display. The symbol is the registered ticker, else the
    /// on-chain name when it is text. Registered assets count as verified.
    pub fn token_info(&self) -> Result<TokenInfo> {
        let asset = AssetId::from_unit(&self.asset).map_err(ProviderError::decode)?;
        let metadata = self.metadata.as_ref();
        let on_chain = (!asset.name.is_empty()).then(|| asset.name.to_string());

        let symbol = metadata
            .and_then(|m| m.ticker.clone())
            .or_else(|| on_chain.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let name = metadata
            .and_then(|m| m.name.clone())
            .or(on_chain)
            .unwrap_or_else(|| self.fingerprint.clone());

        Ok(TokenInfo {
            unit: self.asset.clone(),
            symbol,
            name,
            fingerprint: self.fingerprint.clone(),
            decimals: metadata.and_then(|m| m.decimals).unwrap_or(0),
            verified: metadata.is_some(),
        })
    }
}

/// A native asset as a token picker shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    /// Policy id followed by hex asset name
    pub unit: String,
    /// Ticker or on-chain name
    pub symbol: String,
    /// Registered name, on-chain name or fingerprint
    pub name: String,
    /// CIP-14 fingerprint
    pub fingerprint: String,
    /// Decimal places, zero when unregistered
    pub decimals: u8,
    /// Whether the token registry lists the asset
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    amount: Vec<Amount>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blockfrost HTTP client with connection pooling and rate limiting
pub struct BlockfrostClient {
    config: BlockfrostConfig,
    client: Client,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl BlockfrostClient {
    /// Creates a client, validating the configuration first
    pub fn new(config: BlockfrostConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        let project_id = header::HeaderValue::from_str(&config.project_id)
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
        headers.insert(PROJECT_ID_HEADER, project_id);

        let client = Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e: reqwest::Error| ProviderError::ConnectionFailed(e.to_string()))?;

        let rate_limiter = match &config.rate_limit {
            Some(limit) => Some(RateLimiter::direct(limit.quota()?)),
            None => None,
        };

        Ok(Self {
            config,
            client,
            rate_limiter,
        })
    }

    /// Returns the configuration
    pub fn config(&self) -> &BlockfrostConfig {
        &self.config
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    async fn get_response(&self, path: &str) -> Result<Response> {
        self.throttle().await;
        let url = self.config.endpoint(path);
        tracing::debug!(%url, "blockfrost request");
        Ok(self.client.get(url).send().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.get_response(path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    /// Current protocol parameters
    pub async fn protocol_parameters(&self) -> Result<ProtocolParameters> {
        let raw: EpochParameters = self
            .get("/epochs/latest/parameters")
            .await?
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: "no protocol parameters".into(),
            })?;
        raw.into_protocol_parameters()
    }

    /// Every UTXO at `address`, following pagination.
    ///
    /// An address Blockfrost has never seen has no UTXOs.
    pub async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        let mut utxos = Vec::new();
        let mut page = 1;
        loop {
            let path = format!("/addresses/{address}/utxos?count={PAGE_SIZE}&page={page}");
            let Some(entries) = self.get::<Vec<AddressUtxo>>(&path).await? else {
                break;
            };
            let full = entries.len() == PAGE_SIZE;
            for entry in entries {
                utxos.push(entry.into_utxo()?);
            }
            if !full {
                break;
            }
            page += 1;
        }
        tracing::debug!(address, count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    /// Total value held at `address`.
    pub async fn address_value(&self, address: &str) -> Result<Value> {
        match self.get::<AddressInfo>(&format!("/addresses/{address}")).await? {
            Some(info) => value_from_amounts(&info.amount),
            None => Ok(Value::zero()),
        }
    }

    /// One page of the `/assets` listing, oldest first.
    pub async fn assets(&self, page: u32) -> Result<Vec<AssetListing>> {
        let path = format!("/assets?count={PAGE_SIZE}&page={page}&order=asc");
        Ok(self.get(&path).await?.unwrap_or_default())
    }

    /// Details of one asset; `None` when Blockfrost does not know it.
    pub async fn asset(&self, unit: &str) -> Result<Option<AssetDetails>> {
        self.get(&format!("/assets/{unit}")).await
    }

    /// Display summaries for up to `limit` assets of a listing page.
    ///
    /// Each asset costs one extra request, subject to the rate limit.
    /// Assets that disappear between the two calls are skipped.
    pub async fn tokens(&self, page: u32, limit: usize) -> Result<Vec<TokenInfo>> {
        let listing = self.assets(page).await?;
        let mut tokens = Vec::with_capacity(listing.len().min(limit));
        for entry in listing.into_iter().take(limit) {
            if let Some(details) = self.asset(&entry.asset).await? {
                tokens.push(details.token_info()?);
            }
        }
        tracing::debug!(page, count = tokens.len(), "fetched token details");
        Ok(tokens)
    }

    /// Submits a signed transaction, returning the hash Blockfrost reports.
    pub async fn submit_transaction(&self, signed_tx: &[u8]) -> Result<TxHash> {
        self.throttle().await;
        let response = self
            .client
            .post(self.config.endpoint("/tx/submit"))
            .header(header::CONTENT_TYPE, "application/cbor")
            .body(signed_tx.to_vec())
            .send()
            .await?;
        let response = check_status(response).await?;
        let hash: String = response.json().await?;
        tracing::info!(tx_hash = %hash, "transaction accepted by blockfrost");
        Ok(TxHash::new(hash))
    }
}

impl std::fmt::Debug for BlockfrostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockfrostClient")
            .field("base_url", &self.config.base_url)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ProtocolParameterSource for BlockfrostClient {
    type Parameters = ProtocolParameters;

    async fn fetch_parameters(&self) -> CollaboratorResult<ProtocolParameters> {
        Ok(self.protocol_parameters().await?)
    }
}

#[async_trait]
impl UtxoSource for BlockfrostClient {
    type Utxo = Utxo;

    async fn list_utxos(&self, owner: &str) -> CollaboratorResult<Vec<Utxo>> {
        Ok(self.address_utxos(owner).await?)
    }
}

#[async_trait]
impl Submitter for BlockfrostClient {
    async fn submit(&self, signed_tx: &[u8]) -> CollaboratorResult<TxHash> {
        match self.submit_transaction(signed_tx).await {
            Ok(hash) => Ok(hash),
            // The node rejected the transaction itself. Anything else is transport.
            Err(ProviderError::Api { status, message }) if (400..500).contains(&status) => {
                Err(CollaboratorError::SubmissionRejected { reason: message })
            }
            Err(e) => Err(e.into()),
        }
    }
}
