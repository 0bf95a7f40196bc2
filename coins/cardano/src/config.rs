use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{Result, TransferError};
use crate::params::ProtocolParameters;

/// Cardano network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_id: u8,
    pub name: String,
    pub currency_symbol: String,
    pub decimals: u8,
    pub blockfrost_url: String,
    pub explorer: String,
    pub address_prefix: String,
    /// Used when no parameter source is reachable.
    #[serde(default)]
    pub parameters: ProtocolParameters,
}

/// Cardano network IDs
pub const MAINNET_NETWORK_ID: u8 = 1;
pub const TESTNET_NETWORK_ID: u8 = 0; // Preview/Preprod

/// Lovelace is the smallest unit (1 ADA = 1,000,000 Lovelace)
pub const LOVELACE_PER_ADA: u64 = 1_000_000;

impl NetworkConfig {
    /// Cardano Mainnet configuration
    pub fn mainnet() -> Self {
        NetworkConfig {
            network_id: MAINNET_NETWORK_ID,
            name: "mainnet".to_string(),
            currency_symbol: "ADA".to_string(),
            decimals: 6, // 1 ADA = 1,000,000 Lovelace
            blockfrost_url: "https://cardano-mainnet.blockfrost.io/api/v0".to_string(),
            explorer: "https://cardanoscan.io".to_string(),
            address_prefix: "addr".to_string(),
            parameters: ProtocolParameters::mainnet_defaults(),
        }
    }

    /// Cardano Preview Testnet configuration
    pub fn preview() -> Self {
        NetworkConfig {
            network_id: TESTNET_NETWORK_ID,
            name: "preview".to_string(),
            currency_symbol: "tADA".to_string(),
            decimals: 6,
            blockfrost_url: "https://cardano-preview.blockfrost.io/api/v0".to_string(),
            explorer: "https://preview.cardanoscan.io".to_string(),
            address_prefix: "addr_test".to_string(),
            parameters: ProtocolParameters::mainnet_defaults(),
        }
    }

    /// Cardano Preprod Testnet configuration
    pub fn preprod() -> Self {
        NetworkConfig {
            network_id: TESTNET_NETWORK_ID,
            name: "preprod".to_string(),
            currency_symbol: "tADA".to_string(),
            decimals: 6,
            blockfrost_url: "https://cardano-preprod.blockfrost.io/api/v0".to_string(),
            explorer: "https://preprod.cardanoscan.io".to_string(),
            address_prefix: "addr_test".to_string(),
            parameters: ProtocolParameters::mainnet_defaults(),
        }
    }

    /// Looks a network up by name (`mainnet`, `preview`, `preprod`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mainnet" => Some(Self::mainnet()),
            "preview" | "testnet" => Some(Self::preview()),
            "preprod" => Some(Self::preprod()),
            _ => None,
        }
    }

    /// Check if mainnet
    pub fn is_mainnet(&self) -> bool {
        self.network_id == MAINNET_NETWORK_ID
    }

    /// Parameters to fall back on when no source is reachable. The public
    /// testnets run mainnet's fee and min-UTXO settings.
    pub fn default_parameters(&self) -> ProtocolParameters {
        self.parameters.clone()
    }

    pub fn with_parameters(mut self, parameters: ProtocolParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Rejects Shelley addresses tagged for another network.
    ///
    /// Byron addresses carry no network tag and pass.
    pub fn check_address(&self, address: &Address) -> Result<()> {
        match address.network_id() {
            Some(id) if id != self.network_id => Err(TransferError::invalid_address(
                address.to_string(),
                format!("address is for network {id}, expected {} ({})", self.network_id, self.name),
            )),
            _ => Ok(()),
        }
    }

    pub fn explorer_tx_url(&self, tx_id: &str) -> String {
        format!("{}/transaction/{}", self.explorer, tx_id)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}
