use serde::{Deserialize, Serialize};

use crate::error::{Result, TransferError};

/// Which ledger formula prices the minimum coin of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "era", rename_all = "lowercase")]
pub enum MinUtxoRule {
    /// Cost per word derived from `min_utxo_value`.
    Mary,
    Alonzo { coins_per_word: u64 },
    Babbage { coins_per_byte: u64 },
}

/// Protocol parameters a build is priced against.
///
/// Fetched fresh for each build and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// Fee per byte of signed transaction.
    pub min_fee_a: u64,
    /// Constant fee term.
    pub min_fee_b: u64,
    pub min_utxo: MinUtxoRule,
    /// Floor on the coin of any output.
    pub min_utxo_value: u64,
    pub max_tx_size: u32,
    pub max_value_size: u32,
    pub pool_deposit: u64,
    pub key_deposit: u64,
}

impl ProtocolParameters {
    /// Values in force on mainnet since the Babbage hard fork.
    pub fn mainnet_defaults() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            min_utxo: MinUtxoRule::Babbage {
                coins_per_byte: 4_310,
            },
            min_utxo_value: 1_000_000,
            max_tx_size: 16_384,
            max_value_size: 5_000,
            pool_deposit: 500_000_000,
            key_deposit: 2_000_000,
        }
    }

    /// `min_fee_a * size + min_fee_b`
    pub fn linear_fee(&self, size: usize) -> u64 {
        self.min_fee_a
            .saturating_mul(size as u64)
            .saturating_add(self.min_fee_b)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tx_size == 0 {
            return Err(TransferError::InvalidParameters(
                "max_tx_size must be positive".into(),
            ));
        }
        if self.max_value_size == 0 {
            return Err(TransferError::InvalidParameters(
                "max_value_size must be positive".into(),
            ));
        }
        match self.min_utxo {
            MinUtxoRule::Alonzo { coins_per_word: 0 } => Err(TransferError::InvalidParameters(
                "coins_per_word must be positive".into(),
            )),
            MinUtxoRule::Babbage { coins_per_byte: 0 } => Err(TransferError::InvalidParameters(
                "coins_per_byte must be positive".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self::mainnet_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_fee() {
        let params = ProtocolParameters::mainnet_defaults();
        assert_eq!(params.linear_fee(0), 155_381);
        assert_eq!(params.linear_fee(300), 44 * 300 + 155_381);
    }

    #[test]
    fn test_linear_fee_saturates() {
        let params = ProtocolParameters {
            min_fee_a: u64::MAX,
            ..ProtocolParameters::mainnet_defaults()
        };
        assert_eq!(params.linear_fee(2), u64::MAX);
    }

    #[test]
    fn test_validate() {
        assert!(ProtocolParameters::mainnet_defaults().validate().is_ok());

        let params = ProtocolParameters {
            max_tx_size: 0,
            ..ProtocolParameters::mainnet_defaults()
        };
        assert!(matches!(params.validate(), Err(TransferError::InvalidParameters(_))));

        let params = ProtocolParameters {
            min_utxo: MinUtxoRule::Babbage { coins_per_byte: 0 },
            ..ProtocolParameters::mainnet_defaults()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rule_serialization() {
        let json = serde_json::to_value(MinUtxoRule::Alonzo { coins_per_word: 34_482 }).unwrap();
        assert_eq!(json["era"], "alonzo");
        assert_eq!(json["coins_per_word"], 34_482);

        let back: MinUtxoRule = serde_json::from_str(r#"{"era":"mary"}"#).unwrap();
        assert_eq!(back, MinUtxoRule::Mary);
    }

    #[test]
    fn test_parameters_json_round_trip() {
        let params = ProtocolParameters::mainnet_defaults();
        let json = serde_json::to_string(&params).unwrap();
        let back: ProtocolParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
