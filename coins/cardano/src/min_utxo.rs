//! Minimum coin an output has to carry, by ledger era.

use crate::address::Address;
use crate::codec::{uint_len, value_len_with_coin};
use crate::params::{MinUtxoRule, ProtocolParameters};
use crate::value::Value;

/// Words charged for a UTXO entry before its value.
pub const UTXO_ENTRY_WORDS: u64 = 27;

/// Words an Alonzo coin-only output is priced at.
pub const COIN_ONLY_WORDS: u64 = 29;

/// Bytes Babbage adds to every serialized output.
pub const BABBAGE_OUTPUT_OVERHEAD: u64 = 160;

/// Address length assumed when the receiving address is not known yet.
const ASSUMED_ADDRESS_LEN: usize = 57;

const WORD: u64 = 8;
const ASSET_ENTRY_OVERHEAD: u64 = 12;
const POLICY_ID_BYTES: u64 = 28;
const BUNDLE_BASE_WORDS: u64 = 6;

/// `6 + ceil((assets * 12 + name bytes + policies * 28) / 8)`
pub fn bundle_words(assets: &Value) -> u64 {
    if !assets.has_assets() {
        return 0;
    }
    let bytes = assets.asset_count() as u64 * ASSET_ENTRY_OVERHEAD
        + assets.total_name_len() as u64
        + assets.policy_count() as u64 * POLICY_ID_BYTES;
    BUNDLE_BASE_WORDS + bytes.div_ceil(WORD)
}

/// Minimum coin for an output carrying the assets of `value`.
///
/// The coin already in `value` is ignored. The result is never below
/// `min_utxo_value`.
pub fn min_coin_for(value: &Value, params: &ProtocolParameters) -> u64 {
    min_coin(value, ASSUMED_ADDRESS_LEN, params)
}

/// Like [`min_coin_for`] but sized with the real address of the output.
pub fn min_coin_for_output(address: &Address, value: &Value, params: &ProtocolParameters) -> u64 {
    min_coin(value, address.len(), params)
}

fn min_coin(value: &Value, address_len: usize, params: &ProtocolParameters) -> u64 {
    let rule_cost = match params.min_utxo {
        MinUtxoRule::Mary => {
            if value.has_assets() {
                let per_word = params.min_utxo_value / UTXO_ENTRY_WORDS;
                per_word.saturating_mul(UTXO_ENTRY_WORDS + bundle_words(value))
            } else {
                params.min_utxo_value
            }
        }
        MinUtxoRule::Alonzo { coins_per_word } => {
            let words = if value.has_assets() {
                UTXO_ENTRY_WORDS + bundle_words(value)
            } else {
                COIN_ONLY_WORDS
            };
            coins_per_word.saturating_mul(words)
        }
        MinUtxoRule::Babbage { coins_per_byte } => {
            let size = BABBAGE_OUTPUT_OVERHEAD + output_len(value, address_len);
            coins_per_byte.saturating_mul(size)
        }
    };
    rule_cost.max(params.min_utxo_value)
}

/// Serialized size of `[address, value]` with the widest possible coin.
fn output_len(value: &Value, address_len: usize) -> u64 {
    let address = uint_len(address_len as u128) + address_len;
    (1 + address + value_len_with_coin(value, u64::MAX as u128)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{AssetId, AssetName, PolicyId};

    fn asset(policy: u8, name: &str) -> AssetId {
        AssetId::new(PolicyId::new([policy; 28]), AssetName::new(name.as_bytes().to_vec()).unwrap())
    }

    fn alonzo(coins_per_word: u64) -> ProtocolParameters {
        ProtocolParameters {
            min_utxo: MinUtxoRule::Alonzo { coins_per_word },
            ..ProtocolParameters::mainnet_defaults()
        }
    }

    #[test]
    fn test_bundle_words() {
        assert_eq!(bundle_words(&Value::from_coin(5)), 0);
        // 12 + 0 + 28 = 40 bytes -> 5 words
        assert_eq!(bundle_words(&Value::zero().with_asset(asset(1, ""), 1)), 11);
        // 12 + 10 + 28 = 50 bytes -> 7 words
        assert_eq!(bundle_words(&Value::zero().with_asset(asset(1, "TokenName1"), 1)), 13);
    }

    #[test]
    fn test_coin_only_babbage() {
        let params = ProtocolParameters::mainnet_defaults();
        // (160 + 69) * 4310 falls below the floor
        assert_eq!(min_coin_for(&Value::zero(), &params), 1_000_000);
        let params = ProtocolParameters {
            min_utxo_value: 0,
            ..params
        };
        assert_eq!(min_coin_for(&Value::zero(), &params), 229 * 4_310);
    }

    #[test]
    fn test_coin_only_alonzo_and_mary() {
        let params = ProtocolParameters {
            min_utxo_value: 0,
            ..alonzo(34_482)
        };
        assert_eq!(min_coin_for(&Value::zero(), &params), 29 * 34_482);

        let mary = ProtocolParameters {
            min_utxo: MinUtxoRule::Mary,
            ..ProtocolParameters::mainnet_defaults()
        };
        assert_eq!(min_coin_for(&Value::from_coin(7), &mary), 1_000_000);
    }

    #[test]
    fn test_alonzo_with_asset() {
        let value = Value::zero().with_asset(asset(1, "TokenName1"), 10);
        // (27 + 13) * 30_000
        assert_eq!(min_coin_for(&value, &alonzo(30_000)), 1_200_000);
    }

    #[test]
    fn test_mary_with_asset() {
        let params = ProtocolParameters {
            min_utxo: MinUtxoRule::Mary,
            ..ProtocolParameters::mainnet_defaults()
        };
        let value = Value::zero().with_asset(asset(1, ""), 1);
        // 1_000_000 / 27 = 37_037 per word, 38 words
        assert_eq!(min_coin_for(&value, &params), 37_037 * 38);
    }

    #[test]
    fn test_babbage_with_asset_uses_encoded_size() {
        let params = ProtocolParameters::mainnet_defaults();
        let value = Value::zero().with_asset(asset(1, "A"), 1);
        // header 1, address 59, value 1 + 9 + (1 + 30 + 1 + 2 + 1)
        let size = 160 + 1 + 59 + 1 + 9 + 35;
        assert_eq!(min_coin_for(&value, &params), 4_310 * size);
    }

    #[test]
    fn test_floor_applies() {
        let params = ProtocolParameters {
            min_utxo_value: 5_000_000,
            ..alonzo(1)
        };
        let value = Value::zero().with_asset(asset(1, "A"), 1);
        assert_eq!(min_coin_for(&value, &params), 5_000_000);
    }

    #[test]
    fn test_real_address_length() {
        let params = ProtocolParameters::mainnet_defaults();
        let value = Value::zero().with_asset(asset(1, "A"), 1);
        let enterprise = Address::enterprise(&[1u8; 32], 1);
        let base = Address::base(&[1u8; 32], &[2u8; 32], 1);

        assert_eq!(min_coin_for_output(&base, &value, &params), min_coin_for(&value, &params));
        assert_eq!(
            min_coin_for(&value, &params) - min_coin_for_output(&enterprise, &value, &params),
            28 * 4_310
        );
    }

    #[test]
    fn test_more_assets_never_cheaper() {
        let params = ProtocolParameters::mainnet_defaults();
        let one = Value::zero().with_asset(asset(1, "A"), 1);
        let two = one.clone().with_asset(asset(2, "B"), 1);
        let longer = Value::zero().with_asset(asset(1, "ABCDEFGH"), 1);
        assert!(min_coin_for(&two, &params) >= min_coin_for(&one, &params));
        assert!(min_coin_for(&longer, &params) >= min_coin_for(&one, &params));
    }
}
