use serde::Serialize;

use crate::lovelace::format_ada;
use crate::utxo::Utxo;
use crate::value::{AssetId, Value};

/// One native asset held by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub unit: String,
    pub policy_id: String,
    /// Hex of the raw name.
    pub asset_name: String,
    /// Name as text when it is printable UTF-8, hex otherwise.
    pub display_name: String,
    pub quantity: u128,
}

impl TokenBalance {
    fn new(asset: &AssetId, quantity: u128) -> Self {
        Self {
            unit: asset.unit(),
            policy_id: asset.policy.to_string(),
            asset_name: asset.name.to_hex(),
            display_name: asset.name.to_string(),
            quantity,
        }
    }
}

/// What a wallet holds across its UTXOs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletBalance {
    pub lovelace: u128,
    pub ada: String,
    pub tokens: Vec<TokenBalance>,
    pub utxo_count: usize,
}

impl WalletBalance {
    pub fn from_value(value: &Value, utxo_count: usize) -> Self {
        Self {
            lovelace: value.coin(),
            ada: format_ada(value.coin()),
            tokens: value
                .assets()
                .iter()
                .map(|(asset, &quantity)| TokenBalance::new(asset, quantity))
                .collect(),
            utxo_count,
        }
    }

    pub fn from_utxos(utxos: &[Utxo]) -> Self {
        let total: Value = utxos.iter().map(|u| &u.value).sum();
        Self::from_value(&total, utxos.len())
    }

    pub fn token(&self, unit: &str) -> Option<&TokenBalance> {
        self.tokens.iter().find(|t| t.unit == unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::utxo::UtxoRef;
    use crate::value::{AssetName, PolicyId};

    fn token(name: &[u8]) -> AssetId {
        AssetId::new(PolicyId::new([0xcc; 28]), AssetName::new(name.to_vec()).unwrap())
    }

    fn utxo(n: u8, value: Value) -> Utxo {
        Utxo::new(UtxoRef::new([n; 32], 0), Address::enterprise(&[1; 32], 1), value)
    }

    #[test]
    fn test_aggregates_across_utxos() {
        let utxos = vec![
            utxo(1, Value::from_coin(1_500_000).with_asset(token(b"HOSKY"), 1_000)),
            utxo(2, Value::from_coin(2_000_000).with_asset(token(b"HOSKY"), 500)),
            utxo(3, Value::from_coin(250_000).with_asset(token(&[0xff, 0x00]), 1)),
        ];
        let balance = WalletBalance::from_utxos(&utxos);

        assert_eq!(balance.lovelace, 3_750_000);
        assert_eq!(balance.ada, "3.750000");
        assert_eq!(balance.utxo_count, 3);
        assert_eq!(balance.tokens.len(), 2);

        let hosky = balance.token(&token(b"HOSKY").unit()).unwrap();
        assert_eq!(hosky.quantity, 1_500);
        assert_eq!(hosky.display_name, "HOSKY");

        let binary = balance.token(&token(&[0xff, 0x00]).unit()).unwrap();
        assert_eq!(binary.display_name, "ff00");
    }

    #[test]
    fn test_empty_wallet() {
        let balance = WalletBalance::from_utxos(&[]);
        assert_eq!(balance.lovelace, 0);
        assert!(balance.tokens.is_empty());
    }

    #[test]
    fn test_serializes() {
        let balance = WalletBalance::from_value(&Value::from_coin(1_000_000), 1);
        let json = serde_json::to_value(&balance).unwrap();
        assert_eq!(json["ada"], "1.000000");
        assert_eq!(json["utxo_count"], 1);
    }
}
