use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use thiserror::Error;

use crate::error::{Result, TransferError};

/// Policy ids are blake2b-224 script hashes.
pub const POLICY_ID_LEN: usize = 28;

/// Ledger limit on asset name length.
pub const MAX_ASSET_NAME_LEN: usize = 32;

/// Minting policy hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyId([u8; POLICY_ID_LEN]);

impl PolicyId {
    pub fn new(bytes: [u8; POLICY_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; POLICY_ID_LEN] = bytes.try_into().map_err(|_| {
            TransferError::InvalidAssetId(format!(
                "policy id must be {} bytes, got {}",
                POLICY_ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for PolicyId {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| TransferError::InvalidAssetId(format!("policy id '{s}': {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Asset name bytes, at most 32 of them. The empty name is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_ASSET_NAME_LEN {
            return Err(TransferError::InvalidAssetId(format!(
                "asset name is {} bytes, limit is {}",
                bytes.len(),
                MAX_ASSET_NAME_LEN
            )));
        }
        Ok(Self(bytes))
    }

    /// Accepts either the hex form wallets report or plain text.
    ///
    /// Even-length strings that decode as hex are taken as hex, anything else
    /// is used as its UTF-8 bytes.
    pub fn from_hex_or_utf8(name: &str) -> Result<Self> {
        if name.len() % 2 == 0 {
            if let Ok(bytes) = hex::decode(name) {
                return Self::new(bytes);
            }
        }
        Self::new(name.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) if text.chars().all(|c| !c.is_control()) => f.write_str(text),
            _ => f.write_str(&self.to_hex()),
        }
    }
}

/// A native asset class: policy plus name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId {
    pub policy: PolicyId,
    pub name: AssetName,
}

impl AssetId {
    pub fn new(policy: PolicyId, name: AssetName) -> Self {
        Self { policy, name }
    }

    /// Policy hex followed by name hex, the form Blockfrost calls a unit.
    pub fn unit(&self) -> String {
        format!("{}{}", self.policy, self.name.to_hex())
    }

    pub fn from_unit(unit: &str) -> Result<Self> {
        let split = POLICY_ID_LEN * 2;
        if unit.len() < split || !unit.is_char_boundary(split) {
            return Err(TransferError::InvalidAssetId(format!(
                "unit '{unit}' is shorter than a policy id"
            )));
        }
        let (policy, name) = unit.split_at(split);
        let name = hex::decode(name)
            .map_err(|e| TransferError::InvalidAssetId(format!("asset name '{name}': {e}")))?;
        Ok(Self::new(policy.parse()?, AssetName::new(name)?))
    }
}

impl FromStr for AssetId {
    type Err = TransferError;

    /// Parses `policy.name` (name as hex or text) or a bare unit.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((policy, name)) => Ok(Self::new(policy.parse()?, AssetName::from_hex_or_utf8(name)?)),
            None => Self::from_unit(s),
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.policy, self.name.to_hex())
    }
}

pub type MultiAsset = BTreeMap<AssetId, u128>;

/// Subtraction that would leave a component below zero.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegativeValue {
    #[error("coin {have} is less than {need}")]
    Coin { have: u128, need: u128 },

    #[error("asset {asset} quantity {have} is less than {need}")]
    Asset { asset: AssetId, have: u128, need: u128 },
}

/// Lovelace plus a flat bundle of native assets.
///
/// Zero quantities are never stored, so two values are equal exactly when
/// they hold the same amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    coin: u128,
    assets: MultiAsset,
}

impl Value {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_coin(coin: u128) -> Self {
        Self {
            coin,
            assets: MultiAsset::new(),
        }
    }

    pub fn from_parts(coin: u128, assets: impl IntoIterator<Item = (AssetId, u128)>) -> Self {
        let mut value = Self::from_coin(coin);
        for (asset, quantity) in assets {
            value.add_asset(asset, quantity);
        }
        value
    }

    pub fn with_asset(mut self, asset: AssetId, quantity: u128) -> Self {
        self.add_asset(asset, quantity);
        self
    }

    pub fn add_asset(&mut self, asset: AssetId, quantity: u128) {
        if quantity == 0 {
            return;
        }
        let entry = self.assets.entry(asset).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    pub fn coin(&self) -> u128 {
        self.coin
    }

    pub fn set_coin(&mut self, coin: u128) {
        self.coin = coin;
    }

    pub fn assets(&self) -> &MultiAsset {
        &self.assets
    }

    pub fn quantity_of(&self, asset: &AssetId) -> u128 {
        self.assets.get(asset).copied().unwrap_or(0)
    }

    pub fn has_assets(&self) -> bool {
        !self.assets.is_empty()
    }

    /// Decodes a CIP-30 `getBalance` result.
    pub fn from_cbor_hex(text: &str) -> Result<Self> {
        crate::codec::decode_value(&hex::decode(text.trim())?)
    }

    /// The asset bundle without any coin.
    pub fn assets_only(&self) -> Value {
        Self {
            coin: 0,
            assets: self.assets.clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.coin == 0 && self.assets.is_empty()
    }

    pub fn add(&self, other: &Value) -> Value {
        let mut sum = self.clone();
        sum += other;
        sum
    }

    pub fn checked_sub(&self, other: &Value) -> std::result::Result<Value, NegativeValue> {
        let coin = self.coin.checked_sub(other.coin).ok_or(NegativeValue::Coin {
            have: self.coin,
            need: other.coin,
        })?;

        let mut assets = self.assets.clone();
        for (asset, &need) in &other.assets {
            let have = self.quantity_of(asset);
            let left = have.checked_sub(need).ok_or_else(|| NegativeValue::Asset {
                asset: asset.clone(),
                have,
                need,
            })?;
            if left == 0 {
                assets.remove(asset);
            } else {
                assets.insert(asset.clone(), left);
            }
        }

        Ok(Value { coin, assets })
    }

    /// True when every component of `required` is matched or exceeded.
    pub fn covers(&self, required: &Value) -> bool {
        self.coin >= required.coin
            && required
                .assets
                .iter()
                .all(|(asset, &need)| self.quantity_of(asset) >= need)
    }

    /// Component-wise shortfall of `self` against `required`.
    pub fn deficit(&self, required: &Value) -> Value {
        let mut short = Value::from_coin(required.coin.saturating_sub(self.coin));
        for (asset, &need) in &required.assets {
            short.add_asset(asset.clone(), need.saturating_sub(self.quantity_of(asset)));
        }
        short
    }

    pub fn policy_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for asset in self.assets.keys() {
            if last != Some(&asset.policy) {
                count += 1;
                last = Some(&asset.policy);
            }
        }
        count
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Sum of name lengths over distinct asset names.
    pub fn total_name_len(&self) -> usize {
        let mut names: Vec<&AssetName> = self.assets.keys().map(|a| &a.name).collect();
        names.sort();
        names.dedup();
        names.iter().map(|n| n.len()).sum()
    }

    /// Assets grouped by policy, in canonical order.
    pub fn by_policy(&self) -> BTreeMap<&PolicyId, Vec<(&AssetName, u128)>> {
        let mut grouped: BTreeMap<&PolicyId, Vec<(&AssetName, u128)>> = BTreeMap::new();
        for (asset, &quantity) in &self.assets {
            grouped
                .entry(&asset.policy)
                .or_default()
                .push((&asset.name, quantity));
        }
        grouped
    }
}

impl Add for Value {
    type Output = Value;

    fn add(mut self, rhs: Value) -> Value {
        self += &rhs;
        self
    }
}

impl<'a> Add<&'a Value> for &'a Value {
    type Output = Value;

    fn add(self, rhs: &'a Value) -> Value {
        Value::add(self, rhs)
    }
}

impl AddAssign<&Value> for Value {
    fn add_assign(&mut self, rhs: &Value) {
        self.coin = self.coin.saturating_add(rhs.coin);
        for (asset, &quantity) in &rhs.assets {
            self.add_asset(asset.clone(), quantity);
        }
    }
}

impl AddAssign for Value {
    fn add_assign(&mut self, rhs: Value) {
        *self += &rhs;
    }
}

impl Sum for Value {
    fn sum<I: Iterator<Item = Value>>(iter: I) -> Value {
        iter.fold(Value::zero(), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Value> for Value {
    fn sum<I: Iterator<Item = &'a Value>>(iter: I) -> Value {
        iter.fold(Value::zero(), |mut acc, v| {
            acc += v;
            acc
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lovelace", self.coin)?;
        for (asset, quantity) in &self.assets {
            write!(f, " + {quantity} {asset}")?;
        }
        Ok(())
    }
}
