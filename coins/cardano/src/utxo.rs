use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::address::Address;
use crate::codec;
use crate::error::{Result, TransferError};
use crate::value::Value;

pub const TX_HASH_LEN: usize = 32;

/// Points at one output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtxoRef {
    pub tx_hash: [u8; TX_HASH_LEN],
    pub index: u32,
}

impl UtxoRef {
    pub fn new(tx_hash: [u8; TX_HASH_LEN], index: u32) -> Self {
        Self { tx_hash, index }
    }

    pub fn from_hex(tx_hash: &str, index: u32) -> Result<Self> {
        let bytes = hex::decode(tx_hash)?;
        let tx_hash: [u8; TX_HASH_LEN] = bytes.as_slice().try_into().map_err(|_| {
            TransferError::Codec(format!(
                "transaction hash must be {TX_HASH_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { tx_hash, index })
    }

    pub fn tx_hash_hex(&self) -> String {
        hex::encode(self.tx_hash)
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash_hex(), self.index)
    }
}

impl FromStr for UtxoRef {
    type Err = TransferError;

    /// `<tx hash hex>#<index>`
    fn from_str(s: &str) -> Result<Self> {
        let (hash, index) = s
            .split_once('#')
            .ok_or_else(|| TransferError::Codec(format!("'{s}' is not of the form hash#index")))?;
        let index = index
            .parse()
            .map_err(|e| TransferError::Codec(format!("output index '{index}': {e}")))?;
        Self::from_hex(hash, index)
    }
}

/// A spendable output. Two UTXOs are the same UTXO when their references
/// match.
#[derive(Debug, Clone)]
pub struct Utxo {
    pub reference: UtxoRef,
    pub owner: Address,
    pub value: Value,
}

impl Utxo {
    pub fn new(reference: UtxoRef, owner: Address, value: Value) -> Self {
        Self {
            reference,
            owner,
            value,
        }
    }

    /// Decodes a CIP-30 `TransactionUnspentOutput`, as returned by a
    /// wallet's `getUtxos`.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let (reference, output) = codec::decode_utxo(bytes)?;
        Ok(Self::new(reference, output.address, output.value))
    }

    pub fn from_cbor_hex(text: &str) -> Result<Self> {
        Self::from_cbor(&hex::decode(text.trim())?)
    }
}

impl PartialEq for Utxo {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Utxo {}

impl Hash for Utxo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

/// An output of the transaction being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: Address,
    pub value: Value,
}

impl TxOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self { address, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "8561258e210352fba2ac0488afed67b3427a27ccf1d41ec030c98a8199bc22ec";

    #[test]
    fn test_ref_display_and_parse() {
        let reference: UtxoRef = format!("{HASH}#3").parse().unwrap();
        assert_eq!(reference.index, 3);
        assert_eq!(reference.to_string(), format!("{HASH}#3"));
    }

    #[test]
    fn test_ref_rejects_bad_input() {
        assert!(HASH.parse::<UtxoRef>().is_err());
        assert!("abcd#0".parse::<UtxoRef>().is_err());
        assert!(format!("{HASH}#x").parse::<UtxoRef>().is_err());
    }

    #[test]
    fn test_identity_is_reference() {
        let owner = Address::enterprise(&[1u8; 32], 1);
        let reference = UtxoRef::new([9u8; 32], 0);
        let a = Utxo::new(reference, owner.clone(), Value::from_coin(1));
        let b = Utxo::new(reference, owner, Value::from_coin(2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_cbor_hex_legacy_output() {
        let owner = Address::enterprise(&[1u8; 32], 1);
        let mut bytes = vec![0x82, 0x82, 0x58, 0x20];
        bytes.extend_from_slice(&[0xaa; 32]);
        bytes.push(0x01);
        bytes.extend_from_slice(&[0x82, 0x58, 0x1d]);
        bytes.extend_from_slice(owner.as_bytes());
        bytes.extend_from_slice(&[0x1a, 0x00, 0x4c, 0x4b, 0x40]); // 5_000_000

        let utxo = Utxo::from_cbor_hex(&hex::encode(&bytes)).unwrap();
        assert_eq!(utxo.reference, UtxoRef::new([0xaa; 32], 1));
        assert_eq!(utxo.owner, owner);
        assert_eq!(utxo.value, Value::from_coin(5_000_000));
    }
}
