use std::fmt;
use std::str::FromStr;

use bech32::{Bech32, Hrp};
use blake2::digest::consts::U28;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::config::MAINNET_NETWORK_ID;
use crate::error::{Result, TransferError};

const KEY_HASH_LEN: usize = 28;
const BASE_LEN: usize = 1 + 2 * KEY_HASH_LEN;
const ENTERPRISE_LEN: usize = 1 + KEY_HASH_LEN;
// header + credential + three pointer varints of at least one byte each
const POINTER_MIN_LEN: usize = ENTERPRISE_LEN + 3;
const BYRON_PREFIX: [u8; 3] = [0x82, 0xd8, 0x18];

/// Address types in Cardano
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    Base,       // Payment + staking credential
    Pointer,    // Payment + stake registration pointer
    Enterprise, // Payment credential only
    Reward,     // Staking rewards, never a transaction party
    Byron,      // Legacy bootstrap addresses
}

impl AddressType {
    fn from_header(header: u8) -> Option<Self> {
        match header >> 4 {
            0..=3 => Some(AddressType::Base),
            4 | 5 => Some(AddressType::Pointer),
            6 | 7 => Some(AddressType::Enterprise),
            8 => Some(AddressType::Byron),
            14 | 15 => Some(AddressType::Reward),
            _ => None,
        }
    }
}

/// A validated payment address, held as its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    bytes: Vec<u8>,
}

impl Address {
    /// Validates raw address bytes as a spendable payment address.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let invalid = |reason: String| TransferError::invalid_address(hex::encode(&bytes), reason);

        let header = *bytes.first().ok_or_else(|| invalid("empty address".into()))?;
        let kind = AddressType::from_header(header)
            .ok_or_else(|| invalid(format!("unknown header type {}", header >> 4)))?;

        match kind {
            AddressType::Base if bytes.len() != BASE_LEN => {
                return Err(invalid(format!(
                    "base address must be {BASE_LEN} bytes, got {}",
                    bytes.len()
                )))
            }
            AddressType::Enterprise if bytes.len() != ENTERPRISE_LEN => {
                return Err(invalid(format!(
                    "enterprise address must be {ENTERPRISE_LEN} bytes, got {}",
                    bytes.len()
                )))
            }
            AddressType::Pointer if bytes.len() < POINTER_MIN_LEN => {
                return Err(invalid("pointer address is truncated".into()))
            }
            AddressType::Byron if !is_byron_envelope(&bytes) => {
                return Err(invalid("malformed Byron address".into()))
            }
            AddressType::Reward => {
                return Err(invalid(
                    "reward addresses cannot send or receive outputs".into(),
                ))
            }
            _ => {}
        }

        Ok(Self { bytes })
    }

    /// Create a new enterprise address (no staking)
    pub fn enterprise(payment_pubkey: &[u8], network_id: u8) -> Self {
        let mut bytes = Vec::with_capacity(ENTERPRISE_LEN);
        // 0110 = enterprise with key hash
        bytes.push(0x60 | (network_id & 0x0F));
        bytes.extend_from_slice(&Self::hash_key(payment_pubkey));
        Self { bytes }
    }

    /// Create a new base address (payment + staking)
    pub fn base(payment_pubkey: &[u8], staking_pubkey: &[u8], network_id: u8) -> Self {
        let mut bytes = Vec::with_capacity(BASE_LEN);
        // 0000 = base address with key hash for both
        bytes.push(network_id & 0x0F);
        bytes.extend_from_slice(&Self::hash_key(payment_pubkey));
        bytes.extend_from_slice(&Self::hash_key(staking_pubkey));
        Self { bytes }
    }

    /// Hash a public key using Blake2b-224
    pub fn hash_key(pubkey: &[u8]) -> [u8; KEY_HASH_LEN] {
        let mut hasher = Blake2b::<U28>::new();
        hasher.update(pubkey);
        let result = hasher.finalize();

        let mut hash = [0u8; KEY_HASH_LEN];
        hash.copy_from_slice(&result);
        hash
    }

    pub fn address_type(&self) -> AddressType {
        // from_bytes and the constructors only admit known headers
        AddressType::from_header(self.bytes[0]).unwrap_or(AddressType::Byron)
    }

    /// Network tag of a Shelley address. Byron addresses carry none.
    pub fn network_id(&self) -> Option<u8> {
        match self.address_type() {
            AddressType::Byron => None,
            _ => Some(self.bytes[0] & 0x0F),
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.network_id() == Some(MAINNET_NETWORK_ID)
    }

    pub fn is_byron(&self) -> bool {
        self.address_type() == AddressType::Byron
    }

    /// Bytes identifying who has to sign for this address.
    ///
    /// The payment credential for Shelley addresses, the whole address for
    /// Byron ones.
    pub fn payment_credential(&self) -> &[u8] {
        match self.address_type() {
            AddressType::Byron => &self.bytes,
            _ => &self.bytes[1..ENTERPRISE_LEN],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Bech32 form of a Shelley address.
    pub fn to_bech32(&self) -> Result<String> {
        let network_id = self.network_id().ok_or_else(|| {
            TransferError::invalid_address(self.to_hex(), "Byron addresses have no bech32 form")
        })?;
        let hrp = Hrp::parse(hrp_for(network_id))
            .map_err(|e| TransferError::invalid_address(self.to_hex(), e.to_string()))?;
        bech32::encode::<Bech32>(hrp, &self.bytes)
            .map_err(|e| TransferError::invalid_address(self.to_hex(), e.to_string()))
    }

    /// Validate a Cardano address string
    pub fn validate(address: &str) -> bool {
        address.parse::<Address>().is_ok()
    }

    fn from_bech32(text: &str) -> Result<Self> {
        let (hrp, data) =
            bech32::decode(text).map_err(|e| TransferError::invalid_address(text, e.to_string()))?;

        match hrp.as_str() {
            "addr" | "addr_test" => {}
            "stake" | "stake_test" => {
                return Err(TransferError::invalid_address(
                    text,
                    "reward addresses cannot send or receive outputs",
                ))
            }
            other => {
                return Err(TransferError::invalid_address(
                    text,
                    format!("unexpected prefix '{other}'"),
                ))
            }
        }

        let address = Self::from_bytes(data).map_err(|e| match e {
            TransferError::InvalidAddress { reason, .. } => {
                TransferError::invalid_address(text, reason)
            }
            other => other,
        })?;

        match address.network_id() {
            Some(id) if hrp_for(id) == hrp.as_str() => Ok(address),
            _ => Err(TransferError::invalid_address(
                text,
                "network tag does not match prefix",
            )),
        }
    }
}

fn hrp_for(network_id: u8) -> &'static str {
    if network_id == MAINNET_NETWORK_ID {
        "addr"
    } else {
        "addr_test"
    }
}

/// `[#6.24(bytes), crc32]`
fn is_byron_envelope(bytes: &[u8]) -> bool {
    if !bytes.starts_with(&BYRON_PREFIX) {
        return false;
    }
    let mut decoder = minicbor::Decoder::new(bytes);
    decoder.set_position(BYRON_PREFIX.len());
    decoder.bytes().is_ok() && decoder.u32().is_ok() && decoder.position() == bytes.len()
}

impl FromStr for Address {
    type Err = TransferError;

    /// Parses bech32 (`addr`/`addr_test`) or the hex encoding CIP-30 wallets
    /// return.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransferError::invalid_address(s, "empty address"));
        }
        if s.contains('1') && (s.starts_with("addr") || s.starts_with("stake")) {
            return Self::from_bech32(s);
        }
        let bytes = hex::decode(s).map_err(|e| {
            TransferError::invalid_address(s, format!("neither bech32 nor hex: {e}"))
        })?;
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bech32() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str(&self.to_hex()),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
