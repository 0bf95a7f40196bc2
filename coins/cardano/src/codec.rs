//! Cardano CBOR for the parts of a transaction this crate produces, plus
//! decoding of what CIP-30 wallets hand back.
//!
//! Outputs are written in the legacy array form, which every era since
//! Mary accepts. Decoding also understands the post-Alonzo map form.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::address::Address;
use crate::error::{Result, TransferError};
use crate::utxo::{TxOutput, UtxoRef, TX_HASH_LEN};
use crate::value::{AssetId, AssetName, PolicyId, Value, POLICY_ID_LEN};

/// A witness set with no entries.
pub const EMPTY_WITNESS_SET: [u8; 1] = [0xa0];

const TX_ENVELOPE_HEADER: u8 = 0x84;
const CBOR_TRUE: u8 = 0xf5;
const CBOR_NULL: u8 = 0xf6;

/// Bytes taken by a CBOR unsigned integer, or by a length header.
pub fn uint_len(n: u128) -> usize {
    match n {
        0..=23 => 1,
        24..=0xff => 2,
        0x100..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        0x1_0000_0000..=0xffff_ffff_ffff_ffff => 9,
        // tag 2 big integer with a 16 byte payload
        _ => 18,
    }
}

fn bytes_len(len: usize) -> usize {
    uint_len(len as u128) + len
}

/// Encoded size of the multi-asset part of `value`, computed without
/// encoding it.
pub fn multiasset_len(value: &Value) -> usize {
    let grouped = value.by_policy();
    let mut size = uint_len(grouped.len() as u128);
    for assets in grouped.values() {
        size += bytes_len(POLICY_ID_LEN) + uint_len(assets.len() as u128);
        for (name, quantity) in assets {
            size += bytes_len(name.len()) + uint_len(*quantity);
        }
    }
    size
}

/// Encoded size of `value` with its coin replaced by `coin`.
pub fn value_len_with_coin(value: &Value, coin: u128) -> usize {
    if value.has_assets() {
        1 + uint_len(coin) + multiasset_len(value)
    } else {
        uint_len(coin)
    }
}

fn to_u64(n: u128, what: &str) -> Result<u64> {
    u64::try_from(n).map_err(|_| TransferError::Codec(format!("{what} {n} does not fit in 64 bits")))
}

fn write_value(e: &mut Encoder<Vec<u8>>, value: &Value) -> Result<()> {
    let coin = to_u64(value.coin(), "coin")?;
    if !value.has_assets() {
        e.u64(coin)?;
        return Ok(());
    }

    let grouped = value.by_policy();
    e.array(2)?.u64(coin)?.map(grouped.len() as u64)?;
    for (policy, assets) in grouped {
        e.bytes(policy.as_bytes())?.map(assets.len() as u64)?;
        for (name, quantity) in assets {
            e.bytes(name.as_bytes())?.u64(to_u64(quantity, "asset quantity")?)?;
        }
    }
    Ok(())
}

fn write_output(e: &mut Encoder<Vec<u8>>, output: &TxOutput) -> Result<()> {
    e.array(2)?.bytes(output.address.as_bytes())?;
    write_value(e, &output.value)
}

pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    let mut e = Encoder::new(Vec::new());
    write_value(&mut e, value)?;
    Ok(e.into_writer())
}

pub fn encode_output(output: &TxOutput) -> Result<Vec<u8>> {
    let mut e = Encoder::new(Vec::new());
    write_output(&mut e, output)?;
    Ok(e.into_writer())
}

/// `{0: inputs, 1: outputs, 2: fee}`
pub fn encode_body(inputs: &[UtxoRef], outputs: &[TxOutput], fee: u64) -> Result<Vec<u8>> {
    let mut e = Encoder::new(Vec::new());
    e.map(3)?;

    e.u8(0)?.array(inputs.len() as u64)?;
    for input in inputs {
        e.array(2)?.bytes(&input.tx_hash)?.u32(input.index)?;
    }

    e.u8(1)?.array(outputs.len() as u64)?;
    for output in outputs {
        write_output(&mut e, output)?;
    }

    e.u8(2)?.u64(fee)?;
    Ok(e.into_writer())
}

/// `[body, witness_set, true, null]` built from already encoded parts.
pub fn encode_transaction(body: &[u8], witness_set: &[u8]) -> Vec<u8> {
    let mut tx = Vec::with_capacity(body.len() + witness_set.len() + 3);
    tx.push(TX_ENVELOPE_HEADER);
    tx.extend_from_slice(body);
    tx.extend_from_slice(witness_set);
    tx.push(CBOR_TRUE);
    tx.push(CBOR_NULL);
    tx
}

/// Transaction id: blake2b-256 of the body bytes.
pub fn tx_id(body: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(body);
    let result = hasher.finalize();

    let mut id = [0u8; 32];
    id.copy_from_slice(&result);
    id
}

/// Checks that `bytes` is exactly one CBOR map.
pub fn check_witness_set(bytes: &[u8]) -> Result<()> {
    let mut d = Decoder::new(bytes);
    match d.datatype()? {
        Type::Map | Type::MapIndef => {}
        other => {
            return Err(TransferError::Codec(format!(
                "witness set must be a map, got {other:?}"
            )))
        }
    }
    d.skip()?;
    expect_end(&d, bytes.len())
}

/// Splits a signed transaction into its body and witness set bytes.
pub fn split_transaction(tx: &[u8]) -> Result<(&[u8], &[u8])> {
    let mut d = Decoder::new(tx);
    match d.array()? {
        Some(3) | Some(4) => {}
        _ => return Err(TransferError::Codec("transaction must be a 3 or 4 element array".into())),
    }
    let body_start = d.position();
    d.skip()?;
    let witness_start = d.position();
    d.skip()?;
    let witness_end = d.position();
    while d.position() < tx.len() {
        d.skip()?;
    }
    Ok((&tx[body_start..witness_start], &tx[witness_start..witness_end]))
}

fn expect_end(d: &Decoder<'_>, len: usize) -> Result<()> {
    if d.position() != len {
        return Err(TransferError::Codec(format!(
            "{} trailing bytes",
            len - d.position()
        )));
    }
    Ok(())
}

/// Runs `f` once per element of a definite or indefinite container.
fn for_each<'b>(
    d: &mut Decoder<'b>,
    len: Option<u64>,
    mut f: impl FnMut(&mut Decoder<'b>) -> Result<()>,
) -> Result<()> {
    match len {
        Some(n) => {
            for _ in 0..n {
                f(d)?;
            }
        }
        None => loop {
            if d.datatype()? == Type::Break {
                d.set_position(d.position() + 1);
                break;
            }
            f(d)?;
        },
    }
    Ok(())
}

fn read_value(d: &mut Decoder<'_>) -> Result<Value> {
    match d.datatype()? {
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(Value::from_coin(d.u64()? as u128)),
        Type::Array | Type::ArrayIndef => {
            let len = d.array()?;
            if matches!(len, Some(n) if n != 2) {
                return Err(TransferError::Codec("value array must have two entries".into()));
            }
            let mut value = Value::from_coin(d.u64()? as u128);
            let policies = d.map()?;
            for_each(d, policies, |d| {
                let policy = PolicyId::from_slice(d.bytes()?)?;
                let names = d.map()?;
                for_each(d, names, |d| {
                    let name = AssetName::new(d.bytes()?.to_vec())?;
                    let quantity = d.u64()? as u128;
                    value.add_asset(AssetId::new(policy, name), quantity);
                    Ok(())
                })
            })?;
            if len.is_none() {
                for_each(d, None, |d| {
                    d.skip()?;
                    Ok(())
                })?;
            }
            Ok(value)
        }
        other => Err(TransferError::Codec(format!("unexpected value type {other:?}"))),
    }
}

fn read_address(d: &mut Decoder<'_>) -> Result<Address> {
    Address::from_bytes(d.bytes()?.to_vec())
}

fn read_output(d: &mut Decoder<'_>) -> Result<TxOutput> {
    match d.datatype()? {
        Type::Array | Type::ArrayIndef => {
            let len = d.array()?;
            let address = read_address(d)?;
            let value = read_value(d)?;
            // datum hash, if any
            match len {
                Some(n) => {
                    for _ in 2..n {
                        d.skip()?;
                    }
                }
                None => for_each(d, None, |d| {
                    d.skip()?;
                    Ok(())
                })?,
            }
            Ok(TxOutput::new(address, value))
        }
        Type::Map | Type::MapIndef => {
            let len = d.map()?;
            let mut address = None;
            let mut value = None;
            for_each(d, len, |d| {
                match d.u64()? {
                    0 => address = Some(read_address(d)?),
                    1 => value = Some(read_value(d)?),
                    _ => {
                        d.skip()?;
                    }
                }
                Ok(())
            })?;
            match (address, value) {
                (Some(address), Some(value)) => Ok(TxOutput::new(address, value)),
                _ => Err(TransferError::Codec("output map lacks address or value".into())),
            }
        }
        other => Err(TransferError::Codec(format!("unexpected output type {other:?}"))),
    }
}

fn read_input(d: &mut Decoder<'_>) -> Result<UtxoRef> {
    if d.array()? != Some(2) {
        return Err(TransferError::Codec("input must be [tx_hash, index]".into()));
    }
    let hash = d.bytes()?;
    let tx_hash: [u8; TX_HASH_LEN] = hash.try_into().map_err(|_| {
        TransferError::Codec(format!("transaction hash must be {TX_HASH_LEN} bytes"))
    })?;
    Ok(UtxoRef::new(tx_hash, d.u32()?))
}

/// Decodes a `Value` as returned by CIP-30 `getBalance`.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    let mut d = Decoder::new(bytes);
    let value = read_value(&mut d)?;
    expect_end(&d, bytes.len())?;
    Ok(value)
}

/// Decodes a `TransactionUnspentOutput`: `[input, output]`.
pub fn decode_utxo(bytes: &[u8]) -> Result<(UtxoRef, TxOutput)> {
    let mut d = Decoder::new(bytes);
    if d.array()? != Some(2) {
        return Err(TransferError::Codec("utxo must be [input, output]".into()));
    }
    let input = read_input(&mut d)?;
    let output = read_output(&mut d)?;
    expect_end(&d, bytes.len())?;
    Ok((input, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::enterprise(&[3u8; 32], 1)
    }

    fn token(name: &str) -> AssetId {
        AssetId::new(PolicyId::new([0x11; 28]), AssetName::new(name.as_bytes().to_vec()).unwrap())
    }

    #[test]
    fn test_uint_len_boundaries() {
        assert_eq!(uint_len(23), 1);
        assert_eq!(uint_len(24), 2);
        assert_eq!(uint_len(255), 2);
        assert_eq!(uint_len(256), 3);
        assert_eq!(uint_len(65_536), 5);
        assert_eq!(uint_len(u64::MAX as u128), 9);
        assert_eq!(uint_len(u64::MAX as u128 + 1), 18);
    }

    #[test]
    fn test_coin_only_value() {
        assert_eq!(encode_value(&Value::from_coin(2_000_000)).unwrap(), vec![0x1a, 0x00, 0x1e, 0x84, 0x80]);
    }

    #[test]
    fn test_estimated_len_matches_encoding() {
        let value = Value::from_coin(1_500_000)
            .with_asset(token("A"), 10)
            .with_asset(token("LONGER_NAME"), 1_000_000)
            .with_asset(
                AssetId::new(PolicyId::new([0x22; 28]), AssetName::default()),
                1,
            );
        let encoded = encode_value(&value).unwrap();
        assert_eq!(encoded.len(), value_len_with_coin(&value, value.coin()));
        assert_eq!(decode_value(&encoded).unwrap(), value);
    }

    #[test]
    fn test_oversized_quantity_rejected() {
        let value = Value::from_coin(1).with_asset(token("A"), u64::MAX as u128 + 1);
        assert!(matches!(encode_value(&value), Err(TransferError::Codec(_))));
    }

    #[test]
    fn test_body_layout() {
        let inputs = [UtxoRef::new([0xaa; 32], 0)];
        let outputs = [TxOutput::new(owner(), Value::from_coin(1_000_000))];
        let body = encode_body(&inputs, &outputs, 170_000).unwrap();

        let mut d = Decoder::new(&body);
        assert_eq!(d.map().unwrap(), Some(3));
        assert_eq!(d.u8().unwrap(), 0);
        assert_eq!(d.array().unwrap(), Some(1));
        assert_eq!(read_input(&mut d).unwrap(), inputs[0]);
        assert_eq!(d.u8().unwrap(), 1);
        assert_eq!(d.array().unwrap(), Some(1));
        assert_eq!(read_output(&mut d).unwrap(), outputs[0]);
        assert_eq!(d.u8().unwrap(), 2);
        assert_eq!(d.u64().unwrap(), 170_000);
        assert_eq!(d.position(), body.len());
    }

    #[test]
    fn test_transaction_envelope() {
        let tx = encode_transaction(&[0xa0], &EMPTY_WITNESS_SET);
        assert_eq!(tx, vec![0x84, 0xa0, 0xa0, 0xf5, 0xf6]);
    }

    #[test]
    fn test_split_transaction() {
        let body = encode_body(
            &[UtxoRef::new([0xaa; 32], 1)],
            &[TxOutput::new(owner(), Value::from_coin(1_000_000))],
            170_000,
        )
        .unwrap();
        let witness = [0xa1, 0x00, 0x80];
        let tx = encode_transaction(&body, &witness);

        let (b, w) = split_transaction(&tx).unwrap();
        assert_eq!(b, body.as_slice());
        assert_eq!(w, &witness);
        assert!(split_transaction(&[0x82, 0xa0, 0xa0]).is_err());
        assert!(split_transaction(&[0x84, 0xa0]).is_err());
    }

    #[test]
    fn test_tx_id_is_blake2b_256() {
        let id = tx_id(&[0xa0]);
        assert_eq!(id.len(), 32);
        assert_ne!(id, tx_id(&[0xa1]));
    }

    #[test]
    fn test_check_witness_set() {
        assert!(check_witness_set(&EMPTY_WITNESS_SET).is_ok());
        assert!(check_witness_set(&[0x80]).is_err());
        assert!(check_witness_set(&[0xa0, 0x00]).is_err());
        assert!(check_witness_set(&[]).is_err());
    }

    #[test]
    fn test_decode_map_output_with_datum() {
        let mut bytes = vec![0x82, 0x82, 0x58, 0x20];
        bytes.extend_from_slice(&[0xbb; 32]);
        bytes.push(0x00);
        // {0: addr, 1: coin, 2: [0, h'00']}
        bytes.extend_from_slice(&[0xa3, 0x00, 0x58, 0x1d]);
        bytes.extend_from_slice(owner().as_bytes());
        bytes.extend_from_slice(&[0x01, 0x19, 0x03, 0xe8]);
        bytes.extend_from_slice(&[0x02, 0x82, 0x00, 0x41, 0x00]);

        let (input, output) = decode_utxo(&bytes).unwrap();
        assert_eq!(input, UtxoRef::new([0xbb; 32], 0));
        assert_eq!(output.address, owner());
        assert_eq!(output.value, Value::from_coin(1_000));
    }

    #[test]
    fn test_decode_indefinite_multiasset() {
        // [5, {_ h'11..': {_ h'41': 7}}]
        let mut bytes = vec![0x82, 0x05, 0xbf, 0x58, 0x1c];
        bytes.extend_from_slice(&[0x11; 28]);
        bytes.extend_from_slice(&[0xbf, 0x41, b'A', 0x07, 0xff, 0xff]);

        let value = decode_value(&bytes).unwrap();
        assert_eq!(value.coin(), 5);
        assert_eq!(value.quantity_of(&token("A")), 7);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        assert!(decode_value(&[0x05, 0x05]).is_err());
    }
}
