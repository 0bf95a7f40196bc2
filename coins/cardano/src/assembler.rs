//! Turns a transfer request into a sealed transaction.
//!
//! The build runs the draft through its stages in order:
//!
//! 1. validate the request and both addresses
//! 2. set the receiver output, raising its coin to the minimum
//! 3. select inputs, pricing each candidate set as a full transaction
//! 4. settle the fee against the encoded size
//! 5. resolve change; ADA-only dust is folded into the fee only when no
//!    candidate is left to fund a change output
//! 6. seal
//!
//! Any failure aborts the build. Nothing is retried.

use tracing::{debug, warn};

use crate::address::Address;
use crate::codec;
use crate::config::NetworkConfig;
use crate::draft::{estimate_signed_size, SealedTransaction, TransactionDraft};
use crate::error::{InvariantViolation, Result, TransferError};
use crate::min_utxo::min_coin_for_output;
use crate::params::ProtocolParameters;
use crate::selection::{self, FeeEstimator};
use crate::utxo::{TxOutput, Utxo, UtxoRef};
use crate::value::{AssetId, Value};

/// Rounds of fee recomputation before giving up.
pub const MAX_FEE_ROUNDS: usize = 8;

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    /// Plain ADA. Zero means "the minimum an output may carry".
    Ada { lovelace: u64 },
    /// Native assets, with optional extra coin. The coin is raised to the
    /// output minimum when it falls short.
    Tokens {
        assets: Vec<(AssetId, u128)>,
        lovelace: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Bech32 or hex address of the receiver.
    pub receiver: String,
    pub kind: TransferKind,
}

impl TransferRequest {
    pub fn ada(receiver: impl Into<String>, lovelace: u64) -> Self {
        Self {
            receiver: receiver.into(),
            kind: TransferKind::Ada { lovelace },
        }
    }

    pub fn tokens(
        receiver: impl Into<String>,
        assets: Vec<(AssetId, u128)>,
        lovelace: Option<u64>,
    ) -> Self {
        Self {
            receiver: receiver.into(),
            kind: TransferKind::Tokens { assets, lovelace },
        }
    }
}

enum Change {
    Output(TxOutput),
    Dust(u128),
    Nothing,
}

/// Builds transfers against one set of protocol parameters.
#[derive(Debug, Clone)]
pub struct TransactionAssembler {
    params: ProtocolParameters,
    network: Option<NetworkConfig>,
}

impl TransactionAssembler {
    pub fn new(params: ProtocolParameters) -> Self {
        Self {
            params,
            network: None,
        }
    }

    /// Also reject addresses tagged for a different network.
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    pub fn build(
        &self,
        request: &TransferRequest,
        utxos: &[Utxo],
        change_address: &str,
    ) -> Result<SealedTransaction> {
        let params = &self.params;
        params.validate()?;

        let receiver: Address = request.receiver.parse()?;
        let change_address: Address = change_address.parse()?;
        self.check_networks(&receiver, &change_address)?;

        let mut draft = TransactionDraft::new();

        let mut primary = requested_value(&request.kind)?;
        let minimum = min_coin_for_output(&receiver, &primary, params) as u128;
        if primary.coin() < minimum {
            debug!(requested = %primary.coin(), minimum = %minimum, "raising output coin to minimum");
            primary.set_coin(minimum);
        }
        let outputs = vec![TxOutput::new(receiver, primary.clone())];
        draft.set_outputs(outputs.clone())?;
        debug!(stage = ?draft.stage(), value = %primary, "receiver output set");

        let estimator = DraftEstimator {
            outputs: &outputs,
            required: &primary,
            change_address: &change_address,
            params,
        };
        let selection = selection::select(utxos, &primary, &estimator)?;
        let total = selection.total.clone();
        draft.set_inputs(selection.inputs)?;
        debug!(
            stage = ?draft.stage(),
            inputs = draft.inputs().len(),
            total = %total,
            "inputs selected"
        );

        let (fee, change) = settle_fee(draft.inputs(), &outputs, &total, &change_address, params)?;
        draft.set_fee(fee)?;
        debug!(stage = ?draft.stage(), fee, "fee settled");

        let change = match change {
            Change::Output(output) => Some(output),
            Change::Dust(dust) => {
                warn!(dust = %dust, fee, "no candidates left to fund change, dust folded into fee");
                None
            }
            Change::Nothing => None,
        };
        draft.resolve_change(change)?;
        debug!(stage = ?draft.stage(), outputs = draft.outputs().len(), "change resolved");

        draft.seal(params)
    }

    fn check_networks(&self, receiver: &Address, change: &Address) -> Result<()> {
        if let Some(network) = &self.network {
            network.check_address(receiver)?;
            network.check_address(change)?;
        }
        match (receiver.network_id(), change.network_id()) {
            (Some(a), Some(b)) if a != b => Err(TransferError::invalid_address(
                receiver.to_string(),
                format!("receiver is on network {a}, change address on network {b}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Builds a transfer with no network restriction beyond both addresses
/// agreeing.
pub fn build_transfer(
    request: &TransferRequest,
    utxos: &[Utxo],
    change_address: &str,
    params: &ProtocolParameters,
) -> Result<SealedTransaction> {
    TransactionAssembler::new(params.clone()).build(request, utxos, change_address)
}

fn requested_value(kind: &TransferKind) -> Result<Value> {
    match kind {
        TransferKind::Ada { lovelace } => Ok(Value::from_coin(*lovelace as u128)),
        TransferKind::Tokens { assets, lovelace } => {
            if assets.is_empty() {
                return Err(TransferError::InvalidAmount(
                    "token transfer names no assets".into(),
                ));
            }
            let mut value = Value::from_coin(lovelace.unwrap_or(0) as u128);
            for (asset, quantity) in assets {
                if *quantity == 0 {
                    return Err(TransferError::InvalidAmount(format!(
                        "quantity of {asset} is zero"
                    )));
                }
                value.add_asset(asset.clone(), *quantity);
                if value.quantity_of(asset) > u64::MAX as u128 {
                    return Err(TransferError::InvalidAmount(format!(
                        "quantity of {asset} exceeds {}",
                        u64::MAX
                    )));
                }
            }
            Ok(value)
        }
    }
}

/// Prices a candidate input set as the transaction it would become: the
/// receiver output, plus a change output holding every leftover asset and
/// at least the change minimum in coin. Fee and change coin are priced at
/// their widest encoding.
///
/// An ADA-only set whose surplus is exactly the fee is priced without
/// change. Once the candidates run out, an ADA-only set is also allowed to
/// go without change, its surplus becoming fee.
struct DraftEstimator<'a> {
    outputs: &'a [TxOutput],
    required: &'a Value,
    change_address: &'a Address,
    params: &'a ProtocolParameters,
}

impl DraftEstimator<'_> {
    fn leftover_assets(&self, total: &Value) -> Value {
        total
            .assets_only()
            .checked_sub(&self.required.assets_only())
            .unwrap_or_else(|_| total.assets_only())
    }

    fn without_change(&self, selected: &[Utxo]) -> Result<u64> {
        fee_for(selected, self.outputs, u64::MAX, self.params)
    }

    fn with_change(&self, selected: &[Utxo], leftover: &Value) -> Result<u64> {
        let mut change_value = leftover.clone();
        change_value.set_coin(u64::MAX as u128);

        let mut outputs = self.outputs.to_vec();
        outputs.push(TxOutput::new(self.change_address.clone(), change_value));

        let fee = fee_for(selected, &outputs, u64::MAX, self.params)?;
        let floor = min_coin_for_output(self.change_address, leftover, self.params);
        Ok(fee.saturating_add(floor))
    }
}

impl FeeEstimator for DraftEstimator<'_> {
    fn estimate(&self, selected: &[Utxo], total: &Value) -> Result<u64> {
        let leftover = self.leftover_assets(total);
        if !leftover.has_assets() {
            let fee = self.without_change(selected)?;
            let surplus = total.coin().saturating_sub(self.required.coin());
            if surplus <= fee as u128 {
                return Ok(fee);
            }
        }
        self.with_change(selected, &leftover)
    }

    fn minimum(&self, selected: &[Utxo], total: &Value) -> Result<u64> {
        let leftover = self.leftover_assets(total);
        if leftover.has_assets() {
            return self.with_change(selected, &leftover);
        }
        self.without_change(selected)
    }
}

fn fee_for(
    inputs: &[Utxo],
    outputs: &[TxOutput],
    fee: u64,
    params: &ProtocolParameters,
) -> Result<u64> {
    let references: Vec<UtxoRef> = inputs.iter().map(|u| u.reference).collect();
    let body = codec::encode_body(&references, outputs, fee)?;
    Ok(params.linear_fee(estimate_signed_size(body.len(), inputs)))
}

/// Leftover tokens must always come back; selection priced in their
/// minimum, so falling short here is a defect.
fn resolve_change(
    leftover: Value,
    change_address: &Address,
    params: &ProtocolParameters,
) -> Result<Change> {
    if leftover.is_zero() {
        return Ok(Change::Nothing);
    }
    let minimum = min_coin_for_output(change_address, &leftover, params);
    if leftover.coin() >= minimum as u128 {
        return Ok(Change::Output(TxOutput::new(change_address.clone(), leftover)));
    }
    if leftover.has_assets() {
        return Err(InvariantViolation::ChangeBelowMinimum {
            coin: leftover.coin(),
            minimum,
        }
        .into());
    }
    Ok(Change::Dust(leftover.coin()))
}

/// Raises the fee until it covers the encoded transaction it is part of.
fn settle_fee(
    inputs: &[Utxo],
    outputs: &[TxOutput],
    total: &Value,
    change_address: &Address,
    params: &ProtocolParameters,
) -> Result<(u64, Change)> {
    let spent: Value = outputs.iter().map(|o| &o.value).sum();
    let mut fee = 0u64;

    for round in 0..MAX_FEE_ROUNDS {
        let leftover = total
            .checked_sub(&spent.add(&Value::from_coin(fee as u128)))
            .map_err(InvariantViolation::NegativeChange)?;
        let change = resolve_change(leftover, change_address, params)?;

        let mut body_outputs = outputs.to_vec();
        let mut body_fee = fee;
        match &change {
            Change::Output(output) => body_outputs.push(output.clone()),
            Change::Dust(dust) => {
                body_fee = u64::try_from(fee as u128 + dust).map_err(|_| {
                    TransferError::Codec("fee does not fit in 64 bits".into())
                })?
            }
            Change::Nothing => {}
        }

        let required = fee_for(inputs, &body_outputs, body_fee, params)?;
        debug!(round, fee = body_fee, required, "fee round");
        // Dust is only what is left once the fee itself is paid.
        let settled = match &change {
            Change::Dust(_) => required <= fee,
            _ => required <= body_fee,
        };
        if settled {
            return Ok((body_fee, change));
        }
        fee = required;
    }

    Err(InvariantViolation::FeeDidNotConverge(MAX_FEE_ROUNDS).into())
}
