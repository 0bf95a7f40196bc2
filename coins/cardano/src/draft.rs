//! The transaction under construction and its sealed form.

use std::collections::BTreeSet;

use adasend_traits::TxHash;
use tracing::info;

use crate::codec::{self, uint_len, EMPTY_WITNESS_SET};
use crate::error::{InvariantViolation, Result, TransferError};
use crate::min_utxo::min_coin_for_output;
use crate::params::ProtocolParameters;
use crate::utxo::{TxOutput, Utxo, UtxoRef};
use crate::value::Value;

/// `[vkey, signature]`
pub const VKEY_WITNESS_LEN: usize = 1 + 34 + 66;

/// `[vkey, signature, chain code, attributes]` with room for attributes.
pub const BOOTSTRAP_WITNESS_LEN: usize = 180;

/// Build steps, in the only order they may happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DraftStage {
    Empty,
    OutputsSet,
    InputsSelected,
    FeeComputed,
    ChangeResolved,
    Sealed,
}

impl DraftStage {
    pub fn next(self) -> Option<Self> {
        match self {
            DraftStage::Empty => Some(DraftStage::OutputsSet),
            DraftStage::OutputsSet => Some(DraftStage::InputsSelected),
            DraftStage::InputsSelected => Some(DraftStage::FeeComputed),
            DraftStage::FeeComputed => Some(DraftStage::ChangeResolved),
            DraftStage::ChangeResolved => Some(DraftStage::Sealed),
            DraftStage::Sealed => None,
        }
    }
}

/// Signed size of a transaction with this body and these inputs.
///
/// One witness per distinct payment credential: a vkey witness for Shelley
/// owners, a bootstrap witness for Byron ones.
pub fn estimate_signed_size(body_len: usize, inputs: &[Utxo]) -> usize {
    let mut shelley = BTreeSet::new();
    let mut byron = BTreeSet::new();
    for input in inputs {
        if input.owner.is_byron() {
            byron.insert(input.owner.payment_credential());
        } else {
            shelley.insert(input.owner.payment_credential());
        }
    }

    let mut witness_set = 1;
    for (count, len) in [(shelley.len(), VKEY_WITNESS_LEN), (byron.len(), BOOTSTRAP_WITNESS_LEN)] {
        if count > 0 {
            witness_set += 1 + uint_len(count as u128) + count * len;
        }
    }

    // envelope header, validity flag, auxiliary data
    1 + body_len + witness_set + 1 + 1
}

/// A transaction body being assembled one stage at a time.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    stage: DraftStage,
    inputs: Vec<Utxo>,
    outputs: Vec<TxOutput>,
    fee: u64,
    change_index: Option<usize>,
}

impl Default for TransactionDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self {
            stage: DraftStage::Empty,
            inputs: Vec::new(),
            outputs: Vec::new(),
            fee: 0,
            change_index: None,
        }
    }

    pub fn stage(&self) -> DraftStage {
        self.stage
    }

    fn advance(&mut self, to: DraftStage) -> Result<()> {
        if self.stage.next() != Some(to) {
            return Err(InvariantViolation::StageSkipped {
                from: self.stage,
                to,
            }
            .into());
        }
        self.stage = to;
        Ok(())
    }

    pub fn set_outputs(&mut self, outputs: Vec<TxOutput>) -> Result<()> {
        self.advance(DraftStage::OutputsSet)?;
        self.outputs = outputs;
        Ok(())
    }

    pub fn set_inputs(&mut self, inputs: Vec<Utxo>) -> Result<()> {
        self.advance(DraftStage::InputsSelected)?;
        self.inputs = inputs;
        Ok(())
    }

    pub fn set_fee(&mut self, fee: u64) -> Result<()> {
        self.advance(DraftStage::FeeComputed)?;
        self.fee = fee;
        Ok(())
    }

    /// Appends the change output, if there is one.
    pub fn resolve_change(&mut self, change: Option<TxOutput>) -> Result<()> {
        self.advance(DraftStage::ChangeResolved)?;
        if let Some(change) = change {
            self.change_index = Some(self.outputs.len());
            self.outputs.push(change);
        }
        Ok(())
    }

    pub fn inputs(&self) -> &[Utxo] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn input_total(&self) -> Value {
        self.inputs.iter().map(|u| &u.value).sum()
    }

    pub fn output_total(&self) -> Value {
        self.outputs.iter().map(|o| &o.value).sum()
    }

    /// Checks every ledger-facing invariant and freezes the body.
    pub fn seal(mut self, params: &ProtocolParameters) -> Result<SealedTransaction> {
        self.advance(DraftStage::Sealed)?;

        let inputs = self.input_total();
        let outputs = self.output_total();
        if inputs != outputs.add(&Value::from_coin(self.fee as u128)) {
            return Err(InvariantViolation::Unbalanced {
                inputs,
                outputs,
                fee: self.fee,
            }
            .into());
        }

        for (index, output) in self.outputs.iter().enumerate() {
            let minimum = min_coin_for_output(&output.address, &output.value, params);
            if output.value.coin() < minimum as u128 {
                return Err(InvariantViolation::BelowMinimum {
                    index,
                    coin: output.value.coin(),
                    minimum,
                }
                .into());
            }

            let size = codec::encode_value(&output.value)?.len();
            if size > params.max_value_size as usize {
                return Err(TransferError::OutputTooLarge {
                    index,
                    size,
                    max: params.max_value_size,
                });
            }
        }

        let references: Vec<UtxoRef> = self.inputs.iter().map(|u| u.reference).collect();
        let body = codec::encode_body(&references, &self.outputs, self.fee)?;
        let size = estimate_signed_size(body.len(), &self.inputs);
        if size > params.max_tx_size as usize {
            return Err(TransferError::TransactionTooLarge {
                size,
                max: params.max_tx_size,
            });
        }

        let required = params.linear_fee(size);
        if self.fee < required {
            return Err(InvariantViolation::FeeTooLow {
                fee: self.fee,
                required,
                size,
            }
            .into());
        }

        let sealed = SealedTransaction {
            inputs: self.inputs,
            outputs: self.outputs,
            fee: self.fee,
            change_index: self.change_index,
            estimated_size: size,
            body,
        };
        info!(
            tx_id = %sealed.id(),
            inputs = sealed.inputs.len(),
            outputs = sealed.outputs.len(),
            fee = sealed.fee,
            size,
            "sealed transaction"
        );
        Ok(sealed)
    }
}

/// A balanced, fee-correct body ready for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedTransaction {
    inputs: Vec<Utxo>,
    outputs: Vec<TxOutput>,
    fee: u64,
    change_index: Option<usize>,
    estimated_size: usize,
    body: Vec<u8>,
}

impl SealedTransaction {
    pub fn inputs(&self) -> &[Utxo] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn change_output(&self) -> Option<&TxOutput> {
        self.change_index.map(|i| &self.outputs[i])
    }

    /// Size the fee was priced at, witnesses included.
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn id(&self) -> TxHash {
        TxHash::new(hex::encode(codec::tx_id(&self.body)))
    }

    /// The full transaction with an empty witness set, as wallets expect it
    /// for `signTx`.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        codec::encode_transaction(&self.body, &EMPTY_WITNESS_SET)
    }

    pub fn unsigned_hex(&self) -> String {
        hex::encode(self.unsigned_bytes())
    }

    /// The full transaction carrying `witness_set`.
    pub fn with_witnesses(&self, witness_set: &[u8]) -> Result<Vec<u8>> {
        codec::check_witness_set(witness_set)?;
        Ok(codec::encode_transaction(&self.body, witness_set))
    }
}
