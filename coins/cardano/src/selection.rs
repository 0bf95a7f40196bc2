//! First-fit input selection.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{Result, TransferError};
use crate::utxo::{Utxo, UtxoRef};
use crate::value::Value;

/// Prices the transaction that the current selection would produce.
///
/// The returned coin is added on top of the required value before the
/// selection is considered sufficient: the fee, plus any coin change
/// outputs will need.
pub trait FeeEstimator {
    fn estimate(&self, selected: &[Utxo], total: &Value) -> Result<u64>;

    /// The least the selection can get by with once every candidate has
    /// been taken. Defaults to [`FeeEstimator::estimate`].
    fn minimum(&self, selected: &[Utxo], total: &Value) -> Result<u64> {
        self.estimate(selected, total)
    }
}

impl<F> FeeEstimator for F
where
    F: Fn(&[Utxo], &Value) -> Result<u64>,
{
    fn estimate(&self, selected: &[Utxo], total: &Value) -> Result<u64> {
        self(selected, total)
    }
}

/// Inputs picked to fund a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub inputs: Vec<Utxo>,
    pub total: Value,
    /// Estimate for the final input set.
    pub estimate: u64,
}

impl Selection {
    pub fn references(&self) -> Vec<UtxoRef> {
        self.inputs.iter().map(|u| u.reference).collect()
    }
}

/// Takes candidates in the order given until their sum covers `required`
/// plus the estimate for the inputs taken so far.
///
/// Every required asset must be covered, not just the coin. Candidates
/// repeating an earlier reference are skipped. When the candidates run out
/// the whole set is checked once more against the estimator's minimum.
/// There is no backtracking, so the result is not minimal.
pub fn select(
    candidates: &[Utxo],
    required: &Value,
    estimator: &dyn FeeEstimator,
) -> Result<Selection> {
    if candidates.is_empty() {
        return Err(TransferError::EmptyUtxoSet);
    }

    let mut seen = HashSet::new();
    let mut inputs = Vec::new();
    let mut total = Value::zero();
    let mut estimate = 0;

    for utxo in candidates {
        if !seen.insert(utxo.reference) {
            debug!(utxo = %utxo.reference, "skipping duplicate candidate");
            continue;
        }
        inputs.push(utxo.clone());
        total += &utxo.value;
        estimate = estimator.estimate(&inputs, &total)?;

        debug!(
            utxo = %utxo.reference,
            inputs = inputs.len(),
            coin = %total.coin(),
            estimate,
            "accepted input"
        );

        if total.covers(&with_estimate(required, estimate)) {
            return Ok(Selection {
                inputs,
                total,
                estimate,
            });
        }
    }

    if !inputs.is_empty() {
        let minimum = estimator.minimum(&inputs, &total)?;
        if total.covers(&with_estimate(required, minimum)) {
            debug!(inputs = inputs.len(), minimum, "candidates exhausted, minimum covered");
            return Ok(Selection {
                inputs,
                total,
                estimate: minimum,
            });
        }
        estimate = minimum;
    }

    let required = with_estimate(required, estimate);
    let deficit = total.deficit(&required);
    Err(TransferError::InsufficientFunds {
        required,
        available: total,
        deficit,
    })
}

fn with_estimate(required: &Value, estimate: u64) -> Value {
    required.add(&Value::from_coin(estimate as u128))
}
