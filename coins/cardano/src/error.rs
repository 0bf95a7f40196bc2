use std::convert::Infallible;
use std::fmt;

use adasend_traits::CollaboratorError;
use thiserror::Error;

use crate::draft::DraftStage;
use crate::value::{NegativeValue, Value};

/// The step of a transfer that was running when an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    FetchParameters,
    FetchUtxos,
    Validate,
    Outputs,
    Selection,
    Fee,
    Change,
    Seal,
    Sign,
    AttachWitnesses,
    Submit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FetchParameters => "fetch-parameters",
            Stage::FetchUtxos => "fetch-utxos",
            Stage::Validate => "validate",
            Stage::Outputs => "outputs",
            Stage::Selection => "selection",
            Stage::Fee => "fee",
            Stage::Change => "change",
            Stage::Seal => "seal",
            Stage::Sign => "sign",
            Stage::AttachWitnesses => "attach-witnesses",
            Stage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// Assembly invariants that can only break through a defect in this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("change would be negative: {0}")]
    NegativeChange(NegativeValue),

    #[error("draft moved from {from:?} to {to:?}")]
    StageSkipped { from: DraftStage, to: DraftStage },

    #[error("inputs {inputs} do not equal outputs {outputs} plus fee {fee}")]
    Unbalanced { inputs: Value, outputs: Value, fee: u64 },

    #[error("output {index} carries {coin} lovelace, minimum is {minimum}")]
    BelowMinimum { index: usize, coin: u128, minimum: u64 },

    #[error("change carrying tokens holds {coin} lovelace, minimum is {minimum}")]
    ChangeBelowMinimum { coin: u128, minimum: u64 },

    #[error("fee {fee} is below the {required} required for {size} bytes")]
    FeeTooLow { fee: u64, required: u64, size: usize },

    #[error("fee did not settle after {0} rounds")]
    FeeDidNotConverge(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid asset id: {0}")]
    InvalidAssetId(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid protocol parameters: {0}")]
    InvalidParameters(String),

    #[error("No UTXOs available to spend")]
    EmptyUtxoSet,

    #[error("Insufficient funds: required {required}, available {available}, short by {deficit}")]
    InsufficientFunds {
        required: Value,
        available: Value,
        deficit: Value,
    },

    #[error("Transaction too large: {size} bytes, limit {max}")]
    TransactionTooLarge { size: usize, max: u32 },

    #[error("Output {index} value too large: {size} bytes, limit {max}")]
    OutputTooLarge { index: usize, size: usize, max: u32 },

    #[error("Assembly invariant violated: {0}")]
    Internal(#[from] InvariantViolation),

    #[error("Serialization error: {0}")]
    Codec(String),

    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: CollaboratorError,
    },
}

impl TransferError {
    pub(crate) fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        TransferError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn collaborator(stage: Stage, source: CollaboratorError) -> Self {
        TransferError::Collaborator { stage, source }
    }

    /// Whether this is an assembly defect rather than something the caller
    /// or the network caused.
    pub fn is_internal(&self) -> bool {
        matches!(self, TransferError::Internal(_))
    }

    /// Stage the error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            TransferError::InvalidAddress { .. } | TransferError::InvalidAssetId(_) => {
                Stage::Validate
            }
            TransferError::InvalidAmount(_) => Stage::Outputs,
            TransferError::InvalidParameters(_) => Stage::FetchParameters,
            TransferError::EmptyUtxoSet | TransferError::InsufficientFunds { .. } => {
                Stage::Selection
            }
            TransferError::TransactionTooLarge { .. }
            | TransferError::OutputTooLarge { .. }
            | TransferError::Codec(_) => Stage::Seal,
            TransferError::Internal(violation) => match violation {
                InvariantViolation::NegativeChange(_)
                | InvariantViolation::ChangeBelowMinimum { .. } => Stage::Change,
                InvariantViolation::FeeDidNotConverge(_) => Stage::Fee,
                _ => Stage::Seal,
            },
            TransferError::Collaborator { stage, .. } => *stage,
        }
    }
}

impl From<hex::FromHexError> for TransferError {
    fn from(err: hex::FromHexError) -> Self {
        TransferError::Codec(format!("invalid hex: {err}"))
    }
}

impl From<minicbor::encode::Error<Infallible>> for TransferError {
    fn from(err: minicbor::encode::Error<Infallible>) -> Self {
        TransferError::Codec(err.to_string())
    }
}

impl From<minicbor::decode::Error> for TransferError {
    fn from(err: minicbor::decode::Error) -> Self {
        TransferError::Codec(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_flagged() {
        let err: TransferError = InvariantViolation::FeeDidNotConverge(8).into();
        assert!(err.is_internal());
        assert_eq!(err.stage(), Stage::Fee);

        assert!(!TransferError::EmptyUtxoSet.is_internal());
    }

    #[test]
    fn test_negative_change_is_change_stage() {
        let err: TransferError = InvariantViolation::NegativeChange(NegativeValue::Coin {
            have: 1,
            need: 2,
        })
        .into();
        assert_eq!(err.stage(), Stage::Change);
    }

    #[test]
    fn test_short_change_is_change_stage() {
        let err: TransferError = InvariantViolation::ChangeBelowMinimum {
            coin: 400_000,
            minimum: 1_150_000,
        }
        .into();
        assert!(err.is_internal());
        assert_eq!(err.stage(), Stage::Change);
    }

    #[test]
    fn test_amount_errors_are_output_stage() {
        let err = TransferError::InvalidAmount("quantity is zero".into());
        assert_eq!(err.stage(), Stage::Outputs);
        assert_eq!(err.stage().to_string(), "outputs");
    }

    #[test]
    fn test_collaborator_error_carries_stage() {
        let err = TransferError::collaborator(
            Stage::Sign,
            CollaboratorError::SigningRejected("user declined".into()),
        );
        assert_eq!(err.stage(), Stage::Sign);
        assert_eq!(err.to_string(), "sign failed: Signing rejected: user declined");
    }

    #[test]
    fn test_hex_error_conversion() {
        let err: TransferError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, TransferError::Codec(_)));
    }

    #[test]
    fn test_insufficient_funds_display() {
        let err = TransferError::InsufficientFunds {
            required: Value::from_coin(5_000_000),
            available: Value::from_coin(1_000_000),
            deficit: Value::from_coin(4_000_000),
        };
        let msg = err.to_string();
        assert!(msg.contains("5000000"));
        assert!(msg.contains("4000000"));
    }
}
