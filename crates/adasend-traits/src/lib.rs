//! # adasend Traits
//!
//! Contracts for the external collaborators of the adasend transfer engine.
//! The engine itself is synchronous and never touches the network; everything
//! that does (parameter fetch, UTXO listing, signing, submission) sits behind
//! one of these traits so it can be swapped for a Blockfrost client, a browser
//! wallet bridge, or an in-memory double in tests.
//!
//! ## Core Traits
//!
//! - [`ProtocolParameterSource`] - Current protocol parameters
//! - [`UtxoSource`] - Spendable outputs owned by an address
//! - [`Signer`] - Produces a witness set for an unsigned transaction
//! - [`Submitter`] - Hands a signed transaction to the network
//!
//! ## Example
//!
//! ```ignore
//! use adasend_traits::prelude::*;
//!
//! async fn push<S: Submitter>(submitter: &S, tx: &[u8]) -> CollaboratorResult<TxHash> {
//!     submitter.submit(tx).await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a transaction hash/ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    /// Creates a new TxHash from a string
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TxHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TxHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Failures reported by an external collaborator.
///
/// The engine never inspects these beyond wrapping them with the stage
/// that was running, so the variants only separate what a caller may want
/// to react to differently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// Network/indexer failure (connection, HTTP status, malformed payload)
    #[error("Network error: {0}")]
    Network(String),

    /// The user declined to sign in the wallet
    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    /// Signing failed for any other reason
    #[error("Signing error: {0}")]
    SigningError(String),

    /// The node refused the transaction; `reason` is passed through verbatim
    #[error("Submission rejected: {reason}")]
    SubmissionRejected {
        /// Raw reason string from the node or indexer
        reason: String,
    },
}

impl CollaboratorError {
    /// Whether re-running the whole operation could plausibly succeed.
    ///
    /// Only network failures qualify. Signing and submission can have side
    /// effects, so they are never reported as retryable.
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Network(_))
    }
}

/// Result type for collaborator calls
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Supplies the protocol parameters a build is priced against.
#[async_trait]
pub trait ProtocolParameterSource: Send + Sync {
    /// Parameter snapshot type
    type Parameters: Send;

    /// Fetches the current parameters
    async fn fetch_parameters(&self) -> CollaboratorResult<Self::Parameters>;
}

/// Lists the spendable outputs of an address.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// UTXO type
    type Utxo: Send;

    /// Returns every unspent output owned by `owner`, in the source's order.
    ///
    /// An empty vector is a valid answer.
    async fn list_utxos(&self, owner: &str) -> CollaboratorResult<Vec<Self::Utxo>>;
}

/// Produces witnesses for an unsigned transaction.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs the CBOR of an unsigned transaction
    ///
    /// # Returns
    /// The CBOR of a transaction witness set
    async fn sign(&self, unsigned_tx: &[u8]) -> CollaboratorResult<Vec<u8>>;
}

/// Submits a signed transaction.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submits the CBOR of a signed transaction
    ///
    /// # Returns
    /// The transaction hash reported by the network
    async fn submit(&self, signed_tx: &[u8]) -> CollaboratorResult<TxHash>;
}

#[async_trait]
impl<T: ProtocolParameterSource + ?Sized> ProtocolParameterSource for std::sync::Arc<T> {
    type Parameters = T::Parameters;

    async fn fetch_parameters(&self) -> CollaboratorResult<Self::Parameters> {
        (**self).fetch_parameters().await
    }
}

#[async_trait]
impl<T: UtxoSource + ?Sized> UtxoSource for std::sync::Arc<T> {
    type Utxo = T::Utxo;

    async fn list_utxos(&self, owner: &str) -> CollaboratorResult<Vec<Self::Utxo>> {
        (**self).list_utxos(owner).await
    }
}

#[async_trait]
impl<T: Signer + ?Sized> Signer for std::sync::Arc<T> {
    async fn sign(&self, unsigned_tx: &[u8]) -> CollaboratorResult<Vec<u8>> {
        (**self).sign(unsigned_tx).await
    }
}

#[async_trait]
impl<T: Submitter + ?Sized> Submitter for std::sync::Arc<T> {
    async fn submit(&self, signed_tx: &[u8]) -> CollaboratorResult<TxHash> {
        (**self).submit(signed_tx).await
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CollaboratorError, CollaboratorResult, ProtocolParameterSource, Signer, Submitter,
        TxHash, UtxoSource,
    };
}
