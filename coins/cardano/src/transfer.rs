//! End-to-end transfer: fetch, build, sign, submit.

use adasend_traits::{
    CollaboratorError, ProtocolParameterSource, Signer, Submitter, TxHash, UtxoSource,
};
use tracing::{info, warn};

use crate::assembler::{TransactionAssembler, TransferRequest};
use crate::config::NetworkConfig;
use crate::draft::SealedTransaction;
use crate::error::{Result, Stage, TransferError};
use crate::params::ProtocolParameters;
use crate::utxo::Utxo;

fn collaborator_failure(stage: Stage, source: CollaboratorError) -> TransferError {
    warn!(%stage, error = %source, "collaborator failed");
    TransferError::collaborator(stage, source)
}

/// Wires the engine to its collaborators for one wallet.
///
/// Every collaborator is called at most once per transfer. Failures come
/// back wrapped with the stage that was running.
pub struct Transfer<P, U, S = (), B = ()> {
    parameters: P,
    utxos: U,
    signer: S,
    submitter: B,
    change_address: String,
    network: Option<NetworkConfig>,
}

impl<P, U> Transfer<P, U> {
    /// A transfer that can only be prepared, for callers that sign and
    /// submit elsewhere.
    pub fn read_only(parameters: P, utxos: U, change_address: impl Into<String>) -> Self {
        Self::new(parameters, utxos, (), (), change_address)
    }
}

impl<P, U, S, B> Transfer<P, U, S, B> {
    pub fn new(
        parameters: P,
        utxos: U,
        signer: S,
        submitter: B,
        change_address: impl Into<String>,
    ) -> Self {
        Self {
            parameters,
            utxos,
            signer,
            submitter,
            change_address: change_address.into(),
            network: None,
        }
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn change_address(&self) -> &str {
        &self.change_address
    }
}

impl<P, U, S, B> Transfer<P, U, S, B>
where
    P: ProtocolParameterSource<Parameters = ProtocolParameters>,
    U: UtxoSource<Utxo = Utxo>,
{
    /// Fetches parameters and UTXOs and builds the transaction.
    pub async fn prepare(&self, request: &TransferRequest) -> Result<SealedTransaction> {
        let params = self
            .parameters
            .fetch_parameters()
            .await
            .map_err(|e| collaborator_failure(Stage::FetchParameters, e))?;

        let utxos = self
            .utxos
            .list_utxos(&self.change_address)
            .await
            .map_err(|e| collaborator_failure(Stage::FetchUtxos, e))?;

        let mut assembler = TransactionAssembler::new(params);
        if let Some(network) = &self.network {
            assembler = assembler.with_network(network.clone());
        }
        assembler.build(request, &utxos, &self.change_address)
    }
}

impl<P, U, S, B> Transfer<P, U, S, B>
where
    P: ProtocolParameterSource<Parameters = ProtocolParameters>,
    U: UtxoSource<Utxo = Utxo>,
    S: Signer,
    B: Submitter,
{
    /// Builds, signs and submits. Returns the hash the network reported.
    pub async fn execute(&self, request: &TransferRequest) -> Result<TxHash> {
        let sealed = self.prepare(request).await?;

        let witness_set = self
            .signer
            .sign(&sealed.unsigned_bytes())
            .await
            .map_err(|e| collaborator_failure(Stage::Sign, e))?;

        let signed = sealed.with_witnesses(&witness_set).map_err(|e| {
            collaborator_failure(
                Stage::AttachWitnesses,
                CollaboratorError::SigningError(format!("unusable witness set: {e}")),
            )
        })?;

        let hash = self
            .submitter
            .submit(&signed)
            .await
            .map_err(|e| collaborator_failure(Stage::Submit, e))?;

        let expected = sealed.id();
        if hash != expected {
            warn!(reported = %hash, computed = %expected, "submitted hash differs from body hash");
        }
        info!(tx_hash = %hash, fee = sealed.fee(), "transaction submitted");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::utxo::UtxoRef;
    use crate::value::Value;
    use adasend_traits::CollaboratorResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Params(CollaboratorResult<ProtocolParameters>);

    #[async_trait]
    impl ProtocolParameterSource for Params {
        type Parameters = ProtocolParameters;

        async fn fetch_parameters(&self) -> CollaboratorResult<ProtocolParameters> {
            self.0.clone()
        }
    }

    struct Wallet(Vec<Utxo>);

    #[async_trait]
    impl UtxoSource for Wallet {
        type Utxo = Utxo;

        async fn list_utxos(&self, _owner: &str) -> CollaboratorResult<Vec<Utxo>> {
            Ok(self.0.clone())
        }
    }

    struct EmptySigner;

    #[async_trait]
    impl Signer for EmptySigner {
        async fn sign(&self, _unsigned_tx: &[u8]) -> CollaboratorResult<Vec<u8>> {
            Ok(vec![0xa0])
        }
    }

    struct RejectingSigner;

    #[async_trait]
    impl Signer for RejectingSigner {
        async fn sign(&self, _unsigned_tx: &[u8]) -> CollaboratorResult<Vec<u8>> {
            Err(CollaboratorError::SigningRejected("user declined".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSubmitter {
        submitted: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Submitter for RecordingSubmitter {
        async fn submit(&self, signed_tx: &[u8]) -> CollaboratorResult<TxHash> {
            self.submitted.lock().unwrap().push(signed_tx.to_vec());
            Ok(TxHash::new("00".repeat(32)))
        }
    }

    fn owner() -> Address {
        Address::enterprise(&[4; 32], 1)
    }

    fn wallet() -> Wallet {
        Wallet(vec![Utxo::new(
            UtxoRef::new([1; 32], 0),
            owner(),
            Value::from_coin(10_000_000),
        )])
    }

    fn request() -> TransferRequest {
        TransferRequest::ada(Address::enterprise(&[5; 32], 1).to_string(), 2_000_000)
    }

    #[tokio::test]
    async fn test_prepare_builds() {
        let transfer = Transfer::read_only(
            Params(Ok(ProtocolParameters::mainnet_defaults())),
            wallet(),
            owner().to_string(),
        );
        let sealed = transfer.prepare(&request()).await.unwrap();
        assert_eq!(sealed.outputs()[0].value.coin(), 2_000_000);
    }

    #[tokio::test]
    async fn test_parameter_failure_carries_stage() {
        let transfer = Transfer::read_only(
            Params(Err(CollaboratorError::Network("timeout".into()))),
            wallet(),
            owner().to_string(),
        );
        let err = transfer.prepare(&request()).await.unwrap_err();
        assert_eq!(err.stage(), Stage::FetchParameters);
    }

    #[tokio::test]
    async fn test_execute_submits_signed_transaction() {
        let transfer = Transfer::new(
            Params(Ok(ProtocolParameters::mainnet_defaults())),
            wallet(),
            EmptySigner,
            RecordingSubmitter::default(),
            owner().to_string(),
        );
        let hash = transfer.execute(&request()).await.unwrap();
        assert_eq!(hash.as_str().len(), 64);

        let submitted = transfer.submitter.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0][0], 0x84);
    }

    #[tokio::test]
    async fn test_rejected_signature_stops_before_submit() {
        let transfer = Transfer::new(
            Params(Ok(ProtocolParameters::mainnet_defaults())),
            wallet(),
            RejectingSigner,
            RecordingSubmitter::default(),
            owner().to_string(),
        );
        let err = transfer.execute(&request()).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Sign);
        assert!(matches!(
            err,
            TransferError::Collaborator {
                source: CollaboratorError::SigningRejected(_),
                ..
            }
        ));
        assert!(transfer.submitter.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_restriction_applies() {
        let transfer = Transfer::read_only(
            Params(Ok(ProtocolParameters::mainnet_defaults())),
            wallet(),
            owner().to_string(),
        )
        .with_network(NetworkConfig::preprod());
        let err = transfer.prepare(&request()).await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidAddress { .. }));
    }
}
