//! Transfer pipeline against in-memory collaborators

use std::sync::Arc;

use adasend_cardano::codec;
use adasend_cardano::{
    NetworkConfig, ProtocolParameters, Stage, Transfer, TransferError, TransferRequest, Value,
};
use adasend_testing::{ada_utxos, asset, owner, receiver, utxo, Call, MockChain};
use adasend_traits::CollaboratorError;

type ChainTransfer =
    Transfer<Arc<MockChain>, Arc<MockChain>, Arc<MockChain>, Arc<MockChain>>;

fn chain(utxos: Vec<adasend_cardano::Utxo>) -> Arc<MockChain> {
    Arc::new(MockChain::new(ProtocolParameters::mainnet_defaults()).with_utxos(utxos))
}

fn transfer(chain: &Arc<MockChain>) -> ChainTransfer {
    Transfer::new(
        chain.clone(),
        chain.clone(),
        chain.clone(),
        chain.clone(),
        owner().to_string(),
    )
}

fn request() -> TransferRequest {
    TransferRequest::ada(receiver().to_string(), 2_000_000)
}

#[tokio::test]
async fn test_execute_returns_body_hash() {
    let chain = chain(ada_utxos(&[5_000_000]));
    let transfer = transfer(&chain);

    let expected = transfer.prepare(&request()).await.unwrap().id();
    let hash = transfer.execute(&request()).await.unwrap();
    assert_eq!(hash, expected);

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 1);
    let (body, witnesses) = codec::split_transaction(&submitted[0]).unwrap();
    assert_eq!(hex::encode(codec::tx_id(body)), hash.as_str());
    assert_eq!(witnesses, &codec::EMPTY_WITNESS_SET);
}

#[tokio::test]
async fn test_each_collaborator_called_once() {
    let chain = chain(ada_utxos(&[5_000_000]));
    transfer(&chain).execute(&request()).await.unwrap();

    for call in [Call::FetchParameters, Call::ListUtxos, Call::Sign, Call::Submit] {
        assert_eq!(chain.calls(call), 1, "{call:?}");
    }
}

#[tokio::test]
async fn test_signer_witnesses_are_attached() {
    let witness_set = vec![0xa1, 0x00, 0x80];
    let chain = Arc::new(
        MockChain::new(ProtocolParameters::mainnet_defaults())
            .with_utxos(ada_utxos(&[5_000_000]))
            .with_witness_set(witness_set.clone()),
    );
    transfer(&chain).execute(&request()).await.unwrap();

    let submitted = chain.submitted();
    let (_, witnesses) = codec::split_transaction(&submitted[0]).unwrap();
    assert_eq!(witnesses, witness_set.as_slice());
}

#[tokio::test]
async fn test_token_transfer_through_pipeline() {
    let token = asset(0x44, "HOSKY");
    let chain = chain(vec![utxo(
        1,
        0,
        Value::from_coin(10_000_000).with_asset(token.clone(), 1_000),
    )]);
    let request = TransferRequest::tokens(receiver().to_string(), vec![(token.clone(), 250)], None);

    let sealed = transfer(&chain).prepare(&request).await.unwrap();
    assert_eq!(sealed.outputs()[0].value.quantity_of(&token), 250);
    assert_eq!(sealed.change_output().unwrap().value.quantity_of(&token), 750);
}

#[tokio::test]
async fn test_parameter_failure_stops_pipeline() {
    let chain = chain(ada_utxos(&[5_000_000]));
    chain.fail(
        Call::FetchParameters,
        CollaboratorError::Network("connection refused".into()),
    );

    let err = transfer(&chain).execute(&request()).await.unwrap_err();
    assert_eq!(err.stage(), Stage::FetchParameters);
    assert_eq!(chain.calls(Call::ListUtxos), 0);
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn test_utxo_failure_carries_stage() {
    let chain = chain(ada_utxos(&[5_000_000]));
    chain.fail(Call::ListUtxos, CollaboratorError::Network("timeout".into()));

    let err = transfer(&chain).execute(&request()).await.unwrap_err();
    assert_eq!(err.stage(), Stage::FetchUtxos);
    assert!(!err.is_internal());
}

#[tokio::test]
async fn test_empty_wallet_fails_before_signing() {
    let chain = chain(Vec::new());
    let err = transfer(&chain).execute(&request()).await.unwrap_err();
    assert!(matches!(err, TransferError::EmptyUtxoSet));
    assert_eq!(chain.calls(Call::Sign), 0);
}

#[tokio::test]
async fn test_declined_signature_is_not_retried() {
    let chain = chain(ada_utxos(&[5_000_000]));
    chain.fail(Call::Sign, CollaboratorError::SigningRejected("user declined".into()));

    let err = transfer(&chain).execute(&request()).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Sign);
    assert_eq!(chain.calls(Call::Sign), 1);
    assert_eq!(chain.calls(Call::Submit), 0);
}

#[tokio::test]
async fn test_malformed_witness_set_rejected() {
    let chain = Arc::new(
        MockChain::new(ProtocolParameters::mainnet_defaults())
            .with_utxos(ada_utxos(&[5_000_000]))
            .with_witness_set(vec![0x80]),
    );

    let err = transfer(&chain).execute(&request()).await.unwrap_err();
    assert_eq!(err.stage(), Stage::AttachWitnesses);
    assert!(matches!(
        err,
        TransferError::Collaborator {
            source: CollaboratorError::SigningError(_),
            ..
        }
    ));
    assert_eq!(chain.calls(Call::Submit), 0);
}

#[tokio::test]
async fn test_submission_rejection_keeps_reason() {
    let chain = chain(ada_utxos(&[5_000_000]));
    chain.fail(
        Call::Submit,
        CollaboratorError::SubmissionRejected {
            reason: "ValueNotConservedUTxO".into(),
        },
    );

    let err = transfer(&chain).execute(&request()).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Submit);
    assert_eq!(
        err.to_string(),
        "submit failed: Submission rejected: ValueNotConservedUTxO"
    );
    assert_eq!(chain.calls(Call::Submit), 1);
}

#[tokio::test]
async fn test_wrong_network_rejected_before_signing() {
    let chain = chain(ada_utxos(&[5_000_000]));
    let transfer = transfer(&chain).with_network(NetworkConfig::preprod());

    let err = transfer.execute(&request()).await.unwrap_err();
    assert!(matches!(err, TransferError::InvalidAddress { .. }));
    assert_eq!(chain.calls(Call::Sign), 0);
}
