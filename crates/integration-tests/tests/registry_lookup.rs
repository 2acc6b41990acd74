//! Integration tests for reading registered records back.

#![allow(clippy::unwrap_used)]

use bemember_client::{ContentStore, Submission};
use bemember_core::Address;
use bemember_integration_tests::{ACCOUNT, FakeStore, FakeWallet, Harness, ada};

#[tokio::test]
async fn test_minted_record_can_be_looked_up() {
    let harness = Harness::new(FakeWallet::on_expected_chain(), FakeStore::returning("cid123"));
    let submission = Submission::new(ada());
    harness.orchestrator.submit(&submission, None).await.unwrap();

    let connection = harness.ledger.connect().await.unwrap();
    let owner = Address::parse(ACCOUNT).unwrap();
    let cid = harness
        .registry
        .read_for(&connection, &owner)
        .await
        .unwrap()
        .unwrap();
    let own = harness.registry.read_own(&connection).await.unwrap();

    assert_eq!(cid.as_str(), "cid123");
    assert_eq!(own, Some(cid.clone()));

    let record = harness.store.retrieve(&cid).await.unwrap();
    assert_eq!(record.name, "Ada Lovelace");
    assert_eq!(record.tagline.as_deref(), Some("Engineer at Acme"));
}

#[tokio::test]
async fn test_unregistered_address_reads_none() {
    let harness = Harness::new(FakeWallet::on_expected_chain(), FakeStore::returning("cid123"));
    let connection = harness.ledger.connect().await.unwrap();
    let stranger = Address::parse("0x000000000000000000000000000000000000dead").unwrap();

    let cid = harness.registry.read_for(&connection, &stranger).await.unwrap();

    assert_eq!(cid, None);
}

#[tokio::test]
async fn test_new_submission_overwrites_registered_entry() {
    let harness = Harness::new(FakeWallet::on_expected_chain(), FakeStore::returning("cid123"));
    harness
        .orchestrator
        .submit(&Submission::new(ada()), None)
        .await
        .unwrap();

    let mut updated = ada();
    updated.tagline = Some("Analyst".to_string());
    harness.store.then_return("cid456");
    harness
        .orchestrator
        .submit(&Submission::new(updated), None)
        .await
        .unwrap();

    let connection = harness.ledger.connect().await.unwrap();
    let own = harness.registry.read_own(&connection).await.unwrap().unwrap();
    assert_eq!(own.as_str(), "cid456");
    assert_eq!(harness.wallet.call_count("eth_sendTransaction"), 2);

    let record = harness.store.retrieve(&own).await.unwrap();
    assert_eq!(record.tagline.as_deref(), Some("Analyst"));
}
