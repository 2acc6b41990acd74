//! Integration tests for wallet connection, network switching and change
//! notifications.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bemember_client::{ErrorKind, LedgerError, Submission, SubmitError, UploadState, WalletEvent};
use bemember_core::ChainId;
use bemember_integration_tests::{
    ACCOUNT, EXPECTED_CHAIN, FakeStore, FakeWallet, Harness, ada,
};

// =============================================================================
// Network
// =============================================================================

#[tokio::test]
async fn test_connect_on_expected_chain_skips_switch() {
    let harness = Harness::new(FakeWallet::on_expected_chain(), FakeStore::returning("cid123"));

    let connection = harness.ledger.connect().await.unwrap();

    assert_eq!(connection.current_address().await.unwrap().as_str(), ACCOUNT);
    assert_eq!(harness.wallet.call_count("wallet_switchEthereumChain"), 0);
}

#[tokio::test]
async fn test_connect_registers_unknown_chain_and_switches() {
    let harness = Harness::new(FakeWallet::on_chain(1), FakeStore::returning("cid123"));

    let connection = harness.ledger.connect().await.unwrap();

    assert_eq!(connection.chain_id().await.unwrap(), ChainId::new(EXPECTED_CHAIN));
    assert_eq!(harness.wallet.chain(), EXPECTED_CHAIN);
    assert_eq!(harness.wallet.call_count("wallet_addEthereumChain"), 1);
    assert_eq!(harness.wallet.call_count("wallet_switchEthereumChain"), 2);
}

#[tokio::test]
async fn test_wrong_network_carries_both_chain_ids() {
    let harness = Harness::new(FakeWallet::on_chain(1).stubborn(), FakeStore::returning("cid123"));
    let submission = Submission::new(ada());

    let err = harness.orchestrator.submit(&submission, None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WrongNetwork);
    assert_eq!(
        err,
        SubmitError::Ledger(LedgerError::WrongNetwork {
            expected: ChainId::new(EXPECTED_CHAIN),
            actual: Some(ChainId::new(1)),
        })
    );
    assert_eq!(submission.state(), UploadState::Failed(err));
    assert_eq!(harness.wallet.call_count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_no_authorized_account() {
    let harness = Harness::new(FakeWallet::on_expected_chain(), FakeStore::returning("cid123"));
    harness.wallet.set_accounts(&[]);

    let err = harness.ledger.connect().await.err().unwrap();

    assert_eq!(err, LedgerError::NoAccount);
    assert_eq!(err.kind(), ErrorKind::NoAccount);
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_subscription_reports_chain_change() {
    let harness = Harness::new(FakeWallet::on_expected_chain(), FakeStore::returning("cid123"));
    let mut subscription = harness.ledger.subscribe().unwrap();

    // Let the watcher record its baseline.
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.wallet.set_chain(1);

    let event = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
        .await
        .unwrap();
    assert_eq!(event, Some(WalletEvent::ChainChanged(ChainId::new(1))));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_subscription_stops_watcher() {
    let harness = Harness::new(FakeWallet::on_expected_chain(), FakeStore::returning("cid123"));

    let first = harness.ledger.subscribe().unwrap();
    let second = harness.ledger.subscribe().unwrap();
    assert!(harness.ledger.is_watching());

    drop(first);
    assert!(harness.ledger.is_watching());

    drop(second);
    assert!(!harness.ledger.is_watching());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let polls = harness.wallet.call_count("eth_chainId");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.wallet.call_count("eth_chainId"), polls);
}
