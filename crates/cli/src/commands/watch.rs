//! Print wallet events.

use bemember_client::WalletEvent;
use tracing::info;

use crate::context::AppContext;

/// Print account and chain changes until Ctrl-C.
///
/// # Errors
///
/// Returns an error if no wallet is configured.
pub async fn run(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let expected = ctx.ledger().chain().chain_id;
    let mut subscription = ctx.ledger().subscribe()?;
    println!("Watching wallet (expected chain {expected}). Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = subscription.recv() => match event {
                Some(WalletEvent::AccountsChanged(accounts)) => match accounts.first() {
                    Some(account) => println!("Account changed: {account}"),
                    None => println!("Wallet disconnected"),
                },
                Some(WalletEvent::ChainChanged(chain)) if chain == expected => {
                    println!("Chain changed: {chain}");
                }
                Some(WalletEvent::ChainChanged(chain)) => {
                    println!("Chain changed: {chain} (expected {expected}; run any command to switch back)");
                }
                None => break,
            },
        }
    }

    Ok(())
}
