//! One customer purchase from the command line.

use anyhow::{Context, Result};
use lockervend_core::{BlackBoxLog, LockerId, LockerSettings, VendTransaction};
use lockervend_hardware::{BusDevice, Transport};
use lockervend_payment::{CancelFlag, MdbLink, PaymentSession, VendOutcome, purchase};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Build the transaction for `locker` at its configured price.
///
/// The locker number doubles as the product code shown on the reader.
pub fn transaction_for(settings: &LockerSettings, locker: u8) -> Result<VendTransaction> {
    let locker_id = LockerId::new(locker)?;
    let price = settings
        .prices
        .get(&locker_id)
        .copied()
        .with_context(|| format!("no price configured for locker {locker_id}"))?;
    Ok(VendTransaction::new(
        locker_id,
        u32::from(price),
        u16::from(locker),
    )?)
}

/// Take payment for `transaction`, open the locker when paid, then disable
/// the reader whatever the outcome.
pub async fn sell<D, L>(
    transport: &Transport<D>,
    session: PaymentSession<L>,
    transaction: VendTransaction,
    cancel: CancelFlag,
    uart_log: &BlackBoxLog,
) -> Result<VendOutcome>
where
    D: BusDevice,
    L: MdbLink + 'static,
{
    let locker = transaction.locker_id;
    let session = Arc::new(Mutex::new(session));
    let outcome = purchase(transport, Arc::clone(&session), transaction, cancel, uart_log).await;

    let disabled = tokio::task::spawn_blocking(move || {
        session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown()
    })
    .await;
    match disabled {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Reader left enabled: {}", e),
        Err(e) => warn!("Reader shutdown worker failed: {}", e),
    }

    let outcome = outcome.with_context(|| format!("sale of locker {locker} failed"))?;
    info!("Sale of locker {} finished: {:?}", locker, outcome);
    Ok(outcome)
}
