//! Purchase workflow.
//!
//! Runs a payment session on a blocking worker, opens the locker when the
//! customer has paid, and keeps a record of link failures in the UART black
//! box for engineering.

use crate::error::{MdbError, Result};
use crate::link::MdbLink;
use crate::session::{CancelFlag, PaymentSession, VendOutcome};
use lockervend_core::{BlackBoxEntry, BlackBoxLog, VendTransaction};
use lockervend_hardware::{BusDevice, Transport};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

/// Take payment for `transaction` and open its locker on success.
///
/// The session is shared so it survives the attempt and can be reused for
/// the next customer. Marking the locker as sold is left to the caller.
///
/// # Errors
///
/// Returns the session's [`MdbError`] unchanged. A worker that dies
/// mid-transaction is reported as `MdbError::ConnectionError`.
pub async fn purchase<D, L>(
    transport: &Transport<D>,
    session: Arc<Mutex<PaymentSession<L>>>,
    transaction: VendTransaction,
    cancel: CancelFlag,
    uart_log: &BlackBoxLog,
) -> Result<VendOutcome>
where
    D: BusDevice,
    L: MdbLink + 'static,
{
    let worker_tx = transaction.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        session.run(&worker_tx, &cancel)
    });

    let result = match worker.await {
        Ok(result) => result,
        Err(e) => Err(MdbError::connection(format!("payment worker failed: {e}"))),
    };

    match &result {
        Ok(VendOutcome::Vended) => {
            info!("Payment for locker {} accepted", transaction.locker_id);
            transport.open_locker(transaction.locker_id).await;
        }
        Ok(VendOutcome::Canceled(source)) => {
            info!("Purchase of locker {} cancelled ({:?})", transaction.locker_id, source);
        }
        Err(e) if e.is_link_failure() => {
            error!("Payment for locker {} failed: {}", transaction.locker_id, e);
            uart_log.append(&BlackBoxEntry::event(format!(
                "MDB {} during vend {} (locker {}, {})",
                e,
                transaction.id,
                transaction.locker_id,
                transaction.amount()
            )));
        }
        Err(e) => info!("Payment for locker {} refused: {}", transaction.locker_id, e),
    }

    result
}
