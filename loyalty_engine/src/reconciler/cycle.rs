use log::*;
use thiserror::Error;
use tokio::sync::watch;

use super::state_machine::{decide, Action};
use crate::{
    accrual::{AccrualApiError, AccrualClient, AccrualOutcome},
    traits::{LedgerError, LedgerStore},
};

/// What one reconciliation pass did, for the scheduler's logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    pub visited: usize,
    pub credited: usize,
    pub invalidated: usize,
    /// Orders the oracle has not ingested yet; they stay unresolved and are retried next cycle.
    pub deferred: usize,
    /// Orders with a data-integrity problem in the oracle response. Logged and skipped, never applied.
    pub rejected: usize,
    /// True if a shutdown signal cut the pass short.
    pub interrupted: bool,
}

/// A cycle-fatal failure. Fatal to this cycle only: the scheduler logs it and the next tick starts over.
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("Accrual oracle failure: {0}")]
    Accrual(#[from] AccrualApiError),
    #[error("Ledger failure: {0}")]
    Ledger(#[from] LedgerError),
}

/// Runs one reconciliation pass: poll the oracle for every unresolved order and apply the resulting transition to the
/// ledger.
///
/// Orders are visited sequentially. A rate-limit response pauses the pass for the advertised duration and then retries
/// the *same* order; an unknown-order response defers the order to the next cycle; any transport or store failure
/// aborts the pass. The shutdown signal is observed between orders and interrupts a rate-limit pause promptly.
pub async fn run_cycle<B, C>(
    store: &B,
    oracle: &C,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<CycleReport, CycleError>
where
    B: LedgerStore,
    C: AccrualClient,
{
    let mut report = CycleReport::default();
    let orders = store.unresolved_orders().await?;
    if orders.is_empty() {
        trace!("🔄️ No unresolved orders. Nothing to reconcile");
        return Ok(report);
    }
    debug!("🔄️ Reconciling {} unresolved orders", orders.len());
    'orders: for order in orders {
        report.visited += 1;
        loop {
            if *shutdown.borrow() {
                report.interrupted = true;
                break 'orders;
            }
            match oracle.order_status(order.number).await? {
                AccrualOutcome::RateLimited { retry_after } => {
                    debug!("🔄️ Rate limited; pausing the cycle for {retry_after:?}");
                    tokio::select! {
                        _ = tokio::time::sleep(retry_after) => {},
                        _ = shutdown.changed() => {
                            report.interrupted = true;
                            break 'orders;
                        },
                    }
                    // retry the same order now that the pause is over
                },
                AccrualOutcome::Unknown => {
                    trace!("🔄️ Order [{}] is not known to the oracle yet; deferring", order.number);
                    report.deferred += 1;
                    continue 'orders;
                },
                AccrualOutcome::Resolved { status, accrual } => {
                    match decide(status, accrual) {
                        Ok(Action::NoOp) => {},
                        Ok(Action::MarkInvalid) => {
                            store.mark_invalid(order.number).await?;
                            report.invalidated += 1;
                        },
                        Ok(Action::Credit(amount)) => {
                            store.credit_order(order.number, order.account_id, amount).await?;
                            report.credited += 1;
                        },
                        Err(e) => {
                            error!("🔄️ Rejecting oracle response for order [{}]: {e}", order.number);
                            report.rejected += 1;
                        },
                    }
                    continue 'orders;
                },
            }
        }
    }
    Ok(report)
}
