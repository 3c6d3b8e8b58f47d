use std::time::Duration;

use log::*;
use tokio::{
    sync::{mpsc, watch},
    time::{interval_at, Instant, MissedTickBehavior},
};

use super::cycle::{run_cycle, CycleError};
use crate::{accrual::AccrualClient, traits::LedgerStore};

/// A coalescing trigger for the reconciliation cycle.
///
/// The trigger is a single-slot channel written with a non-blocking send: firing while a cycle is already pending or
/// in flight is a no-op, so a burst of triggers collapses into one cycle instead of queueing a backlog.
#[derive(Clone)]
pub struct CycleTrigger {
    tx: mpsc::Sender<()>,
}

impl CycleTrigger {
    pub fn fire(&self) {
        if self.tx.try_send(()).is_err() {
            trace!("🕰️ A reconciliation cycle is already pending; trigger absorbed");
        }
    }
}

/// Drives reconciliation: a periodic timer fires the coalescing trigger, and a single worker loop drains it, so at
/// most one cycle is ever active.
///
/// Additional [`CycleTrigger`] handles can be cloned off before `run()` to nudge the reconciler out of band, e.g.
/// right after an order is submitted.
pub struct ReconcileScheduler<B, C> {
    store: B,
    oracle: C,
    poll_interval: Duration,
    tx: mpsc::Sender<()>,
    rx: mpsc::Receiver<()>,
}

impl<B, C> ReconcileScheduler<B, C>
where
    B: LedgerStore,
    C: AccrualClient,
{
    pub fn new(store: B, oracle: C, poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { store, oracle, poll_interval, tx, rx }
    }

    pub fn trigger(&self) -> CycleTrigger {
        CycleTrigger { tx: self.tx.clone() }
    }

    /// Runs until the shutdown flag flips to `true` (or all senders of the watch are dropped).
    ///
    /// Cycle failures are logged and retried on the next tick; they never abort the scheduler. On shutdown the
    /// in-flight cycle is allowed to observe cancellation and exit early, and the most recent cycle error is reported
    /// to the caller, unless a later cycle has succeeded since.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), CycleError> {
        let ReconcileScheduler { store, oracle, poll_interval, tx, mut rx } = self;
        info!("🕰️ Reconciliation scheduler started. Polling every {poll_interval:?}");

        let ticker_trigger = CycleTrigger { tx };
        let mut ticker_shutdown = shutdown.clone();
        let ticker = async move {
            let mut timer = interval_at(Instant::now() + poll_interval, poll_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = timer.tick() => ticker_trigger.fire(),
                    _ = ticker_shutdown.changed() => break,
                }
            }
        };

        let mut worker_shutdown = shutdown;
        let worker = async move {
            let mut last_error = None;
            loop {
                let received = tokio::select! {
                    received = rx.recv() => received,
                    _ = worker_shutdown.changed() => None,
                };
                if received.is_none() {
                    break;
                }
                match run_cycle(&store, &oracle, &mut worker_shutdown).await {
                    Ok(report) if report.interrupted => {
                        info!("🕰️ Reconciliation cycle interrupted by shutdown");
                        break;
                    },
                    Ok(report) => {
                        debug!(
                            "🕰️ Reconciliation cycle complete. {} visited, {} credited, {} invalidated, {} \
                             deferred, {} rejected",
                            report.visited, report.credited, report.invalidated, report.deferred, report.rejected
                        );
                        // the supervisor only hears about an error the reconciler has not recovered from
                        last_error = None;
                    },
                    Err(e) => {
                        error!("🕰️ Reconciliation cycle failed (the next tick will retry): {e}");
                        last_error = Some(e);
                    },
                }
            }
            last_error
        };

        let ((), last_error) = tokio::join!(ticker, worker);
        info!("🕰️ Reconciliation scheduler stopped");
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
