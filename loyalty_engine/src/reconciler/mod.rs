//! The order reconciliation engine.
//!
//! Reconciliation is split into three layers, leaf-first:
//! * [`state_machine`]: pure classification of an oracle outcome into the ledger action it requires. No I/O.
//! * [`cycle`]: one full pass over the unresolved orders, polling the oracle and applying each decision to the ledger.
//! * [`scheduler`]: a periodic timer plus a coalescing trigger guaranteeing at most one cycle in flight.

mod cycle;
mod scheduler;
mod state_machine;

pub use cycle::{run_cycle, CycleError, CycleReport};
pub use scheduler::{CycleTrigger, ReconcileScheduler};
pub use state_machine::{decide, Action, DecisionError};
