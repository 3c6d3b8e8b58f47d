//! Loyalty Engine
//!
//! The loyalty engine keeps the points ledger for registered accounts and reconciles submitted orders against an
//! external accrual oracle. This library contains the core logic for the service. It is transport-agnostic: the HTTP
//! layer, authentication and session handling live outside of this crate and talk to the engine through the public
//! API.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the database directly.
//!    Instead, use the public API. The exception is the data types used in the database, which are defined in the
//!    [`mod@db_types`] module and are public. Backends implement the [`traits::LedgerStore`] trait; SQLite is the
//!    backend provided here.
//! 2. The ledger public API ([`LedgerApi`]). This is the surface that upstream collaborators call to submit orders,
//!    query balances and withdraw points. Every mutation ultimately delegates to the `LedgerStore` contract, which
//!    guarantees the ledger invariant: `balance == Σ(credited accruals) − Σ(withdrawals)` for every account.
//! 3. The reconciler ([`mod@reconciler`]). A background scheduler periodically polls the accrual oracle for every
//!    unresolved order and applies the resulting status transition and balance credit exactly once per order. At most
//!    one reconciliation cycle is ever in flight; overlapping triggers coalesce into it.

pub mod accrual;
pub mod api;
pub mod config;
pub mod db_types;
pub mod helpers;
pub mod reconciler;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use accrual::{AccrualApiError, AccrualClient, AccrualOutcome, HttpAccrualClient};
pub use api::{LedgerApi, LedgerApiError};
pub use config::EngineConfig;
pub use reconciler::{run_cycle, Action, CycleError, CycleReport, CycleTrigger, ReconcileScheduler};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;
pub use traits::{LedgerError, LedgerStore};
