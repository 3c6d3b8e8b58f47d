//! The traits that a storage backend must implement to act as the ledger for the loyalty engine.

mod ledger_store;

pub use ledger_store::{LedgerError, LedgerStore};
