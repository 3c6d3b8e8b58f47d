//! The public-facing ledger API.
//!
//! Upstream collaborators (the HTTP layer, admin tooling) talk to the engine exclusively through [`LedgerApi`]. The
//! presentation DTOs live in [`order_objects`]; internal records never cross the boundary directly.

mod ledger_api;
pub mod order_objects;

pub use ledger_api::{LedgerApi, LedgerApiError};
