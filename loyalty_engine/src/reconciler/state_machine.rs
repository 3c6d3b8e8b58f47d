use lp_common::Points;
use thiserror::Error;

use crate::db_types::OrderStatus;

/// The ledger mutation an oracle outcome calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The order is still pending at the oracle. Leave it in the unresolved set.
    NoOp,
    /// The oracle rejected the order.
    MarkInvalid,
    /// The oracle finished the order; credit the accrual to the owning account.
    Credit(Points),
}

#[derive(Debug, Clone, Error)]
pub enum DecisionError {
    #[error("Oracle reported PROCESSED without an accrual amount")]
    MissingAccrual,
    #[error("Oracle reported PROCESSED with a non-positive accrual of {0}")]
    NonPositiveAccrual(Points),
}

/// Maps a resolved oracle status to the action the ledger must take. Classification only; the caller applies the
/// action, exactly once.
///
/// A `PROCESSED` status without a strictly positive accrual is a data-integrity error and is surfaced rather than
/// silently applied.
pub fn decide(status: OrderStatus, accrual: Option<Points>) -> Result<Action, DecisionError> {
    match status {
        OrderStatus::Registered | OrderStatus::Processing => Ok(Action::NoOp),
        OrderStatus::Invalid => Ok(Action::MarkInvalid),
        OrderStatus::Processed => {
            let amount = accrual.ok_or(DecisionError::MissingAccrual)?;
            if !amount.is_positive() {
                return Err(DecisionError::NonPositiveAccrual(amount));
            }
            Ok(Action::Credit(amount))
        },
    }
}
