use lp_common::Points;
use thiserror::Error;

use crate::db_types::{Account, NewOrder, NewWithdrawal, Order, OrderNumber, OrderStatus, Withdrawal};

/// The ledger contract. The single source of truth for balances.
///
/// Implementations must guarantee:
/// * Every mutation is atomic: a crediting transaction writes the order status and the balance together, or not at
///   all.
/// * Mutations against the same account are serialized. Two concurrent withdrawals must not both pass the balance
///   check against a stale read.
/// * Terminal orders are immutable. [`Self::credit_order`] and [`Self::mark_invalid`] enforce the forward-only status
///   lifecycle, which is what makes a retried reconciliation cycle safe.
#[allow(async_fn_in_trait)]
pub trait LedgerStore: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Creates a new account with a zero balance.
    async fn create_account(&self) -> Result<Account, LedgerError>;

    /// Fetches the account, or `AccountNotFound`.
    async fn fetch_account(&self, account_id: i64) -> Result<Account, LedgerError>;

    /// Records a newly submitted order with `Registered` status.
    ///
    /// This call is idempotent. The boolean in the result is `false` if the same account has already submitted this
    /// order number. Submitting a number that belongs to a different account is an `OrderOwnedByOtherAccount` error.
    async fn submit_order(&self, order: NewOrder) -> Result<(Order, bool), LedgerError>;

    /// All orders submitted by the account, oldest first.
    async fn orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, LedgerError>;

    /// All orders still awaiting a terminal status, i.e. `Registered` or `Processing`.
    async fn unresolved_orders(&self) -> Result<Vec<Order>, LedgerError>;

    /// Marks the order `Invalid`. Idempotent if the order is already `Invalid`; a `TerminalOrder` error if it has
    /// been `Processed`.
    async fn mark_invalid(&self, number: OrderNumber) -> Result<(), LedgerError>;

    /// In a single atomic transaction, marks the order `Processed` with the given accrual and increases the account
    /// balance by `amount`.
    ///
    /// Crediting an order that is already `Processed` is a no-op, so a retried cycle can never credit twice.
    /// Crediting an `Invalid` order is a `TerminalOrder` error, and a non-positive amount is rejected outright.
    async fn credit_order(&self, number: OrderNumber, account_id: i64, amount: Points) -> Result<(), LedgerError>;

    /// Atomically checks `balance >= amount`, decreases the balance and inserts the withdrawal record.
    ///
    /// The withdrawal is keyed uniquely by its `order_ref`, so a client retrying the same request gets a
    /// `DuplicateReference` error instead of a second debit.
    async fn withdraw(&self, withdrawal: NewWithdrawal) -> Result<Withdrawal, LedgerError>;

    /// All withdrawals made by the account, oldest first.
    async fn withdrawals_for_account(&self, account_id: i64) -> Result<Vec<Withdrawal>, LedgerError>;

    /// The sum of all withdrawal amounts for the account.
    async fn total_withdrawn(&self, account_id: i64) -> Result<Points, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested account {0} does not exist")]
    AccountNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Order {0} has already been submitted by another account")]
    OrderOwnedByOtherAccount(OrderNumber),
    #[error("Order {number} is terminal ({status}) and cannot be modified")]
    TerminalOrder { number: OrderNumber, status: OrderStatus },
    #[error("The account balance does not cover the requested withdrawal")]
    InsufficientBalance,
    #[error("A withdrawal with reference {0} has already been recorded")]
    DuplicateReference(OrderNumber),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
