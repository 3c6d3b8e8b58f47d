use lp_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWithdrawal, Withdrawal},
    traits::LedgerError,
};

/// Inserts the withdrawal record. The `order_ref` column carries a uniqueness constraint, so a client retry of the
/// same withdrawal surfaces as `DuplicateReference` instead of a second row.
pub async fn insert_withdrawal(
    withdrawal: NewWithdrawal,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, LedgerError> {
    let order_ref = withdrawal.order_ref;
    let withdrawal = sqlx::query_as(
        r#"
            INSERT INTO withdrawals (order_ref, account_id, amount) VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(withdrawal.order_ref)
    .bind(withdrawal.account_id)
    .bind(withdrawal.amount)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => LedgerError::DuplicateReference(order_ref),
        _ => LedgerError::from(e),
    })?;
    Ok(withdrawal)
}

/// All withdrawals made by the account, oldest first.
pub async fn withdrawals_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Withdrawal>, sqlx::Error> {
    let withdrawals = sqlx::query_as("SELECT * FROM withdrawals WHERE account_id = $1 ORDER BY processed_at ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(withdrawals)
}

pub async fn total_withdrawn(account_id: i64, conn: &mut SqliteConnection) -> Result<Points, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM withdrawals WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(conn)
        .await?;
    Ok(Points::from_cents(total))
}
