use lp_common::Points;
use sqlx::SqliteConnection;

use crate::{db_types::Account, traits::LedgerError};

pub async fn insert_account(conn: &mut SqliteConnection) -> Result<Account, LedgerError> {
    let account = sqlx::query_as("INSERT INTO accounts (balance) VALUES (0) RETURNING *").fetch_one(conn).await?;
    Ok(account)
}

pub async fn fetch_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, sqlx::Error> {
    let account = sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(account_id).fetch_optional(conn).await?;
    Ok(account)
}

/// Adds `amount` to the account balance. Callers embed this in the same transaction as the order status write so that
/// the two are all-or-nothing.
pub async fn credit_balance(account_id: i64, amount: Points, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let result =
        sqlx::query("UPDATE accounts SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
            .bind(amount)
            .bind(account_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::AccountNotFound(account_id));
    }
    Ok(())
}

/// Debits the balance only if it covers `amount`. The balance check and the decrement are a single guarded UPDATE,
/// which closes the check-then-act race between concurrent withdrawals. Returns `false` if the guard did not pass.
pub async fn debit_balance_if_sufficient(
    account_id: i64,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE accounts SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND balance >= $1
        "#,
    )
    .bind(amount)
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
