#![allow(dead_code)]
use log::*;
use loyalty_engine::SqliteLedger;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

/// Creates a fresh throwaway database, runs the migrations and hands back a ledger connected to it.
pub async fn prepare_test_env(url: &str) -> SqliteLedger {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await
}

pub fn random_db_path() -> String {
    format!("sqlite://{}/loyalty_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) -> SqliteLedger {
    // the migrator leaves its connection in exclusive locking mode, so it gets a throwaway pool that is
    // closed before the ledger pool opens
    let migrator = SqliteLedger::new_with_url(url, 1).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(migrator.pool()).await.expect("Error running DB migrations");
    migrator.pool().close().await;
    info!("🚀️ Migrations complete");
    SqliteLedger::new_with_url(url, 5).await.expect("Error creating connection to database")
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

/// Appends the Luhn check digit to `payload`, producing a valid order number.
pub fn luhn_number(payload: i64) -> i64 {
    let mut sum = 0;
    let mut n = payload;
    let mut position = 0;
    while n > 0 {
        let mut digit = n % 10;
        if position % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit = digit % 10 + digit / 10;
            }
        }
        sum += digit;
        n /= 10;
        position += 1;
    }
    payload * 10 + (10 - sum % 10) % 10
}
