//! SQLite backend for the payment engine.
//!
//! The query modules hold the raw SQL for each concern and always take a `&mut SqliteConnection`, so callers
//! decide transaction boundaries. [`SqliteDatabase`] stitches them together into the storage traits.

mod accounts;
mod affiliates;
mod db;
mod holds;
mod orders;
mod schema;

use std::env;

pub use db::SqliteDatabase;
use log::info;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

const SQLITE_DB_URL: &str = "sqlite://data/spg_store.db";

pub fn db_url() -> String {
    let result = env::var("SPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("SPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
