use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{GatewayAccount, NewGatewayAccount},
    traits::AccountError,
};

pub async fn fetch_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<GatewayAccount>, AccountError> {
    let account = sqlx::query_as::<_, GatewayAccount>("SELECT * FROM gateway_accounts WHERE id = ?")
        .bind(account_id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

pub async fn fetch_accounts(
    brand: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<GatewayAccount>, AccountError> {
    let accounts = match brand {
        Some(brand) => {
            sqlx::query_as::<_, GatewayAccount>("SELECT * FROM gateway_accounts WHERE brand = ? ORDER BY id")
                .bind(brand)
                .fetch_all(conn)
                .await?
        },
        None => {
            sqlx::query_as::<_, GatewayAccount>("SELECT * FROM gateway_accounts ORDER BY brand, id")
                .fetch_all(conn)
                .await?
        },
    };
    Ok(accounts)
}

pub async fn fetch_default_account(
    brand: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<GatewayAccount>, AccountError> {
    let account = sqlx::query_as::<_, GatewayAccount>(
        "SELECT * FROM gateway_accounts WHERE brand = ? AND is_default = 1 AND enabled = 1",
    )
    .bind(brand)
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

/// Insert a new receiving account. The wallet address is stored lowercased, duplicates within a brand are
/// rejected, and the first account for a brand always becomes the default. Run inside a transaction: demoting
/// the old default and inserting the new one must be atomic.
pub async fn register_account(
    account: NewGatewayAccount,
    conn: &mut SqliteConnection,
) -> Result<GatewayAccount, AccountError> {
    let brand = account.brand.to_lowercase();
    let wallet_address = account.wallet_address.to_lowercase();
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM gateway_accounts WHERE brand = ? AND wallet_address = ?")
        .bind(&brand)
        .bind(&wallet_address)
        .fetch_optional(&mut *conn)
        .await?;
    if existing.is_some() {
        return Err(AccountError::DuplicateAccount { brand, wallet_address });
    }
    let brand_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM gateway_accounts WHERE brand = ?")
        .bind(&brand)
        .fetch_one(&mut *conn)
        .await?;
    let is_default = account.set_default || brand_count == 0;
    if is_default {
        demote_default(&brand, &mut *conn).await?;
    }
    let account = sqlx::query_as::<_, GatewayAccount>(
        r#"
        INSERT INTO gateway_accounts (brand, label, wallet_address, is_default)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&brand)
    .bind(&account.label)
    .bind(&wallet_address)
    .bind(is_default)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Gateway account #{} stored for brand {brand}", account.id);
    Ok(account)
}

/// Promote the account to its brand's default. Run inside a transaction.
pub async fn set_default_account(account_id: i64, conn: &mut SqliteConnection) -> Result<GatewayAccount, AccountError> {
    let account = fetch_account(account_id, &mut *conn).await?.ok_or(AccountError::AccountNotFound(account_id))?;
    demote_default(&account.brand, &mut *conn).await?;
    let account = sqlx::query_as::<_, GatewayAccount>(
        "UPDATE gateway_accounts SET is_default = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *",
    )
    .bind(account_id)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

async fn demote_default(brand: &str, conn: &mut SqliteConnection) -> Result<(), AccountError> {
    sqlx::query("UPDATE gateway_accounts SET is_default = 0, updated_at = CURRENT_TIMESTAMP WHERE brand = ? AND is_default = 1")
        .bind(brand)
        .execute(conn)
        .await?;
    Ok(())
}
