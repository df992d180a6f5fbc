use log::debug;
use spg_common::MinorUnits;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AffiliateAccount, NewAffiliateAccount},
    traits::AccountError,
};

/// Bind an affiliate to a gateway account. Run inside a transaction: the existence check, the one-binding-
/// per-account check, and the insert must be atomic.
pub async fn bind_affiliate(
    affiliate: NewAffiliateAccount,
    conn: &mut SqliteConnection,
) -> Result<AffiliateAccount, AccountError> {
    let account_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM gateway_accounts WHERE id = ?")
        .bind(affiliate.gateway_account_id)
        .fetch_one(&mut *conn)
        .await?;
    if account_exists == 0 {
        return Err(AccountError::AccountNotFound(affiliate.gateway_account_id));
    }
    let already_bound = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM affiliate_accounts WHERE gateway_account_id = ?")
        .bind(affiliate.gateway_account_id)
        .fetch_one(&mut *conn)
        .await?;
    if already_bound > 0 {
        return Err(AccountError::AffiliateAlreadyBound(affiliate.gateway_account_id));
    }
    let affiliate = sqlx::query_as::<_, AffiliateAccount>(
        r#"
        INSERT INTO affiliate_accounts (gateway_account_id, payout_wallet, commission_rate, merchant_rate)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(affiliate.gateway_account_id)
    .bind(affiliate.payout_wallet.to_lowercase())
    .bind(affiliate.commission_rate)
    .bind(affiliate.merchant_rate)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Affiliate #{} bound to gateway account #{}", affiliate.id, affiliate.gateway_account_id);
    Ok(affiliate)
}

pub async fn fetch_affiliate_for_account(
    gateway_account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<AffiliateAccount>, AccountError> {
    let affiliate = sqlx::query_as::<_, AffiliateAccount>("SELECT * FROM affiliate_accounts WHERE gateway_account_id = ?")
        .bind(gateway_account_id)
        .fetch_optional(conn)
        .await?;
    Ok(affiliate)
}

pub async fn fetch_affiliates(conn: &mut SqliteConnection) -> Result<Vec<AffiliateAccount>, AccountError> {
    let affiliates =
        sqlx::query_as::<_, AffiliateAccount>("SELECT * FROM affiliate_accounts ORDER BY id").fetch_all(conn).await?;
    Ok(affiliates)
}

/// Bump the lifetime counters for a settled commission in one write.
pub async fn record_transaction(
    affiliate_id: i64,
    commission: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<AffiliateAccount, AccountError> {
    let affiliate = sqlx::query_as::<_, AffiliateAccount>(
        r#"
        UPDATE affiliate_accounts
        SET total_transactions = total_transactions + 1,
            total_commission = total_commission + ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(commission)
    .bind(affiliate_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AccountError::AffiliateNotFound(affiliate_id))?;
    Ok(affiliate)
}
