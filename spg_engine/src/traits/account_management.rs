use spg_common::MinorUnits;
use thiserror::Error;

use crate::db_types::{AffiliateAccount, GatewayAccount, NewAffiliateAccount, NewGatewayAccount};

/// Gateway receiving accounts and the affiliate commission records bound to them.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Register a receiving wallet for a gateway brand. The wallet address is stored lowercased; registering an
    /// address that already exists for the brand is rejected. When `set_default` is set, any previous default
    /// for the brand is cleared in the same transaction.
    async fn register_account(&self, account: NewGatewayAccount) -> Result<GatewayAccount, AccountError>;

    /// Make the given account the single default for its brand, clearing the previous default atomically.
    async fn set_default_account(&self, account_id: i64) -> Result<GatewayAccount, AccountError>;

    async fn fetch_account(&self, account_id: i64) -> Result<Option<GatewayAccount>, AccountError>;

    /// All accounts, optionally limited to one brand.
    async fn fetch_accounts(&self, brand: Option<&str>) -> Result<Vec<GatewayAccount>, AccountError>;

    /// The enabled default account for a brand, if one is configured.
    async fn fetch_default_account(&self, brand: &str) -> Result<Option<GatewayAccount>, AccountError>;

    /// Bind an affiliate payout wallet to a gateway account. One affiliate per account.
    async fn bind_affiliate(&self, affiliate: NewAffiliateAccount) -> Result<AffiliateAccount, AccountError>;

    async fn fetch_affiliate_for_account(&self, account_id: i64) -> Result<Option<AffiliateAccount>, AccountError>;

    async fn fetch_affiliates(&self) -> Result<Vec<AffiliateAccount>, AccountError>;

    /// Add one settled transaction and its commission to the affiliate's running totals.
    async fn record_affiliate_transaction(
        &self,
        affiliate_id: i64,
        commission: MinorUnits,
    ) -> Result<AffiliateAccount, AccountError>;
}

#[derive(Debug, Clone, Error)]
pub enum AccountError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Wallet {wallet_address} is already registered for gateway brand '{brand}'")]
    DuplicateAccount { brand: String, wallet_address: String },
    #[error("The requested gateway account {0} does not exist")]
    AccountNotFound(i64),
    #[error("The requested affiliate {0} does not exist")]
    AffiliateNotFound(i64),
    #[error("Gateway account {0} already has an affiliate bound to it")]
    AffiliateAlreadyBound(i64),
    #[error("Commission and merchant rates must lie in [0, 1] (got {0})")]
    RateOutOfRange(f64),
}

impl From<sqlx::Error> for AccountError {
    fn from(e: sqlx::Error) -> Self {
        AccountError::DatabaseError(e.to_string())
    }
}
