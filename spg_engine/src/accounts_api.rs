use log::info;

use crate::{
    db_types::{GatewayAccount, NewGatewayAccount},
    traits::{AccountError, AccountManagement},
};

/// The `GatewayAccountApi` manages the registry of receiving accounts, keyed by gateway brand.
///
/// Wallet addresses are normalised to lowercase on the way in, so lookups and duplicate detection are
/// case-insensitive. Each brand carries at most one default account; registering or promoting a new default
/// demotes the previous one in the same write.
pub struct GatewayAccountApi<B> {
    db: B,
}

impl<B> std::fmt::Debug for GatewayAccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GatewayAccountApi")
    }
}

impl<B> GatewayAccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Register a new receiving account. Rejects a duplicate (brand, wallet address) pair. When
    /// `set_default` is set, or the brand has no default yet, the new account becomes the brand default.
    pub async fn register_account(&self, account: NewGatewayAccount) -> Result<GatewayAccount, AccountError> {
        let account = self.db.register_account(account).await?;
        info!(
            "🏦️ Registered {} account #{} ({}){}",
            account.brand,
            account.id,
            account.wallet_address,
            if account.is_default { " as the brand default" } else { "" }
        );
        Ok(account)
    }

    /// Promote an existing account to be its brand's default, demoting the current default.
    pub async fn set_default_account(&self, account_id: i64) -> Result<GatewayAccount, AccountError> {
        let account = self.db.set_default_account(account_id).await?;
        info!("🏦️ Account #{} is now the default for {}", account.id, account.brand);
        Ok(account)
    }

    pub async fn fetch_account(&self, account_id: i64) -> Result<Option<GatewayAccount>, AccountError> {
        self.db.fetch_account(account_id).await
    }

    /// List accounts, optionally restricted to a single brand.
    pub async fn fetch_accounts(&self, brand: Option<&str>) -> Result<Vec<GatewayAccount>, AccountError> {
        self.db.fetch_accounts(brand).await
    }

    /// The enabled default account for a brand, if one is configured. Checkout initiation routes
    /// payments through this account.
    pub async fn fetch_default_account(&self, brand: &str) -> Result<Option<GatewayAccount>, AccountError> {
        self.db.fetch_default_account(brand).await
    }
}
