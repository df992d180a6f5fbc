use chrono::{DateTime, Utc};
use mockall::mock;
use spg_common::MinorUnits;
use spg_engine::{
    db_types::{
        AffiliateAccount,
        Denomination,
        GatewayAccount,
        NewAffiliateAccount,
        NewGatewayAccount,
        NewHold,
        ProductHold,
    },
    traits::{AccountError, AccountManagement, InventoryError, InventoryManagement},
};

mock! {
    pub Inventory {}
    impl InventoryManagement for Inventory {
        async fn upsert_stock(&self, product_id: &str, denomination: Denomination, total: i64) -> Result<(), InventoryError>;
        async fn available_quantity(&self, product_id: &str, denomination: Denomination) -> Result<i64, InventoryError>;
        async fn create_hold(&self, hold: NewHold) -> Result<ProductHold, InventoryError>;
        async fn release_hold(&self, hold_id: i64) -> Result<bool, InventoryError>;
        async fn release_holds_for_cart(&self, cart_key: &str) -> Result<u64, InventoryError>;
        async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<ProductHold>, InventoryError>;
    }
}

mock! {
    pub AccountManager {}
    impl AccountManagement for AccountManager {
        async fn register_account(&self, account: NewGatewayAccount) -> Result<GatewayAccount, AccountError>;
        async fn set_default_account(&self, account_id: i64) -> Result<GatewayAccount, AccountError>;
        async fn fetch_account(&self, account_id: i64) -> Result<Option<GatewayAccount>, AccountError>;
        async fn fetch_accounts<'a>(&self, brand: Option<&'a str>) -> Result<Vec<GatewayAccount>, AccountError>;
        async fn fetch_default_account(&self, brand: &str) -> Result<Option<GatewayAccount>, AccountError>;
        async fn bind_affiliate(&self, affiliate: NewAffiliateAccount) -> Result<AffiliateAccount, AccountError>;
        async fn fetch_affiliate_for_account(&self, account_id: i64) -> Result<Option<AffiliateAccount>, AccountError>;
        async fn fetch_affiliates(&self) -> Result<Vec<AffiliateAccount>, AccountError>;
        async fn record_affiliate_transaction(&self, affiliate_id: i64, commission: MinorUnits) -> Result<AffiliateAccount, AccountError>;
    }
}
