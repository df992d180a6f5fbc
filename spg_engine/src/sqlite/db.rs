use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqlitePool;

use super::{accounts, affiliates, holds, new_pool, orders, schema};
use crate::{
    db_types::{
        AffiliateAccount, Denomination, FulfilmentStatus, GatewayAccount, NewAffiliateAccount, NewGatewayAccount,
        NewHold, NewOrder, Order, OrderId, OrderLineItem, PaymentMethod, ProductHold, StatusUpdate,
    },
    traits::{
        AccountError, AccountManagement, HashSyncResult, InventoryError, InventoryManagement, OrderQueryFilter,
        PaymentGatewayDatabase, PaymentGatewayError, StatusWriteResult,
    },
};
use spg_common::MinorUnits;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connect to the database at `url` and bring the schema up to date.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        schema::create_schema(&pool).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// An isolated in-memory store. One connection only, so every query sees the same database.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        Self::new("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        if orders::order_exists(&order.order_id, &mut tx).await?.is_some() {
            let existing = orders::fetch_order_by_order_id(&order.order_id, &mut tx)
                .await?
                .ok_or_else(|| PaymentGatewayError::OrderNotFound(order.order_id.clone()))?;
            tx.commit().await?;
            return Ok((existing, false));
        }
        let order_id = order.order_id.clone();
        orders::insert_order(&order, &mut tx).await?;
        if let Some(cart_key) = &order.cart_key {
            // The committed lines now count against stock, so the cart's reservations are retired with them.
            let released = holds::release_holds_for_cart(cart_key, &mut tx)
                .await
                .map_err(|e| PaymentGatewayError::DatabaseError(e.to_string()))?;
            debug!("🗃️ Converted {released} hold(s) from cart {cart_key} into lines of {order_id}");
        }
        let stored = orders::fetch_order_by_order_id(&order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        Ok((stored, true))
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_order_lines(&self, order_row_id: i64) -> Result<Vec<OrderLineItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_lines(order_row_id, &mut conn).await
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(filter, &mut conn).await
    }

    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        update: StatusUpdate,
    ) -> Result<StatusWriteResult, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::update_payment_status(order_id, update, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn set_gateway_session(
        &self,
        order_id: &OrderId,
        gateway_account_id: Option<i64>,
        payload: serde_json::Value,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_gateway_session(order_id, gateway_account_id, &payload, &mut conn).await
    }

    async fn acquire_initiation_latch(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
    ) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::acquire_initiation_latch(order_id, method, &mut conn).await
    }

    async fn record_onchain_hash(&self, order_id: &OrderId, tx_hash: &str) -> Result<HashSyncResult, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::record_onchain_hash(order_id, tx_hash, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn set_fulfilment_status(
        &self,
        order_id: &OrderId,
        status: FulfilmentStatus,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_fulfilment_status(order_id, status, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn upsert_stock(
        &self,
        product_id: &str,
        denomination: Denomination,
        total: i64,
    ) -> Result<(), InventoryError> {
        let mut conn = self.pool.acquire().await?;
        holds::upsert_stock(product_id, denomination, total, &mut conn).await
    }

    async fn available_quantity(&self, product_id: &str, denomination: Denomination) -> Result<i64, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        holds::available_quantity(product_id, denomination, Utc::now(), &mut conn).await
    }

    async fn create_hold(&self, hold: NewHold) -> Result<ProductHold, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let hold = holds::create_hold(hold, &mut tx).await?;
        tx.commit().await?;
        Ok(hold)
    }

    async fn release_hold(&self, hold_id: i64) -> Result<bool, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        holds::release_hold(hold_id, &mut conn).await
    }

    async fn release_holds_for_cart(&self, cart_key: &str) -> Result<u64, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        holds::release_holds_for_cart(cart_key, &mut conn).await
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<ProductHold>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        holds::release_expired_holds(now, &mut conn).await
    }
}

impl AccountManagement for SqliteDatabase {
    async fn register_account(&self, account: NewGatewayAccount) -> Result<GatewayAccount, AccountError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::register_account(account, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn set_default_account(&self, account_id: i64) -> Result<GatewayAccount, AccountError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::set_default_account(account_id, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn fetch_account(&self, account_id: i64) -> Result<Option<GatewayAccount>, AccountError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_account(account_id, &mut conn).await
    }

    async fn fetch_accounts(&self, brand: Option<&str>) -> Result<Vec<GatewayAccount>, AccountError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_accounts(brand, &mut conn).await
    }

    async fn fetch_default_account(&self, brand: &str) -> Result<Option<GatewayAccount>, AccountError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_default_account(brand, &mut conn).await
    }

    async fn bind_affiliate(&self, affiliate: NewAffiliateAccount) -> Result<AffiliateAccount, AccountError> {
        let mut tx = self.pool.begin().await?;
        let affiliate = affiliates::bind_affiliate(affiliate, &mut tx).await?;
        tx.commit().await?;
        Ok(affiliate)
    }

    async fn fetch_affiliate_for_account(&self, account_id: i64) -> Result<Option<AffiliateAccount>, AccountError> {
        let mut conn = self.pool.acquire().await?;
        affiliates::fetch_affiliate_for_account(account_id, &mut conn).await
    }

    async fn fetch_affiliates(&self) -> Result<Vec<AffiliateAccount>, AccountError> {
        let mut conn = self.pool.acquire().await?;
        affiliates::fetch_affiliates(&mut conn).await
    }

    async fn record_affiliate_transaction(
        &self,
        affiliate_id: i64,
        commission: MinorUnits,
    ) -> Result<AffiliateAccount, AccountError> {
        let mut conn = self.pool.acquire().await?;
        affiliates::record_transaction(affiliate_id, commission, &mut conn).await
    }
}
