use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{Denomination, NewHold, ProductHold};

/// Per-denomination stock accounting. Each denomination of a product is an independently tracked pool; holds and
/// committed order lines are subtracted from total stock to yield the sellable quantity.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Create or replace the total stock level for a product+denomination.
    async fn upsert_stock(
        &self,
        product_id: &str,
        denomination: Denomination,
        total: i64,
    ) -> Result<(), InventoryError>;

    /// `total_stock − Σ active holds − Σ committed, non-cancelled order lines` for the stock key.
    /// The result is advisory: a second actor can race between this read and a subsequent write, which is why
    /// [`Self::create_hold`] re-validates.
    async fn available_quantity(&self, product_id: &str, denomination: Denomination) -> Result<i64, InventoryError>;

    /// Create a hold, re-validating availability inside the same transaction. A request that exceeds the
    /// available quantity is rejected with [`InventoryError::InsufficientStock`], never clamped.
    async fn create_hold(&self, hold: NewHold) -> Result<ProductHold, InventoryError>;

    /// Release a single hold. Returns `false` when the hold no longer exists.
    async fn release_hold(&self, hold_id: i64) -> Result<bool, InventoryError>;

    /// Delete all holds owned by the cart. Called when the cart's order is committed (the order lines now count
    /// against stock in place of the holds) or when the cart is abandoned.
    async fn release_holds_for_cart(&self, cart_key: &str) -> Result<u64, InventoryError>;

    /// Delete holds whose expiry has passed, returning them. Expired holds are already ignored by
    /// [`Self::available_quantity`]; this reclaims the rows.
    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<ProductHold>, InventoryError>;
}

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Insufficient stock for {product_id} x{denomination}: requested {requested}, available {available}")]
    InsufficientStock { product_id: String, denomination: Denomination, requested: i64, available: i64 },
    #[error("The requested quantity must be positive (got {0})")]
    NonPositiveQuantity(i64),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}
