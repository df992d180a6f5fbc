use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::{
    db_types::{Denomination, NewHold, ProductHold},
    traits::{InventoryError, InventoryManagement},
};

/// The `InventoryApi` keeps per-denomination stock accounting honest while shoppers build carts.
///
/// Stock is tracked per (product, denomination) pair; a $25 card and a $100 card of the same product draw
/// from independent pools. A hold reserves quantity for a cart until it is released, converted into an order,
/// or falls past its expiry. Availability is always computed as on-hand stock minus active holds and committed
/// order lines, so two carts can never reserve the same unit.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> std::fmt::Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Set the total stock level for a (product, denomination) pair, creating the row if needed.
    pub async fn upsert_stock(
        &self,
        product_id: &str,
        denomination: Denomination,
        total: i64,
    ) -> Result<(), InventoryError> {
        self.db.upsert_stock(product_id, denomination, total).await?;
        info!("📦️ Stock for product {product_id} @ {denomination} set to {total}");
        Ok(())
    }

    /// Sellable quantity right now. Advisory only; [`InventoryApi::place_hold`] re-validates inside its own
    /// transaction before reserving anything.
    pub async fn available_quantity(
        &self,
        product_id: &str,
        denomination: Denomination,
    ) -> Result<i64, InventoryError> {
        self.db.available_quantity(product_id, denomination).await
    }

    /// Reserve quantity for a cart. Requests past the available count are rejected outright rather than
    /// clamped to what is left.
    pub async fn place_hold(&self, hold: NewHold) -> Result<ProductHold, InventoryError> {
        if hold.quantity <= 0 {
            return Err(InventoryError::NonPositiveQuantity(hold.quantity));
        }
        let hold = self.db.create_hold(hold).await?;
        debug!(
            "📦️ Held {}x product {} @ {} for cart {} until {}",
            hold.quantity, hold.product_id, hold.denomination, hold.cart_key, hold.expires_at
        );
        Ok(hold)
    }

    /// Release a single hold, returning its quantity to the available pool. Returns `false` when the hold was
    /// already gone; that is not an error.
    pub async fn release_hold(&self, hold_id: i64) -> Result<bool, InventoryError> {
        let released = self.db.release_hold(hold_id).await?;
        if released {
            debug!("📦️ Released hold #{hold_id}");
        }
        Ok(released)
    }

    /// Release every hold belonging to a cart. Used when a cart is abandoned or its order is committed.
    pub async fn release_holds_for_cart(&self, cart_key: &str) -> Result<u64, InventoryError> {
        let released = self.db.release_holds_for_cart(cart_key).await?;
        if released > 0 {
            debug!("📦️ Released {released} hold(s) for cart {cart_key}");
        }
        Ok(released)
    }

    /// Sweep holds whose expiry has passed. The expiry worker calls this on a timer.
    pub async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<ProductHold>, InventoryError> {
        let released = self.db.release_expired_holds(now).await?;
        if !released.is_empty() {
            info!("🕰️ Released {} expired hold(s)", released.len());
        }
        Ok(released)
    }
}
