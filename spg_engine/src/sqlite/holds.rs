use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Denomination, NewHold, ProductHold},
    traits::InventoryError,
};

pub async fn upsert_stock(
    product_id: &str,
    denomination: Denomination,
    total: i64,
    conn: &mut SqliteConnection,
) -> Result<(), InventoryError> {
    sqlx::query(
        r#"
        INSERT INTO product_stock (product_id, denomination, total) VALUES (?, ?, ?)
        ON CONFLICT (product_id, denomination) DO UPDATE SET total = excluded.total
        "#,
    )
    .bind(product_id)
    .bind(denomination)
    .bind(total)
    .execute(conn)
    .await?;
    Ok(())
}

/// `total − Σ active holds − Σ committed lines` for the stock key. Expired holds and lines on cancelled
/// orders no longer count against stock.
pub async fn available_quantity(
    product_id: &str,
    denomination: Denomination,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, InventoryError> {
    let available = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE((SELECT total FROM product_stock WHERE product_id = $1 AND denomination = $2), 0)
             - COALESCE((SELECT SUM(quantity) FROM product_holds
                         WHERE product_id = $1 AND denomination = $2 AND expires_at > $3), 0)
             - COALESCE((SELECT SUM(oi.quantity) FROM order_items oi
                         JOIN orders o ON o.id = oi.order_row_id
                         WHERE oi.product_id = $1 AND oi.denomination = $2 AND o.fulfilment_status <> 'cancelled'), 0)
        "#,
    )
    .bind(product_id)
    .bind(denomination)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(available)
}

/// Availability is re-checked here, on the caller's transaction, so the read and the insert are atomic.
pub async fn create_hold(hold: NewHold, conn: &mut SqliteConnection) -> Result<ProductHold, InventoryError> {
    let available = available_quantity(&hold.product_id, hold.denomination, Utc::now(), &mut *conn).await?;
    if hold.quantity > available {
        return Err(InventoryError::InsufficientStock {
            product_id: hold.product_id,
            denomination: hold.denomination,
            requested: hold.quantity,
            available,
        });
    }
    let created = sqlx::query_as::<_, ProductHold>(
        r#"
        INSERT INTO product_holds (product_id, denomination, quantity, cart_key, expires_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&hold.product_id)
    .bind(hold.denomination)
    .bind(hold.quantity)
    .bind(&hold.cart_key)
    .bind(hold.expires_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Hold #{} created for cart {}", created.id, created.cart_key);
    Ok(created)
}

pub async fn release_hold(hold_id: i64, conn: &mut SqliteConnection) -> Result<bool, InventoryError> {
    let result = sqlx::query("DELETE FROM product_holds WHERE id = ?").bind(hold_id).execute(conn).await?;
    Ok(result.rows_affected() == 1)
}

pub async fn release_holds_for_cart(cart_key: &str, conn: &mut SqliteConnection) -> Result<u64, InventoryError> {
    let result = sqlx::query("DELETE FROM product_holds WHERE cart_key = ?").bind(cart_key).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn release_expired_holds(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductHold>, InventoryError> {
    let expired = sqlx::query_as::<_, ProductHold>("DELETE FROM product_holds WHERE expires_at <= ? RETURNING *")
        .bind(now)
        .fetch_all(conn)
        .await?;
    Ok(expired)
}
