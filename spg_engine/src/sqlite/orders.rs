use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{FulfilmentStatus, NewOrder, Order, OrderId, OrderLineItem, PaymentMethod, PaymentStatus, StatusUpdate},
    state_machine::{self, Transition},
    traits::{HashSyncResult, OrderQueryFilter, PaymentGatewayError, StatusWriteResult},
};

pub async fn order_exists(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<i64>, PaymentGatewayError> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM orders WHERE order_id = ?")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Inserts a new order and its line items using the given connection. This is not atomic on its own; embed the
/// call inside a transaction and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<i64, PaymentGatewayError> {
    let row_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO orders (
            order_id, customer_id, currency, subtotal, discount, tax, shipping, total,
            payment_method, shipping_address, billing_address, contact_email
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.customer_id)
    .bind(&order.currency)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.tax)
    .bind(order.shipping)
    .bind(order.total)
    .bind(order.method)
    .bind(&order.shipping_address)
    .bind(&order.billing_address)
    .bind(&order.contact_email)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_row_id, product_id, denomination, quantity, unit_price, total)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row_id)
        .bind(&item.product_id)
        .bind(item.denomination)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total())
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {} has been saved in the DB with id {row_id}", order.order_id);
    Ok(row_id)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = ?")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_lines(
    order_row_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderLineItem>, PaymentGatewayError> {
    let lines = sqlx::query_as::<_, OrderLineItem>("SELECT * FROM order_items WHERE order_row_id = ? ORDER BY id")
        .bind(order_row_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

pub async fn search_orders(
    filter: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, PaymentGatewayError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders");
    if !filter.is_empty() {
        builder.push(" WHERE 1=1");
        if let Some(order_id) = &filter.order_id {
            builder.push(" AND order_id = ").push_bind(order_id.clone());
        }
        if let Some(customer_id) = &filter.customer_id {
            builder.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(status) = filter.payment_status {
            builder.push(" AND payment_status = ").push_bind(status);
        }
        if let Some(method) = filter.method {
            builder.push(" AND payment_method = ").push_bind(method);
        }
        if let Some(fulfilment) = filter.fulfilment {
            builder.push(" AND fulfilment_status = ").push_bind(fulfilment);
        }
    }
    builder.push(" ORDER BY id");
    trace!("🗃️ Executing order search: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}

/// The conditional status write. The order is re-read on this connection (the caller holds the transaction),
/// the transition is decided in memory, and the UPDATE is predicated on the status column still holding the
/// value the decision was made against. A concurrent delivery that slips in between therefore leaves exactly
/// one winner.
pub async fn update_payment_status(
    order_id: &OrderId,
    update: StatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<StatusWriteResult, PaymentGatewayError> {
    let order = fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
    let applied = match state_machine::propose(&order.payment, &update, Utc::now()) {
        Transition::Noop(reason) => {
            debug!("🗃️ Status write {} → {} on {order_id} is a no-op ({reason:?})", order.payment.status, update.status);
            return Ok(StatusWriteResult { order, applied: false, noop: Some(reason) });
        },
        Transition::Apply(applied) => applied,
    };
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_status = ?, transaction_id = ?, paid_at = ?, updated_at = CURRENT_TIMESTAMP
        WHERE order_id = ? AND payment_status = ?
        "#,
    )
    .bind(applied.status)
    .bind(&applied.transaction_id)
    .bind(applied.paid_at)
    .bind(order_id)
    .bind(order.payment.status)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        // Lost the race against a concurrent write. The winner's state stands.
        debug!("🗃️ Status write on {order_id} lost a concurrent race and was dropped");
        let order = fetch_order_by_order_id(order_id, &mut *conn)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        return Ok(StatusWriteResult { order, applied: false, noop: None });
    }
    if applied.status == PaymentStatus::Completed {
        sqlx::query("UPDATE orders SET fulfilment_status = ? WHERE order_id = ? AND fulfilment_status = ?")
            .bind(FulfilmentStatus::OrderProcessing)
            .bind(order_id)
            .bind(FulfilmentStatus::PendingPayment)
            .execute(&mut *conn)
            .await?;
    }
    let order = fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
    Ok(StatusWriteResult { order, applied: true, noop: None })
}

pub async fn set_gateway_session(
    order_id: &OrderId,
    gateway_account_id: Option<i64>,
    payload: &serde_json::Value,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET gateway_account_id = ?, gateway_payload = ?, updated_at = CURRENT_TIMESTAMP
        WHERE order_id = ?
        "#,
    )
    .bind(gateway_account_id)
    .bind(payload.to_string())
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PaymentGatewayError::OrderNotFound(order_id.clone()));
    }
    fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
}

pub async fn set_fulfilment_status(
    order_id: &OrderId,
    status: FulfilmentStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result =
        sqlx::query("UPDATE orders SET fulfilment_status = ?, updated_at = CURRENT_TIMESTAMP WHERE order_id = ?")
            .bind(status)
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(PaymentGatewayError::OrderNotFound(order_id.clone()));
    }
    fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
}

/// `true` when this call created the latch row, `false` when it already existed.
pub async fn acquire_initiation_latch(
    order_id: &OrderId,
    method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query("INSERT OR IGNORE INTO initiation_latches (order_id, payment_method) VALUES (?, ?)")
        .bind(order_id)
        .bind(method)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Record a wallet-reported transaction hash and push the matching completion through the state machine.
/// A hash equal to the order's last synced hash is a duplicate report and changes nothing.
pub async fn record_onchain_hash(
    order_id: &OrderId,
    tx_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<HashSyncResult, PaymentGatewayError> {
    let order = fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
    if order.last_synced_hash.as_deref() == Some(tx_hash) {
        return Ok(HashSyncResult::Duplicate);
    }
    sqlx::query("UPDATE orders SET last_synced_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE order_id = ?")
        .bind(tx_hash)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    let update = StatusUpdate::new(PaymentStatus::Completed).with_transaction_id(tx_hash);
    let write = update_payment_status(order_id, update, conn).await?;
    Ok(HashSyncResult::Synced(write))
}
