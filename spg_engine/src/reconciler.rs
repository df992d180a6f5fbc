use log::{debug, info, warn};
use spg_common::MinorUnits;
use thiserror::Error;

use crate::{
    callback_event::{CallbackEvent, CallbackEventError},
    db_types::{Order, OrderId, PaymentStatus, StatusUpdate},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

/// The `CallbackReconciler` is the single ingress for gateway callbacks, webhooks and return redirects.
///
/// Every delivery is normalised into a [`CallbackEvent`] before it gets here, so the reconciler only deals
/// with one shape. The matching order is resolved (direct id first, then recovery from the session string),
/// the mapped status is pushed through the state machine as one conditional write. When a completion is
/// applied through a gateway account with an affiliate binding, the commission is accrued in the same pass.
///
/// Redeliveries are welcome: a repeated event resolves to the same order, proposes the same transition, and
/// the state machine answers with a no-op.
pub struct CallbackReconciler<B> {
    db: B,
}

impl<B> std::fmt::Debug for CallbackReconciler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallbackReconciler")
    }
}

/// What a callback delivery did, reported back to the caller so the HTTP layer can acknowledge accurately.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub order_id: OrderId,
    /// The payment status after reconciliation.
    pub status: PaymentStatus,
    /// `true` when this delivery changed the order; `false` for redeliveries and stale events.
    pub applied: bool,
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The payload carried neither an order id nor a session id, or neither resolved to a stored order.
    #[error("The callback could not be matched to an order")]
    OrderNotFound,
    #[error("{0}")]
    InvalidPayload(#[from] CallbackEventError),
    #[error("Order reconciliation failed. {0}")]
    Backend(#[from] PaymentGatewayError),
}

impl<B> CallbackReconciler<B>
where B: PaymentGatewayDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Resolve the order the event refers to. The direct order id wins; otherwise the id recovered from the
    /// session string is tried, but only when it is well formed. Anything else fails closed.
    async fn resolve_order(&self, event: &CallbackEvent) -> Result<Order, ReconcileError> {
        if let Some(order_id) = &event.order_id {
            if let Some(order) = self.db.fetch_order_by_order_id(order_id).await.map_err(ReconcileError::Backend)? {
                return Ok(order);
            }
            debug!("🔄️ Callback named order {order_id}, but no such order is stored");
        }
        if let Some(recovered) = event.order_id_from_session() {
            if let Some(order) = self.db.fetch_order_by_order_id(&recovered).await.map_err(ReconcileError::Backend)? {
                debug!("🔄️ Recovered order {recovered} from the callback's session id");
                return Ok(order);
            }
        }
        warn!("🔄️ A callback could not be matched to any order. It has been dropped.");
        Err(ReconcileError::OrderNotFound)
    }

    /// Ingest one normalised callback event.
    pub async fn ingest(&self, event: CallbackEvent) -> Result<ReconcileOutcome, ReconcileError> {
        let order = self.resolve_order(&event).await?;
        let order_id = order.order_id.clone();
        if let Some(amount) = event.amount {
            if amount != order.total {
                // Amounts are advisory on some gateways, so a mismatch is flagged but does not block the write.
                warn!("🔄️ Callback for {order_id} reports {amount}, but the order total is {}", order.total);
            }
        }
        let mut update = StatusUpdate::new(event.status);
        if let Some(txid) = event.transaction_id {
            update = update.with_transaction_id(txid);
        }
        if let Some(paid_at) = event.paid_at {
            update = update.with_paid_at(paid_at);
        }
        let write = self.db.update_payment_status(&order_id, update).await.map_err(ReconcileError::Backend)?;
        if write.applied {
            info!("🔄️ Order {order_id} moved to {} via callback", write.status());
        } else {
            debug!("🔄️ Callback for {order_id} was a no-op ({:?})", write.noop);
        }
        if write.applied && write.status() == PaymentStatus::Completed {
            self.accrue_commission(&write.order).await;
        }
        Ok(ReconcileOutcome { order_id, status: write.status(), applied: write.applied })
    }

    /// Accrue the affiliate commission for a freshly completed payment, when the order settled through a
    /// gateway account with an enabled affiliate binding. Accrual failures are logged, never propagated: the
    /// payment itself has already been recorded.
    async fn accrue_commission(&self, order: &Order) {
        let Some(account_id) = order.gateway_account_id else {
            return;
        };
        let affiliate = match self.db.fetch_affiliate_for_account(account_id).await {
            Ok(Some(affiliate)) if affiliate.enabled => affiliate,
            Ok(_) => return,
            Err(e) => {
                warn!("🤝️ Could not look up the affiliate for account #{account_id}. {e}");
                return;
            },
        };
        let commission = MinorUnits::from((order.total.value() as f64 * affiliate.commission_rate).round() as i64);
        match self.db.record_affiliate_transaction(affiliate.id, commission).await {
            Ok(updated) => info!(
                "🤝️ Affiliate #{} earned {commission} on {}. Lifetime commission is {}.",
                updated.id, order.order_id, updated.total_commission
            ),
            Err(e) => warn!("🤝️ Failed to accrue a {commission} commission for affiliate #{}. {e}", affiliate.id),
        }
    }
}
