use log::{debug, info, warn};

use crate::{
    adapters::{
        CheckoutUrls, CryptoTransferAdapter, HostedCheckoutAdapter, InitiateContext, InitiateResponse,
        PaymentSdkClient, RailAdapter, SdkCheckoutAdapter, SdkStatus,
    },
    db_types::{FulfilmentStatus, NewOrder, Order, OrderId, OrderLineItem, PaymentMethod, PaymentStatus, StatusUpdate},
    traits::{
        HashSyncResult, OrderQueryFilter, PaymentGatewayDatabase, PaymentGatewayError,
        StatusWriteResult,
    },
};

/// Which gateway brand receives funds for a rail. The SDK settles through the vendor's own merchant account,
/// not a registered wallet.
fn brand_for(method: PaymentMethod) -> Option<&'static str> {
    match method {
        PaymentMethod::HostedCheckout => Some("paygate"),
        PaymentMethod::CryptoTransfer => Some("crypto"),
        PaymentMethod::CashApp => None,
    }
}

/// The `CheckoutApi` drives payment initiation and the rail-specific settlement paths.
///
/// Initiation is guarded by a per-(order, rail) latch stored alongside the order, so a re-rendered checkout
/// page, a double-clicked pay button, or a retried request can never open a second external session. The latch
/// is acquired *before* the adapter is invoked; if the adapter then fails, the failure is surfaced and an
/// operator can clear the latch, rather than silently charging twice.
pub struct CheckoutApi<B, C>
where C: PaymentSdkClient
{
    db: B,
    hosted: HostedCheckoutAdapter,
    sdk: SdkCheckoutAdapter<C>,
    crypto: CryptoTransferAdapter,
}

impl<B, C: PaymentSdkClient> std::fmt::Debug for CheckoutApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, C> CheckoutApi<B, C>
where
    B: PaymentGatewayDatabase,
    C: PaymentSdkClient,
{
    pub fn new(db: B, hosted: HostedCheckoutAdapter, sdk: SdkCheckoutAdapter<C>, crypto: CryptoTransferAdapter) -> Self {
        Self { db, hosted, sdk, crypto }
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentGatewayError> {
        self.db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
    }

    pub async fn fetch_order_lines(&self, order_row_id: i64) -> Result<Vec<OrderLineItem>, PaymentGatewayError> {
        self.db.fetch_order_lines(order_row_id).await
    }

    pub async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError> {
        self.db.search_orders(filter).await
    }

    /// Store a new order, converting its cart's holds into committed lines in the same transaction. Returns
    /// the order and whether it was freshly created. Repeats with the same order id return the stored order.
    pub async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let (order, created) = self.db.insert_order(order).await?;
        if created {
            info!("🛒️ Stored new order {} for {} ({})", order.order_id, order.customer_id, order.total);
        } else {
            debug!("🛒️ Order {} was already stored; returning the existing record", order.order_id);
        }
        Ok((order, created))
    }

    /// Fulfilment-side transition. Completed payments and courier handoffs move this forward; cancellation is
    /// soft, so the order remains queryable.
    pub async fn set_fulfilment_status(
        &self,
        order_id: &OrderId,
        status: FulfilmentStatus,
    ) -> Result<Order, PaymentGatewayError> {
        let order = self.db.set_fulfilment_status(order_id, status).await?;
        info!("🛒️ Order {} fulfilment moved to {status}", order.order_id);
        Ok(order)
    }

    /// Admin-triggered refund. Only a completed payment can be refunded; the state machine rejects anything
    /// else as a no-op, which is surfaced to the caller through the write result.
    pub async fn refund(&self, order_id: &OrderId, partial: bool) -> Result<StatusWriteResult, PaymentGatewayError> {
        let target = if partial { PaymentStatus::PartiallyRefunded } else { PaymentStatus::Refunded };
        let write = self.db.update_payment_status(order_id, StatusUpdate::new(target)).await?;
        if write.applied {
            info!("🛒️ Order {order_id} marked as {target}");
        } else {
            warn!("🛒️ Refund of {order_id} was a no-op ({:?})", write.noop);
        }
        Ok(write)
    }

    /// Open a payment session for the order on its configured rail.
    ///
    /// Exactly-once: the first call per (order, rail) reaches the adapter; every later call is rejected with
    /// [`PaymentGatewayError::AlreadyInitiated`]. A completed payment can never be re-initiated.
    pub async fn initiate(&self, order_id: &OrderId, urls: CheckoutUrls) -> Result<InitiateResponse, PaymentGatewayError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment.status == PaymentStatus::Completed {
            return Err(PaymentGatewayError::UnsupportedAction(format!(
                "Re-initiating payment for completed order {order_id}"
            )));
        }
        let method = order.payment.method;
        if !self.db.acquire_initiation_latch(order_id, method).await? {
            debug!("🛒️ Initiation for {order_id} on the {method} rail was already latched");
            return Err(PaymentGatewayError::AlreadyInitiated(order_id.clone(), method));
        }
        let receiving_account = match brand_for(method) {
            Some(brand) => Some(
                self.db
                    .fetch_default_account(brand)
                    .await
                    .map_err(|e| PaymentGatewayError::DatabaseError(e.to_string()))?
                    .filter(|a| a.enabled)
                    .ok_or_else(|| PaymentGatewayError::NoReceivingAccount(brand.to_string()))?,
            ),
            None => None,
        };
        let affiliate = match &receiving_account {
            Some(account) => self
                .db
                .fetch_affiliate_for_account(account.id)
                .await
                .map_err(|e| PaymentGatewayError::DatabaseError(e.to_string()))?
                .filter(|a| a.enabled),
            None => None,
        };
        let ctx = InitiateContext { order, receiving_account, affiliate, urls };
        let response = match method {
            PaymentMethod::HostedCheckout => self.hosted.initiate(&ctx).await?,
            PaymentMethod::CashApp => self.sdk.initiate(&ctx).await?,
            PaymentMethod::CryptoTransfer => self.crypto.initiate(&ctx).await?,
        };
        let payload = serde_json::to_value(&response)
            .map_err(|e| PaymentGatewayError::GatewayError(format!("Unserialisable initiation payload: {e}")))?;
        let account_id = ctx.receiving_account.as_ref().map(|a| a.id);
        self.db.set_gateway_session(order_id, account_id, payload).await?;
        info!("🛒️ Opened a {method} payment session for {order_id}");
        Ok(response)
    }

    /// The order's current payment status. A pure read with no side effects; the storefront polls this while
    /// the shopper completes payment elsewhere.
    pub async fn check_status(&self, order_id: &OrderId) -> Result<PaymentStatus, PaymentGatewayError> {
        Ok(self.fetch_order(order_id).await?.payment.status)
    }

    /// Ask the rail for its view of a non-terminal payment and, when it differs from ours, push the remote
    /// status through the state machine. Used by the background poller as a safety net for lost callbacks.
    pub async fn reconcile_remote_status(&self, order_id: &OrderId) -> Result<StatusWriteResult, PaymentGatewayError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment.status.is_terminal() {
            return Ok(StatusWriteResult { order, applied: false, noop: None });
        }
        let remote = match order.payment.method {
            PaymentMethod::HostedCheckout => self.hosted.check_status(&order).await?,
            PaymentMethod::CashApp => self.sdk.check_status(&order).await?,
            PaymentMethod::CryptoTransfer => self.crypto.check_status(&order).await?,
        };
        if remote == order.payment.status {
            return Ok(StatusWriteResult { order, applied: false, noop: None });
        }
        debug!("🔄️ Remote status for {order_id} is {remote}; ours is {}", order.payment.status);
        self.db.update_payment_status(order_id, StatusUpdate::new(remote)).await
    }

    /// Run an SDK payment to its definitive result and record it. The SDK rail has no pending window; the
    /// attempt resolves to `completed` or `failed` before this returns.
    pub async fn pay_with_sdk(&self, order_id: &OrderId) -> Result<StatusWriteResult, PaymentGatewayError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment.method != PaymentMethod::CashApp {
            return Err(PaymentGatewayError::MethodMismatch(PaymentMethod::CashApp, order.payment.method));
        }
        let result = self.sdk.client().pay(order.total, &order.currency, order.order_id.as_str()).await?;
        let update = match result.status {
            SdkStatus::Ok => {
                let mut update = StatusUpdate::new(PaymentStatus::Completed);
                if let Some(txid) = result.transaction_id {
                    update = update.with_transaction_id(txid);
                }
                update
            },
            SdkStatus::Failed => {
                warn!(
                    "📱️ SDK payment for {order_id} failed. {}",
                    result.error.as_deref().unwrap_or("No reason was given.")
                );
                StatusUpdate::new(PaymentStatus::Failed)
            },
        };
        self.db.update_payment_status(order_id, update).await
    }

    /// Record an on-chain transaction hash reported by the wallet widget. Re-reports of the same hash are
    /// answered with [`HashSyncResult::Duplicate`] and change nothing.
    pub async fn report_onchain_hash(&self, order_id: &OrderId, tx_hash: &str) -> Result<HashSyncResult, PaymentGatewayError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment.method != PaymentMethod::CryptoTransfer {
            return Err(PaymentGatewayError::MethodMismatch(PaymentMethod::CryptoTransfer, order.payment.method));
        }
        let result = self.db.record_onchain_hash(order_id, tx_hash).await?;
        match &result {
            HashSyncResult::Duplicate => debug!("⛓️ Ignoring a repeated hash report for {order_id}"),
            HashSyncResult::Synced(write) => {
                info!("⛓️ Synced hash {tx_hash} for {order_id}. Status is now {}", write.status());
            },
        }
        Ok(result)
    }
}
