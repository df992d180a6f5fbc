use std::{sync::Arc, time::Duration};

use log::{debug, error, info};
use tokio::sync::watch;

use crate::{
    adapters::PaymentSdkClient,
    checkout_api::CheckoutApi,
    db_types::{PaymentMethod, PaymentStatus},
    traits::{OrderQueryFilter, PaymentGatewayDatabase},
};

/// A safety net for lost callbacks on the hosted rail.
///
/// Callbacks are the primary settlement signal, but gateways drop them. The poller periodically sweeps orders
/// that are still awaiting settlement, asks the gateway for its view of each session, and pushes any
/// difference through the state machine. Because all writes funnel through the same transition rules, a poll
/// that races a late callback is harmless.
///
/// The poller stops when `true` is sent on its shutdown channel.
pub struct StatusPoller<B, C>
where C: PaymentSdkClient
{
    api: Arc<CheckoutApi<B, C>>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<B, C> StatusPoller<B, C>
where
    B: PaymentGatewayDatabase,
    C: PaymentSdkClient,
{
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(api: Arc<CheckoutApi<B, C>>, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { api, interval, shutdown }
    }

    /// One sweep: reconcile every hosted-rail order that is still pending or processing. Returns the number of
    /// orders whose status changed.
    pub async fn sweep(&self) -> usize {
        let mut changed = 0;
        for status in [PaymentStatus::Pending, PaymentStatus::Processing] {
            let filter = OrderQueryFilter::default()
                .with_method(PaymentMethod::HostedCheckout)
                .with_payment_status(status);
            let orders = match self.api.search_orders(filter).await {
                Ok(orders) => orders,
                Err(e) => {
                    error!("🕰️ Status sweep could not list {status} orders. {e}");
                    continue;
                },
            };
            for order in orders {
                match self.api.reconcile_remote_status(&order.order_id).await {
                    Ok(write) if write.applied => {
                        info!("🕰️ Poll moved {} to {}", order.order_id, write.status());
                        changed += 1;
                    },
                    Ok(_) => {},
                    Err(e) => debug!("🕰️ Could not reconcile {}. {e}", order.order_id),
                }
            }
        }
        changed
    }

    /// Run sweeps on the configured interval until shutdown is signalled. Spawn this; it only returns on
    /// shutdown.
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        info!("🕰️ Status poller started ({}s interval)", self.interval.as_secs());
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let changed = self.sweep().await;
                    if changed > 0 {
                        info!("🕰️ Status sweep reconciled {changed} order(s)");
                    }
                },
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("🕰️ Status poller shutting down");
                        return;
                    }
                },
            }
        }
    }
}
