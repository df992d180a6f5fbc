use serde::{Deserialize, Serialize};

use crate::{
    db_types::{FulfilmentStatus, Order, OrderId, PaymentMethod, PaymentStatus},
    state_machine::NoopReason,
};

/// The result of pushing a status update through the state machine and the database in one conditional write.
#[derive(Debug, Clone)]
pub struct StatusWriteResult {
    /// The order as it stands after the write (unchanged when the write was a no-op).
    pub order: Order,
    /// Whether the transition was applied. A `false` here is still success; see the no-op rule.
    pub applied: bool,
    pub noop: Option<NoopReason>,
}

impl StatusWriteResult {
    pub fn status(&self) -> PaymentStatus {
        self.order.payment.status
    }
}

/// Outcome of reporting an on-chain transaction hash for the crypto rail.
#[derive(Debug, Clone)]
pub enum HashSyncResult {
    /// The hash matches the last synced hash; a re-render resubmitted the same completion.
    Duplicate,
    /// The hash was recorded and the completion applied (or found to be a status no-op).
    Synced(StatusWriteResult),
}

/// Query criteria for order searches. Empty filters match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub fulfilment: Option<FulfilmentStatus>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_fulfilment(mut self, status: FulfilmentStatus) -> Self {
        self.fulfilment = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.customer_id.is_none()
            && self.payment_status.is_none()
            && self.method.is_none()
            && self.fulfilment.is_none()
    }
}
