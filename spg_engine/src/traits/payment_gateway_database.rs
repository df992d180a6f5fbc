use thiserror::Error;

use crate::{
    db_types::{FulfilmentStatus, NewOrder, Order, OrderId, OrderLineItem, PaymentMethod, StatusUpdate},
    traits::{AccountManagement, HashSyncResult, OrderQueryFilter, StatusWriteResult},
};

/// The highest level of behaviour for backends supporting the payment engine: order storage, and the single
/// place where an order's payment status may be mutated.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + AccountManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new order in a single atomic transaction, converting any holds owned by the order's cart key
    /// into committed lines. Idempotent: returns the existing order and `false` when the order id is already
    /// present.
    ///
    /// The caller is responsible for having validated availability; the committed lines themselves now count
    /// against stock, so the matching holds are deleted in the same transaction.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_lines(&self, order_row_id: i64) -> Result<Vec<OrderLineItem>, PaymentGatewayError>;

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Applies a proposed payment status transition as one conditional write: the order row is re-read inside
    /// the transaction, the transition is decided by [`crate::state_machine::propose`], and the update is only
    /// written when the state machine accepts it *and* the status column still holds the value the decision was
    /// made against. Concurrent deliveries therefore serialise to "first accepted write wins".
    ///
    /// Completing a payment also advances the fulfilment status from `pending_payment` to `order_processing`.
    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        update: StatusUpdate,
    ) -> Result<StatusWriteResult, PaymentGatewayError>;

    /// Records the receiving gateway account and the adapter-specific payload chosen at initiation.
    async fn set_gateway_session(
        &self,
        order_id: &OrderId,
        gateway_account_id: Option<i64>,
        payload: serde_json::Value,
    ) -> Result<Order, PaymentGatewayError>;

    /// Acquire the initiation latch for (order, rail). Returns `true` when this call acquired it, `false` when
    /// a previous initiation already holds it. The latch is what makes a re-rendered checkout page unable to
    /// open a duplicate external session.
    async fn acquire_initiation_latch(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
    ) -> Result<bool, PaymentGatewayError>;

    /// Record an on-chain transaction hash reported by the wallet widget. The hash is compared against the
    /// order's last synced hash inside the transaction; a repeat report is answered with
    /// [`HashSyncResult::Duplicate`] and changes nothing. A new hash is stored and a `completed` transition
    /// (with the hash as transaction id) is pushed through the state machine.
    async fn record_onchain_hash(&self, order_id: &OrderId, tx_hash: &str) -> Result<HashSyncResult, PaymentGatewayError>;

    /// Fulfilment-side transition (courier assignment, shipping, soft cancellation). Orders are never deleted.
    async fn set_fulfilment_status(
        &self,
        order_id: &OrderId,
        status: FulfilmentStatus,
    ) -> Result<Order, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("Payment for order {0} was already initiated on the {1} rail")]
    AlreadyInitiated(OrderId, PaymentMethod),
    #[error("No enabled receiving account is configured for gateway brand '{0}'")]
    NoReceivingAccount(String),
    #[error("The {0} rail cannot initiate an order whose payment method is {1}")]
    MethodMismatch(PaymentMethod, PaymentMethod),
    #[error("The payment gateway returned an unusable response. {0}")]
    GatewayError(String),
    #[error("The payment SDK is unavailable. {0}")]
    SdkUnavailable(String),
    #[error("{0} is not supported yet")]
    UnsupportedAction(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
