//! Storage traits for the payment engine.
//!
//! The module defines the behaviour a database backend must expose in order to drive the engine:
//!
//! * [`PaymentGatewayDatabase`]: order storage and the single conditional payment-status write.
//! * [`InventoryManagement`]: per-denomination stock accounting and hold lifecycle.
//! * [`AccountManagement`]: gateway receiving accounts and affiliate commission records.
//!
//! Multiple independent requests may race on the same order or the same product+denomination stock row, so
//! implementations express every shared-state update as a conditional, idempotent write inside a transaction,
//! never as a read-modify-write guarded by in-process state.

mod account_management;
mod data_objects;
mod inventory_management;
mod payment_gateway_database;

pub use account_management::{AccountError, AccountManagement};
pub use data_objects::{HashSyncResult, OrderQueryFilter, StatusWriteResult};
pub use inventory_management::{InventoryError, InventoryManagement};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
