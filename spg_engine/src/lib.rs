//! Storefront Payment Gateway engine
//!
//! The engine contains the core logic for reconciling order payments across the three supported payment rails
//! (hosted checkout, SDK-driven card payments, and direct crypto transfers), together with the per-denomination
//! inventory hold accounting that gates "add to cart" against available stock.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public APIs instead. The exception is the data types used in the
//!    database, which are defined in [`mod@db_types`] and are public.
//! 2. Storage traits ([`mod@traits`]) that a backend must implement to drive the engine.
//! 3. The engine public API: the [`CallbackReconciler`], the [`CheckoutApi`] and its rail adapters, the
//!    [`InventoryApi`], and the registry/affiliate APIs.
//!
//! All payment status writes, no matter which rail or ingress they originate from, funnel through the transition
//! rules in [`mod@state_machine`]. That module is the single place where "can this status change happen" is decided.

pub mod adapters;
pub mod db_types;
pub mod redirect_extract;
pub mod state_machine;

mod accounts_api;
mod affiliates_api;
mod callback_event;
mod checkout_api;
mod holds_api;
mod poller;
mod reconciler;

pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use accounts_api::GatewayAccountApi;
pub use affiliates_api::{AffiliateApi, AffiliateRegistrar, HttpAffiliateRegistrar};
pub use callback_event::{map_external_status, CallbackEvent, CallbackEventError, CallbackPayload};
pub use checkout_api::CheckoutApi;
pub use holds_api::InventoryApi;
pub use poller::StatusPoller;
pub use reconciler::{CallbackReconciler, ReconcileError, ReconcileOutcome};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
