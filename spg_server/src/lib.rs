//! # Storefront payment gateway server
//! This module hosts the HTTP surface of the payment gateway. It is responsible for:
//! Listening for payment callbacks (server-to-server webhooks and browser returns) from the hosted checkout
//! gateway.
//! Driving the checkout, SDK and crypto-transfer payment rails.
//! Managing inventory holds, gateway receiving accounts and affiliate bindings.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/callback/payment`: Callback ingress. `POST` for gateway webhooks, `GET` for browser returns.
//! * `/orders`, `/checkout/*`, `/cart/*`: The storefront-facing payment and inventory routes.
//! * `/admin/*`: Account, affiliate and order administration, guarded by the `spg-admin-key` header.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod hold_expiry_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
