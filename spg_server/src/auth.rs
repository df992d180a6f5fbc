//! Admin authentication.
//!
//! The `/admin` scope is protected by a shared API key carried in the `spg-admin-key` header. The key is
//! compared in the [`AdminKey`] extractor, so protected handlers just take `_: AdminKey` as a parameter and
//! unauthenticated requests never reach them.

use std::future::{ready, Ready};

use actix_web::{web, FromRequest, HttpRequest};
use log::debug;
use spg_common::Secret;

use crate::errors::ServerError;

pub const ADMIN_KEY_HEADER: &str = "spg-admin-key";

/// The configured admin key, injected as app data at server construction.
#[derive(Clone, Debug)]
pub struct AdminAuth {
    key: Secret<String>,
}

impl AdminAuth {
    pub fn new(key: Secret<String>) -> Self {
        Self { key }
    }

    pub fn verify(&self, presented: &str) -> bool {
        !self.key.reveal().is_empty() && self.key.reveal() == presented
    }
}

/// Proof that the request carried the correct admin key.
pub struct AdminKey;

impl FromRequest for AdminKey {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let auth = req.app_data::<web::Data<AdminAuth>>();
        let presented = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok());
        let ok = match (auth, presented) {
            (Some(auth), Some(key)) => auth.verify(key),
            _ => false,
        };
        if !ok {
            debug!("💻️ Rejected an admin request with a missing or wrong API key");
            return ready(Err(ServerError::InvalidApiKey));
        }
        ready(Ok(AdminKey))
    }
}
