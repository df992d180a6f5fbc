use log::*;
use spg_engine::{db_types::ProductHold, InventoryApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the hold expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Holds expire on read as well (availability queries ignore lapsed holds), so this job is housekeeping: it
/// deletes lapsed rows so the holds table does not grow without bound.
pub fn start_hold_expiry_worker(db: SqliteDatabase) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        let api = InventoryApi::new(db);
        info!("🕰️ Hold expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running hold expiry job");
            match api.release_expired_holds(chrono::Utc::now()).await {
                Ok(released) if released.is_empty() => {},
                Ok(released) => {
                    info!("🕰️ {} expired holds released", released.len());
                    debug!("🕰️ Released holds: {}", hold_list(&released));
                },
                Err(e) => {
                    error!("🕰️ Error running hold expiry job: {e}");
                },
            }
        }
    })
}

fn hold_list(holds: &[ProductHold]) -> String {
    holds
        .iter()
        .map(|h| format!("[{}] {} x{} ({})", h.id, h.product_id, h.quantity, h.cart_key))
        .collect::<Vec<String>>()
        .join(", ")
}
