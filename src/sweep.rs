//! Background task that periodically persists the OVERDUE reclassification.
//!
//! The query views already derive overdue on read, so the sweep only has to
//! keep the stored status converging; running it late or twice is harmless.

use tokio::time::Duration;

use crate::{services::rental_service, state::AppState};

pub fn start_sweep_task(state: AppState) {
    let interval_secs = state.config.sweep_interval_secs;
    tokio::spawn(async move {
        tracing::info!(interval_secs, "overdue sweep task started");
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            match rental_service::sweep_overdue(&state).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "rentals marked overdue"),
                Err(err) => tracing::warn!(error = %err, "overdue sweep failed"),
            }
        }
    });
}
