//! Background tasks owned by the server process

use std::sync::Arc;
use std::time::Duration;

use diyafa_core::{DomainEvent, ReservationService};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Periodically cancel pending bookings past `pending_expiry_hours`
pub async fn run_expiry_sweep(
    service: Arc<ReservationService>,
    every: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let service = Arc::clone(&service);
                match tokio::task::spawn_blocking(move || service.expire_pending()).await {
                    Ok(Ok(expired)) if !expired.is_empty() => {
                        info!(count = expired.len(), "Expiry sweep cancelled bookings");
                    }
                    Ok(Ok(_)) => debug!("Expiry sweep found nothing"),
                    Ok(Err(e)) => warn!(error = %e, "Expiry sweep failed"),
                    Err(e) => error!(error = %e, "Expiry sweep panicked"),
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Expiry sweep shutting down");
                break;
            }
        }
    }
}

/// Log every domain event until the channel closes or shutdown
pub async fn log_events(
    mut events: broadcast::Receiver<DomainEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => info!(
                    kind = ?event.kind,
                    booking_id = %event.booking_id,
                    host_id = %event.host_id,
                    guest_id = %event.guest_id,
                    status = %event.status,
                    "Booking event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown_rx.recv() => break,
        }
    }
}
