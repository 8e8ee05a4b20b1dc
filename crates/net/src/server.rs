//! TCP server for the Search and Booking API
//!
//! One task per connection. Requests on a connection are answered in
//! order; store calls run on the blocking pool so the reactor never waits
//! on SQLite.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use diyafa_core::ReservationService;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ApiError, Envelope, Reply, Request, ResponseBody, Session};

/// Maximum number of concurrent connections
const MAX_CONNECTIONS: usize = 256;

/// API server handle
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    accept_handle: JoinHandle<()>,
}

impl Server {
    /// Bind `addr` and start serving `service`
    pub async fn start(addr: SocketAddr, service: Arc<ReservationService>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_rx = shutdown_tx.subscribe();
        let accept_handle = tokio::spawn(accept_loop(
            listener,
            service,
            shutdown_tx.clone(),
            shutdown_rx,
        ));

        Ok(Server {
            addr: bound_addr,
            shutdown_tx,
            accept_handle,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and close open connections
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }

    /// Wait for the accept loop to finish
    pub async fn join(self) {
        if let Err(e) = self.accept_handle.await {
            error!(error = %e, "Accept loop panicked");
        }
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    service: Arc<ReservationService>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let slots = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let Ok(permit) = Arc::clone(&slots).try_acquire_owned() else {
                            warn!(addr = %addr, "Connection limit reached, dropping");
                            continue;
                        };
                        debug!(addr = %addr, "New connection");
                        let service = Arc::clone(&service);
                        let shutdown_rx = shutdown_tx.subscribe();
                        tokio::spawn(async move {
                            handle_connection(stream, addr, service, shutdown_rx).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Serve one client until it disconnects or the server shuts down
async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    service: Arc<ReservationService>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let envelope: Envelope = tokio::select! {
            result = read_frame::<_, Envelope>(&mut stream) => match result {
                Ok(envelope) => envelope,
                Err(Error::ConnectionClosed) => {
                    debug!(addr = %addr, "Connection closed");
                    break;
                }
                Err(e) => {
                    warn!(addr = %addr, error = %e, "Read error");
                    break;
                }
            },
            _ = shutdown_rx.recv() => break,
        };

        let reply = answer(&service, envelope).await;
        if let Err(e) = write_frame(&mut stream, &reply).await {
            debug!(addr = %addr, error = %e, "Write failed");
            break;
        }
    }
}

/// Run one request against the service
async fn answer(service: &Arc<ReservationService>, envelope: Envelope) -> Reply {
    let Envelope {
        request_id,
        session,
        request,
    } = envelope;
    let route = request.route();
    debug!(request_id, route, "Request");

    let service = Arc::clone(service);
    let outcome = tokio::task::spawn_blocking(move || dispatch(&service, session, request))
        .await
        .unwrap_or_else(|e| {
            error!(request_id, route, error = %e, "Request handler panicked");
            Err(ApiError::from(diyafa_core::Error::Io(std::io::Error::other(
                "handler panicked",
            ))))
        });

    if let Err(api) = &outcome {
        warn!(request_id, route, status = api.status, kind = %api.kind, "Request rejected");
    }

    Reply {
        request_id,
        outcome,
    }
}

fn dispatch(
    service: &ReservationService,
    session: Option<Session>,
    request: Request,
) -> std::result::Result<ResponseBody, ApiError> {
    let actor = || {
        session
            .map(|s| s.actor())
            .ok_or_else(ApiError::unauthorized)
    };

    let body = match request {
        Request::Ping => ResponseBody::Pong,
        Request::Search { constraints } => ResponseBody::Listings {
            listings: service.search(&constraints)?,
        },
        Request::GetListing { listing_id } => ResponseBody::Listing {
            listing: service.get_listing(listing_id)?,
        },
        Request::CreateBooking { booking } => ResponseBody::Booking {
            booking: service.create_booking(actor()?, booking)?,
        },
        Request::Decide {
            booking_id,
            decision,
        } => ResponseBody::Booking {
            booking: service.decide(actor()?, booking_id, decision)?,
        },
        Request::Cancel { booking_id } => ResponseBody::Booking {
            booking: service.cancel(actor()?, booking_id)?,
        },
        Request::GetBooking { booking_id } => ResponseBody::Booking {
            booking: service.get_booking(actor()?, booking_id)?,
        },
        Request::MyBookings => ResponseBody::Bookings {
            bookings: service.bookings_for(actor()?)?,
        },
    };

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::events::BroadcastSink;
    use chrono::{TimeZone, Utc};
    use diyafa_core::{
        BookingRequest, BookingStatus, Database, Decision, EngineConfig, EventKind, FixedClock,
        Money, NewListing, SearchConstraints,
    };
    use uuid::Uuid;

    struct Harness {
        server: Server,
        events: BroadcastSink,
        host: Uuid,
        listing_id: Uuid,
    }

    async fn harness() -> Harness {
        let events = BroadcastSink::new();
        let service = ReservationService::new(
            Database::open_in_memory().unwrap(),
            EngineConfig::default(),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 12, 1, 9, 0, 0).unwrap(),
        )))
        .with_events(Arc::new(events.clone()));

        let host = Uuid::new_v4();
        let listing = service
            .create_listing(
                host,
                NewListing::new("Famille Alami", "Marrakech", Money::from_major(250))
                    .with_slots(["2025-12-10/19:00".parse().unwrap()]),
            )
            .unwrap();

        let server = Server::start("127.0.0.1:0".parse().unwrap(), Arc::new(service))
            .await
            .unwrap();

        Harness {
            server,
            events,
            host,
            listing_id: listing.id,
        }
    }

    fn request(listing_id: Uuid) -> BookingRequest {
        BookingRequest {
            listing_id,
            date: "2025-12-10".into(),
            time: Some("19:00".into()),
            guests: 4,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_server_start() {
        let h = harness().await;
        assert!(h.server.addr().port() > 0);
        h.server.shutdown();
        h.server.join().await;
    }

    #[tokio::test]
    async fn test_ping_and_search() {
        let h = harness().await;
        let mut client = Client::connect(h.server.addr()).await.unwrap();

        client.ping().await.unwrap();
        let listings = client
            .search(SearchConstraints::new().city("marra"))
            .await
            .unwrap();
        assert_eq!(listings.len(), 1);
        assert!(listings[0].has_open_slots);

        let listing = client.get_listing(h.listing_id).await.unwrap();
        assert_eq!(listing.availability.len(), 1);

        h.server.shutdown();
    }

    #[tokio::test]
    async fn test_booking_requires_session() {
        let h = harness().await;
        let mut client = Client::connect(h.server.addr()).await.unwrap();

        let err = client.create_booking(request(h.listing_id)).await.unwrap_err();
        match err {
            Error::Api(api) => assert_eq!(api.status, 401),
            other => panic!("unexpected {:?}", other),
        }

        h.server.shutdown();
    }

    #[tokio::test]
    async fn test_booking_flow_over_the_wire() {
        let h = harness().await;
        let mut events = h.events.subscribe();

        let mut guest = Client::connect(h.server.addr())
            .await
            .unwrap()
            .with_session(Session::guest(Uuid::new_v4()));
        let booking = guest.create_booking(request(h.listing_id)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_price, Money::from_major(1000));

        let mut rival = Client::connect(h.server.addr())
            .await
            .unwrap()
            .with_session(Session::guest(Uuid::new_v4()));
        match rival.create_booking(request(h.listing_id)).await.unwrap_err() {
            Error::Api(api) => {
                assert_eq!(api.status, 409);
                assert!(api.is_slot_unavailable());
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut host = Client::connect(h.server.addr())
            .await
            .unwrap()
            .with_session(Session::host(h.host));
        let confirmed = host.decide(booking.id, Decision::Accept).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(host.my_bookings().await.unwrap().len(), 1);

        // A second decision is a stale-client bug and fails loudly
        match host.decide(booking.id, Decision::Refuse).await.unwrap_err() {
            Error::Api(api) => assert_eq!(api.kind, "illegal_transition"),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(events.recv().await.unwrap().kind, EventKind::BookingCreated);
        assert_eq!(events.recv().await.unwrap().kind, EventKind::BookingConfirmed);

        h.server.shutdown();
    }

    #[tokio::test]
    async fn test_foreign_host_forbidden() {
        let h = harness().await;
        let mut guest = Client::connect(h.server.addr())
            .await
            .unwrap()
            .with_session(Session::guest(Uuid::new_v4()));
        let booking = guest.create_booking(request(h.listing_id)).await.unwrap();

        let mut stranger = Client::connect(h.server.addr())
            .await
            .unwrap()
            .with_session(Session::host(Uuid::new_v4()));
        match stranger.cancel(booking.id).await.unwrap_err() {
            Error::Api(api) => assert_eq!(api.status, 403),
            other => panic!("unexpected {:?}", other),
        }

        let cancelled = guest.cancel(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(guest.get_booking(booking.id).await.unwrap().status, BookingStatus::Cancelled);

        h.server.shutdown();
    }
}
