//! Diyafa Network Library
//!
//! Serves the Search and Booking API over TCP.
//!
//! # Architecture
//!
//! - **Server**: Wraps a shared `ReservationService`, one task per connection
//! - **Client**: Request/reply over a single connection
//! - **Protocol**: Length-prefixed JSON envelopes and replies
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start("127.0.0.1:7440".parse()?, Arc::new(service)).await?;
//!
//! let mut client = Client::connect(server.addr())
//!     .await?
//!     .with_session(Session::guest(guest_id));
//! let booking = client.create_booking(request).await?;
//! ```

pub mod client;
pub mod error;
pub mod events;
mod frame;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use events::BroadcastSink;
pub use frame::MAX_FRAME_SIZE;
pub use protocol::{ApiError, Envelope, Reply, Request, ResponseBody, Session, SessionRole};
pub use server::Server;

/// Default port for Diyafa servers
pub const DEFAULT_PORT: u16 = 7440;
