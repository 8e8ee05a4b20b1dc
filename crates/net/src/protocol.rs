//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.
//! Every [`Envelope`] is answered by exactly one [`Reply`] with the same
//! `request_id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use diyafa_core::{
    Actor, Booking, BookingRequest, Decision, Error as CoreError, Listing, ListingSummary,
    SearchConstraints,
};

/// Role asserted by the session layer (mirrors `Actor` but decoupled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Guest,
    Host,
}

/// Caller identity supplied by the external auth layer. Trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub role: SessionRole,
}

impl Session {
    pub fn guest(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: SessionRole::Guest,
        }
    }

    pub fn host(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: SessionRole::Host,
        }
    }

    pub fn actor(&self) -> Actor {
        match self.role {
            SessionRole::Guest => Actor::Guest(self.user_id),
            SessionRole::Host => Actor::Host(self.user_id),
        }
    }
}

/// API requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Search the catalog
    Search {
        #[serde(default)]
        constraints: SearchConstraints,
    },

    /// Listing detail, including open slots
    GetListing { listing_id: Uuid },

    /// Request a booking as a guest
    CreateBooking { booking: BookingRequest },

    /// Host accepts or refuses a pending booking
    Decide {
        booking_id: Uuid,
        decision: Decision,
    },

    /// Guest or host cancels a booking
    Cancel { booking_id: Uuid },

    GetBooking { booking_id: Uuid },

    /// The caller's own bookings (guest) or bookings on its listings (host)
    MyBookings,

    Ping,
}

impl Request {
    /// HTTP-style route, for logs
    pub fn route(&self) -> &'static str {
        match self {
            Request::Search { .. } => "GET /listings",
            Request::GetListing { .. } => "GET /listings/{id}",
            Request::CreateBooking { .. } => "POST /bookings",
            Request::Decide { .. } => "POST /bookings/{id}/decision",
            Request::Cancel { .. } => "POST /bookings/{id}/cancel",
            Request::GetBooking { .. } => "GET /bookings/{id}",
            Request::MyBookings => "GET /bookings",
            Request::Ping => "PING",
        }
    }

    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Request::Search { .. } | Request::GetListing { .. } | Request::Ping
        )
    }
}

/// Successful response payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseBody {
    Listings { listings: Vec<ListingSummary> },
    Listing { listing: Listing },
    Booking { booking: Booking },
    Bookings { bookings: Vec<Booking> },
    Pong,
}

/// Typed error payload with an HTTP-style status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{status} {kind}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            status: 401,
            kind: "unauthorized".into(),
            message: "a session is required for this request".into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            kind: "bad_request".into(),
            message: message.into(),
        }
    }

    /// Whether the caller lost a slot race and should search again
    pub fn is_slot_unavailable(&self) -> bool {
        self.kind == diyafa_core::ErrorKind::SlotUnavailable.as_str()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let kind = err.kind();
        // Internal details stay in the server log
        let message = match kind {
            diyafa_core::ErrorKind::Internal => {
                tracing::error!(error = %err, "Internal error");
                "internal error".to_string()
            }
            _ => err.to_string(),
        };
        Self {
            status: kind.status_code(),
            kind: kind.as_str().to_string(),
            message,
        }
    }
}

/// Client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub request_id: u64,
    #[serde(default)]
    pub session: Option<Session>,
    pub request: Request,
}

/// Server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub request_id: u64,
    pub outcome: Result<ResponseBody, ApiError>,
}
