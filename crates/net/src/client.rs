//! TCP client for the Diyafa API

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tracing::{debug, info};
use uuid::Uuid;

use diyafa_core::{Booking, BookingRequest, Decision, Listing, ListingSummary, SearchConstraints};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Envelope, Reply, Request, ResponseBody, Session};

/// One connection; requests are sent and answered one at a time
pub struct Client {
    stream: TcpStream,
    session: Option<Session>,
    next_request_id: u64,
}

impl Client {
    /// Connect to a Diyafa server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            session: None,
            next_request_id: 1,
        })
    }

    /// Attach the caller identity sent with every request
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    /// Send one request and wait for its reply
    pub async fn call(&mut self, request: Request) -> Result<ResponseBody> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        debug!(request_id, route = request.route(), "Sending request");

        let envelope = Envelope {
            request_id,
            session: self.session,
            request,
        };
        write_frame(&mut self.stream, &envelope).await?;

        let reply: Reply = read_frame(&mut self.stream).await?;
        if reply.request_id != request_id {
            return Err(Error::ReplyMismatch {
                expected: request_id,
                got: reply.request_id,
            });
        }

        Ok(reply.outcome?)
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self.call(Request::Ping).await? {
            ResponseBody::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn search(&mut self, constraints: SearchConstraints) -> Result<Vec<ListingSummary>> {
        match self.call(Request::Search { constraints }).await? {
            ResponseBody::Listings { listings } => Ok(listings),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn get_listing(&mut self, listing_id: Uuid) -> Result<Listing> {
        match self.call(Request::GetListing { listing_id }).await? {
            ResponseBody::Listing { listing } => Ok(listing),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn create_booking(&mut self, booking: BookingRequest) -> Result<Booking> {
        self.booking(Request::CreateBooking { booking }).await
    }

    pub async fn decide(&mut self, booking_id: Uuid, decision: Decision) -> Result<Booking> {
        self.booking(Request::Decide {
            booking_id,
            decision,
        })
        .await
    }

    pub async fn cancel(&mut self, booking_id: Uuid) -> Result<Booking> {
        self.booking(Request::Cancel { booking_id }).await
    }

    pub async fn get_booking(&mut self, booking_id: Uuid) -> Result<Booking> {
        self.booking(Request::GetBooking { booking_id }).await
    }

    pub async fn my_bookings(&mut self) -> Result<Vec<Booking>> {
        match self.call(Request::MyBookings).await? {
            ResponseBody::Bookings { bookings } => Ok(bookings),
            other => Err(unexpected(&other)),
        }
    }

    async fn booking(&mut self, request: Request) -> Result<Booking> {
        match self.call(request).await? {
            ResponseBody::Booking { booking } => Ok(booking),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(body: &ResponseBody) -> Error {
    Error::Protocol(format!("Unexpected response: {:?}", body))
}
