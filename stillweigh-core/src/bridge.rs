//! Inbound request bridge contract
//!
//! Another task (a UART command port in the firmware) hands requests to the
//! orchestrator through a [`BridgeInbox`] and receives one status per
//! request. The bridge never touches stability state or calibration; a
//! re-tare is only ever performed by the orchestrator.
//!
//! Requests travel as numbered [`Ticket`]s and answers as [`Receipt`]s
//! carrying the same number, so a reply to a request the bridge already
//! gave up on is never taken for the answer to a newer one.

use core::future::Future;

use stillweigh_protocol::{messages, BridgeCommand, Message, StatusCode};

use crate::delivery::DeliveryResult;

/// A request queued by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeRequest {
    /// Forward a payload to the peer
    Deliver(Message),
    /// Re-zero the load cell
    Retare,
}

impl BridgeRequest {
    /// Parse a bridge line; the error is the status to answer with
    pub fn from_line(line: &str) -> Result<Self, StatusCode> {
        match BridgeCommand::parse(line) {
            Ok(BridgeCommand::Send(payload)) => messages::text(payload)
                .map(BridgeRequest::Deliver)
                .map_err(|_| StatusCode::BadRequest),
            Ok(BridgeCommand::Tare) => Ok(BridgeRequest::Retare),
            Err(_) => Err(StatusCode::BadRequest),
        }
    }
}

/// Bridge status for a delivery outcome
pub fn delivery_status(result: DeliveryResult) -> StatusCode {
    match result {
        DeliveryResult::Confirmed => StatusCode::Ok,
        DeliveryResult::Rejected => StatusCode::Rejected,
        DeliveryResult::TimedOut => StatusCode::NoConfirmation,
        DeliveryResult::TransportError => StatusCode::CommunicationError,
        DeliveryResult::ServiceNotFound => StatusCode::ServiceNotFound,
    }
}

/// Orchestrator side of the bridge queue
pub trait BridgeInbox {
    /// Take the next pending request without waiting
    fn try_next(&mut self) -> Option<BridgeRequest>;

    /// Answer the request taken last
    fn reply(&mut self, status: StatusCode);
}

/// A request numbered by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub seq: u32,
    pub request: BridgeRequest,
}

/// A status tagged with the ticket it answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Receipt {
    pub seq: u32,
    pub status: StatusCode,
}

/// Issues ticket numbers in order
#[derive(Debug, Default)]
pub struct Sequencer {
    next: u32,
}

impl Sequencer {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    pub fn issue(&mut self, request: BridgeRequest) -> Ticket {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        Ticket { seq, request }
    }
}

/// Wait for the receipt of ticket `seq`, dropping receipts for older tickets
pub async fn await_receipt<F, Fut>(seq: u32, mut next: F) -> StatusCode
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Receipt>,
{
    loop {
        let receipt = next().await;
        if receipt.seq == seq {
            return receipt.status;
        }
        debug!("Bridge: dropped late reply to request {}", receipt.seq);
    }
}

/// [`BridgeInbox`] over a ticket source and a receipt sink
pub struct TicketInbox<Q, R> {
    take: Q,
    answer: R,
    current: Option<u32>,
}

impl<Q, R> TicketInbox<Q, R>
where
    Q: FnMut() -> Option<Ticket>,
    R: FnMut(Receipt),
{
    pub fn new(take: Q, answer: R) -> Self {
        Self {
            take,
            answer,
            current: None,
        }
    }
}

impl<Q, R> BridgeInbox for TicketInbox<Q, R>
where
    Q: FnMut() -> Option<Ticket>,
    R: FnMut(Receipt),
{
    fn try_next(&mut self) -> Option<BridgeRequest> {
        let ticket = (self.take)()?;
        self.current = Some(ticket.seq);
        Some(ticket.request)
    }

    fn reply(&mut self, status: StatusCode) {
        match self.current.take() {
            Some(seq) => (self.answer)(Receipt { seq, status }),
            None => warn!("Bridge: reply without a pending request"),
        }
    }
}
