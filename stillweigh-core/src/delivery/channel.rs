//! Request / acknowledge exchange over a byte stream

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use stillweigh_protocol::{LineParser, Token};

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeliveryResult {
    /// Peer answered `True`
    Confirmed,
    /// Peer answered `False`
    Rejected,
    /// No terminal token before the deadline
    TimedOut,
    /// Write failed, read failed, or the peer closed the stream
    TransportError,
    /// No peer offers the service
    ServiceNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum StreamFault {
    Io,
    Closed,
}

/// Connected peer stream
///
/// All operations take `&mut self`, so at most one request is in flight.
/// Messages are sent as one line terminated by `\n`; replies may or may
/// not be newline-terminated. Input already buffered when a request starts
/// belongs to an earlier exchange and is discarded.
pub struct DeliveryChannel<T> {
    transport: T,
    parser: LineParser,
}

impl<T: Read + Write + ReadReady> DeliveryChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            parser: LineParser::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send `message` and wait up to `ack_timeout_ms` for `True` / `False`
    ///
    /// Exactly one attempt; lines other than the two terminal tokens are
    /// logged and skipped.
    pub async fn send<D: DelayNs>(
        &mut self,
        message: &str,
        ack_timeout_ms: u32,
        delay: &mut D,
    ) -> DeliveryResult {
        if let Err(fault) = self.discard_stale().await {
            warn!("Delivery: stream fault {:?}", fault);
            return DeliveryResult::TransportError;
        }

        if self.write_line(message).await.is_err() {
            warn!("Delivery: write failed");
            return DeliveryResult::TransportError;
        }

        let wait = self.wait_for(Token::is_acknowledgement);
        match select(wait, delay.delay_ms(ack_timeout_ms)).await {
            Either::First(Ok(Token::Confirm)) => DeliveryResult::Confirmed,
            Either::First(Ok(_)) => DeliveryResult::Rejected,
            Either::First(Err(fault)) => {
                warn!("Delivery: stream fault {:?}", fault);
                DeliveryResult::TransportError
            }
            Either::Second(()) => DeliveryResult::TimedOut,
        }
    }

    /// Send `Sync` and wait for `Sync Confirmed`
    pub async fn request_sync<D: DelayNs>(&mut self, timeout_ms: u32, delay: &mut D) -> DeliveryResult {
        if self.discard_stale().await.is_err() {
            return DeliveryResult::TransportError;
        }

        if self.write_line(Token::Sync.as_str()).await.is_err() {
            return DeliveryResult::TransportError;
        }

        let wait = self.wait_for(|t| t == Token::SyncConfirmed);
        match select(wait, delay.delay_ms(timeout_ms)).await {
            Either::First(Ok(_)) => DeliveryResult::Confirmed,
            Either::First(Err(_)) => DeliveryResult::TransportError,
            Either::Second(()) => DeliveryResult::TimedOut,
        }
    }

    /// Wait for `Sync` from the peer and answer `Sync Confirmed`
    pub async fn answer_sync<D: DelayNs>(&mut self, timeout_ms: u32, delay: &mut D) -> DeliveryResult {
        self.parser.reset();

        let wait = self.wait_for(|t| t == Token::Sync);
        match select(wait, delay.delay_ms(timeout_ms)).await {
            Either::First(Ok(_)) => {}
            Either::First(Err(_)) => return DeliveryResult::TransportError,
            Either::Second(()) => return DeliveryResult::TimedOut,
        }

        match self.write_line(Token::SyncConfirmed.as_str()).await {
            Ok(()) => DeliveryResult::Confirmed,
            Err(_) => DeliveryResult::TransportError,
        }
    }

    /// Drop whatever is already readable, e.g. a reply that missed its deadline
    async fn discard_stale(&mut self) -> Result<(), StreamFault> {
        self.parser.reset();
        let mut buf = [0u8; 32];
        while self.transport.read_ready().map_err(|_| StreamFault::Io)? {
            let n = self
                .transport
                .read(&mut buf)
                .await
                .map_err(|_| StreamFault::Io)?;
            if n == 0 {
                return Err(StreamFault::Closed);
            }
            debug!("Delivery: discarded {} stale bytes", n);
        }
        Ok(())
    }

    async fn write_line(&mut self, text: &str) -> Result<(), T::Error> {
        self.transport.write_all(text.as_bytes()).await?;
        self.transport.write_all(b"\n").await?;
        self.transport.flush().await
    }

    /// Read until a token accepted by `accept` arrives
    async fn wait_for(&mut self, accept: impl Fn(Token) -> bool) -> Result<Token, StreamFault> {
        let mut buf = [0u8; 32];
        loop {
            let n = self
                .transport
                .read(&mut buf)
                .await
                .map_err(|_| StreamFault::Io)?;
            if n == 0 {
                return Err(StreamFault::Closed);
            }

            for &byte in &buf[..n] {
                match self.parser.feed(byte) {
                    Ok(Some(line)) => match Token::parse(line.as_bytes()) {
                        Some(token) if accept(token) => return Ok(token),
                        _ => debug!("Delivery: ignored line '{}'", line.as_str()),
                    },
                    Ok(None) => {}
                    Err(e) => warn!("Delivery: dropped input: {:?}", e),
                }
            }

            // Peers may reply without a terminator
            if let Some(token) = Token::parse(self.parser.pending()) {
                if accept(token) {
                    self.parser.reset();
                    return Ok(token);
                }
            }
        }
    }
}
