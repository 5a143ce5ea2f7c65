//! Peer link abstraction (Bluetooth serial port profile or similar)

use core::fmt;
use core::future::Future;

use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};

/// 128-bit service identifier
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceUuid(pub [u8; 16]);

impl ServiceUuid {
    /// Service the companion app advertises and looks up
    pub const WEIGHT_REPORT: ServiceUuid = ServiceUuid([
        0x94, 0xf3, 0x9d, 0x29, 0x7d, 0x6d, 0x43, 0x7d, 0x97, 0x3b, 0xfb, 0xa3, 0x9e, 0x49, 0xd4,
        0xee,
    ]);

    /// Parse the canonical `8-4-4-4-12` hex form (case-insensitive)
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.as_bytes();
        if text.len() != 36 {
            return None;
        }
        let mut bytes = [0u8; 16];
        let mut nibbles = 0usize;
        for (i, &c) in text.iter().enumerate() {
            if matches!(i, 8 | 13 | 18 | 23) {
                if c != b'-' {
                    return None;
                }
                continue;
            }
            let v = hex_value(c)?;
            bytes[nibbles / 2] |= if nibbles % 2 == 0 { v << 4 } else { v };
            nibbles += 1;
        }
        Some(ServiceUuid(bytes))
    }
}

impl fmt::Debug for ServiceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Bluetooth device address, most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// Parse `AA:BB:CC:DD:EE:FF`
    pub fn parse(text: &str) -> Option<Self> {
        let mut addr = [0u8; 6];
        let mut parts = text.split(':');
        for byte in addr.iter_mut() {
            let part = parts.next()?.as_bytes();
            if part.len() != 2 {
                return None;
            }
            *byte = (hex_value(part[0])? << 4) | hex_value(part[1])?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(BdAddr(addr))
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// A resolved peer: address plus serial channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerEndpoint {
    pub address: BdAddr,
    pub channel: u8,
}

/// Link-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Radio/module did not answer
    NoResponse,
    /// Connection attempt refused or failed
    ConnectFailed,
    /// Underlying serial I/O failed
    Io,
    /// Link is already handed out as a transport
    Busy,
}

/// Connection-oriented byte-stream link to a single peer
///
/// A transport handed out by `connect`/`accept` stays valid until it is
/// passed back to `release`. It reports a lost peer as a read or write
/// error rather than as silence.
pub trait PeerLink {
    type Transport: Read + Write + ReadReady;

    /// Look up a peer offering `service`
    fn find_service(
        &mut self,
        service: &ServiceUuid,
    ) -> impl Future<Output = Result<Option<PeerEndpoint>, LinkError>>;

    /// Open an outbound connection
    fn connect(
        &mut self,
        endpoint: &PeerEndpoint,
    ) -> impl Future<Output = Result<Self::Transport, LinkError>>;

    /// Advertise `service` and wait for a peer to connect
    fn accept(
        &mut self,
        service: &ServiceUuid,
    ) -> impl Future<Output = Result<Self::Transport, LinkError>>;

    /// Close the connection and take the transport back
    fn release(&mut self, transport: Self::Transport) -> impl Future<Output = ()>;
}
