//! Stillweigh text protocol
//!
//! Two newline-delimited ASCII protocols share this crate:
//!
//! - the **peer protocol** spoken over the Bluetooth serial link: weight
//!   reports out, `True` / `False` acknowledgements back, plus the
//!   `Sync` / `Sync Confirmed` handshake;
//! - the **bridge protocol** spoken over a local UART by a host that wants
//!   to push its own payloads through the peer link.
//!
//! ```text
//! device ──"Average weight: 12.34 grams\n"──▶ peer
//! device ◀─────────────"True"────────────── peer
//! ```
//!
//! Peers are not required to terminate their replies with a newline, so
//! [`LineParser::pending`] exposes the unterminated tail for token matching.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod line;
pub mod messages;
pub mod tokens;

pub use bridge::{BridgeCommand, BridgeParseError, StatusCode};
pub use line::{LineError, LineParser, MAX_LINE_LEN};
pub use messages::{text, weight_report, Message, MessageError, MAX_MESSAGE_LEN};
pub use tokens::Token;
