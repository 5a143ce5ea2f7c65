//! Acknowledged message delivery to the peer
//!
//! - [`DeliveryChannel`]: one message out, one `True` / `False` back,
//!   bounded by a timeout
//! - [`connect`]: outbound discovery/connect and inbound accept

pub mod channel;
pub mod connect;

pub use channel::{DeliveryChannel, DeliveryResult};
pub use connect::{accept_inbound, connect_outbound, establish, ConnectError};
