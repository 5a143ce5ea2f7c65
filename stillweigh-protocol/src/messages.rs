//! Outbound peer messages

use core::fmt::Write;

use heapless::String;

/// Maximum formatted message length
pub const MAX_MESSAGE_LEN: usize = 64;

/// A formatted outbound message
pub type Message = String<MAX_MESSAGE_LEN>;

/// Errors building a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// Formatted text did not fit
    TooLong,
    /// Weight was NaN or infinite
    NotFinite,
}

/// Format a weight report, e.g. `Average weight: 12.34 grams`
pub fn weight_report(weight: f64) -> Result<Message, MessageError> {
    if !weight.is_finite() {
        return Err(MessageError::NotFinite);
    }
    let mut msg = Message::new();
    write!(msg, "Average weight: {:.2} grams", weight).map_err(|_| MessageError::TooLong)?;
    Ok(msg)
}

/// Build a message from arbitrary text
pub fn text(payload: &str) -> Result<Message, MessageError> {
    Message::try_from(payload).map_err(|_| MessageError::TooLong)
}
