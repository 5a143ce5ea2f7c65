//! Bridge line protocol
//!
//! A local host sends one request per line and receives one status line
//! per request:
//!
//! ```text
//! SEND <payload>   ──▶   200 OK | 409 REJECTED | 504 NO CONFIRMATION
//!                        502 COMMUNICATION ERROR | 503 SERVICE NOT FOUND
//! TARE             ──▶   200 OK | 500 TARE FAILED
//! anything else    ──▶   400 BAD REQUEST
//! ```

/// A parsed bridge request borrowing from the received line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand<'a> {
    /// Forward the payload to the peer
    Send(&'a str),
    /// Re-zero the load cell
    Tare,
}

/// Reasons a bridge line could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeParseError {
    /// Line was empty
    Empty,
    /// Unknown verb
    UnknownCommand,
    /// `SEND` without a payload
    MissingPayload,
}

impl<'a> BridgeCommand<'a> {
    /// Parse one request line (terminator already stripped)
    pub fn parse(line: &'a str) -> Result<Self, BridgeParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(BridgeParseError::Empty);
        }

        let (verb, rest) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb {
            "SEND" if rest.is_empty() => Err(BridgeParseError::MissingPayload),
            "SEND" => Ok(BridgeCommand::Send(rest)),
            "TARE" if rest.is_empty() => Ok(BridgeCommand::Tare),
            _ => Err(BridgeParseError::UnknownCommand),
        }
    }
}

/// Status returned to the bridge host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusCode {
    Ok,
    BadRequest,
    Rejected,
    TareFailed,
    CommunicationError,
    ServiceNotFound,
    NoConfirmation,
}

impl StatusCode {
    /// Numeric code
    pub const fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Rejected => 409,
            StatusCode::TareFailed => 500,
            StatusCode::CommunicationError => 502,
            StatusCode::ServiceNotFound => 503,
            StatusCode::NoConfirmation => 504,
        }
    }

    /// Full status line without terminator
    pub const fn as_str(self) -> &'static str {
        match self {
            StatusCode::Ok => "200 OK",
            StatusCode::BadRequest => "400 BAD REQUEST",
            StatusCode::Rejected => "409 REJECTED",
            StatusCode::TareFailed => "500 TARE FAILED",
            StatusCode::CommunicationError => "502 COMMUNICATION ERROR",
            StatusCode::ServiceNotFound => "503 SERVICE NOT FOUND",
            StatusCode::NoConfirmation => "504 NO CONFIRMATION",
        }
    }

    /// Whether the request succeeded
    pub const fn is_success(self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}
