//! Fixed tokens of the peer protocol

/// Terminal and handshake tokens exchanged with the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Token {
    /// Peer accepted the last message
    Confirm,
    /// Peer refused the last message
    Reject,
    /// Handshake request
    Sync,
    /// Handshake reply
    SyncConfirmed,
}

impl Token {
    /// Wire text of the token
    pub const fn as_str(self) -> &'static str {
        match self {
            Token::Confirm => "True",
            Token::Reject => "False",
            Token::Sync => "Sync",
            Token::SyncConfirmed => "Sync Confirmed",
        }
    }

    /// Match a received line against the known tokens
    ///
    /// Surrounding ASCII whitespace is ignored; matching is otherwise exact.
    pub fn parse(text: &[u8]) -> Option<Token> {
        match text.trim_ascii() {
            b"True" => Some(Token::Confirm),
            b"False" => Some(Token::Reject),
            b"Sync" => Some(Token::Sync),
            b"Sync Confirmed" => Some(Token::SyncConfirmed),
            _ => None,
        }
    }

    /// Whether this token ends a delivery exchange
    pub const fn is_acknowledgement(self) -> bool {
        matches!(self, Token::Confirm | Token::Reject)
    }
}
