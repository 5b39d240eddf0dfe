use thiserror::Error;

/// Per-packet extraction failure; the packet is dropped and capture continues
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer shorter than the IPv4 header it claims to carry
    #[error("packet too short: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    /// Version nibble is not 4
    #[error("unsupported IP version {0}")]
    UnsupportedVersion(u8),
}

/// Compile-time error in a filter expression. Positions are byte offsets into the filter text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterSyntaxError {
    #[error("unknown field '{name}' at position {position}")]
    UnknownField { name: String, position: usize },

    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("empty expression at position {position}")]
    EmptyExpression { position: usize },

    #[error("invalid pattern '{pattern}' at position {position}: {reason}")]
    InvalidPattern {
        pattern: String,
        position: usize,
        reason: String,
    },
}

impl FilterSyntaxError {
    /// Byte offset where the error was detected
    pub fn position(&self) -> usize {
        match self {
            FilterSyntaxError::UnknownField { position, .. }
            | FilterSyntaxError::UnexpectedToken { position, .. }
            | FilterSyntaxError::UnterminatedString { position }
            | FilterSyntaxError::EmptyExpression { position }
            | FilterSyntaxError::InvalidPattern { position, .. } => *position,
        }
    }
}

/// Capture source failures. Both variants end the capture loop.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Source closed or asked to stop
    #[error("capture source closed")]
    Closed,

    /// Error from pcap library
    #[error("PCAP error: {0}")]
    Pcap(#[from] pcap::Error),

    /// Error from I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device framing we cannot strip down to IPv4
    #[error("unsupported link type {0}")]
    UnsupportedLinkType(i32),
}

impl CaptureError {
    /// Whether this is a clean shutdown rather than a failure
    pub fn is_closed(&self) -> bool {
        matches!(self, CaptureError::Closed)
    }
}
