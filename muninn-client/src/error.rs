use thiserror::Error;

/// Errors surfaced by the client
#[derive(Error, Debug)]
pub enum Error {
    /// Socket not open, dropped mid-request, or reconnect exhausted.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server reported completion status 2; carries the application
    /// return code and the message from the reply body.
    #[error("server error {code}: {message}")]
    Server { code: u32, message: String },

    /// Text decoding failure or an out-of-range cast while decoding.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Wire-level violation: oversized frame, reply with an unknown
    /// request id, truncated body or malformed varint.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid arguments: unknown update op symbol, out-of-range integer
    /// field, bad configuration.
    #[error("usage error: {0}")]
    Usage(String),

    /// The configured in-flight backlog is exhausted.
    #[error("in-flight backlog exhausted")]
    Capacity,
}

impl Error {
    pub(crate) fn lost_connection() -> Error {
        Error::Connection("Lost connection".into())
    }

    pub(crate) fn not_connected() -> Error {
        Error::Connection("Not connected".into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Connection(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
