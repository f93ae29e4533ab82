/// Errors surfaced by frame codec, settings mirror, and command parsing.
///
/// Transport-agnostic: none of these variants assume a `TcpStream` is
/// involved, so the same type is used by in-memory round-trip tests and by
/// real sockets in `daq-net`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection mid-frame.
    #[error("peer closed mid-frame")]
    Eof,

    /// A length prefix, type tag, or shape was malformed or out of bounds.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Bind failure or an otherwise invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A command name outside the closed vocabulary, surfaced to the
    /// extension hook instead of being handled internally.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, Error>;
