use std::fmt;

/// Result type alias for phloem core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for phloem core operations
#[derive(Debug)]
pub enum Error {
    /// I/O errors from a backend's transport
    Io(std::io::Error),

    /// Missing or malformed configuration; fatal before any worker starts
    Config(String),

    /// Unrecoverable backend connection failure; fatal to the affected worker only
    Connection(String),

    /// A single operation failed outside of status reporting
    Operation(String),

    /// A finite generator has handed out every value it owns
    Exhausted { items: u64 },

    /// Other errors
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error should end the worker that observed it
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::Connection(msg) => write!(f, "Connection error: {msg}"),
            Error::Operation(msg) => write!(f, "Operation error: {msg}"),
            Error::Exhausted { items } => write!(f, "Generator exhausted after {items} items"),
            Error::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
