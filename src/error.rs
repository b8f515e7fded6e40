use std::fmt;

/// Main error type for the peer extension
#[derive(Debug)]
pub enum PeerExtError {
    /// Configuration or CLI argument errors
    Config(String),

    /// The underlying document store could not be created or reached
    StoreUnavailable(String),

    /// Expiry index creation or index query errors
    Index(String),

    /// Read/write/delete errors inside an open store
    Store(String),

    /// A content-addressed key does not match its value
    InvalidKey(String),

    /// The store provider has been closed
    Closed,

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),

    /// System I/O errors
    Io(std::io::Error),
}

impl fmt::Display for PeerExtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerExtError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PeerExtError::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            PeerExtError::Index(msg) => write!(f, "Index error: {}", msg),
            PeerExtError::Store(msg) => write!(f, "Store error: {}", msg),
            PeerExtError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            PeerExtError::Closed => write!(f, "Store provider is closed"),
            PeerExtError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
            PeerExtError::Serialization(err) => write!(f, "Serialization error: {}", err),
            PeerExtError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for PeerExtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PeerExtError::Io(err) => Some(err),
            PeerExtError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, PeerExtError>;

impl PeerExtError {
    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            PeerExtError::Config(_) => "configuration_error",
            PeerExtError::StoreUnavailable(_) => "store_unavailable",
            PeerExtError::Index(_) => "index_error",
            PeerExtError::Store(_) => "store_error",
            PeerExtError::InvalidKey(_) => "invalid_key",
            PeerExtError::Closed => "closed",
            PeerExtError::Concurrency(_) => "concurrency_error",
            PeerExtError::Serialization(_) => "serialization_error",
            PeerExtError::Io(_) => "io_error",
        }
    }
}

impl From<std::io::Error> for PeerExtError {
    fn from(err: std::io::Error) -> Self {
        PeerExtError::Io(err)
    }
}

impl From<serde_json::Error> for PeerExtError {
    fn from(err: serde_json::Error) -> Self {
        PeerExtError::Serialization(err)
    }
}

impl<T> From<std::sync::PoisonError<T>> for PeerExtError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PeerExtError::Concurrency(format!("Lock poisoned: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::PeerExtError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PeerExtError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! store_error {
    ($msg:expr) => {
        $crate::error::PeerExtError::Store($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PeerExtError::Store(format!($fmt, $($arg)*))
    };
}
