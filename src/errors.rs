//! FastDFS Error Definitions
//!
//! All fallible operations in this crate return [`FdfsError`]. Every variant
//! belongs to one [`ErrorKind`], which is what callers usually match on:
//! configuration problems surface from [`Client::new`](crate::Client::new),
//! connection problems from pool checkout and socket I/O, protocol problems
//! from malformed or non-success responses.

use thiserror::Error;

/// Result type alias for FastDFS operations
pub type Result<T> = std::result::Result<T, FdfsError>;

/// Coarse classification of an [`FdfsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid client or pool configuration
    Configuration,
    /// No tracker reachable, dial failure, closed pool or socket failure
    Connection,
    /// Short read, malformed field or non-success response status
    Protocol,
    /// Malformed file identifier
    Identifier,
    /// Local file open/read/write failure
    Io,
    /// Caller supplied an argument the operation cannot honour
    InvalidArgument,
}

/// Base error type for all FastDFS errors
#[derive(Error, Debug)]
pub enum FdfsError {
    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Client has been closed
    #[error("Client is closed")]
    ClientClosed,

    /// Connection pool has been torn down
    #[error("Connection pool for {0} is closed")]
    PoolClosed(String),

    /// Every configured tracker refused a connection
    #[error("No tracker server available: {0}")]
    NoTrackerAvailable(#[source] Box<FdfsError>),

    /// Connection timeout
    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    /// Network-related error
    #[error("Network error during {operation} to {addr}: {source}")]
    Network {
        /// Step that failed, such as "connect"
        operation: &'static str,
        /// Server address being dialed
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Socket read or write failed mid-exchange
    #[error("Transport error during {operation}: {source}")]
    Transport {
        /// "read" or "write"
        operation: &'static str,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Peer closed the connection before the expected number of bytes arrived
    #[error("Short read: expected {expected} bytes, got {received}")]
    ShortRead {
        /// Bytes the response announced
        expected: u64,
        /// Bytes that arrived before end of stream
        received: u64,
    },

    /// Server response is invalid
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Requested file does not exist
    #[error("File not found")]
    FileNotFound,

    /// File already exists
    #[error("File already exists")]
    FileAlreadyExists,

    /// Insufficient storage space
    #[error("Insufficient storage space")]
    InsufficientSpace,

    /// Protocol-level error
    #[error("Protocol error (code {code}): {message}")]
    Protocol {
        /// Status byte from the response header
        code: u8,
        /// Human-readable description of the status
        message: String,
    },

    /// File ID format is invalid
    #[error("Invalid file ID: {0}")]
    InvalidFileId(String),

    /// Invalid argument was provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Destination buffer cannot hold the requested download
    #[error("Buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes that had to fit
        required: u64,
        /// Capacity of the caller's buffer
        available: usize,
    },

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FdfsError {
    /// Returns the category this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            FdfsError::InvalidConfig(_) => ErrorKind::Configuration,
            FdfsError::ClientClosed
            | FdfsError::PoolClosed(_)
            | FdfsError::NoTrackerAvailable(_)
            | FdfsError::ConnectionTimeout(_)
            | FdfsError::Network { .. }
            | FdfsError::Transport { .. } => ErrorKind::Connection,
            FdfsError::ShortRead { .. }
            | FdfsError::InvalidResponse(_)
            | FdfsError::FileNotFound
            | FdfsError::FileAlreadyExists
            | FdfsError::InsufficientSpace
            | FdfsError::Protocol { .. } => ErrorKind::Protocol,
            FdfsError::InvalidFileId(_) => ErrorKind::Identifier,
            FdfsError::InvalidArgument(_) | FdfsError::BufferTooSmall { .. } => {
                ErrorKind::InvalidArgument
            }
            FdfsError::Io(_) => ErrorKind::Io,
        }
    }

    /// Wraps a socket error raised while reading or writing a request
    pub(crate) fn transport(operation: &'static str, source: std::io::Error) -> Self {
        FdfsError::Transport { operation, source }
    }
}

/// Maps FastDFS protocol status codes to Rust errors
///
/// Status code 0 indicates success (no error).
/// Other status codes are mapped to predefined errors or a Protocol error.
///
/// Common status codes:
///   - 0: Success
///   - 2: File not found (ENOENT)
///   - 6: File already exists (EEXIST)
///   - 22: Invalid argument (EINVAL)
///   - 28: Insufficient space (ENOSPC)
pub fn map_status_to_error(status: u8) -> Option<FdfsError> {
    match status {
        0 => None,
        2 => Some(FdfsError::FileNotFound),
        6 => Some(FdfsError::FileAlreadyExists),
        22 => Some(FdfsError::Protocol {
            code: status,
            message: "server rejected request arguments".to_string(),
        }),
        28 => Some(FdfsError::InsufficientSpace),
        _ => Some(FdfsError::Protocol {
            code: status,
            message: format!("Unknown error code: {}", status),
        }),
    }
}
