//! FastDFS Rust Client Library
//!
//! Async client for the FastDFS distributed file system. Every operation
//! asks a tracker which storage node to use, then talks to that node over a
//! pooled connection.
//!
//! # Features
//!
//! - File upload from a local path or an in-memory buffer, into any group
//!   or a named one
//! - Whole-file and ranged download into a new buffer, a caller buffer, or a
//!   local file
//! - File deletion
//! - Per-server connection pooling with idle expiry
//! - Tracker failover in configuration order
//! - Async/await support with Tokio
//!
//! # Example
//!
//! ```no_run
//! use fdfs::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(vec!["192.168.1.100:22122".to_string()]);
//!     let client = Client::new(config)?;
//!
//!     let file_id = client.upload_buffer(b"Hello, FastDFS!", "txt").await?;
//!     let data = client.download_file(&file_id).await?;
//!     assert_eq!(&data[..], b"Hello, FastDFS!");
//!     client.delete_file(&file_id).await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod client;
mod connection;
mod errors;
mod file_source;
mod operations;
pub mod protocol;
pub mod stream;
pub mod tasks;
pub mod types;

// Re-export public API
pub use client::Client;
pub use connection::{validate_addr, Connection, ConnectionPool, PooledConnection, StoragePools};
pub use errors::{map_status_to_error, ErrorKind, FdfsError, Result};
pub use file_source::FileSource;
pub use tasks::{DownloadSink, Task};
pub use types::{ClientConfig, StorageCommand, StorageLocator, TrackerCommand};
