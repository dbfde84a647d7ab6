//! FastDFS Protocol Types and Constants
//!
//! Wire-layout constants, command codes, and the small value types passed
//! between the tracker and storage steps of an operation. Field widths live
//! here and nowhere else; the task encoders only refer to these names.

use std::time::Duration;

/// Default tracker port
pub const TRACKER_DEFAULT_PORT: u16 = 22122;
/// Default storage node port
pub const STORAGE_DEFAULT_PORT: u16 = 23000;

/// Protocol header size
pub const FDFS_PROTO_HEADER_LEN: usize = 10;

/// Command code carried by every tracker and storage response header
pub const FDFS_PROTO_CMD_RESP: u8 = 100;

/// Field size limits
pub const FDFS_GROUP_NAME_MAX_LEN: usize = 16;
pub const FDFS_FILE_EXT_NAME_MAX_LEN: usize = 6;
pub const IP_ADDRESS_SIZE: usize = 16;
pub const FDFS_REMOTE_NAME_MAX_SIZE: usize = 128;

/// Width of the IP field inside tracker query responses
pub const TRACKER_IP_FIELD_LEN: usize = IP_ADDRESS_SIZE - 1;

/// Body length of a tracker "fetch" response: group, ip, port
pub const TRACKER_QUERY_STORAGE_FETCH_BODY_LEN: usize =
    FDFS_GROUP_NAME_MAX_LEN + TRACKER_IP_FIELD_LEN + 8;

/// Body length of a tracker "store" response: fetch layout plus the path index
pub const TRACKER_QUERY_STORAGE_STORE_BODY_LEN: usize = TRACKER_QUERY_STORAGE_FETCH_BODY_LEN + 1;

/// Separator between the group name and the remote filename in a file ID
pub const FILE_ID_SEPARATOR: char = '/';

/// Tracker protocol commands used by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackerCommand {
    /// Pick any group and storage node for a new upload
    ServiceQueryStoreWithoutGroupOne = 101,
    /// Locate the storage node that serves an existing file
    ServiceQueryFetchOne = 102,
    /// Pick a storage node inside a named group for a new upload
    ServiceQueryStoreWithGroupOne = 104,
}

impl From<TrackerCommand> for u8 {
    fn from(cmd: TrackerCommand) -> u8 {
        cmd as u8
    }
}

impl TrackerCommand {
    /// Whether the command asks for an upload target rather than an owner
    pub fn is_store(self) -> bool {
        !matches!(self, TrackerCommand::ServiceQueryFetchOne)
    }
}

/// Storage protocol commands used by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageCommand {
    /// Store a new regular file
    UploadFile = 11,
    /// Remove a stored file
    DeleteFile = 12,
    /// Read a byte range of a stored file
    DownloadFile = 14,
}

impl From<StorageCommand> for u8 {
    fn from(cmd: StorageCommand) -> u8 {
        cmd as u8
    }
}

/// FastDFS protocol header (10 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Length of the message body (not including header)
    pub length: u64,
    /// Command code (request type or response type)
    pub cmd: u8,
    /// Status code (0 for success, error code otherwise)
    pub status: u8,
}

/// Storage node resolved by a tracker query
///
/// Produced by the locate step and consumed immediately to pick the
/// storage pool for the execute step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocator {
    /// Group the storage node belongs to
    pub group_name: String,
    /// IP address of the storage server
    pub ip_addr: String,
    /// Port number of the storage server
    pub port: u16,
    /// Index of the storage path to use (0-based)
    pub store_path_index: u8,
}

impl StorageLocator {
    /// Address the storage pool registry is keyed by
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip_addr, self.port)
    }
}

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// List of tracker server addresses in format "host:port"
    pub tracker_addrs: Vec<String>,
    /// Maximum number of connections checked out at once, per server
    pub max_conns: usize,
    /// Timeout for establishing connections in milliseconds
    pub connect_timeout: u64,
    /// Idle connections older than this (milliseconds) are not reused
    pub idle_timeout: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tracker_addrs: Vec::new(),
            max_conns: 10,
            connect_timeout: 5000,
            idle_timeout: 60000,
        }
    }
}

impl ClientConfig {
    /// Creates a new client configuration with tracker addresses
    pub fn new(tracker_addrs: Vec<String>) -> Self {
        Self {
            tracker_addrs,
            ..Default::default()
        }
    }

    /// Sets the maximum number of connections per server
    pub fn with_max_conns(mut self, max_conns: usize) -> Self {
        self.max_conns = max_conns;
        self
    }

    /// Sets the connection timeout in milliseconds
    pub fn with_connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout in milliseconds
    pub fn with_idle_timeout(mut self, timeout: u64) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    pub(crate) fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout)
    }
}
