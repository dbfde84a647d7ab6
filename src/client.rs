//! FastDFS Rust Client
//!
//! Main client struct for interacting with FastDFS distributed file system.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::connection::validate_addr;
use crate::errors::{FdfsError, Result};
use crate::file_source::FileSource;
use crate::operations::Operations;
use crate::tasks::DownloadSink;
use crate::types::ClientConfig;

/// FastDFS client for file operations
///
/// The client owns one connection pool per tracker and creates a pool per
/// storage node the first time a tracker routes a request to it. It never
/// retries: the first failure of an operation is its result.
///
/// # Example
///
/// ```no_run
/// use fdfs::{Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::new(vec!["192.168.1.100:22122".to_string()]);
///     let client = Client::new(config)?;
///
///     let file_id = client.upload_file("test.jpg").await?;
///     let head = client.download_to_buffer(&file_id, 0, 1024).await?;
///     client.delete_file(&file_id).await?;
///
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct Client {
    config: ClientConfig,
    ops: Operations,
    closed: RwLock<bool>,
}

impl Client {
    /// Creates a new FastDFS client with the given configuration
    ///
    /// No connection is opened here; trackers are dialed on first use.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::validate_config(&config)?;
        let ops = Operations::new(&config)?;

        Ok(Self {
            config,
            ops,
            closed: RwLock::new(false),
        })
    }

    /// Validates the client configuration
    fn validate_config(config: &ClientConfig) -> Result<()> {
        if config.tracker_addrs.is_empty() {
            return Err(FdfsError::InvalidConfig(
                "Tracker addresses are required".to_string(),
            ));
        }

        for addr in &config.tracker_addrs {
            validate_addr(addr)?;
        }

        if config.max_conns == 0 {
            return Err(FdfsError::InvalidConfig(
                "max_conns must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the configuration the client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Checks if the client is closed
    async fn check_closed(&self) -> Result<()> {
        let closed = self.closed.read().await;
        if *closed {
            return Err(FdfsError::ClientClosed);
        }
        Ok(())
    }

    /// Uploads a file from the local filesystem to FastDFS
    ///
    /// The file is streamed to the storage node; its extension is recorded
    /// with the upload.
    pub async fn upload_file(&self, local_filename: impl AsRef<Path>) -> Result<String> {
        self.check_closed().await?;
        let source = FileSource::from_path(local_filename).await?;
        self.ops.upload(source, None).await
    }

    /// Uploads a local file into a specific storage group
    pub async fn upload_file_to_group(
        &self,
        local_filename: impl AsRef<Path>,
        group_name: &str,
    ) -> Result<String> {
        self.check_closed().await?;
        let source = FileSource::from_path(local_filename).await?;
        self.ops.upload(source, Some(group_name)).await
    }

    /// Uploads data from a buffer to FastDFS
    pub async fn upload_buffer(&self, data: &[u8], file_ext_name: &str) -> Result<String> {
        self.check_closed().await?;
        let source = FileSource::from_bytes(Bytes::copy_from_slice(data), file_ext_name)?;
        self.ops.upload(source, None).await
    }

    /// Uploads data from a buffer into a specific storage group
    pub async fn upload_buffer_to_group(
        &self,
        data: &[u8],
        file_ext_name: &str,
        group_name: &str,
    ) -> Result<String> {
        self.check_closed().await?;
        let source = FileSource::from_bytes(Bytes::copy_from_slice(data), file_ext_name)?;
        self.ops.upload(source, Some(group_name)).await
    }

    /// Downloads a whole file from FastDFS and returns its content
    pub async fn download_file(&self, file_id: &str) -> Result<Bytes> {
        self.download_to_buffer(file_id, 0, 0).await
    }

    /// Downloads `length` bytes starting at `offset` into a new buffer
    ///
    /// A `length` of zero reads to the end of the file.
    pub async fn download_to_buffer(&self, file_id: &str, offset: u64, length: u64) -> Result<Bytes> {
        self.check_closed().await?;
        let task = self
            .ops
            .download(file_id, offset, length, DownloadSink::Allocate)
            .await?;
        Ok(task.into_bytes())
    }

    /// Downloads `length` bytes starting at `offset` into `buffer`
    ///
    /// Returns how many bytes were written to the front of `buffer`, which
    /// can be less than `length` near the end of the file. A buffer shorter
    /// than a non-zero `length` fails with [`FdfsError::BufferTooSmall`]
    /// before anything is sent; with `length == 0` the same error is
    /// returned if the server's reply does not fit.
    pub async fn download_into(
        &self,
        file_id: &str,
        buffer: &mut [u8],
        offset: u64,
        length: u64,
    ) -> Result<usize> {
        self.check_closed().await?;
        let task = self
            .ops
            .download(file_id, offset, length, DownloadSink::Buffer(buffer))
            .await?;
        Ok(task.received() as usize)
    }

    /// Downloads a byte range and saves it to the local filesystem
    ///
    /// The file is created (or truncated) only once the storage node has
    /// accepted the request. Returns the number of bytes written.
    pub async fn download_to_file(
        &self,
        file_id: &str,
        local_filename: impl Into<PathBuf>,
        offset: u64,
        length: u64,
    ) -> Result<u64> {
        self.check_closed().await?;
        let sink = DownloadSink::File(local_filename.into());
        let task = self.ops.download(file_id, offset, length, sink).await?;
        Ok(task.received())
    }

    /// Deletes a file from FastDFS
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.check_closed().await?;
        self.ops.delete(file_id).await
    }

    /// Number of storage node pools created so far
    pub async fn storage_pool_count(&self) -> usize {
        self.ops.storage_pool_count().await
    }

    /// Closes the client and releases all resources
    ///
    /// After calling close, all operations will return ClientClosed error.
    /// It's safe to call close multiple times.
    pub async fn close(&self) {
        let mut closed = self.closed.write().await;
        if *closed {
            return;
        }
        *closed = true;
        drop(closed);

        self.ops.close().await;
    }
}
