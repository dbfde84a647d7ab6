//! FastDFS Operations
//!
//! Every operation runs the same two steps: a tracker query resolves a
//! storage node, then a storage task runs on a connection from that node's
//! pool. Borrowed connections go back to their pool (or are closed, if the
//! exchange failed) before the result is returned.

use std::sync::Arc;

use crate::connection::{ConnectionPool, PooledConnection, StoragePools};
use crate::errors::{FdfsError, Result};
use crate::file_source::FileSource;
use crate::protocol::split_file_id;
use crate::tasks::{
    exchange, DeleteTask, DownloadSink, DownloadTask, Task, TrackerTask, UploadTask,
};
use crate::types::{ClientConfig, StorageLocator, FDFS_GROUP_NAME_MAX_LEN};

/// Handles all FastDFS file operations
///
/// This struct is used internally by the Client.
pub struct Operations {
    tracker_pools: Vec<Arc<ConnectionPool>>,
    storage_pools: StoragePools,
}

impl Operations {
    /// Creates one pool per tracker, in configuration order
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let tracker_pools = config
            .tracker_addrs
            .iter()
            .map(|addr| {
                ConnectionPool::new(
                    addr.as_str(),
                    config.max_conns,
                    config.connect_timeout(),
                    config.idle_timeout(),
                )
                .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tracker_pools,
            storage_pools: StoragePools::new(
                config.max_conns,
                config.connect_timeout(),
                config.idle_timeout(),
            ),
        })
    }

    /// Uploads `source`, optionally into a specific group
    pub async fn upload(&self, source: FileSource, group_name: Option<&str>) -> Result<String> {
        let query = match group_name {
            Some(group_name) => {
                validate_group_name(group_name)?;
                TrackerTask::query_store_in_group(group_name)
            }
            None => TrackerTask::query_store(),
        };
        let locator = self.query_storage(query).await?;

        let mut task = UploadTask::new(source, locator.store_path_index);
        self.run_storage(&locator, &mut task).await?;
        task.into_file_id()
    }

    /// Downloads a byte range of `file_id` into `sink`
    ///
    /// A caller buffer shorter than a non-zero `length` is rejected before
    /// any network access.
    pub async fn download<'a>(
        &self,
        file_id: &str,
        offset: u64,
        length: u64,
        sink: DownloadSink<'a>,
    ) -> Result<DownloadTask<'a>> {
        let (group_name, remote_filename) = split_file_id(file_id)?;
        if let DownloadSink::Buffer(buf) = &sink {
            if length > buf.len() as u64 {
                return Err(FdfsError::BufferTooSmall {
                    required: length,
                    available: buf.len(),
                });
            }
        }

        let locator = self
            .query_storage(TrackerTask::query_fetch(&group_name, &remote_filename))
            .await?;

        let mut task = DownloadTask::new(&group_name, &remote_filename, offset, length, sink);
        self.run_storage(&locator, &mut task).await?;
        Ok(task)
    }

    /// Deletes `file_id` from the storage node that owns it
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let (group_name, remote_filename) = split_file_id(file_id)?;
        let locator = self
            .query_storage(TrackerTask::query_fetch(&group_name, &remote_filename))
            .await?;

        let mut task = DeleteTask::new(&group_name, &remote_filename);
        self.run_storage(&locator, &mut task).await
    }

    /// Runs a tracker query and returns the storage node it named
    async fn query_storage(&self, mut task: TrackerTask) -> Result<StorageLocator> {
        let conn = self.tracker_conn().await?;
        let tracker_addr = conn.addr().to_string();
        run_on(conn, &mut task).await?;

        let locator = task.into_locator()?;
        tracing::debug!(
            "Tracker {} resolved {:?} to {} (path index {})",
            tracker_addr,
            locator.group_name,
            locator.addr(),
            locator.store_path_index
        );
        Ok(locator)
    }

    /// Checks out a connection from the first tracker that yields one
    async fn tracker_conn(&self) -> Result<PooledConnection> {
        let mut last_err = None;
        for pool in &self.tracker_pools {
            match pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    tracing::debug!("Tracker {} unavailable: {}", pool.addr(), e);
                    last_err = Some(e);
                }
            }
        }

        Err(FdfsError::NoTrackerAvailable(Box::new(last_err.unwrap_or_else(
            || FdfsError::InvalidConfig("no tracker configured".to_string()),
        ))))
    }

    /// Runs `task` on a connection from the locator's storage pool
    async fn run_storage<T>(&self, locator: &StorageLocator, task: &mut T) -> Result<()>
    where
        T: Task + Send,
    {
        let pool = self.storage_pools.get_or_create(&locator.addr()).await?;
        let conn = pool.get().await?;
        run_on(conn, task).await
    }

    /// Number of storage pools created so far
    pub async fn storage_pool_count(&self) -> usize {
        self.storage_pools.len().await
    }

    /// Tears down every tracker and storage pool
    pub async fn close(&self) {
        for pool in &self.tracker_pools {
            pool.close();
        }
        self.storage_pools.close().await;
    }
}

/// Runs one exchange and releases the connection
///
/// The connection only goes back to its pool when both halves of the
/// exchange succeeded; otherwise it is closed.
async fn run_on<T>(mut conn: PooledConnection, task: &mut T) -> Result<()>
where
    T: Task + Send,
{
    exchange(task, &mut *conn).await?;
    conn.mark_reusable();
    Ok(())
}

fn validate_group_name(group_name: &str) -> Result<()> {
    if group_name.is_empty() || group_name.len() > FDFS_GROUP_NAME_MAX_LEN {
        return Err(FdfsError::InvalidArgument(format!(
            "Invalid group name: {:?}",
            group_name
        )));
    }
    Ok(())
}
