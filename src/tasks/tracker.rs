use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{recv_body, recv_header, unexpected_length, AsyncConn, Task};
use crate::errors::{FdfsError, Result};
use crate::protocol::{encode_header, put_padded};
use crate::stream::{read_cstr, send};
use crate::types::*;

/// Asks a tracker which storage node should serve an operation
pub struct TrackerTask {
    cmd: TrackerCommand,
    group_name: String,
    remote_filename: String,
    locator: Option<StorageLocator>,
}

impl TrackerTask {
    /// Query for any storage node able to accept a new upload
    pub fn query_store() -> Self {
        Self::new(TrackerCommand::ServiceQueryStoreWithoutGroupOne, "", "")
    }

    /// Query for a storage node inside `group_name` able to accept an upload
    pub fn query_store_in_group(group_name: &str) -> Self {
        Self::new(TrackerCommand::ServiceQueryStoreWithGroupOne, group_name, "")
    }

    /// Query for the storage node that owns an existing file
    pub fn query_fetch(group_name: &str, remote_filename: &str) -> Self {
        Self::new(TrackerCommand::ServiceQueryFetchOne, group_name, remote_filename)
    }

    fn new(cmd: TrackerCommand, group_name: &str, remote_filename: &str) -> Self {
        Self {
            cmd,
            group_name: group_name.to_string(),
            remote_filename: remote_filename.to_string(),
            locator: None,
        }
    }

    /// Command code this task sends
    pub fn command(&self) -> TrackerCommand {
        self.cmd
    }

    /// Storage node reported by the tracker, once the response is in
    pub fn locator(&self) -> Option<&StorageLocator> {
        self.locator.as_ref()
    }

    /// Consumes the task, yielding the resolved storage node
    pub fn into_locator(self) -> Result<StorageLocator> {
        self.locator.ok_or_else(|| {
            FdfsError::InvalidResponse("tracker query finished without a result".to_string())
        })
    }

    fn encode_request(&self) -> Bytes {
        let body_len = match self.cmd {
            TrackerCommand::ServiceQueryStoreWithoutGroupOne => 0,
            TrackerCommand::ServiceQueryStoreWithGroupOne => FDFS_GROUP_NAME_MAX_LEN,
            TrackerCommand::ServiceQueryFetchOne => {
                FDFS_GROUP_NAME_MAX_LEN + self.remote_filename.len()
            }
        };

        let mut buf = BytesMut::with_capacity(FDFS_PROTO_HEADER_LEN + body_len);
        buf.put(encode_header(body_len as u64, self.cmd.into(), 0));
        if body_len > 0 {
            put_padded(&mut buf, &self.group_name, FDFS_GROUP_NAME_MAX_LEN);
            buf.put_slice(self.remote_filename.as_bytes());
        }
        buf.freeze()
    }

    fn expected_body_len(&self) -> usize {
        if self.cmd.is_store() {
            TRACKER_QUERY_STORAGE_STORE_BODY_LEN
        } else {
            TRACKER_QUERY_STORAGE_FETCH_BODY_LEN
        }
    }
}

impl Task for TrackerTask {
    async fn send_request<C>(&mut self, conn: &mut C) -> Result<()>
    where
        C: AsyncConn + ?Sized,
    {
        send(conn, &self.encode_request()).await
    }

    async fn recv_response<C>(&mut self, conn: &mut C) -> Result<()>
    where
        C: AsyncConn + ?Sized,
    {
        let header = recv_header(conn).await?;
        let expected = self.expected_body_len();
        if header.length != expected as u64 {
            return Err(unexpected_length("tracker query", header.length));
        }

        let mut body = recv_body(conn, expected).await?;
        let group_name = read_cstr(&mut body, FDFS_GROUP_NAME_MAX_LEN)?;
        let ip_addr = read_cstr(&mut body, TRACKER_IP_FIELD_LEN)?;
        let port = u16::try_from(body.get_u64()).map_err(|_| {
            FdfsError::InvalidResponse(format!("tracker reported invalid port for {}", ip_addr))
        })?;
        let store_path_index = if self.cmd.is_store() { body.get_u8() } else { 0 };

        self.locator = Some(StorageLocator {
            group_name,
            ip_addr,
            port,
            store_path_index,
        });
        Ok(())
    }
}
