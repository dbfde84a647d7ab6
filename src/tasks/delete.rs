use bytes::{BufMut, Bytes, BytesMut};

use super::{recv_header, unexpected_length, AsyncConn, Task};
use crate::errors::Result;
use crate::protocol::{encode_header, put_padded};
use crate::stream::send;
use crate::types::*;

/// Removes a stored file
pub struct DeleteTask {
    group_name: String,
    remote_filename: String,
}

impl DeleteTask {
    /// Creates a deletion of `remote_filename` in `group_name`
    pub fn new(group_name: &str, remote_filename: &str) -> Self {
        Self {
            group_name: group_name.to_string(),
            remote_filename: remote_filename.to_string(),
        }
    }

    fn encode_request(&self) -> Bytes {
        let body_len = FDFS_GROUP_NAME_MAX_LEN + self.remote_filename.len();

        let mut buf = BytesMut::with_capacity(FDFS_PROTO_HEADER_LEN + body_len);
        buf.put(encode_header(body_len as u64, StorageCommand::DeleteFile.into(), 0));
        put_padded(&mut buf, &self.group_name, FDFS_GROUP_NAME_MAX_LEN);
        buf.put_slice(self.remote_filename.as_bytes());
        buf.freeze()
    }
}

impl Task for DeleteTask {
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
        if header.length != 0 {
            return Err(unexpected_length("delete", header.length));
        }
        Ok(())
    }
}
