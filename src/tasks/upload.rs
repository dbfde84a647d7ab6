use bytes::{BufMut, Bytes, BytesMut};

use super::{recv_body, recv_header, unexpected_length, AsyncConn, Task};
use crate::errors::{FdfsError, Result};
use crate::file_source::FileSource;
use crate::protocol::{encode_header, join_file_id, put_padded};
use crate::stream::{read_cstr, send};
use crate::types::*;

/// Fixed part of an upload body: path index, file size, extension
const UPLOAD_PREFIX_LEN: usize = 1 + 8 + FDFS_FILE_EXT_NAME_MAX_LEN;

/// Sends a file to a storage node and records the file ID it was given
pub struct UploadTask {
    source: FileSource,
    store_path_index: u8,
    file_id: Option<String>,
}

impl UploadTask {
    /// Creates an upload of `source` into the given store path
    pub fn new(source: FileSource, store_path_index: u8) -> Self {
        Self {
            source,
            store_path_index,
            file_id: None,
        }
    }

    /// File ID assigned by the storage node, once the response is in
    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    /// Consumes the task, yielding the assigned file ID
    pub fn into_file_id(self) -> Result<String> {
        self.file_id.ok_or_else(|| {
            FdfsError::InvalidResponse("upload finished without a file ID".to_string())
        })
    }

    fn encode_prefix(&self) -> Bytes {
        let body_len = UPLOAD_PREFIX_LEN as u64 + self.source.size();

        let mut buf = BytesMut::with_capacity(FDFS_PROTO_HEADER_LEN + UPLOAD_PREFIX_LEN);
        buf.put(encode_header(body_len, StorageCommand::UploadFile.into(), 0));
        buf.put_u8(self.store_path_index);
        buf.put_u64(self.source.size());
        put_padded(&mut buf, self.source.ext_name(), FDFS_FILE_EXT_NAME_MAX_LEN);
        buf.freeze()
    }
}

impl Task for UploadTask {
    async fn send_request<C>(&mut self, conn: &mut C) -> Result<()>
    where
        C: AsyncConn + ?Sized,
    {
        send(conn, &self.encode_prefix()).await?;
        self.source.write_to(conn).await
    }

    async fn recv_response<C>(&mut self, conn: &mut C) -> Result<()>
    where
        C: AsyncConn + ?Sized,
    {
        let header = recv_header(conn).await?;
        let max_len = (FDFS_GROUP_NAME_MAX_LEN + FDFS_REMOTE_NAME_MAX_SIZE) as u64;
        if header.length <= FDFS_GROUP_NAME_MAX_LEN as u64 || header.length > max_len {
            return Err(unexpected_length("upload", header.length));
        }

        let mut body = recv_body(conn, header.length as usize).await?;
        let group_name = read_cstr(&mut body, FDFS_GROUP_NAME_MAX_LEN)?;
        let rest = body.len();
        let remote_filename = read_cstr(&mut body, rest)?;
        if group_name.is_empty() || remote_filename.is_empty() {
            return Err(FdfsError::InvalidResponse(
                "upload response is missing the group or filename".to_string(),
            ));
        }

        self.file_id = Some(join_file_id(&group_name, &remote_filename));
        Ok(())
    }
}
