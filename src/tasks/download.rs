use bytes::{BufMut, Bytes, BytesMut};
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::{recv_header, unexpected_length, AsyncConn, Task};
use crate::errors::{FdfsError, Result};
use crate::protocol::{encode_header, put_padded};
use crate::stream::{read_exact_into, send, stream_to_writer};
use crate::types::*;

/// Largest up-front allocation for a freshly allocated download buffer;
/// bigger payloads grow the buffer as bytes arrive
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Where downloaded bytes go
pub enum DownloadSink<'a> {
    /// Caller-provided buffer; the response must fit in it
    Buffer(&'a mut [u8]),
    /// A new buffer sized to the response
    Allocate,
    /// A local file, created or truncated, with missing parent directories
    /// created first
    File(PathBuf),
}

/// Fetches a byte range of a stored file into a [`DownloadSink`]
pub struct DownloadTask<'a> {
    group_name: String,
    remote_filename: String,
    offset: u64,
    download_bytes: u64,
    sink: DownloadSink<'a>,
    received: u64,
    data: Option<Bytes>,
}

impl<'a> DownloadTask<'a> {
    /// Creates a download of `download_bytes` bytes starting at `offset`
    ///
    /// A `download_bytes` of zero asks for everything from `offset` to the
    /// end of the file.
    pub fn new(
        group_name: &str,
        remote_filename: &str,
        offset: u64,
        download_bytes: u64,
        sink: DownloadSink<'a>,
    ) -> Self {
        Self {
            group_name: group_name.to_string(),
            remote_filename: remote_filename.to_string(),
            offset,
            download_bytes,
            sink,
            received: 0,
            data: None,
        }
    }

    /// Number of payload bytes delivered to the sink
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Consumes the task, yielding the buffer filled by an
    /// [`Allocate`](DownloadSink::Allocate) sink
    pub fn into_bytes(self) -> Bytes {
        self.data.unwrap_or_default()
    }

    fn encode_request(&self) -> Bytes {
        let body_len = 16 + FDFS_GROUP_NAME_MAX_LEN + self.remote_filename.len();

        let mut buf = BytesMut::with_capacity(FDFS_PROTO_HEADER_LEN + body_len);
        buf.put(encode_header(body_len as u64, StorageCommand::DownloadFile.into(), 0));
        buf.put_u64(self.offset);
        buf.put_u64(self.download_bytes);
        put_padded(&mut buf, &self.group_name, FDFS_GROUP_NAME_MAX_LEN);
        buf.put_slice(self.remote_filename.as_bytes());
        buf.freeze()
    }
}

impl Task for DownloadTask<'_> {
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
        let len = header.length;
        if self.download_bytes > 0 && len > self.download_bytes {
            return Err(unexpected_length("download", len));
        }

        match &mut self.sink {
            DownloadSink::Buffer(buf) => {
                let available = buf.len();
                let size = usize::try_from(len)
                    .ok()
                    .filter(|&n| n <= available)
                    .ok_or(FdfsError::BufferTooSmall {
                        required: len,
                        available,
                    })?;
                read_exact_into(conn, &mut buf[..], size).await?;
            }
            DownloadSink::Allocate => {
                let mut data = Vec::with_capacity(len.min(MAX_PREALLOC) as usize);
                stream_to_writer(conn, &mut data, len).await?;
                self.data = Some(Bytes::from(data));
            }
            DownloadSink::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).await?;
                }
                let mut writer = BufWriter::new(File::create(path.as_path()).await?);
                stream_to_writer(conn, &mut writer, len).await?;
                writer.flush().await?;
                writer.into_inner().sync_all().await?;
            }
        }

        self.received = len;
        Ok(())
    }
}
