//! Upload payload descriptor
//!
//! A [`FileSource`] is either an open local file or an in-memory buffer.
//! It owns the file handle, so the handle is closed exactly once, when the
//! source is dropped, whichever way the upload ends.

use bytes::Bytes;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite};

use crate::errors::{FdfsError, Result};
use crate::protocol::get_file_ext_name;
use crate::stream::{send, STREAM_CHUNK_SIZE};
use crate::types::FDFS_FILE_EXT_NAME_MAX_LEN;

enum Source {
    File(File),
    Buffer(Bytes),
}

/// Bytes to upload plus the extension the storage node should record
pub struct FileSource {
    source: Source,
    size: u64,
    ext_name: String,
}

impl FileSource {
    /// Opens a local file for upload
    ///
    /// The extension is taken from the path and truncated to the protocol
    /// maximum.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(FdfsError::InvalidArgument(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(Self {
            source: Source::File(file),
            size: meta.len(),
            ext_name: get_file_ext_name(path),
        })
    }

    /// Wraps an in-memory buffer for upload
    ///
    /// Unlike [`from_path`](FileSource::from_path), an explicit extension
    /// longer than the protocol allows is rejected rather than truncated.
    pub fn from_bytes(data: impl Into<Bytes>, ext_name: &str) -> Result<Self> {
        if ext_name.len() > FDFS_FILE_EXT_NAME_MAX_LEN {
            return Err(FdfsError::InvalidArgument(format!(
                "File extension '{}' exceeds {} bytes",
                ext_name, FDFS_FILE_EXT_NAME_MAX_LEN
            )));
        }

        let data = data.into();
        Ok(Self {
            size: data.len() as u64,
            source: Source::Buffer(data),
            ext_name: ext_name.to_string(),
        })
    }

    /// Number of bytes that will be sent
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Extension recorded with the uploaded file, without the leading dot
    pub fn ext_name(&self) -> &str {
        &self.ext_name
    }

    /// Writes exactly [`size`](FileSource::size) bytes to `conn`
    ///
    /// File contents are streamed in [`STREAM_CHUNK_SIZE`] pieces rather
    /// than loaded into memory. Failing to read the local file is an
    /// [`FdfsError::Io`], including a file that shrank since it was opened;
    /// failing to write the socket stays a transport error.
    pub(crate) async fn write_to<W>(&mut self, conn: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let size = self.size;
        let file = match &mut self.source {
            Source::Buffer(data) => return send(conn, data).await,
            Source::File(file) => file,
        };

        let mut chunk = vec![0u8; size.min(STREAM_CHUNK_SIZE as u64) as usize];
        let mut sent = 0u64;
        while sent < size {
            let want = (size - sent).min(chunk.len() as u64) as usize;
            let n = match file.read(&mut chunk[..want]).await {
                Ok(0) => {
                    return Err(FdfsError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("file ended after {} of {} bytes", sent, size),
                    )))
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FdfsError::Io(e)),
            };
            send(conn, &chunk[..n]).await?;
            sent += n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, Write};

    #[tokio::test]
    async fn test_from_bytes() {
        let source = FileSource::from_bytes(&b"hello"[..], "txt").unwrap();
        assert_eq!(source.size(), 5);
        assert_eq!(source.ext_name(), "txt");
    }

    #[test]
    fn test_from_bytes_rejects_long_extension() {
        let err = FileSource::from_bytes(Bytes::from_static(b"x"), "toolong").err().unwrap();
        assert!(matches!(err, FdfsError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_from_path_streams_file() {
        let mut file = tempfile::Builder::new().suffix(".jpeg").tempfile().unwrap();
        file.write_all(b"jpeg bytes").unwrap();

        let mut source = FileSource::from_path(file.path()).await.unwrap();
        assert_eq!(source.size(), 10);
        assert_eq!(source.ext_name(), "jpeg");

        let mut sent = Vec::new();
        source.write_to(&mut sent).await.unwrap();
        assert_eq!(sent, b"jpeg bytes");
    }

    fn file_source(file: std::fs::File, size: u64) -> FileSource {
        FileSource {
            source: Source::File(File::from_std(file)),
            size,
            ext_name: String::new(),
        }
    }

    #[tokio::test]
    async fn test_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("write-only.bin");
        std::fs::write(&path, b"data").unwrap();
        let write_only = std::fs::OpenOptions::new().write(true).open(&path).unwrap();

        let mut source = file_source(write_only, 4);
        let mut sent = Vec::new();
        let err = source.write_to(&mut sent).await.unwrap_err();
        assert!(matches!(err, FdfsError::Io(_)));
        assert_eq!(err.kind(), crate::ErrorKind::Io);
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_shrunken_file_is_io_error() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"abcd").unwrap();
        file.rewind().unwrap();

        let mut source = file_source(file, 10);
        let mut sent = Vec::new();
        let err = source.write_to(&mut sent).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
        assert_eq!(sent, b"abcd");
    }

    #[tokio::test]
    async fn test_socket_failure_stays_transport_error() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"abcd").unwrap();
        file.rewind().unwrap();

        let mut conn = tokio_test::io::Builder::new()
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reset"))
            .build();
        let mut source = file_source(file, 4);
        let err = source.write_to(&mut conn).await.unwrap_err();
        assert!(matches!(err, FdfsError::Transport { operation: "write", .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_large_file_is_sent_in_chunks() {
        let content: Vec<u8> = (0..3 * STREAM_CHUNK_SIZE + 17).map(|i| i as u8).collect();
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&content).unwrap();
        file.rewind().unwrap();

        let mut source = file_source(file, content.len() as u64);
        let mut sent = Vec::new();
        source.write_to(&mut sent).await.unwrap();
        assert_eq!(sent, content);
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::from_path(dir.path().join("absent.txt"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::from_path(dir.path()).await.err().unwrap();
        assert!(matches!(err, FdfsError::InvalidArgument(_)));
    }
}
