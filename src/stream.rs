//! Exact-size read primitives
//!
//! Every response decoder is built from these three reads. They carry no
//! knowledge of command layouts; they only guarantee byte counts.

use bytes::Buf;
use std::io::ErrorKind as IoErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{FdfsError, Result};

/// Upper bound on a single read while streaming a payload to a sink
pub const STREAM_CHUNK_SIZE: usize = 4096;

/// Reads a fixed-width, null-terminated text field from an in-memory buffer
///
/// Exactly `size` bytes are consumed. The returned text stops at the first
/// zero byte inside the field, or spans the whole field if there is none.
/// Fails without consuming anything if fewer than `size` bytes remain.
pub fn read_cstr<B: Buf>(buf: &mut B, size: usize) -> Result<String> {
    if buf.remaining() < size {
        return Err(FdfsError::ShortRead {
            expected: size as u64,
            received: buf.remaining() as u64,
        });
    }

    let field = buf.copy_to_bytes(size);
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    Ok(String::from_utf8_lossy(&field[..end]).into_owned())
}

/// Fills `dest[..size]` with exactly `size` bytes read from `conn`
///
/// Partial reads are retried until the slice is full. End of stream before
/// that point is a [`FdfsError::ShortRead`].
pub async fn read_exact_into<R>(conn: &mut R, dest: &mut [u8], size: usize) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let available = dest.len();
    let dest = dest.get_mut(..size).ok_or(FdfsError::BufferTooSmall {
        required: size as u64,
        available,
    })?;

    let mut filled = 0;
    while filled < size {
        match conn.read(&mut dest[filled..]).await {
            Ok(0) => {
                return Err(FdfsError::ShortRead {
                    expected: size as u64,
                    received: filled as u64,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(FdfsError::transport("read", e)),
        }
    }
    Ok(())
}

/// Copies exactly `size` bytes from `conn` into `sink`
///
/// Reads at most [`STREAM_CHUNK_SIZE`] bytes at a time, so memory use does
/// not grow with `size`. On failure the sink keeps whatever prefix had
/// already been written.
pub async fn stream_to_writer<R, W>(conn: &mut R, sink: &mut W, size: u64) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut chunk = vec![0u8; (size.min(STREAM_CHUNK_SIZE as u64)) as usize];
    let mut received = 0u64;

    while received < size {
        let want = (size - received).min(chunk.len() as u64) as usize;
        let n = match conn.read(&mut chunk[..want]).await {
            Ok(0) => {
                return Err(FdfsError::ShortRead {
                    expected: size,
                    received,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(FdfsError::transport("read", e)),
        };
        sink.write_all(&chunk[..n]).await?;
        received += n as u64;
    }
    Ok(())
}

/// Writes the whole of `data` to the connection
pub async fn send<W>(conn: &mut W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    conn.write_all(data)
        .await
        .map_err(|e| FdfsError::transport("write", e))
}
