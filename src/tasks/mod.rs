//! Request/response units
//!
//! Every client operation is built from one or two [`Task`]s. A task
//! serializes its own request onto a borrowed connection, then parses the
//! reply into itself. It never owns the connection and lives for exactly
//! one exchange.

use bytes::Bytes;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::errors::{FdfsError, Result};
use crate::protocol::{check_response_header, decode_header};
use crate::stream::read_exact_into;
use crate::types::{Header, FDFS_PROTO_HEADER_LEN};

mod delete;
mod download;
mod tracker;
mod upload;

pub use delete::DeleteTask;
pub use download::{DownloadSink, DownloadTask};
pub use tracker::TrackerTask;
pub use upload::UploadTask;

/// Anything a task can talk over: a pooled TCP connection, or an in-memory
/// mock in tests
pub trait AsyncConn: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + ?Sized> AsyncConn for T {}

/// One request/response exchange against a tracker or storage node
pub trait Task {
    /// Writes the request header, body and any payload
    fn send_request<C>(&mut self, conn: &mut C) -> impl Future<Output = Result<()>> + Send
    where
        C: AsyncConn + ?Sized;

    /// Reads and decodes the response, storing the outcome in the task
    fn recv_response<C>(&mut self, conn: &mut C) -> impl Future<Output = Result<()>> + Send
    where
        C: AsyncConn + ?Sized;
}

/// Runs a full exchange: request first, then response
///
/// Any failure aborts the exchange; the connection is then in an unknown
/// state and must not be reused.
pub async fn exchange<T, C>(task: &mut T, conn: &mut C) -> Result<()>
where
    T: Task + Send,
    C: AsyncConn + ?Sized,
{
    task.send_request(conn).await?;
    task.recv_response(conn).await
}

/// Reads a response header and rejects non-success replies
pub(crate) async fn recv_header<C>(conn: &mut C) -> Result<Header>
where
    C: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; FDFS_PROTO_HEADER_LEN];
    read_exact_into(conn, &mut buf, FDFS_PROTO_HEADER_LEN).await?;
    let header = decode_header(&buf)?;
    check_response_header(&header)?;
    Ok(header)
}

/// Reads a response body whose length has already been validated
pub(crate) async fn recv_body<C>(conn: &mut C, len: usize) -> Result<Bytes>
where
    C: AsyncRead + Unpin + ?Sized,
{
    let mut body = vec![0u8; len];
    read_exact_into(conn, &mut body, len).await?;
    Ok(Bytes::from(body))
}

/// Error for a response whose body length does not fit the command
pub(crate) fn unexpected_length(what: &str, length: u64) -> FdfsError {
    FdfsError::InvalidResponse(format!("{} response has unexpected body length {}", what, length))
}
