//! FastDFS Connection Management
//!
//! One [`ConnectionPool`] per server address, a scoped [`PooledConnection`]
//! guard that hands the socket back on drop, and the [`StoragePools`]
//! registry that creates storage pools lazily as trackers name new nodes.

use std::collections::HashMap;
use std::io;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::time::timeout;

use crate::errors::{FdfsError, Result};

/// Represents a TCP connection to a FastDFS server (tracker or storage)
///
/// It wraps a TcpStream with the address it was dialed to and the time it
/// last moved data, which the pool uses to decide whether it is still worth
/// reusing.
pub struct Connection {
    stream: TcpStream,
    addr: String,
    last_used: Instant,
}

impl Connection {
    /// Creates a new connection with an established TCP stream
    pub fn new(stream: TcpStream, addr: String) -> Self {
        Self {
            stream,
            addr,
            last_used: Instant::now(),
        }
    }

    /// Returns the timestamp of the last send or receive operation
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Returns the server address this connection is connected to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether the socket is readable while no request is outstanding
    ///
    /// For an idle connection that means the peer closed it (or sent bytes
    /// nobody asked for); either way it cannot carry another exchange.
    fn has_pending_input(&self) -> bool {
        let mut scratch = [0u8; 1];
        match self.stream.try_read(&mut scratch) {
            Err(e) => e.kind() != io::ErrorKind::WouldBlock,
            Ok(_) => true,
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let poll = Pin::new(&mut self.stream).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            self.last_used = Instant::now();
        }
        poll
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.stream).poll_write(cx, buf);
        if let Poll::Ready(Ok(_)) = poll {
            self.last_used = Instant::now();
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

/// Checks that an address has the form "host:port" with a numeric port
pub fn validate_addr(addr: &str) -> Result<()> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(FdfsError::InvalidConfig(format!(
            "Invalid server address: {}",
            addr
        ))),
    }
}

/// Bounded set of reusable connections to a single server
///
/// At most `max_conns` connections are checked out at any moment; further
/// callers wait in [`get`](ConnectionPool::get) until one is returned.
/// Connections are dialed lazily and idle ones are reused LIFO.
pub struct ConnectionPool {
    addr: String,
    max_conns: usize,
    connect_timeout: Duration,
    idle_timeout: Duration,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Creates a pool bound to `addr` for its whole life
    ///
    /// The pool starts empty; nothing is dialed until the first `get`.
    pub fn new(
        addr: impl Into<String>,
        max_conns: usize,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self> {
        let addr = addr.into();
        validate_addr(&addr)?;
        if max_conns == 0 {
            return Err(FdfsError::InvalidConfig(
                "max_conns must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            addr,
            max_conns,
            connect_timeout,
            idle_timeout,
            permits: Arc::new(Semaphore::new(max_conns)),
            idle: Mutex::new(Vec::with_capacity(max_conns)),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the address this pool connects to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Returns the checkout cap
    pub fn max_conns(&self) -> usize {
        self.max_conns
    }

    /// Number of connections currently checked out
    pub fn in_use(&self) -> usize {
        self.max_conns - self.permits.available_permits()
    }

    /// Number of idle connections held for reuse
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether [`close`](ConnectionPool::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Checks out a connection, reusing an idle one or dialing a new one
    ///
    /// Waits while `max_conns` connections are already checked out. Fails
    /// with [`FdfsError::PoolClosed`] once the pool is closed, including for
    /// callers already waiting.
    pub async fn get(self: &Arc<Self>) -> Result<PooledConnection> {
        if self.is_closed() {
            return Err(FdfsError::PoolClosed(self.addr.clone()));
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FdfsError::PoolClosed(self.addr.clone()))?;

        let conn = match self.take_idle() {
            Some(conn) => {
                tracing::trace!("Reusing idle connection to {}", self.addr);
                conn
            }
            None => self.create_connection().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            reusable: false,
            _permit: permit,
        })
    }

    /// Pops the most recently returned connection that is still fresh and
    /// still open on the server side
    fn take_idle(&self) -> Option<Connection> {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(conn) = idle.pop() {
            if conn.last_used().elapsed() >= self.idle_timeout {
                tracing::trace!("Dropping stale connection to {}", self.addr);
            } else if conn.has_pending_input() {
                tracing::trace!("Dropping connection closed by {}", self.addr);
            } else {
                return Some(conn);
            }
        }
        None
    }

    /// Creates a new TCP connection to the server
    async fn create_connection(&self) -> Result<Connection> {
        tracing::debug!("Dialing {}", self.addr);
        let result = timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true).map_err(|e| FdfsError::Network {
                    operation: "configure",
                    addr: self.addr.clone(),
                    source: e,
                })?;
                Ok(Connection::new(stream, self.addr.clone()))
            }
            Ok(Err(e)) => Err(FdfsError::Network {
                operation: "connect",
                addr: self.addr.clone(),
                source: e,
            }),
            Err(_) => Err(FdfsError::ConnectionTimeout(self.addr.clone())),
        }
    }

    /// Takes a connection back from a guard
    ///
    /// The connection is only kept if the pool is still open and has room
    /// for it; otherwise it is dropped, which closes the socket.
    fn put(&self, conn: Connection) {
        if self.is_closed() {
            return;
        }

        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_conns {
            idle.push(conn);
        }
    }

    /// Closes every idle connection and refuses further checkouts
    ///
    /// Connections still checked out are closed when their guards drop.
    /// It's safe to call close multiple times.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.permits.close();

        let drained: Vec<Connection> = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            idle.drain(..).collect()
        };
        tracing::debug!(
            "Closed pool for {} ({} idle connections)",
            self.addr,
            drained.len()
        );
    }
}

/// A connection checked out of a [`ConnectionPool`]
///
/// Dropping the guard returns the connection to its pool if it was marked
/// [`reusable`](PooledConnection::mark_reusable), and closes it otherwise.
/// The checkout slot is released in both cases.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
    reusable: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Marks the connection as being at a clean request boundary
    pub fn mark_reusable(&mut self) {
        self.reusable = true;
    }

    /// Marks the connection as unfit for reuse
    pub fn mark_broken(&mut self) {
        self.reusable = false;
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.reusable {
                self.pool.put(conn);
            } else {
                tracing::trace!("Discarding connection to {}", conn.addr());
            }
        }
    }
}

/// Address-keyed registry of storage pools, grown on first use
///
/// Lookups of known addresses only take the read lock. A miss upgrades to
/// the write lock and re-checks before inserting, so concurrent first use
/// of one address still yields a single pool. Once closed, the registry
/// creates no more pools.
pub struct StoragePools {
    max_conns: usize,
    connect_timeout: Duration,
    idle_timeout: Duration,
    pools: RwLock<HashMap<String, Arc<ConnectionPool>>>,
    closed: AtomicBool,
}

impl StoragePools {
    /// Creates an empty registry whose pools share the given settings
    pub fn new(max_conns: usize, connect_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            max_conns,
            connect_timeout,
            idle_timeout,
            pools: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the pool for `addr`, creating and registering it if needed
    pub async fn get_or_create(&self, addr: &str) -> Result<Arc<ConnectionPool>> {
        if let Some(pool) = self.pools.read().await.get(addr) {
            return Ok(Arc::clone(pool));
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(addr) {
            return Ok(Arc::clone(pool));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(FdfsError::PoolClosed(addr.to_string()));
        }

        tracing::debug!("Creating storage pool for {}", addr);
        let pool = Arc::new(ConnectionPool::new(
            addr,
            self.max_conns,
            self.connect_timeout,
            self.idle_timeout,
        )?);
        pools.insert(addr.to_string(), Arc::clone(&pool));
        Ok(pool)
    }

    /// Number of registered pools
    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    /// Whether no storage pool has been created yet
    pub async fn is_empty(&self) -> bool {
        self.pools.read().await.is_empty()
    }

    /// Closes every registered pool and stops creating new ones
    ///
    /// Pools stay registered, so late callers get a closed pool for a known
    /// address and `PoolClosed` for a new one. It's safe to call close
    /// multiple times.
    pub async fn close(&self) {
        let pools = self.pools.write().await;
        self.closed.store(true, Ordering::Release);
        for pool in pools.values() {
            pool.close();
        }
    }
}
