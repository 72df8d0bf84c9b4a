//! Pool of independent connections to one Pixelflut endpoint.
//!
//! The pool is a plain ordered sequence of shared connections with
//! index-modulo acquisition. There is no affinity and no load feedback:
//! `acquire(i)` always maps to `pool[i % size]`, so when more areas than
//! connections are in flight, several areas share a socket and their
//! batches serialize on its mutex while distinct sockets still run in
//! parallel.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::connection::Connection;
use crate::error::Result;

/// A shared handle to one pooled connection.
pub type PooledConnection<S> = Arc<Mutex<Connection<S>>>;

/// An eagerly established, fixed-size set of connections.
pub struct ConnectionPool<S> {
    connections: Vec<PooledConnection<S>>,
}

impl ConnectionPool<TcpStream> {
    /// Open `size` independent TCP connections to the endpoint.
    ///
    /// Fail-fast: if any single connection cannot be established, the
    /// whole pool creation fails and already opened sockets are dropped.
    /// No partial pools.
    pub async fn connect(host: &str, port: u16, size: usize) -> Result<Self> {
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            connections.push(Arc::new(Mutex::new(Connection::connect(host, port).await?)));
        }
        tracing::debug!(host, port, size, "connection pool established");
        Ok(Self { connections })
    }
}

impl<S: AsyncRead + AsyncWrite> ConnectionPool<S> {
    /// Build a pool from already connected streams. Used by tests to pool
    /// in-memory duplex transports.
    pub fn from_connections(connections: Vec<Connection<S>>) -> Self {
        Self {
            connections: connections
                .into_iter()
                .map(|conn| Arc::new(Mutex::new(conn)))
                .collect(),
        }
    }

    /// Round-robin acquisition: returns `pool[index % size]`.
    ///
    /// The same connection may be handed to multiple concurrent callers;
    /// their operations serialize on the connection's lock.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty.
    pub fn acquire(&self, index: usize) -> PooledConnection<S> {
        self.connections[index % self.connections.len()].clone()
    }

    /// Number of pooled connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the pool holds no connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Best-effort close of every pooled connection.
    pub async fn close_all(&self) {
        for (index, conn) in self.connections.iter().enumerate() {
            if let Err(err) = conn.lock().await.close().await {
                tracing::warn!(index, error = %err, "closing pooled connection failed");
            }
        }
    }

    /// Sum of parse-failure counters across all pooled connections.
    pub async fn parse_failures(&self) -> u64 {
        let mut total = 0;
        for conn in &self.connections {
            total += conn.lock().await.parse_failures();
        }
        total
    }
}
