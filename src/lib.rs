//! # pixeldump
//!
//! Concurrent, connection-pooled dump client for Pixelflut canvas servers.
//!
//! Pixelflut exposes a shared pixel canvas over a line-based TCP protocol
//! with no bulk read: every pixel is queried and answered individually.
//! This crate reconstructs the whole canvas anyway, fast, by
//!
//! - partitioning the canvas into a grid of disjoint areas,
//! - fetching areas concurrently over a pool of persistent connections,
//! - pipelining reads in batches so round trips amortize, and
//! - merging results into one shared, concurrency-safe raster.
//!
//! ## Architecture
//!
//! ```text
//! Area 0 ─ task ─┐                      ┌─► Connection 0 ─┐
//! Area 1 ─ task ─┼─ acquire(i % size) ──┼─► Connection 1 ─┼─► server
//! Area N ─ task ─┘                      └─► Connection K ─┘
//!        └──────────► CanvasBuffer ◄──── results
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pixeldump::Dumper;
//!
//! #[tokio::main]
//! async fn main() -> pixeldump::Result<()> {
//!     let dumper = Dumper::builder("localhost", 1234).connect().await?;
//!     let buffer = dumper.snapshot().await?;
//!     pixeldump::export::export_png(&buffer, "canvas.png".as_ref())?;
//!     dumper.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod canvas;
pub mod connection;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod partition;
pub mod pool;
pub mod protocol;
pub mod types;

pub use canvas::CanvasBuffer;
pub use connection::{Connection, DEFAULT_BATCH_SIZE};
pub use error::{PixelflutError, Result};
pub use orchestrator::{Dumper, DumperBuilder, FetchConfig, Recording, DEFAULT_POOL_SIZE};
pub use partition::{partition, DEFAULT_GRID_SPLIT};
pub use pool::ConnectionPool;
pub use types::{Area, Color, Pixel, Point};
