//! One persistent Pixelflut session over a duplex byte stream.
//!
//! The protocol has strict FIFO correlation: responses arrive in the order
//! requests were sent, exactly one line per read request and no line for a
//! write. Bulk reads exploit this by pipelining: a whole batch of `PX x y`
//! requests is written back-to-back and flushed once, then exactly
//! batch-length response lines are read in order. This amortizes the
//! round-trip latency over the batch instead of paying it per pixel.
//!
//! The connection is generic over its transport, so production code runs it
//! on a [`TcpStream`] while tests drive it over [`tokio::io::duplex`]
//! pairs.

use bytes::BytesMut;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf,
    WriteHalf,
};
use tokio::net::TcpStream;

use crate::error::{PixelflutError, Result};
use crate::protocol;
use crate::types::{Area, Color, Pixel, Point};

/// Default number of read requests pipelined per flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A persistent line-oriented Pixelflut session.
pub struct Connection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    /// Reused response line buffer.
    line: String,
    /// Responses that failed to decode and were masked by a fallback value.
    parse_failures: u64,
    closed: bool,
}

impl Connection<TcpStream> {
    /// Open a TCP connection to a Pixelflut server.
    ///
    /// Nagle's algorithm is disabled: batches are already flushed as whole
    /// buffers, and delaying the final partial segment only adds latency.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let address = format!("{host}:{port}");
        let stream =
            TcpStream::connect(&address)
                .await
                .map_err(|source| PixelflutError::Connect {
                    address: address.clone(),
                    source,
                })?;
        stream
            .set_nodelay(true)
            .map_err(|source| PixelflutError::Connect { address, source })?;

        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    /// Wrap an already connected duplex stream.
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            line: String::new(),
            parse_failures: 0,
            closed: false,
        }
    }

    /// Query the canvas dimensions as `(width, height)`.
    ///
    /// A malformed response is masked as `(0, 0)` rather than failing the
    /// call; the defect stays visible through [`parse_failures`] and a
    /// warning log instead of changing the call's outcome.
    ///
    /// [`parse_failures`]: Connection::parse_failures
    pub async fn query_size(&mut self) -> Result<(u32, u32)> {
        self.ensure_open()?;

        self.send_line(protocol::encode_size_request()).await?;
        self.writer.flush().await?;
        self.read_line().await?;

        match protocol::decode_size_response(&self.line) {
            Ok(size) => Ok(size),
            Err(err) => {
                self.record_parse_failure(&err);
                Ok((0, 0))
            }
        }
    }

    /// Query the color of a single pixel.
    ///
    /// A malformed response is masked as the **requested** point with black
    /// color, so the caller still gets an entry for the position it asked
    /// about.
    pub async fn query_pixel(&mut self, point: Point) -> Result<Pixel> {
        self.ensure_open()?;

        self.send_line(&protocol::encode_read_request(point)).await?;
        self.writer.flush().await?;
        self.read_line().await?;

        match protocol::decode_read_response(&self.line) {
            Ok(pixel) => Ok(pixel),
            Err(err) => {
                self.record_parse_failure(&err);
                Ok(Pixel::new(point, Color::BLACK))
            }
        }
    }

    /// Read every pixel in the inclusive rectangle `start..=end`.
    ///
    /// Points are enumerated x-outer/y-inner and split into batches of at
    /// most `batch_size`. Each batch is written back-to-back, flushed once,
    /// and answered by exactly batch-length lines read in request order.
    /// One undecodable line yields one fallback pixel (requested point,
    /// black) and the rest of the batch is processed normally.
    pub async fn query_area(
        &mut self,
        start: Point,
        end: Point,
        batch_size: usize,
    ) -> Result<Vec<Pixel>> {
        self.ensure_open()?;

        let area = Area::new(start, end);
        let points: Vec<Point> = area.points().collect();
        let mut pixels = Vec::with_capacity(points.len());
        let mut batch_buf = BytesMut::new();

        for batch in points.chunks(batch_size.max(1)) {
            batch_buf.clear();
            for &point in batch {
                protocol::write_read_request(&mut batch_buf, point);
            }
            self.writer.write_all(&batch_buf).await?;
            self.writer.flush().await?;

            for &point in batch {
                self.read_line().await?;
                match protocol::decode_read_response(&self.line) {
                    Ok(pixel) => pixels.push(pixel),
                    Err(err) => {
                        self.record_parse_failure(&err);
                        pixels.push(Pixel::new(point, Color::BLACK));
                    }
                }
            }
        }

        Ok(pixels)
    }

    /// Write a single pixel. Fire-and-forget, no response line.
    pub async fn draw_pixel(&mut self, pixel: Pixel) -> Result<()> {
        self.ensure_open()?;

        self.send_line(&protocol::encode_write_request(pixel)).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Write a set of pixels with the same batching as [`query_area`],
    /// minus the response reads.
    ///
    /// [`query_area`]: Connection::query_area
    pub async fn draw_pixels(&mut self, pixels: &[Pixel], batch_size: usize) -> Result<()> {
        self.ensure_open()?;

        let mut batch_buf = BytesMut::new();
        for batch in pixels.chunks(batch_size.max(1)) {
            batch_buf.clear();
            for &pixel in batch {
                protocol::write_write_request(&mut batch_buf, pixel);
            }
            self.writer.write_all(&batch_buf).await?;
            self.writer.flush().await?;
        }

        Ok(())
    }

    /// Shut the session down. Idempotent; later operations fail with
    /// [`PixelflutError::ConnectionClosed`].
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Number of response lines that failed to decode and were replaced by
    /// a fallback value.
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PixelflutError::ConnectionClosed);
        }
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    /// Read one response line into the reuse buffer, stripped of the line
    /// terminator. EOF means the server hung up.
    async fn read_line(&mut self) -> Result<()> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            self.closed = true;
            return Err(PixelflutError::ConnectionClosed);
        }
        while self.line.ends_with('\n') || self.line.ends_with('\r') {
            self.line.pop();
        }
        Ok(())
    }

    fn record_parse_failure(&mut self, err: &PixelflutError) {
        self.parse_failures += 1;
        tracing::warn!(error = %err, "masking malformed response with fallback value");
    }
}
