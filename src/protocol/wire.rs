//! Wire encoding and decoding for the Pixelflut line protocol.
//!
//! ```text
//! → SIZE                  query canvas dimensions
//! ← SIZE <w> <h>          w, h decimal unsigned
//! → PX <x> <y>            query pixel color
//! ← PX <x> <y> <RRGGBB>   hex uppercase, six digits
//! → PX <x> <y> <RRGGBB>   write pixel, no response
//! ```
//!
//! Keywords are case-sensitive, lines are newline-terminated. Decoding is
//! strict: a line that does not match its pattern exactly yields
//! [`PixelflutError::Parse`] carrying the offending line, and the caller
//! decides the fallback.

use std::io::Write as _;

use bytes::{BufMut, BytesMut};

use crate::error::{PixelflutError, Result};
use crate::types::{Color, Pixel, Point};

/// Keyword of the size query and its response.
pub const SIZE_COMMAND: &str = "SIZE";

/// Keyword of pixel reads, read responses, and pixel writes.
pub const PX_COMMAND: &str = "PX";

/// Encode a size request line (without the trailing newline).
///
/// # Example
///
/// ```
/// use pixeldump::protocol::encode_size_request;
///
/// assert_eq!(encode_size_request(), "SIZE");
/// ```
pub fn encode_size_request() -> &'static str {
    SIZE_COMMAND
}

/// Decode a `SIZE <w> <h>` response into `(width, height)`.
pub fn decode_size_response(line: &str) -> Result<(u32, u32)> {
    let mut tokens = line.split(' ');

    if tokens.next() != Some(SIZE_COMMAND) {
        return Err(parse_error(line));
    }
    let width = parse_uint(tokens.next(), line)?;
    let height = parse_uint(tokens.next(), line)?;
    if tokens.next().is_some() {
        return Err(parse_error(line));
    }

    Ok((width, height))
}

/// Encode a pixel read request line (without the trailing newline).
///
/// # Example
///
/// ```
/// use pixeldump::protocol::encode_read_request;
/// use pixeldump::Point;
///
/// assert_eq!(encode_read_request(Point::new(3, 4)), "PX 3 4");
/// ```
pub fn encode_read_request(point: Point) -> String {
    format!("{} {} {}", PX_COMMAND, point.x, point.y)
}

/// Append a newline-terminated pixel read request to a batch buffer.
pub fn write_read_request(buf: &mut BytesMut, point: Point) {
    // Writes into BytesMut cannot fail.
    let _ = writeln!(buf.writer(), "{} {} {}", PX_COMMAND, point.x, point.y);
}

/// Decode a `PX <x> <y> <RRGGBB>` response into a [`Pixel`].
pub fn decode_read_response(line: &str) -> Result<Pixel> {
    let mut tokens = line.split(' ');

    if tokens.next() != Some(PX_COMMAND) {
        return Err(parse_error(line));
    }
    let x = parse_uint(tokens.next(), line)?;
    let y = parse_uint(tokens.next(), line)?;
    let color = parse_color(tokens.next(), line)?;
    if tokens.next().is_some() {
        return Err(parse_error(line));
    }

    Ok(Pixel::new(Point::new(x, y), color))
}

/// Encode a pixel write request line (without the trailing newline).
///
/// The color is rendered as six uppercase hex digits, zero-padded per byte.
///
/// # Example
///
/// ```
/// use pixeldump::protocol::encode_write_request;
/// use pixeldump::{Color, Pixel, Point};
///
/// let pixel = Pixel::new(Point::new(3, 4), Color::new(255, 0, 170));
/// assert_eq!(encode_write_request(pixel), "PX 3 4 FF00AA");
/// ```
pub fn encode_write_request(pixel: Pixel) -> String {
    format!(
        "{} {} {} {}",
        PX_COMMAND, pixel.point.x, pixel.point.y, pixel.color
    )
}

/// Append a newline-terminated pixel write request to a batch buffer.
pub fn write_write_request(buf: &mut BytesMut, pixel: Pixel) {
    let _ = writeln!(
        buf.writer(),
        "{} {} {} {}",
        PX_COMMAND,
        pixel.point.x,
        pixel.point.y,
        pixel.color
    );
}

fn parse_error(line: &str) -> PixelflutError {
    PixelflutError::Parse(line.to_string())
}

fn parse_uint(token: Option<&str>, line: &str) -> Result<u32> {
    token
        .and_then(|t| t.parse::<u32>().ok())
        .ok_or_else(|| parse_error(line))
}

fn parse_color(token: Option<&str>, line: &str) -> Result<Color> {
    let hex = token.ok_or_else(|| parse_error(line))?;
    if hex.len() != 6 || !hex.is_char_boundary(2) || !hex.is_char_boundary(4) {
        return Err(parse_error(line));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| parse_error(line))
    };

    Ok(Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
