//! Snapshot export: render the canvas buffer to a PNG file.
//!
//! The exporter consumes a read-only view of the buffer at the moment of
//! the call. In recording mode that view may mix generations from
//! different area loops; the frame is written as observed.

use std::path::Path;

use image::{ImageError, Rgb, RgbImage};
use thiserror::Error;

use crate::canvas::CanvasBuffer;

/// Errors produced while rendering or writing a snapshot.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The buffer has a zero dimension, there is nothing to render.
    #[error("cannot export an empty {width}x{height} canvas")]
    EmptyCanvas {
        /// Canvas width at export time.
        width: u32,
        /// Canvas height at export time.
        height: u32,
    },

    /// Encoding or writing the image failed.
    #[error("image encoding failed: {0}")]
    Image(#[from] ImageError),
}

/// Render the buffer onto an RGB raster by absolute coordinate.
///
/// Unset points stay black. Points outside the buffer's declared
/// dimensions are skipped; the protocol should not produce any, but a
/// misbehaving server must not be able to panic the exporter.
pub fn render_image(buffer: &CanvasBuffer) -> Result<RgbImage, ExportError> {
    let (width, height) = (buffer.width(), buffer.height());
    if width == 0 || height == 0 {
        return Err(ExportError::EmptyCanvas { width, height });
    }

    let mut image = RgbImage::new(width, height);
    buffer.for_each(|point, color| {
        if point.x < width && point.y < height {
            image.put_pixel(point.x, point.y, Rgb([color.r, color.g, color.b]));
        }
    });
    Ok(image)
}

/// Render the buffer and write it as a PNG file.
pub fn export_png(buffer: &CanvasBuffer, path: &Path) -> Result<(), ExportError> {
    let image = render_image(buffer)?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    tracing::info!(path = %path.display(), pixels = buffer.len(), "snapshot written");
    Ok(())
}
