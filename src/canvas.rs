//! Concurrency-safe canvas raster assembled from area fetches.
//!
//! The buffer is a sparse Point -> Color map behind a lock. Correctness of
//! concurrent assembly does not come from the lock but from the partition
//! invariant: concurrent writers always hold disjoint key sets, so the lock
//! only protects the map's structure during inserts. Same-key writers are
//! still correct (last write wins), merely contended.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::types::{Color, Pixel, Point};

/// Shared mutable raster for one orchestration run.
///
/// Unset points have no entry. The lock is never held across await points;
/// [`insert_all`] takes it once per result batch rather than per pixel.
///
/// [`insert_all`]: CanvasBuffer::insert_all
#[derive(Debug)]
pub struct CanvasBuffer {
    width: u32,
    height: u32,
    pixels: RwLock<HashMap<Point, Color>>,
}

impl CanvasBuffer {
    /// Create an empty buffer for a canvas of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: RwLock::new(HashMap::with_capacity(width as usize * height as usize)),
        }
    }

    /// Canvas width this buffer was sized for.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height this buffer was sized for.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Upsert one pixel, last write wins.
    pub fn insert(&self, pixel: Pixel) {
        self.pixels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pixel.point, pixel.color);
    }

    /// Upsert a batch of pixels under a single lock acquisition.
    pub fn insert_all<I>(&self, pixels: I)
    where
        I: IntoIterator<Item = Pixel>,
    {
        let mut map = self.pixels.write().unwrap_or_else(PoisonError::into_inner);
        for pixel in pixels {
            map.insert(pixel.point, pixel.color);
        }
    }

    /// Remove the entry at a point, if any.
    pub fn remove(&self, point: Point) {
        self.pixels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&point);
    }

    /// Color currently stored at a point, if set.
    pub fn get(&self, point: Point) -> Option<Color> {
        self.pixels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&point)
            .copied()
    }

    /// Number of set points.
    pub fn len(&self) -> usize {
        self.pixels.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no point is set.
    pub fn is_empty(&self) -> bool {
        self.pixels.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    /// Visit every set point under the read lock.
    ///
    /// Iteration order is not significant: exports place colors by absolute
    /// coordinate, not by sequence.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(Point, Color),
    {
        let map = self.pixels.read().unwrap_or_else(PoisonError::into_inner);
        for (&point, &color) in map.iter() {
            visitor(point, color);
        }
    }
}
