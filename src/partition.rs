//! Canvas partitioning into a fixed grid of fetch areas.
//!
//! The partition is the invariant the whole concurrent fetch rests on:
//! cells are pairwise disjoint and together cover the canvas exactly once,
//! so concurrent area fetches never write the same point into the canvas
//! buffer.

use crate::types::{Area, Point};

/// Default number of grid cells per axis, independent of canvas size.
pub const DEFAULT_GRID_SPLIT: u32 = 20;

/// Split a `width` x `height` canvas into an `x_split` x `y_split` grid.
///
/// Base cell size is `width / x_split` by `height / y_split` (integer
/// division). All remainder pixels on each axis are folded into the single
/// cell at grid index (0, 0), which is therefore larger than every other
/// cell. Splits are clamped to the canvas dimensions so no cell is ever
/// empty; a zero-sized canvas yields no areas.
///
/// Cells are enumerated grid-x outer, grid-y inner.
///
/// # Example
///
/// ```
/// use pixeldump::partition::partition;
///
/// let areas = partition(40, 40, 2, 2);
/// assert_eq!(areas.len(), 4);
/// assert_eq!(areas[0].origin.x, 0);
/// assert_eq!(areas[0].end.x, 19);
/// ```
pub fn partition(width: u32, height: u32, x_split: u32, y_split: u32) -> Vec<Area> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let x_split = x_split.clamp(1, width);
    let y_split = y_split.clamp(1, height);

    let cell_width = width / x_split;
    let cell_height = height / y_split;
    let remainder_width = width - cell_width * x_split;
    let remainder_height = height - cell_height * y_split;

    let mut areas = Vec::with_capacity((x_split * y_split) as usize);
    for grid_x in 0..x_split {
        for grid_y in 0..y_split {
            let origin_x = match grid_x {
                0 => 0,
                _ => remainder_width + grid_x * cell_width,
            };
            let origin_y = match grid_y {
                0 => 0,
                _ => remainder_height + grid_y * cell_height,
            };
            let end_x = remainder_width + (grid_x + 1) * cell_width - 1;
            let end_y = remainder_height + (grid_y + 1) * cell_height - 1;

            areas.push(Area::new(
                Point::new(origin_x, origin_y),
                Point::new(end_x, end_y),
            ));
        }
    }

    areas
}
