//! Axis-aligned box movement against the tile grid.
//!
//! Movement is resolved one axis at a time, x first. For each axis the box
//! sweeps through the columns (or rows) its leading edge newly enters and
//! stops flush against the first solid tile. Sliding along walls falls out
//! of the per-axis order: a blocked x component leaves y free to move.
//!
//! Server validation and client prediction both go through
//! [`move_axis_aligned`] so they agree to the pixel.

use serde::{Deserialize, Serialize};

use crate::grid::WorldGrid;

/// Box in pixel space; (x, y) is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Touching edges count as intersecting.
    pub fn intersects(&self, other: &PixelBox) -> bool {
        self.x <= other.x + other.width
            && self.x + self.width >= other.x
            && self.y <= other.y + other.height
            && self.y + self.height >= other.y
    }

    /// Inclusive (first, last) columns and rows the box covers.
    pub fn cells(&self, grid: &WorldGrid) -> ((i64, i64), (i64, i64)) {
        let ds = grid.display_size() as f64;
        (span(self.x, self.width, ds), span(self.y, self.height, ds))
    }

    /// Does the box cover any solid cell?
    pub fn overlaps_solid(&self, grid: &WorldGrid) -> bool {
        let ((c0, c1), (r0, r1)) = self.cells(grid);
        (r0..=r1).any(|row| (c0..=c1).any(|col| solid(grid, col, row)))
    }
}

/// Largest x / y the box may take while staying on the map.
pub fn max_position(grid: &WorldGrid, width: f64, height: f64) -> (f64, f64) {
    (
        (grid.pixel_width() - width).max(0.0),
        (grid.pixel_height() - height).max(0.0),
    )
}

/// Move `b` by (dx, dy), never entering a solid tile, and keep it within the
/// map extent.
pub fn move_axis_aligned(b: PixelBox, dx: f64, dy: f64, grid: &WorldGrid) -> PixelBox {
    let (max_x, max_y) = max_position(grid, b.width, b.height);
    let ds = grid.display_size() as f64;
    let mut out = b;

    if dx.is_finite() && dx != 0.0 {
        let target = (out.x + dx).clamp(0.0, max_x);
        let rows = span(out.y, out.height, ds);
        out.x = sweep(out.x, target, out.width, ds, |col| {
            (rows.0..=rows.1).any(|row| solid(grid, col, row))
        });
    }

    if dy.is_finite() && dy != 0.0 {
        let target = (out.y + dy).clamp(0.0, max_y);
        let cols = span(out.x, out.width, ds);
        out.y = sweep(out.y, target, out.height, ds, |row| {
            (cols.0..=cols.1).any(|col| solid(grid, col, row))
        });
    }

    out.x = out.x.clamp(0.0, max_x);
    out.y = out.y.clamp(0.0, max_y);
    out
}

/// One-axis sweep from `from` toward `to` for an extent of `len`. `blocked`
/// reports whether a given cell index along the axis is solid anywhere across
/// the box's other-axis span.
fn sweep(from: f64, to: f64, len: f64, ds: f64, blocked: impl Fn(i64) -> bool) -> f64 {
    if to > from {
        let (_, old_last) = span(from, len, ds);
        let (_, new_last) = span(to, len, ds);
        for cell in old_last + 1..=new_last {
            if blocked(cell) {
                return cell as f64 * ds - len;
            }
        }
    } else if to < from {
        let (old_first, _) = span(from, len, ds);
        let (new_first, _) = span(to, len, ds);
        for cell in (new_first..old_first).rev() {
            if blocked(cell) {
                return (cell + 1) as f64 * ds;
            }
        }
    }
    to
}

/// Cells covered by the half-open interval [lo, lo + len).
fn span(lo: f64, len: f64, ds: f64) -> (i64, i64) {
    let first = (lo / ds).floor() as i64;
    let last = ((lo + len) / ds).ceil() as i64 - 1;
    (first, last.max(first))
}

fn solid(grid: &WorldGrid, col: i64, row: i64) -> bool {
    if col < 0 || row < 0 {
        return true;
    }
    grid.is_solid(col as usize, row as usize)
}
