//! Near-square grid layout.
//!
//! Tile `i` of `n` lands in row `i / cols`, column `i % cols` with
//! `cols = ceil(sqrt(n))` and `rows = ceil(n / cols)`. Each column is as wide
//! as its widest tile, each row as tall as its tallest tile, and every tile
//! sits at the top-left corner of its cell.

use crate::error::{Result, TileSheetError};
use crate::model::Rect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    pub cols: usize,
    pub rows: usize,
    pub col_widths: Vec<u32>,
    pub row_heights: Vec<u32>,
    /// Placed rectangle of each tile, in input order.
    pub placements: Vec<Rect>,
}

impl GridLayout {
    /// `(cols, rows)` for `n` tiles. `n` must be positive.
    pub fn grid_shape(n: usize) -> (usize, usize) {
        let cols = ceil_sqrt(n).max(1);
        let rows = n.div_ceil(cols);
        (cols, rows)
    }

    /// Computes the layout for tiles of the given `(w, h)` sizes.
    pub fn compute(sizes: &[(u32, u32)]) -> Result<Self> {
        if sizes.is_empty() {
            return Err(TileSheetError::InvalidInput(
                "cannot lay out an empty batch".into(),
            ));
        }
        let (cols, rows) = Self::grid_shape(sizes.len());
        let mut col_widths = vec![0u32; cols];
        let mut row_heights = vec![0u32; rows];
        for (i, &(w, h)) in sizes.iter().enumerate() {
            let (r, c) = (i / cols, i % cols);
            col_widths[c] = col_widths[c].max(w);
            row_heights[r] = row_heights[r].max(h);
        }

        let col_x = prefix_offsets(&col_widths)?;
        let row_y = prefix_offsets(&row_heights)?;

        let placements = sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| Rect::new(col_x[i % cols], row_y[i / cols], w, h))
            .collect();

        Ok(Self {
            cols,
            rows,
            col_widths,
            row_heights,
            placements,
        })
    }

    /// Canvas width (sum of column widths).
    pub fn width(&self) -> u32 {
        self.col_widths.iter().sum()
    }

    /// Canvas height (sum of row heights).
    pub fn height(&self) -> u32 {
        self.row_heights.iter().sum()
    }

    /// `(row, col)` of tile `i`.
    pub fn cell_of(&self, i: usize) -> (usize, usize) {
        (i / self.cols, i % self.cols)
    }

    /// Bounds of the cell holding tile `i`.
    pub fn cell_rect(&self, i: usize) -> Rect {
        let (r, c) = self.cell_of(i);
        let p = self.placements[i];
        Rect::new(p.x, p.y, self.col_widths[c], self.row_heights[r])
    }
}

/// Start offset of each track; errors if the total overflows `u32`.
fn prefix_offsets(tracks: &[u32]) -> Result<Vec<u32>> {
    let mut out = Vec::with_capacity(tracks.len());
    let mut acc = 0u32;
    for &t in tracks {
        out.push(acc);
        acc = acc.checked_add(t).ok_or_else(|| {
            TileSheetError::InvalidInput("composite canvas exceeds u32 pixel range".into())
        })?;
    }
    Ok(out)
}

/// Smallest `c` with `c * c >= n`.
fn ceil_sqrt(n: usize) -> usize {
    let mut c = (n as f64).sqrt() as usize;
    while c * c < n {
        c += 1;
    }
    while c > 0 && (c - 1) * (c - 1) >= n {
        c -= 1;
    }
    c
}
