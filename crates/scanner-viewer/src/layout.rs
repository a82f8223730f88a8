//! Packs media streams into a window region as a grid of cells, fitting
//! each stream to its cell without stretching.

use crate::error::LayoutError;

/// A rectangle in window pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Largest rectangle with the aspect of `size` that fits inside `self`,
    /// centered (letterboxed or pillarboxed).
    pub fn adjust_ratio(&self, size: [f32; 2]) -> Rect {
        let [sw, sh] = size;
        if sw <= 0.0 || sh <= 0.0 {
            return *self;
        }

        let mut h = self.h;
        let mut w = self.h * sw / sh;
        if w > self.w {
            let scale = self.w / w;
            w *= scale;
            h *= scale;
        }

        Rect {
            x: self.x + (self.w - w) / 2.0,
            y: self.y + (self.h - h) / 2.0,
            w,
            h,
        }
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Column/row counts and the pixel size of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl Grid {
    /// Rectangle of the cell holding stream `index` (row-major fill).
    pub fn cell(&self, index: usize) -> Rect {
        let col = index as u32 % self.columns;
        let row = index as u32 / self.columns;
        Rect::new(
            col as f32 * self.cell_width,
            row as f32 * self.cell_height,
            self.cell_width,
            self.cell_height,
        )
    }
}

/// Near-square grid for `streams` cells following the window aspect.
pub fn compute_grid(width: f32, height: f32, streams: usize) -> Result<Grid, LayoutError> {
    let invalid = || LayoutError::InvalidLayout {
        width,
        height,
        streams,
    };

    // Negated comparisons also reject NaN.
    if !(width > 0.0) || !(height > 0.0) || streams == 0 {
        return Err(invalid());
    }

    let n = streams as f32;
    let ratio = width / height;
    let x = (ratio * n).sqrt();
    let y = n / x;
    let mut w = x.round() as i64;
    let mut h = y.round() as i64;
    if w == 0 || h == 0 {
        return Err(invalid());
    }

    let n = streams as i64;
    // Shrink the larger side; on a tie drop a row.
    while w * h > n {
        if w > h {
            w -= 1;
        } else {
            h -= 1;
        }
    }
    // Grow the larger side; on a tie add a column.
    while w * h < n {
        if h > w {
            h += 1;
        } else {
            w += 1;
        }
    }

    Ok(Grid {
        columns: w as u32,
        rows: h as u32,
        cell_width: (width / w as f32).round(),
        cell_height: (height / h as f32).round(),
    })
}

/// One aspect-fitted tile per stream, in input order. `streams` holds the
/// native `[width, height]` of each stream.
pub fn compute_tiles(width: f32, height: f32, streams: &[[f32; 2]]) -> Result<Vec<Rect>, LayoutError> {
    let grid = compute_grid(width, height, streams.len())?;
    Ok(streams
        .iter()
        .enumerate()
        .map(|(i, size)| grid.cell(i).adjust_ratio(*size))
        .collect())
}

/// One row or one column of cells along the longer side of the region.
/// Covers regions too elongated for `compute_grid` to split.
pub fn strip_tiles(width: f32, height: f32, streams: &[[f32; 2]]) -> Result<Vec<Rect>, LayoutError> {
    if !(width > 0.0) || !(height > 0.0) || streams.is_empty() {
        return Err(LayoutError::InvalidLayout {
            width,
            height,
            streams: streams.len(),
        });
    }

    let n = streams.len() as u32;
    let grid = if height >= width {
        Grid {
            columns: 1,
            rows: n,
            cell_width: width.round(),
            cell_height: (height / n as f32).round(),
        }
    } else {
        Grid {
            columns: n,
            rows: 1,
            cell_width: (width / n as f32).round(),
            cell_height: height.round(),
        }
    };

    Ok(streams
        .iter()
        .enumerate()
        .map(|(i, size)| grid.cell(i).adjust_ratio(*size))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_stream_gets_one_cell() {
        let g = compute_grid(640.0, 480.0, 1).unwrap();
        assert_eq!((g.columns, g.rows), (1, 1));
        assert_eq!((g.cell_width, g.cell_height), (640.0, 480.0));
    }

    #[test]
    fn four_streams_make_two_by_two() {
        let g = compute_grid(640.0, 480.0, 4).unwrap();
        assert_eq!((g.columns, g.rows), (2, 2));
        assert_eq!((g.cell_width, g.cell_height), (320.0, 240.0));
    }

    #[test]
    fn three_streams_in_a_square_window() {
        let g = compute_grid(100.0, 100.0, 3).unwrap();
        let cells = g.columns * g.rows;
        assert!(cells == 3 || cells == 4, "got {}x{}", g.columns, g.rows);
        assert_ne!((g.columns, g.rows), (1, 1));
    }

    #[test]
    fn invalid_inputs_fail() {
        assert!(matches!(
            compute_grid(-1.0, 480.0, 2),
            Err(LayoutError::InvalidLayout { .. })
        ));
        assert!(compute_grid(640.0, 0.0, 2).is_err());
        assert!(compute_grid(640.0, 480.0, 0).is_err());
        assert!(compute_grid(f32::NAN, 480.0, 1).is_err());
        assert!(compute_tiles(640.0, 480.0, &[]).is_err());
    }

    #[test]
    fn extreme_aspect_that_rounds_to_zero_fails() {
        // sqrt(0.001 * 1) rounds to 0 columns.
        assert!(compute_grid(1.0, 1000.0, 1).is_err());
    }

    #[test]
    fn grid_covers_streams_without_waste() {
        let windows = [
            (640.0, 480.0),
            (100.0, 100.0),
            (1920.0, 1080.0),
            (300.0, 1200.0),
            (1000.0, 180.0),
        ];
        for &(w, h) in &windows {
            for n in 1..=40usize {
                let Ok(g) = compute_grid(w, h, n) else {
                    continue;
                };
                let cells = (g.columns * g.rows) as usize;
                assert!(cells >= n, "{w}x{h} n={n}: {}x{}", g.columns, g.rows);
                assert!(
                    cells - n < g.columns.max(g.rows) as usize,
                    "{w}x{h} n={n}: {}x{}",
                    g.columns,
                    g.rows
                );
                assert_eq!(compute_grid(w, h, n), Ok(g));
            }
        }
    }

    #[test]
    fn wide_stream_is_letterboxed() {
        let cell = Rect::new(0.0, 0.0, 320.0, 320.0);
        let r = cell.adjust_ratio([640.0, 480.0]);
        assert_relative_eq!(r.w, 320.0);
        assert_relative_eq!(r.h, 240.0);
        assert_relative_eq!(r.x, 0.0);
        assert_relative_eq!(r.y, 40.0);
    }

    #[test]
    fn tall_stream_is_pillarboxed() {
        let cell = Rect::new(10.0, 20.0, 400.0, 200.0);
        let r = cell.adjust_ratio([480.0, 640.0]);
        assert_relative_eq!(r.h, 200.0);
        assert_relative_eq!(r.w, 150.0);
        assert_relative_eq!(r.x, 10.0 + 125.0);
        assert_relative_eq!(r.y, 20.0);
    }

    #[test]
    fn tiles_fit_and_center_in_their_cells() {
        let streams = [[640.0, 480.0], [1280.0, 720.0], [480.0, 640.0], [100.0, 100.0], [1.0, 9.0]];
        for &(w, h) in &[(640.0, 480.0), (901.0, 333.0), (200.0, 900.0)] {
            let grid = compute_grid(w, h, streams.len()).unwrap();
            let tiles = compute_tiles(w, h, &streams).unwrap();
            assert_eq!(tiles.len(), streams.len());

            for (i, tile) in tiles.iter().enumerate() {
                let cell = grid.cell(i);
                assert!(tile.w <= cell.w + 1e-3 && tile.h <= cell.h + 1e-3);

                let left = tile.x - cell.x;
                let right = (cell.x + cell.w) - (tile.x + tile.w);
                let top = tile.y - cell.y;
                let bottom = (cell.y + cell.h) - (tile.y + tile.h);
                assert!((left - right).abs() <= 1.0);
                assert!((top - bottom).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn tiles_fill_row_major() {
        let tiles = compute_tiles(640.0, 480.0, &[[320.0, 240.0]; 4]).unwrap();
        assert_eq!(tiles[0], Rect::new(0.0, 0.0, 320.0, 240.0));
        assert_eq!(tiles[1], Rect::new(320.0, 0.0, 320.0, 240.0));
        assert_eq!(tiles[2], Rect::new(0.0, 240.0, 320.0, 240.0));
        assert_eq!(tiles[3], Rect::new(320.0, 240.0, 320.0, 240.0));
    }

    #[test]
    fn strip_stacks_along_the_long_side() {
        let tiles = strip_tiles(240.0, 1200.0, &[[640.0, 480.0]; 2]).unwrap();
        assert_eq!(tiles.len(), 2);
        for (tile, top) in tiles.iter().zip([210.0, 810.0]) {
            assert_relative_eq!(tile.x, 0.0);
            assert_relative_eq!(tile.y, top, epsilon = 1e-3);
            assert_relative_eq!(tile.w, 240.0, epsilon = 1e-3);
            assert_relative_eq!(tile.h, 180.0, epsilon = 1e-3);
        }

        let tiles = strip_tiles(1200.0, 100.0, &[[640.0, 480.0]; 3]).unwrap();
        assert!(tiles.windows(2).all(|w| w[0].x < w[1].x && w[0].y == w[1].y));
        assert!(strip_tiles(0.0, 100.0, &[[1.0, 1.0]]).is_err());
        assert!(strip_tiles(100.0, 100.0, &[]).is_err());
    }
}
