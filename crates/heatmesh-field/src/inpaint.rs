use heatmesh_core::wire::Metric;
use ndarray::Array2;
use std::collections::HashMap;
use thiserror::Error;

use crate::grid::CoarseGrid;

pub const DEFAULT_MAX_PASSES: usize = 50;
pub const DEFAULT_TEMPERATURE_FALLBACK: f64 = 25.0;

/// Per-metric constant used when a grid holds no data at all. Metrics
/// without an entry make that situation an error instead of a made-up
/// surface.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    defaults: HashMap<Metric, f64>,
}

impl Default for FallbackTable {
    fn default() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(Metric::Temperature, DEFAULT_TEMPERATURE_FALLBACK);
        Self { defaults }
    }
}

impl FallbackTable {
    pub fn empty() -> Self {
        Self {
            defaults: HashMap::new(),
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.defaults.insert(metric, value);
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.defaults.get(&metric).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InpaintError {
    #[error("grid has no known cells and no fallback is defined for {metric}")]
    NoData { metric: Metric },
}

/// Fills every unknown cell by iterative 8-neighbor diffusion.
///
/// Each pass reads only the previous pass's grid and writes a fresh one, so
/// the result is independent of traversal order. Passes stop once the grid
/// is full, once a pass fills nothing, or at `max_passes`; cells still
/// unknown after that are set to the mean of the known cells.
pub fn inpaint(
    grid: &CoarseGrid,
    fallbacks: &FallbackTable,
    max_passes: usize,
) -> Result<Array2<f64>, InpaintError> {
    if grid.known_count() == 0 {
        let Some(fill) = fallbacks.get(grid.metric) else {
            return Err(InpaintError::NoData {
                metric: grid.metric,
            });
        };
        return Ok(Array2::from_elem(grid.cells.dim(), fill));
    }

    let mut current = grid.cells.clone();
    for _ in 0..max_passes {
        if current.iter().all(Option::is_some) {
            break;
        }
        let (next, filled) = diffuse_pass(&current);
        current = next;
        if filled == 0 {
            break;
        }
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for value in current.iter().flatten() {
        sum += *value;
        count += 1;
    }
    let residual = sum / count as f64;
    Ok(current.map(|cell| cell.unwrap_or(residual)))
}

fn diffuse_pass(cells: &Array2<Option<f64>>) -> (Array2<Option<f64>>, usize) {
    let (rows, cols) = cells.dim();
    let mut filled = 0usize;
    let next = Array2::from_shape_fn((rows, cols), |(row, col)| {
        if let Some(value) = cells[[row, col]] {
            return Some(value);
        }
        let mut sum = 0.0;
        let mut known = 0u32;
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let nr = row as i64 + dr;
                let nc = col as i64 + dc;
                if nr < 0 || nc < 0 || nr >= rows as i64 || nc >= cols as i64 {
                    continue;
                }
                if let Some(value) = cells[[nr as usize, nc as usize]] {
                    sum += value;
                    known += 1;
                }
            }
        }
        if known == 0 {
            None
        } else {
            filled += 1;
            Some(sum / f64::from(known))
        }
    });
    (next, filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, cols: usize, cells: Vec<Option<f64>>) -> CoarseGrid {
        CoarseGrid {
            metric: Metric::Temperature,
            cells: Array2::from_shape_vec((rows, cols), cells).expect("cell count"),
        }
    }

    fn unknown_grid(metric: Metric) -> CoarseGrid {
        CoarseGrid {
            metric,
            cells: Array2::from_elem((4, 4), None),
        }
    }

    #[test]
    fn single_center_cell_floods_a_4x4_grid_in_two_passes() {
        let mut cells = vec![None; 16];
        cells[5] = Some(21.5); // (x=1, y=1)
        let filled = inpaint(&grid(4, 4, cells), &FallbackTable::default(), 2).expect("inpaint");
        for value in filled.iter() {
            assert_eq!(*value, 21.5);
        }
    }

    #[test]
    fn fully_unknown_temperature_grid_becomes_the_fallback_constant() {
        let filled = inpaint(
            &unknown_grid(Metric::Temperature),
            &FallbackTable::default(),
            DEFAULT_MAX_PASSES,
        )
        .expect("inpaint");
        for value in filled.iter() {
            assert_eq!(*value, DEFAULT_TEMPERATURE_FALLBACK);
        }
    }

    #[test]
    fn fully_unknown_grid_without_fallback_is_an_error() {
        let err = inpaint(
            &unknown_grid(Metric::Humidity),
            &FallbackTable::default(),
            DEFAULT_MAX_PASSES,
        )
        .unwrap_err();
        assert_eq!(
            err,
            InpaintError::NoData {
                metric: Metric::Humidity
            }
        );
    }

    #[test]
    fn configured_fallback_overrides_the_error() {
        let mut fallbacks = FallbackTable::default();
        fallbacks.set(Metric::Humidity, 55.0);
        let filled = inpaint(&unknown_grid(Metric::Humidity), &fallbacks, 1).expect("inpaint");
        for value in filled.iter() {
            assert_eq!(*value, 55.0);
        }
    }

    #[test]
    fn pass_averages_known_neighbors_only() {
        let cells = vec![
            Some(10.0),
            None,
            Some(20.0),
            None,
            None,
            None,
            Some(30.0),
            None,
            Some(40.0),
        ];
        let filled = inpaint(&grid(3, 3, cells), &FallbackTable::default(), 1).expect("inpaint");
        // Center sees all four corners, the top edge only its two.
        assert_eq!(filled[[1, 1]], 25.0);
        assert_eq!(filled[[0, 1]], 15.0);
    }

    #[test]
    fn passes_read_the_previous_grid_not_the_one_being_written() {
        let cells = vec![Some(10.0), None, None, Some(40.0)];
        let filled = inpaint(&grid(1, 4, cells), &FallbackTable::default(), 1).expect("inpaint");
        // An in-place sweep would let the freshly written 10.0 leak into
        // the third cell's average.
        assert_eq!(filled[[0, 1]], 10.0);
        assert_eq!(filled[[0, 2]], 40.0);
    }

    #[test]
    fn cells_left_over_after_max_passes_get_the_known_mean() {
        let cells = vec![Some(10.0), None, None, Some(30.0)];
        let filled = inpaint(&grid(1, 4, cells), &FallbackTable::default(), 0).expect("inpaint");
        assert_eq!(filled[[0, 0]], 10.0);
        assert_eq!(filled[[0, 1]], 20.0);
        assert_eq!(filled[[0, 2]], 20.0);
        assert_eq!(filled[[0, 3]], 30.0);
    }

    #[test]
    fn known_cells_are_never_rewritten() {
        let cells = vec![Some(12.25), Some(33.5), None, None];
        let filled = inpaint(&grid(2, 2, cells), &FallbackTable::default(), 5).expect("inpaint");
        assert_eq!(filled[[0, 0]], 12.25);
        assert_eq!(filled[[0, 1]], 33.5);
    }

    #[test]
    fn fully_known_grid_passes_through_unchanged() {
        let cells = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let filled = inpaint(&grid(2, 2, cells), &FallbackTable::empty(), 0).expect("inpaint");
        assert_eq!(filled[[0, 0]], 1.0);
        assert_eq!(filled[[1, 1]], 4.0);
    }
}
