use heatmesh_core::registry::SnapshotEntry;
use heatmesh_core::wire::Metric;
use ndarray::Array2;

use crate::layout::CoordinateMap;

/// Coarse field of one metric, `height x width`. `None` marks a cell with
/// no fresh reading behind it.
#[derive(Debug, Clone)]
pub struct CoarseGrid {
    pub metric: Metric,
    pub cells: Array2<Option<f64>>,
}

impl CoarseGrid {
    /// Projects fresh snapshot entries through the seat layout. Stale
    /// devices and devices without a seat leave their cells unknown. The
    /// layout guarantees at most one device per cell, so iteration order
    /// cannot change the result.
    pub fn build(snapshot: &[SnapshotEntry], layout: &CoordinateMap, metric: Metric) -> Self {
        let mut cells = Array2::from_elem((layout.height(), layout.width()), None);
        for entry in snapshot {
            if !entry.fresh {
                continue;
            }
            let Some((x, y)) = layout.get(&entry.device_id) else {
                continue;
            };
            cells[[y, x]] = Some(entry.reading.value(metric));
        }
        Self { metric, cells }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn known_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn value_at(&self, x: usize, y: usize) -> Option<f64> {
        self.cells[[y, x]]
    }
}
