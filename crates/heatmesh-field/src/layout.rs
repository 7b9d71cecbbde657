use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("layout grid must have non-zero dimensions, got {width}x{height}")]
    ZeroDimension { width: usize, height: usize },
    #[error("device {device_id} sits at ({x},{y}), outside the {width}x{height} grid")]
    OutOfBounds {
        device_id: String,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("device {device_id} is listed more than once")]
    DuplicateDevice { device_id: String },
    #[error("devices {first} and {second} are both assigned to cell ({x},{y})")]
    CellCollision {
        first: String,
        second: String,
        x: usize,
        y: usize,
    },
    #[error("layout file read failed: {0}")]
    Io(String),
    #[error("layout file parse failed: {0}")]
    Parse(String),
}

/// Immutable `device id -> (x, y)` seat assignment on a fixed W x H grid.
/// All placement rules are checked once here, at startup, so downstream grid
/// code never has to care about collisions or bounds.
#[derive(Debug, Clone)]
pub struct CoordinateMap {
    width: usize,
    height: usize,
    cells: HashMap<String, (usize, usize)>,
}

#[derive(Debug, Deserialize)]
struct LayoutFile {
    width: usize,
    height: usize,
    devices: HashMap<String, (usize, usize)>,
}

impl CoordinateMap {
    pub fn new(
        width: usize,
        height: usize,
        entries: impl IntoIterator<Item = (String, (usize, usize))>,
    ) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::ZeroDimension { width, height });
        }
        let mut cells: HashMap<String, (usize, usize)> = HashMap::new();
        let mut occupied: HashMap<(usize, usize), String> = HashMap::new();
        for (device_id, (x, y)) in entries {
            if x >= width || y >= height {
                return Err(LayoutError::OutOfBounds {
                    device_id,
                    x,
                    y,
                    width,
                    height,
                });
            }
            if cells.contains_key(&device_id) {
                return Err(LayoutError::DuplicateDevice { device_id });
            }
            if let Some(first) = occupied.get(&(x, y)) {
                return Err(LayoutError::CellCollision {
                    first: first.clone(),
                    second: device_id,
                    x,
                    y,
                });
            }
            occupied.insert((x, y), device_id.clone());
            cells.insert(device_id, (x, y));
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Loads `{"width":W,"height":H,"devices":{"A1":[0,0],...}}`. Entries
    /// are validated in id order so errors are stable across runs.
    pub fn from_path(path: &Path) -> Result<Self, LayoutError> {
        let text =
            std::fs::read_to_string(path).map_err(|err| LayoutError::Io(err.to_string()))?;
        let file: LayoutFile =
            serde_json::from_str(&text).map_err(|err| LayoutError::Parse(err.to_string()))?;
        let mut entries = file.devices.into_iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self::new(file.width, file.height, entries)
    }

    /// The default seating chart: columns A..D left to right, rows 1..4
    /// front to back, so "B3" is x=1, y=2.
    pub fn classroom_4x4() -> Self {
        let mut cells = HashMap::new();
        for (y, number) in (1..=4u8).enumerate() {
            for (x, letter) in ["A", "B", "C", "D"].into_iter().enumerate() {
                cells.insert(format!("{letter}{number}"), (x, y));
            }
        }
        Self {
            width: 4,
            height: 4,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, device_id: &str) -> Option<(usize, usize)> {
        self.cells.get(device_id).copied()
    }

    /// All assignments sorted by device id.
    pub fn devices(&self) -> Vec<(&str, (usize, usize))> {
        let mut devices = self
            .cells
            .iter()
            .map(|(device_id, xy)| (device_id.as_str(), *xy))
            .collect::<Vec<_>>();
        devices.sort_by(|a, b| a.0.cmp(b.0));
        devices
    }
}
