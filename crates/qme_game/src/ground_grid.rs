//! Terrain underlay: one ground kind per grid cell and per layer.
//!
//! Terrain is kept apart from entities. Entities ask the grid what lies
//! under a point or inside a box and decide for themselves whether that
//! ground stops them. Everything outside the grid reads as wall.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use qme_core::{Ground, Layer, Point, Rect};

#[derive(Debug, Deserialize, Clone)]
pub struct GroundFile {
    pub cell_size: i32,
    #[serde(default)]
    pub origin: GridOrigin,
    pub width: i32,
    pub height: i32,
    /// Ground of every cell not listed in `cells`.
    #[serde(default)]
    pub default_ground: Ground,
    #[serde(default)]
    pub cells: Vec<GroundCell>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridOrigin {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GroundCell {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub layer: Layer,
    pub ground: Ground,
}

/// Terrain queries used by the map while moving entities.
pub trait GroundProvider {
    fn ground_at(&self, point: Point, layer: Layer) -> Ground;

    /// Whether any cell touched by `area` holds a ground matching `pred`.
    fn is_any_ground_in(&self, area: Rect, layer: Layer, pred: &dyn Fn(Ground) -> bool) -> bool;
}

#[derive(Debug, Clone)]
pub struct GroundGrid {
    pub cell_size: i32,
    pub origin: GridOrigin,
    pub width: i32,
    pub height: i32,
    default_ground: Ground,
    cells: HashMap<(Layer, i32, i32), Ground>,
}

impl GroundGrid {
    /// Grid where every cell holds `ground`.
    pub fn filled(cell_size: i32, origin: GridOrigin, width: i32, height: i32, ground: Ground) -> Self {
        Self {
            cell_size,
            origin,
            width,
            height,
            default_ground: ground,
            cells: HashMap::new(),
        }
    }

    pub fn from_file(file: GroundFile) -> Self {
        let cells = file
            .cells
            .into_iter()
            .map(|cell| ((cell.layer, cell.x, cell.y), cell.ground))
            .collect();
        Self {
            cell_size: file.cell_size,
            origin: file.origin,
            width: file.width,
            height: file.height,
            default_ground: file.default_ground,
            cells,
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    pub fn ground_cell(&self, layer: Layer, x: i32, y: i32) -> Ground {
        if !self.in_bounds(x, y) {
            return Ground::Wall;
        }
        self.cells
            .get(&(layer, x, y))
            .copied()
            .unwrap_or(self.default_ground)
    }

    pub fn set_ground(&mut self, layer: Layer, x: i32, y: i32, ground: Ground) -> Result<(), String> {
        if !self.in_bounds(x, y) {
            return Err(format!(
                "Ground cell ({x}, {y}) is outside the {}x{} grid",
                self.width, self.height
            ));
        }
        self.cells.insert((layer, x, y), ground);
        Ok(())
    }

    pub fn world_to_cell(&self, point: Point) -> (i32, i32) {
        (
            (point.x - self.origin.x).div_euclid(self.cell_size),
            (point.y - self.origin.y).div_euclid(self.cell_size),
        )
    }

    /// Top-left corner of a cell in map coordinates.
    pub fn cell_origin(&self, x: i32, y: i32) -> Point {
        Point::new(
            self.origin.x + x * self.cell_size,
            self.origin.y + y * self.cell_size,
        )
    }
}

impl GroundProvider for GroundGrid {
    fn ground_at(&self, point: Point, layer: Layer) -> Ground {
        let (x, y) = self.world_to_cell(point);
        self.ground_cell(layer, x, y)
    }

    fn is_any_ground_in(&self, area: Rect, layer: Layer, pred: &dyn Fn(Ground) -> bool) -> bool {
        if area.width <= 0 || area.height <= 0 {
            return false;
        }
        let (x0, y0) = self.world_to_cell(Point::new(area.x, area.y));
        let (x1, y1) = self.world_to_cell(Point::new(area.right() - 1, area.bottom() - 1));
        (y0..=y1).any(|y| (x0..=x1).any(|x| pred(self.ground_cell(layer, x, y))))
    }
}

pub fn validate_ground_file(file: &GroundFile) -> Result<(), String> {
    if file.cell_size <= 0 {
        return Err("Ground validation failed: cell_size must be > 0".to_string());
    }
    if file.width <= 0 || file.height <= 0 {
        return Err("Ground validation failed: width and height must be > 0".to_string());
    }

    let mut seen = HashSet::new();
    for cell in &file.cells {
        if cell.x < 0 || cell.x >= file.width || cell.y < 0 || cell.y >= file.height {
            return Err(format!(
                "Ground validation failed: cell out of bounds ({}, {})",
                cell.x, cell.y
            ));
        }
        if !seen.insert((cell.layer, cell.x, cell.y)) {
            return Err(format!(
                "Ground validation failed: duplicate cell ({}, {}) on layer {:?}",
                cell.x, cell.y, cell.layer
            ));
        }
    }
    Ok(())
}
