use glam::Vec3;
use skirmish_common::InstanceKey;
use std::collections::{HashMap, HashSet};

/// A 2D cell coordinate on the terrain (the Y axis is ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// A ray in world space. `direction` does not need to be normalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Straight down from high above `position`.
    pub fn downward_through(position: Vec3) -> Self {
        Self {
            origin: Vec3::new(position.x, position.y + 1000.0, position.z),
            direction: Vec3::NEG_Y,
        }
    }
}

/// The narrow spatial-index interface the instance registry uses to re-file
/// scenery when it crosses a cell boundary.
pub trait TerrainIndex: Send {
    fn connect_to_cell(&mut self, cell: CellCoord, key: InstanceKey);

    /// Returns false when the instance was not filed in that cell.
    fn disconnect_from_cell(&mut self, cell: CellCoord, key: InstanceKey) -> bool;

    fn find_cell_for_ray(&self, ray: &Ray) -> Option<CellCoord>;
}

/// Fixed-size grid over a flat ground plane at `y = 0`.
///
/// Stands in for the terrain quad-tree. Cells are square, `cell_size` wide,
/// and the grid spans `half_extent` cells in each direction from the origin.
pub struct TerrainGrid {
    cell_size: f32,
    half_extent: i32,
    cells: HashMap<CellCoord, HashSet<InstanceKey>>,
}

impl TerrainGrid {
    /// Create a new grid with the given cell size and extent.
    pub fn new(cell_size: f32, half_extent: i32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        Self {
            cell_size,
            half_extent,
            cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert a world position to a cell coordinate.
    pub fn position_to_cell(&self, pos: Vec3) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    pub fn contains_cell(&self, coord: CellCoord) -> bool {
        (-self.half_extent..self.half_extent).contains(&coord.x)
            && (-self.half_extent..self.half_extent).contains(&coord.z)
    }

    /// Get all instance keys in a specific cell.
    pub fn instances_in_cell(&self, coord: CellCoord) -> HashSet<InstanceKey> {
        self.cells.get(&coord).cloned().unwrap_or_default()
    }

    /// Get all instance keys within a radius (in cells) of a center cell.
    pub fn instances_in_radius(&self, center: CellCoord, radius: i32) -> HashSet<InstanceKey> {
        let mut result = HashSet::new();
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let coord = CellCoord::new(center.x + dx, center.z + dz);
                if let Some(keys) = self.cells.get(&coord) {
                    result.extend(keys);
                }
            }
        }
        result
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total number of instance placements across all cells.
    pub fn total_placements(&self) -> usize {
        self.cells.values().map(|s| s.len()).sum()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

impl TerrainIndex for TerrainGrid {
    fn connect_to_cell(&mut self, cell: CellCoord, key: InstanceKey) {
        self.cells.entry(cell).or_default().insert(key);
    }

    fn disconnect_from_cell(&mut self, cell: CellCoord, key: InstanceKey) -> bool {
        let Some(keys) = self.cells.get_mut(&cell) else {
            return false;
        };
        let removed = keys.remove(&key);
        if keys.is_empty() {
            self.cells.remove(&cell);
        }
        removed
    }

    fn find_cell_for_ray(&self, ray: &Ray) -> Option<CellCoord> {
        if ray.direction.y.abs() <= f32::EPSILON {
            return None;
        }
        let t = -ray.origin.y / ray.direction.y;
        if t < 0.0 {
            return None;
        }
        let hit = ray.origin + ray.direction * t;
        let cell = self.position_to_cell(hit);
        self.contains_cell(cell).then_some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_to_cell_basic() {
        let grid = TerrainGrid::new(16.0, 8);
        let coord = grid.position_to_cell(Vec3::new(10.0, 0.0, 10.0));
        assert_eq!(coord, CellCoord::new(0, 0));

        let coord = grid.position_to_cell(Vec3::new(20.0, 0.0, -5.0));
        assert_eq!(coord, CellCoord::new(1, -1));
    }

    #[test]
    fn connect_and_disconnect() {
        let mut grid = TerrainGrid::new(16.0, 8);
        let key = InstanceKey(1);
        grid.connect_to_cell(CellCoord::new(0, 0), key);
        grid.connect_to_cell(CellCoord::new(1, 0), InstanceKey(2));

        assert_eq!(grid.cell_count(), 2);
        assert_eq!(grid.total_placements(), 2);
        assert!(grid.instances_in_cell(CellCoord::new(0, 0)).contains(&key));

        assert!(grid.disconnect_from_cell(CellCoord::new(0, 0), key));
        assert!(!grid.disconnect_from_cell(CellCoord::new(0, 0), key));
        assert_eq!(grid.cell_count(), 1);
    }

    #[test]
    fn instances_in_radius() {
        let mut grid = TerrainGrid::new(16.0, 8);
        grid.connect_to_cell(CellCoord::new(0, 0), InstanceKey(1));
        grid.connect_to_cell(CellCoord::new(1, 0), InstanceKey(2));

        let nearby = grid.instances_in_radius(CellCoord::new(0, 0), 1);
        assert!(nearby.contains(&InstanceKey(1)));
        assert!(nearby.contains(&InstanceKey(2)));

        let far = grid.instances_in_radius(CellCoord::new(6, 6), 0);
        assert!(far.is_empty());
    }

    #[test]
    fn downward_ray_finds_cell() {
        let grid = TerrainGrid::new(16.0, 8);
        let ray = Ray::downward_through(Vec3::new(20.0, 3.0, -5.0));
        assert_eq!(grid.find_cell_for_ray(&ray), Some(CellCoord::new(1, -1)));
    }

    #[test]
    fn ray_misses_outside_extent_or_parallel() {
        let grid = TerrainGrid::new(16.0, 2);
        let outside = Ray::downward_through(Vec3::new(500.0, 0.0, 0.0));
        assert_eq!(grid.find_cell_for_ray(&outside), None);

        let parallel = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::X);
        assert_eq!(grid.find_cell_for_ray(&parallel), None);

        let upward = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::Y);
        assert_eq!(grid.find_cell_for_ray(&upward), None);
    }
}
