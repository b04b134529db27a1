//! Terrain spatial index: cells that scenery instances are filed under.
//!
//! # Invariants
//! - An instance key is filed in at most one cell at a time; the registry
//!   disconnects before reconnecting.
//! - Empty cells are dropped, so `cell_count` only counts occupied cells.

mod grid;

pub use grid::{CellCoord, Ray, TerrainGrid, TerrainIndex};

pub fn crate_info() -> &'static str {
    "skirmish-terrain v0.1.0"
}
