use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::core::types::Aabb;

/// Entries spanning more cells than this skip the cell map.
pub const MAX_CELLS_PER_ENTRY: u64 = 64;

/// Uniform grid spatial partitioning shared by the rigid-body and particle
/// broad-phases. Entries are registered under every cell their bounds touch;
/// oversized or unbounded entries are kept in a flat list tested on every query.
#[derive(Debug, Clone)]
pub struct SpatialGrid<K> {
    cell_size: f32,
    grid: HashMap<Cell, Vec<K>>,
    oversized: Vec<(K, Aabb)>,
}

type Cell = (i32, i32, i32);

fn cell_count(min: Cell, max: Cell) -> u64 {
    let span = |lo: i32, hi: i32| (hi as i64 - lo as i64 + 1).max(0) as u64;
    span(min.0, max.0)
        .saturating_mul(span(min.1, max.1))
        .saturating_mul(span(min.2, max.2))
}

impl<K: Copy + Ord> SpatialGrid<K> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            grid: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn set_cell_size(&mut self, cell_size: f32) {
        self.cell_size = cell_size.max(f32::EPSILON);
        self.clear();
    }

    fn world_to_grid(&self, pos: Vec3) -> Cell {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.grid.clear();
        self.oversized.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty() && self.oversized.is_empty()
    }

    /// Number of entries kept outside the cell map.
    pub fn oversized_len(&self) -> usize {
        self.oversized.len()
    }

    pub fn insert(&mut self, key: K, bounds: &Aabb) {
        if !bounds.min.is_finite() || !bounds.max.is_finite() {
            self.oversized.push((key, *bounds));
            return;
        }
        let min_cell = self.world_to_grid(bounds.min);
        let max_cell = self.world_to_grid(bounds.max);
        if cell_count(min_cell, max_cell) > MAX_CELLS_PER_ENTRY {
            self.oversized.push((key, *bounds));
            return;
        }

        for x in min_cell.0..=max_cell.0 {
            for y in min_cell.1..=max_cell.1 {
                for z in min_cell.2..=max_cell.2 {
                    self.grid.entry((x, y, z)).or_default().push(key);
                }
            }
        }
    }

    /// Candidate keys whose cells intersect `bounds`, sorted and deduplicated.
    pub fn query(&self, bounds: &Aabb) -> Vec<K> {
        let mut results: Vec<K> = self
            .oversized
            .iter()
            .filter(|(_, entry)| entry.overlaps(bounds))
            .map(|&(key, _)| key)
            .collect();
        if self.grid.is_empty() {
            results.sort();
            return results;
        }
        let min_cell = self.world_to_grid(bounds.min);
        let max_cell = self.world_to_grid(bounds.max);

        if cell_count(min_cell, max_cell) > self.grid.len() as u64 {
            // Huge query regions: scanning occupied cells is cheaper.
            for (cell, keys) in &self.grid {
                if (min_cell.0..=max_cell.0).contains(&cell.0)
                    && (min_cell.1..=max_cell.1).contains(&cell.1)
                    && (min_cell.2..=max_cell.2).contains(&cell.2)
                {
                    results.extend(keys.iter().copied());
                }
            }
        } else {
            for x in min_cell.0..=max_cell.0 {
                for y in min_cell.1..=max_cell.1 {
                    for z in min_cell.2..=max_cell.2 {
                        if let Some(keys) = self.grid.get(&(x, y, z)) {
                            results.extend(keys.iter().copied());
                        }
                    }
                }
            }
        }

        results.sort();
        results.dedup();
        results
    }
}

/// A [`SpatialGrid`] rebuilt on demand the first time it is read after being
/// marked dirty. Reads only need `&self`, so queries stay non-mutating.
#[derive(Debug)]
pub struct LazyGrid<K> {
    grid: RwLock<SpatialGrid<K>>,
    dirty: AtomicBool,
}

impl<K: Copy + Ord> LazyGrid<K> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: RwLock::new(SpatialGrid::new(cell_size)),
            dirty: AtomicBool::new(true),
        }
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn set_cell_size(&mut self, cell_size: f32) {
        self.grid.get_mut().set_cell_size(cell_size);
        self.mark_dirty();
    }

    /// Returns the grid, first refilling it through `fill` if it is stale.
    pub fn read_with(&self, fill: impl FnOnce(&mut SpatialGrid<K>)) -> RwLockReadGuard<'_, SpatialGrid<K>> {
        if self.dirty.load(Ordering::Acquire) {
            let mut grid = self.grid.write();
            if self.dirty.swap(false, Ordering::AcqRel) {
                grid.clear();
                fill(&mut grid);
            }
        }
        self.grid.read()
    }
}

impl<K: Copy + Ord> Clone for LazyGrid<K> {
    fn clone(&self) -> Self {
        let cell_size = self.grid.read().cell_size();
        Self::new(cell_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_returns_entries_in_touched_cells_once() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(7usize, &Aabb::new(Vec3::splat(-0.5), Vec3::splat(1.5)));
        grid.insert(9usize, &Aabb::from_point(Vec3::splat(10.0)));

        let hits = grid.query(&Aabb::new(Vec3::ZERO, Vec3::splat(2.0)));
        assert_eq!(hits, vec![7]);
    }

    #[test]
    fn huge_query_scans_occupied_cells() {
        let mut grid = SpatialGrid::new(0.1);
        grid.insert(1u32, &Aabb::from_point(Vec3::splat(500.0)));
        grid.insert(2u32, &Aabb::from_point(Vec3::splat(-500.0)));

        let hits = grid.query(&Aabb::new(Vec3::splat(-1000.0), Vec3::splat(1000.0)));
        assert_eq!(hits, vec![1, 2]);
    }

    #[test]
    fn lazy_grid_refills_only_when_dirty() {
        let lazy = LazyGrid::new(1.0);
        let mut fills = 0;
        {
            let grid = lazy.read_with(|grid| {
                fills += 1;
                grid.insert(1u8, &Aabb::from_point(Vec3::ZERO));
            });
            assert!(!grid.is_empty());
        }
        drop(lazy.read_with(|_| fills += 1));
        assert_eq!(fills, 1);

        lazy.mark_dirty();
        drop(lazy.read_with(|_| fills += 1));
        assert_eq!(fills, 2);
    }

    #[test]
    fn oversized_entries_bypass_cells() {
        let mut grid = SpatialGrid::new(5.0);
        grid.insert(1u32, &Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(4000.0, 1.0, 4000.0)));
        grid.insert(2u32, &Aabb::new(Vec3::NEG_INFINITY, Vec3::INFINITY));
        grid.insert(3u32, &Aabb::from_point(Vec3::new(2.0, 0.0, 2.0)));
        assert_eq!(grid.oversized_len(), 2);

        assert_eq!(grid.query(&Aabb::from_center_half_extents(Vec3::ONE, Vec3::splat(1.5))), vec![1, 2, 3]);
        assert_eq!(grid.query(&Aabb::from_point(Vec3::new(0.0, 50.0, 0.0))), vec![2]);
    }
}
