//! Neighborhood queries over a per-tick snapshot of agent positions.

use std::collections::HashMap;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::error::{ensure_positive, SimResult};
use crate::sim::{AgentHandle, AgentKind};

pub const DEFAULT_GRID_CELL_SIZE: f64 = 5.0;

/// Which neighborhood index a world rebuilds every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum IndexStrategy {
    BruteForce,
    UniformGrid { cell_size: f64 },
}

impl Default for IndexStrategy {
    fn default() -> Self {
        IndexStrategy::UniformGrid { cell_size: DEFAULT_GRID_CELL_SIZE }
    }
}

impl IndexStrategy {
    pub fn validate(&self) -> SimResult<()> {
        match self {
            IndexStrategy::BruteForce => Ok(()),
            IndexStrategy::UniformGrid { cell_size } => ensure_positive("index.cell_size", *cell_size),
        }
    }

    pub fn build(&self) -> Box<dyn NeighborhoodIndex> {
        match *self {
            IndexStrategy::BruteForce => Box::new(BruteForceIndex::default()),
            IndexStrategy::UniformGrid { cell_size } => Box::new(UniformGridIndex::new(cell_size)),
        }
    }
}

/// Common behaviour exposed by neighborhood indices.
///
/// Slots are positions in the slice passed to `rebuild`.
pub trait NeighborhoodIndex: Send + Sync + std::fmt::Debug {
    fn rebuild(&mut self, positions: &[Vector3<f64>]);

    /// Visit every slot whose position lies within `radius` of `center`.
    fn within(&self, center: &Vector3<f64>, radius: f64, visitor: &mut dyn FnMut(usize));
}

/// O(n) scan; fine for the population sizes of a single scene.
#[derive(Debug, Clone, Default)]
pub struct BruteForceIndex {
    positions: Vec<Vector3<f64>>,
}

impl NeighborhoodIndex for BruteForceIndex {
    fn rebuild(&mut self, positions: &[Vector3<f64>]) {
        self.positions.clear();
        self.positions.extend_from_slice(positions);
    }

    fn within(&self, center: &Vector3<f64>, radius: f64, visitor: &mut dyn FnMut(usize)) {
        let r2 = radius * radius;
        for (slot, p) in self.positions.iter().enumerate() {
            if (p - center).norm_squared() <= r2 {
                visitor(slot);
            }
        }
    }
}

/// Sparse uniform grid keyed by integer cell coordinates.
#[derive(Debug, Clone)]
pub struct UniformGridIndex {
    cell_size: f64,
    positions: Vec<Vector3<f64>>,
    cells: HashMap<[i64; 3], Vec<usize>>,
}

impl UniformGridIndex {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            positions: Vec::new(),
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, p: &Vector3<f64>) -> [i64; 3] {
        [
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        ]
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[Vector3<f64>]) {
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        for (slot, p) in positions.iter().enumerate() {
            let cell = self.cell_of(p);
            self.cells.entry(cell).or_default().push(slot);
        }
        self.cells.retain(|_, bucket| !bucket.is_empty());
    }

    fn within(&self, center: &Vector3<f64>, radius: f64, visitor: &mut dyn FnMut(usize)) {
        if self.positions.is_empty() || !(radius >= 0.0) {
            return;
        }
        let r2 = radius * radius;
        let reach_cells = (radius / self.cell_size).ceil();
        let base = self.cell_of(center);

        // Sparse scenes or huge radii: walking the occupied buckets beats
        // walking the cube, and never has to step past the i64 cell range.
        let cube = (2.0 * reach_cells + 1.0).powi(3);
        if !(cube <= self.cells.len() as f64) {
            let reach = reach_cells as i64;
            for (cell, bucket) in &self.cells {
                if (0..3).all(|a| cell[a].saturating_sub(base[a]).saturating_abs() <= reach) {
                    self.scan(bucket, center, r2, visitor);
                }
            }
            return;
        }

        let reach = reach_cells as i64;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    let key = match (
                        base[0].checked_add(dx),
                        base[1].checked_add(dy),
                        base[2].checked_add(dz),
                    ) {
                        (Some(x), Some(y), Some(z)) => [x, y, z],
                        _ => continue,
                    };
                    if let Some(bucket) = self.cells.get(&key) {
                        self.scan(bucket, center, r2, visitor);
                    }
                }
            }
        }
    }
}

impl UniformGridIndex {
    fn scan(&self, bucket: &[usize], center: &Vector3<f64>, r2: f64, visitor: &mut dyn FnMut(usize)) {
        for &slot in bucket {
            if (self.positions[slot] - center).norm_squared() <= r2 {
                visitor(slot);
            }
        }
    }
}

/// Frozen view of one agent for the read phase of a tick.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotEntry {
    pub handle: AgentHandle,
    pub kind: AgentKind,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

/// Consistent snapshot of every agent plus an index over their positions.
///
/// Built once per tick before any agent moves.
#[derive(Debug)]
pub struct SpatialIndex {
    entries: Vec<SnapshotEntry>,
    slots: SecondaryMap<AgentHandle, usize>,
    index: Box<dyn NeighborhoodIndex>,
}

impl SpatialIndex {
    pub fn new(strategy: IndexStrategy) -> Self {
        Self {
            entries: Vec::new(),
            slots: SecondaryMap::new(),
            index: strategy.build(),
        }
    }

    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = SnapshotEntry>,
    {
        self.entries.clear();
        self.slots.clear();
        self.entries.extend(entries);
        for (slot, e) in self.entries.iter().enumerate() {
            self.slots.insert(e.handle, slot);
        }
        let positions: Vec<Vector3<f64>> = self.entries.iter().map(|e| e.position).collect();
        self.index.rebuild(&positions);
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn entries(&self) -> &[SnapshotEntry] { &self.entries }

    pub fn get(&self, handle: AgentHandle) -> Option<&SnapshotEntry> {
        self.slots.get(handle).map(|&slot| &self.entries[slot])
    }

    pub fn position_of(&self, handle: AgentHandle) -> Option<Vector3<f64>> {
        self.get(handle).map(|e| e.position)
    }

    /// Agents of `kind` within `radius` of `center`, optionally excluding one handle.
    /// No ordering guarantee.
    pub fn neighbors(
        &self,
        center: &Vector3<f64>,
        radius: f64,
        exclude: Option<AgentHandle>,
        kind: Option<AgentKind>,
    ) -> Vec<&SnapshotEntry> {
        let mut out = Vec::new();
        self.index.within(center, radius, &mut |slot| {
            let e = &self.entries[slot];
            if Some(e.handle) == exclude {
                return;
            }
            if kind.is_some_and(|k| k != e.kind) {
                return;
            }
            out.push(e);
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn layout() -> (Vec<AgentHandle>, Vec<SnapshotEntry>) {
        let mut keys: SlotMap<AgentHandle, ()> = SlotMap::with_key();
        let points = [
            (Vector3::new(0.0, 0.0, 0.0), AgentKind::FlockMember),
            (Vector3::new(1.0, 0.0, 0.0), AgentKind::FlockMember),
            (Vector3::new(-1.0, 0.0, 0.0), AgentKind::FlockMember),
            (Vector3::new(0.0, 0.0, 4.9), AgentKind::Human),
            (Vector3::new(8.0, 8.0, 8.0), AgentKind::FlockMember),
            (Vector3::new(-5.2, 0.0, 0.0), AgentKind::Zombie),
        ];
        let mut handles = Vec::new();
        let mut entries = Vec::new();
        for (position, kind) in points {
            let handle = keys.insert(());
            handles.push(handle);
            entries.push(SnapshotEntry { handle, kind, position, velocity: Vector3::zeros() });
        }
        (handles, entries)
    }

    fn sorted(found: Vec<&SnapshotEntry>) -> Vec<AgentHandle> {
        let mut out: Vec<AgentHandle> = found.into_iter().map(|e| e.handle).collect();
        out.sort();
        out
    }

    fn check_strategy(strategy: IndexStrategy) {
        let (h, entries) = layout();
        let mut index = SpatialIndex::new(strategy);
        index.rebuild(entries);

        let origin = Vector3::zeros();
        assert_eq!(
            sorted(index.neighbors(&origin, 5.0, Some(h[0]), None)),
            vec![h[1], h[2], h[3]]
        );
        assert_eq!(
            sorted(index.neighbors(&origin, 5.0, Some(h[0]), Some(AgentKind::FlockMember))),
            vec![h[1], h[2]]
        );
        assert_eq!(
            sorted(index.neighbors(&origin, 5.5, None, Some(AgentKind::Zombie))),
            vec![h[5]]
        );
        assert!(index.neighbors(&Vector3::new(30.0, 0.0, 0.0), 1.0, None, None).is_empty());
    }

    #[test]
    fn brute_force_finds_neighbors_in_known_layout() {
        check_strategy(IndexStrategy::BruteForce);
    }

    #[test]
    fn grid_finds_neighbors_in_known_layout() {
        check_strategy(IndexStrategy::UniformGrid { cell_size: 2.0 });
        check_strategy(IndexStrategy::UniformGrid { cell_size: 0.5 });
        check_strategy(IndexStrategy::UniformGrid { cell_size: 50.0 });
    }

    #[test]
    fn grid_checks_across_cell_boundaries() {
        let mut keys: SlotMap<AgentHandle, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let mut index = SpatialIndex::new(IndexStrategy::UniformGrid { cell_size: 2.0 });
        index.rebuild([
            SnapshotEntry { handle: a, kind: AgentKind::Human, position: Vector3::new(1.9, 0.0, 0.0), velocity: Vector3::zeros() },
            SnapshotEntry { handle: b, kind: AgentKind::Human, position: Vector3::new(2.1, 0.0, 0.0), velocity: Vector3::zeros() },
        ]);
        assert_eq!(sorted(index.neighbors(&Vector3::new(1.9, 0.0, 0.0), 0.25, Some(a), None)), vec![b]);
    }

    #[test]
    fn dense_grid_agrees_with_brute_force() {
        let mut keys: SlotMap<AgentHandle, ()> = SlotMap::with_key();
        let mut entries = Vec::new();
        for x in 0..10 {
            for y in 0..10 {
                for z in 0..10 {
                    entries.push(SnapshotEntry {
                        handle: keys.insert(()),
                        kind: AgentKind::FlockMember,
                        position: Vector3::new(x as f64, y as f64, z as f64) * 1.1,
                        velocity: Vector3::zeros(),
                    });
                }
            }
        }
        let mut grid = SpatialIndex::new(IndexStrategy::UniformGrid { cell_size: 1.0 });
        let mut brute = SpatialIndex::new(IndexStrategy::BruteForce);
        grid.rebuild(entries.clone());
        brute.rebuild(entries);

        for center in [Vector3::new(5.0, 5.0, 5.0), Vector3::new(0.0, 0.0, 0.0), Vector3::new(9.9, 2.2, 7.7)] {
            assert_eq!(
                sorted(grid.neighbors(&center, 1.5, None, None)),
                sorted(brute.neighbors(&center, 1.5, None, None))
            );
        }
    }

    #[test]
    fn empty_population_returns_empty() {
        let index = SpatialIndex::new(IndexStrategy::default());
        assert!(index.is_empty());
        assert!(index.neighbors(&Vector3::zeros(), 10.0, None, None).is_empty());
    }

    #[test]
    fn huge_radius_and_tiny_cells_do_not_overflow() {
        let (h, entries) = layout();
        for strategy in [
            IndexStrategy::UniformGrid { cell_size: DEFAULT_GRID_CELL_SIZE },
            IndexStrategy::UniformGrid { cell_size: 1.0e-300 },
        ] {
            let mut index = SpatialIndex::new(strategy);
            index.rebuild(entries.clone());
            assert_eq!(sorted(index.neighbors(&Vector3::zeros(), 1.0e20, None, None)), sorted_handles(&h));
            assert_eq!(
                sorted(index.neighbors(&Vector3::zeros(), 5.0, Some(h[0]), None)),
                vec![h[1], h[2], h[3]]
            );
        }
    }

    fn sorted_handles(handles: &[AgentHandle]) -> Vec<AgentHandle> {
        let mut out = handles.to_vec();
        out.sort();
        out
    }

    #[test]
    fn grid_cell_size_must_be_positive() {
        assert!(IndexStrategy::UniformGrid { cell_size: 0.0 }.validate().is_err());
        assert!(IndexStrategy::BruteForce.validate().is_ok());
    }
}
