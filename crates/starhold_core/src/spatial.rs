//! Uniform-grid spatial index over the world.
//!
//! Generalizes the lock-free `DashMap`-keyed registries used throughout the
//! event system (one handler list per event key) to "one set of live
//! entity ids per grid cell". Cell size is fixed at `SECTOR_SIZE` so grid
//! cells line up with procedural sectors.

use crate::types::{EntityId, EntityKind, Position};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

pub type CellCoord = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct Tracked {
    kind: EntityKind,
    pos: Position,
}

/// Concurrent uniform grid. Reads (queries) and writes (insert/move/remove)
/// can happen from different tasks without an external lock: `DashMap`
/// shards its buckets internally, the same trade the event system makes to
/// avoid a single global `RwLock`.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: DashMap<CellCoord, Arc<DashSet<EntityId>>>,
    entities: DashMap<EntityId, Tracked>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: DashMap::new(),
            entities: DashMap::new(),
        }
    }

    fn cell_of(&self, pos: Position) -> CellCoord {
        pos.sector(self.cell_size)
    }

    fn cell_set(&self, cell: CellCoord) -> Arc<DashSet<EntityId>> {
        self.cells
            .entry(cell)
            .or_insert_with(|| Arc::new(DashSet::new()))
            .clone()
    }

    /// Registers a new entity at `pos`. O(1) amortized.
    pub fn insert(&self, id: EntityId, kind: EntityKind, pos: Position) {
        let cell = self.cell_of(pos);
        self.cell_set(cell).insert(id);
        self.entities.insert(id, Tracked { kind, pos });
    }

    /// Updates an entity's position, rebucketing only if the cell changed.
    pub fn move_entity(&self, id: EntityId, new_pos: Position) {
        let Some(mut tracked) = self.entities.get_mut(&id) else {
            return;
        };
        let old_cell = self.cell_of(tracked.pos);
        let new_cell = self.cell_of(new_pos);
        tracked.pos = new_pos;
        drop(tracked);

        if old_cell != new_cell {
            if let Some(set) = self.cells.get(&old_cell) {
                set.remove(&id);
            }
            self.cell_set(new_cell).insert(id);
        }
    }

    /// Removes an entity entirely. O(1).
    pub fn remove(&self, id: EntityId) {
        if let Some((_, tracked)) = self.entities.remove(&id) {
            let cell = self.cell_of(tracked.pos);
            if let Some(set) = self.cells.get(&cell) {
                set.remove(&id);
            }
        }
    }

    pub fn position_of(&self, id: EntityId) -> Option<Position> {
        self.entities.get(&id).map(|t| t.pos)
    }

    /// All live ids within `radius` of `center`, visiting at most
    /// `((2r/cell)+1)^2` cells.
    pub fn query(&self, center: Position, radius: f64) -> Vec<EntityId> {
        let (cx, cy) = self.cell_of(center);
        let span = (radius / self.cell_size).ceil() as i32;
        let mut out = Vec::new();
        for dx in -span..=span {
            for dy in -span..=span {
                let Some(set) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for id in set.iter() {
                    if let Some(tracked) = self.entities.get(&id) {
                        if tracked.pos.distance(center) <= radius {
                            out.push(*id);
                        }
                    }
                }
            }
        }
        out
    }

    /// Same as [`query`](Self::query) but restricted to one entity kind.
    pub fn query_kind(&self, center: Position, radius: f64, kind: EntityKind) -> Vec<EntityId> {
        self.query(center, radius)
            .into_iter()
            .filter(|id| self.entities.get(id).map(|t| t.kind == kind).unwrap_or(false))
            .collect()
    }

    /// Outward ring (Moore neighborhood) expansion until an entity of
    /// `kind` is found or `max_rings` is exceeded. Ties broken by ascending
    /// entity id to keep behavior reproducible.
    pub fn nearest(&self, center: Position, kind: EntityKind, max_rings: i32) -> Option<EntityId> {
        let (cx, cy) = self.cell_of(center);
        for ring in 0..=max_rings {
            let mut candidates: Vec<(f64, EntityId)> = Vec::new();
            for dx in -ring..=ring {
                for dy in -ring..=ring {
                    if ring > 0 && dx.abs() != ring && dy.abs() != ring {
                        continue; // only the new outer ring, inner cells already scanned
                    }
                    let Some(set) = self.cells.get(&(cx + dx, cy + dy)) else {
                        continue;
                    };
                    for id in set.iter() {
                        if let Some(tracked) = self.entities.get(&id) {
                            if tracked.kind == kind {
                                candidates.push((tracked.pos.distance(center), *id));
                            }
                        }
                    }
                }
            }
            if !candidates.is_empty() {
                candidates.sort_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.1.cmp(&b.1))
                });
                return Some(candidates[0].1);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_query_remove_roundtrip() {
        let grid = SpatialGrid::new(100.0);
        let a = EntityId::next();
        let b = EntityId::next();
        grid.insert(a, EntityKind::Ship, Position::new(0.0, 0.0));
        grid.insert(b, EntityKind::Ship, Position::new(50.0, 0.0));

        let hits = grid.query(Position::new(0.0, 0.0), 60.0);
        assert_eq!(hits.len(), 2);

        grid.remove(b);
        let hits = grid.query(Position::new(0.0, 0.0), 60.0);
        assert_eq!(hits, vec![a]);
    }

    #[test]
    fn move_rebuckets_only_on_cell_change() {
        let grid = SpatialGrid::new(10.0);
        let a = EntityId::next();
        grid.insert(a, EntityKind::Ship, Position::new(0.0, 0.0));
        grid.move_entity(a, Position::new(500.0, 500.0));
        assert_eq!(grid.position_of(a), Some(Position::new(500.0, 500.0)));
        assert!(grid.query(Position::new(0.0, 0.0), 5.0).is_empty());
        assert_eq!(grid.query(Position::new(500.0, 500.0), 5.0), vec![a]);
    }

    #[test]
    fn nearest_breaks_ties_by_ascending_id() {
        let grid = SpatialGrid::new(50.0);
        let ids: Vec<EntityId> = (0..3)
            .map(|_| EntityId::next())
            .collect();
        for id in &ids {
            grid.insert(*id, EntityKind::Npc, Position::new(10.0, 0.0));
        }
        let nearest = grid.nearest(Position::new(0.0, 0.0), EntityKind::Npc, 5);
        assert_eq!(nearest, Some(ids[0]));
    }

    #[test]
    fn nearest_expands_rings_until_found() {
        let grid = SpatialGrid::new(10.0);
        let far = EntityId::next();
        grid.insert(far, EntityKind::Wreckage, Position::new(95.0, 0.0));
        assert_eq!(
            grid.nearest(Position::new(0.0, 0.0), EntityKind::Wreckage, 3),
            None
        );
        assert_eq!(
            grid.nearest(Position::new(0.0, 0.0), EntityKind::Wreckage, 10),
            Some(far)
        );
    }
}
