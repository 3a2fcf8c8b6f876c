//! Interest management (C9): who needs to hear about what.
//!
//! One channel, one rule: a player hears about anything within
//! `interest_radius(radar_tier)` of their ship, recomputed from
//! [`crate::spatial::SpatialGrid`] every tick rather than tracked as a
//! standing subscription.

use crate::constants::interest_radius;
use crate::spatial::SpatialGrid;
use crate::types::{EntityId, EntityKind, Position};

/// Returns every live entity of `kind` within `observer`'s radar range at
/// `radar_tier`, excluding `observer` itself.
pub fn entities_in_interest(
    grid: &SpatialGrid,
    observer: EntityId,
    observer_pos: Position,
    radar_tier: u8,
    kind: EntityKind,
) -> Vec<EntityId> {
    let radius = interest_radius(radar_tier);
    grid.query_kind(observer_pos, radius, kind)
        .into_iter()
        .filter(|&id| id != observer)
        .collect()
}

/// Returns every live entity of any kind within range, for snapshot-style
/// full state sync (e.g. right after authentication).
pub fn all_in_interest(
    grid: &SpatialGrid,
    observer: EntityId,
    observer_pos: Position,
    radar_tier: u8,
) -> Vec<EntityId> {
    let radius = interest_radius(radar_tier);
    grid.query(observer_pos, radius)
        .into_iter()
        .filter(|&id| id != observer)
        .collect()
}

/// Given every ship position, returns the subset of `candidate_ids` whose
/// owner currently has `target` within interest range. Used by the
/// broadcast fan-out to decide which connections receive a given event
/// without re-querying the grid once per recipient.
pub fn observers_of(
    grid: &SpatialGrid,
    target_pos: Position,
    candidates: &[(EntityId, Position, u8)],
) -> Vec<EntityId> {
    candidates
        .iter()
        .filter(|(_, pos, radar_tier)| pos.distance(target_pos) <= interest_radius(*radar_tier))
        .map(|(id, _, _)| *id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_excludes_self_and_far_entities() {
        let grid = SpatialGrid::new(1000.0);
        let observer = EntityId::next();
        let near = EntityId::next();
        let far = EntityId::next();
        grid.insert(observer, EntityKind::Ship, Position::new(0.0, 0.0));
        grid.insert(near, EntityKind::Ship, Position::new(100.0, 0.0));
        grid.insert(far, EntityKind::Ship, Position::new(1_000_000.0, 0.0));

        let seen = entities_in_interest(&grid, observer, Position::new(0.0, 0.0), 1, EntityKind::Ship);
        assert_eq!(seen, vec![near]);
    }

    #[test]
    fn observers_of_filters_by_individual_radar_tier() {
        let target = Position::new(0.0, 0.0);
        let close = EntityId::next();
        let weak_radar = EntityId::next();
        let candidates = vec![
            (close, Position::new(50.0, 0.0), 5),
            (weak_radar, Position::new(5_000.0, 0.0), 1),
        ];
        let observers = observers_of(&SpatialGrid::new(1000.0), target, &candidates);
        assert_eq!(observers, vec![close]);
    }
}
