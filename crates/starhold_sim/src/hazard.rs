//! Environmental hazards: star-proximity damage. The
//! gradient ramps from zero at `STAR_SIZE_MAX * SAFE_MULTIPLIER` down to
//! `MAX_DAMAGE_PER_SEC` at the star's surface.

use starhold_core::constants::STAR_SIZE_MAX;

const SAFE_MULTIPLIER: f64 = 3.0;
const MAX_DAMAGE_PER_SEC: f64 = 20.0;

/// Hull damage per second for a ship `distance` away from a star of
/// `star_radius`. Zero once clear of the danger zone.
pub fn star_proximity_damage_per_sec(distance: f64, star_radius: f64) -> f64 {
    let danger_edge = star_radius.max(STAR_SIZE_MAX) * SAFE_MULTIPLIER;
    if distance >= danger_edge {
        return 0.0;
    }
    let depth = (danger_edge - distance.max(star_radius)) / (danger_edge - star_radius).max(1.0);
    MAX_DAMAGE_PER_SEC * depth.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_damage_outside_danger_zone() {
        assert_eq!(star_proximity_damage_per_sec(1000.0, 80.0), 0.0);
    }

    #[test]
    fn damage_increases_closer_to_star() {
        let far = star_proximity_damage_per_sec(200.0, 80.0);
        let near = star_proximity_damage_per_sec(90.0, 80.0);
        assert!(near > far);
    }
}
