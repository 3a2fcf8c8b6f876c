//! Orbital parameters and the on-demand position function.
//!
//! `pos(t) = parent + (cos(theta(t)), sin(theta(t))) * radius`, where
//! `theta(t) = start_phase + angular_velocity * t`. Nothing about an
//! orbit is stored as a position — only the parameters that let any
//! process reconstruct the same position from the same wall-clock time.

use serde::{Deserialize, Serialize};
use starhold_core::types::Position;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalParams {
    pub radius: f64,
    pub eccentricity: f64,
    pub angular_velocity: f64,
    pub start_phase: f64,
}

impl OrbitalParams {
    /// Position at `t` seconds since the epoch, relative to `parent`.
    pub fn position_at(&self, parent: Position, t_seconds: f64) -> Position {
        let theta = self.start_phase + self.angular_velocity * t_seconds;
        let semi_minor = self.radius * (1.0 - self.eccentricity * self.eccentricity).sqrt();
        Position::new(
            parent.x + theta.cos() * self.radius,
            parent.y + theta.sin() * semi_minor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_is_deterministic_given_time() {
        let orbit = OrbitalParams {
            radius: 100.0,
            eccentricity: 0.1,
            angular_velocity: 0.5,
            start_phase: 0.0,
        };
        let parent = Position::new(0.0, 0.0);
        assert_eq!(orbit.position_at(parent, 10.0), orbit.position_at(parent, 10.0));
    }

    #[test]
    fn circular_orbit_stays_on_radius() {
        let orbit = OrbitalParams {
            radius: 50.0,
            eccentricity: 0.0,
            angular_velocity: 1.0,
            start_phase: 0.0,
        };
        let pos = orbit.position_at(Position::new(0.0, 0.0), 3.0);
        assert!((pos.distance(Position::new(0.0, 0.0)) - 50.0).abs() < 1e-9);
    }
}
