//! Sector content generation: the star/planet/asteroid/wormhole/station
//! mix for one `(sx, sy)` cell of the galaxy.

use crate::mix::mix_seed;
use crate::orbit::OrbitalParams;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use starhold_core::constants::{SECTOR_SIZE, STAR_SIZE_MAX};
use starhold_core::types::{Position, ResourceType};

const KIND_STAR: u8 = 0;
const KIND_PLANET: u8 = 1;
const KIND_ASTEROID: u8 = 2;
const KIND_WORMHOLE: u8 = 3;
const KIND_STATION: u8 = 4;

const STAR_PROBABILITY: f64 = 0.35;
const WORMHOLE_PROBABILITY: f64 = 0.08;
const STATION_PROBABILITY: f64 = 0.05;
const MAX_PLANETS: u32 = 4;
const MAX_ASTEROIDS: u32 = 12;

/// Exclusion radius around a sector's origin corner within which no star
/// may be centered, so deep-space spawn (`> STAR_SIZE_MAX * 2` from any
/// star, per the ship-position invariant) always has room.
const ORIGIN_EXCLUSION: f64 = STAR_SIZE_MAX * 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub id_index: u32,
    pub position: Position,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id_index: u32,
    pub orbit: OrbitalParams,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asteroid {
    pub id_index: u32,
    pub resource: ResourceType,
    pub yield_units: u32,
    pub orbit: Option<OrbitalParams>,
    pub fixed_position: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wormhole {
    pub id_index: u32,
    pub position: Position,
    pub size: f64,
    /// Lore hint only; actual destination selection is nearest-wormhole
    /// search at transit entry time, never this field.
    pub destination_sector_hint: (i32, i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id_index: u32,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub sx: i32,
    pub sy: i32,
    pub star: Option<Star>,
    pub planets: Vec<Planet>,
    pub asteroids: Vec<Asteroid>,
    pub wormhole: Option<Wormhole>,
    pub station: Option<Station>,
}

impl Sector {
    fn object_id(&self, kind: &str, index: u32) -> String {
        format!("sector_{}_{}_{}_{}", self.sx, self.sy, kind, index)
    }

    /// Stable ids for every object in the sector, in a fixed order, used
    /// both by tests and by the gateway when resolving a client-supplied
    /// object id back to its generated content.
    pub fn object_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if self.star.is_some() {
            ids.push(self.object_id("star", 0));
        }
        for p in &self.planets {
            ids.push(self.object_id("planet", p.id_index));
        }
        for a in &self.asteroids {
            ids.push(self.object_id("asteroid", a.id_index));
        }
        if let Some(w) = &self.wormhole {
            ids.push(self.object_id("wormhole", w.id_index));
        }
        if let Some(s) = &self.station {
            ids.push(self.object_id("station", s.id_index));
        }
        ids
    }

    /// The sector's origin corner in world space.
    pub fn origin(&self) -> Position {
        Position::new(self.sx as f64 * SECTOR_SIZE, self.sy as f64 * SECTOR_SIZE)
    }
}

fn rng_for(seed: u64, sx: i32, sy: i32, kind: u8, index: u32) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(mix_seed(seed, sx, sy, kind, index))
}

/// Pure function `(seed, sx, sy) -> Sector`. Bit-identical across
/// processes given the same inputs.
pub fn generate_sector(seed: u64, sx: i32, sy: i32) -> Sector {
    let origin = Position::new(sx as f64 * SECTOR_SIZE, sy as f64 * SECTOR_SIZE);

    let mut gate = rng_for(seed, sx, sy, KIND_STAR, 0);
    let star = if gate.random::<f64>() < STAR_PROBABILITY {
        let mut r = rng_for(seed, sx, sy, KIND_STAR, 1);
        let local_x = r.random_range(ORIGIN_EXCLUSION..SECTOR_SIZE - ORIGIN_EXCLUSION);
        let local_y = r.random_range(ORIGIN_EXCLUSION..SECTOR_SIZE - ORIGIN_EXCLUSION);
        Some(Star {
            id_index: 0,
            position: Position::new(origin.x + local_x, origin.y + local_y),
            radius: r.random_range(STAR_SIZE_MAX * 0.4..STAR_SIZE_MAX),
        })
    } else {
        None
    };

    let mut planets = Vec::new();
    if let Some(star) = &star {
        let mut count_rng = rng_for(seed, sx, sy, KIND_PLANET, 0);
        let planet_count = count_rng.random_range(0..=MAX_PLANETS);
        for i in 0..planet_count {
            let mut r = rng_for(seed, sx, sy, KIND_PLANET, i + 1);
            let orbit = OrbitalParams {
                radius: star.radius * 3.0 + r.random_range(0.0..SECTOR_SIZE * 0.4),
                eccentricity: r.random_range(0.0..0.3),
                angular_velocity: r.random_range(0.01..0.1) * if r.random_bool(0.5) { 1.0 } else { -1.0 },
                start_phase: r.random_range(0.0..std::f64::consts::TAU),
            };
            planets.push(Planet {
                id_index: i,
                orbit,
                radius: r.random_range(8.0..30.0),
            });
        }
    }

    let mut asteroids = Vec::new();
    {
        let mut count_rng = rng_for(seed, sx, sy, KIND_ASTEROID, 0);
        let asteroid_count = count_rng.random_range(0..=MAX_ASTEROIDS);
        const RESOURCES: [ResourceType; 7] = [
            ResourceType::Iron,
            ResourceType::Copper,
            ResourceType::Titanium,
            ResourceType::Gold,
            ResourceType::Platinum,
            ResourceType::IceCrystal,
            ResourceType::ExoticMatter,
        ];
        for i in 0..asteroid_count {
            let mut r = rng_for(seed, sx, sy, KIND_ASTEROID, i + 1);
            let resource = RESOURCES[r.random_range(0..RESOURCES.len())];
            let belt = star.is_some() && r.random_bool(0.6);
            let (orbit, fixed_position) = if belt {
                let star = star.as_ref().unwrap();
                (
                    Some(OrbitalParams {
                        radius: star.radius * 5.0 + r.random_range(0.0..SECTOR_SIZE * 0.45),
                        eccentricity: r.random_range(0.0..0.4),
                        angular_velocity: r.random_range(0.005..0.05)
                            * if r.random_bool(0.5) { 1.0 } else { -1.0 },
                        start_phase: r.random_range(0.0..std::f64::consts::TAU),
                    }),
                    None,
                )
            } else {
                (
                    None,
                    Some(Position::new(
                        origin.x + r.random_range(0.0..SECTOR_SIZE),
                        origin.y + r.random_range(0.0..SECTOR_SIZE),
                    )),
                )
            };
            asteroids.push(Asteroid {
                id_index: i,
                resource,
                yield_units: r.random_range(20..200),
                orbit,
                fixed_position,
            });
        }
    }

    let mut wormhole_gate = rng_for(seed, sx, sy, KIND_WORMHOLE, 0);
    let wormhole = if wormhole_gate.random::<f64>() < WORMHOLE_PROBABILITY {
        let mut r = rng_for(seed, sx, sy, KIND_WORMHOLE, 1);
        Some(Wormhole {
            id_index: 0,
            position: Position::new(
                origin.x + r.random_range(0.0..SECTOR_SIZE),
                origin.y + r.random_range(0.0..SECTOR_SIZE),
            ),
            size: r.random_range(15.0..30.0),
            destination_sector_hint: (
                sx + r.random_range(-3..=3),
                sy + r.random_range(-3..=3),
            ),
        })
    } else {
        None
    };

    let mut station_gate = rng_for(seed, sx, sy, KIND_STATION, 0);
    let station = if station_gate.random::<f64>() < STATION_PROBABILITY {
        let mut r = rng_for(seed, sx, sy, KIND_STATION, 1);
        Some(Station {
            id_index: 0,
            position: Position::new(
                origin.x + r.random_range(0.0..SECTOR_SIZE),
                origin.y + r.random_range(0.0..SECTOR_SIZE),
            ),
        })
    } else {
        None
    };

    Sector {
        sx,
        sy,
        star,
        planets,
        asteroids,
        wormhole,
        station,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_kept_clear_of_origin_exclusion_zone() {
        for sx in -5..5 {
            for sy in -5..5 {
                let sector = generate_sector(1, sx, sy);
                if let Some(star) = sector.star {
                    let origin = sector.origin();
                    let local_x = star.position.x - origin.x;
                    let local_y = star.position.y - origin.y;
                    assert!(local_x >= ORIGIN_EXCLUSION - 1e-6);
                    assert!(local_y >= ORIGIN_EXCLUSION - 1e-6);
                }
            }
        }
    }

    #[test]
    fn planets_only_exist_with_a_star() {
        let sector = generate_sector(99, 10, 10);
        if sector.star.is_none() {
            assert!(sector.planets.is_empty());
        }
    }

    #[test]
    fn object_ids_are_stably_formatted() {
        let sector = generate_sector(42, 3, -1);
        for id in sector.object_ids() {
            assert!(id.starts_with("sector_3_-1_"));
        }
    }
}
