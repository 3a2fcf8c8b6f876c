//! Wormhole transit state machine: a two-phase protocol,
//! `selecting → transit → complete`, cancellable only in `selecting`.

use starhold_core::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum TransitPhase {
    Selecting { destinations: Vec<Destination>, expires_at_tick: u64 },
    Transit { destination: Destination, completes_at_tick: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub id: u64,
    pub sector_x: i32,
    pub sector_y: i32,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Transit {
    pub entry_wormhole_id: String,
    pub phase: TransitPhase,
}

impl Transit {
    pub fn selecting(destinations: Vec<Destination>, entry_wormhole_id: String, expires_at_tick: u64) -> Self {
        Self {
            entry_wormhole_id,
            phase: TransitPhase::Selecting { destinations, expires_at_tick },
        }
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.phase, TransitPhase::Selecting { .. })
    }
}

/// Packs a sector coordinate into the 64-bit id the wire protocol uses for
/// `WormholeDestination::id` / `WormholeSelectDestination::destination_id`,
/// so selecting a destination needs no server-side lookup table — the
/// sector is decoded straight back out of the id (`sector_of`).
pub fn destination_id(sx: i32, sy: i32) -> u64 {
    ((sx as u32 as u64) << 32) | (sy as u32 as u64)
}

pub fn sector_of(id: u64) -> (i32, i32) {
    ((id >> 32) as u32 as i32, (id & 0xFFFF_FFFF) as u32 as i32)
}

/// Outward ring expansion over procedural sector coordinates,
/// distinct from `SpatialGrid::nearest`: wormholes are static procedural
/// content, not runtime entities, so this walks `generate_sector` sector
/// cells directly rather than the spatial index.
pub fn nearest_wormholes(
    seed: u64,
    from_sx: i32,
    from_sy: i32,
    exclude: Option<(i32, i32)>,
    max_count: usize,
    max_rings: i32,
) -> Vec<Destination> {
    let mut found: Vec<(f64, Destination)> = Vec::new();
    let origin = Position::new(
        from_sx as f64 * starhold_core::constants::SECTOR_SIZE,
        from_sy as f64 * starhold_core::constants::SECTOR_SIZE,
    );

    for ring in 0..=max_rings {
        for dx in -ring..=ring {
            for dy in -ring..=ring {
                if ring > 0 && dx.abs() != ring && dy.abs() != ring {
                    continue;
                }
                let (sx, sy) = (from_sx + dx, from_sy + dy);
                if Some((sx, sy)) == exclude {
                    continue;
                }
                let sector = starhold_worldgen::generate_sector(seed, sx, sy);
                if let Some(w) = sector.wormhole {
                    let dist = w.position.distance(origin);
                    found.push((
                        dist,
                        Destination {
                            id: destination_id(sx, sy),
                            sector_x: sx,
                            sector_y: sy,
                            position: w.position,
                        },
                    ));
                }
            }
        }
        if found.len() >= max_count {
            break;
        }
    }

    found.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    found.truncate(max_count);
    found.into_iter().map(|(_, d)| d).collect()
}
