//! NPC state and AI.
//!
//! One state machine shape for every faction — `Idle -> Patrol -> Engage
//! -> {Flank, Retreat} -> Dead`, monotonic toward `Dead` — with the
//! per-faction policy only deciding *when* to transition and what to do
//! in `Engage`/`Flank`/`Retreat`. Keeps the tick loop's NPC phase a single
//! dispatch instead of one match arm per faction elsewhere.

use starhold_core::constants::{interest_radius, BASE_SPEED, TICK_MS};
use starhold_core::{EntityId, Position, Velocity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    Raider,
    PatrolDrone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    Idle,
    Patrol,
    Engage,
    Flank,
    Retreat,
    Dead,
}

#[derive(Debug, Clone)]
pub struct Npc {
    pub id: EntityId,
    pub faction: Faction,
    pub position: Position,
    pub velocity: Velocity,
    pub hull_current: f64,
    pub hull_max: f64,
    pub state: AiState,
    pub target: Option<EntityId>,
    pub home: Position,
    pub last_fire_tick: Option<u64>,
    /// Loot content credited to the wreckage this NPC spawns on death.
    pub bounty_credits: i64,
}

impl Npc {
    pub fn is_alive(&self) -> bool {
        self.state != AiState::Dead
    }
}

/// Detection range used for target acquisition; independent of any
/// player's radar tier since NPCs have no radar component.
const NPC_SIGHT_RANGE: f64 = 400.0;
const ENGAGE_RANGE: f64 = 350.0;
const FLEE_HULL_FRACTION: f64 = 0.25;
const PATROL_RADIUS: f64 = 200.0;

/// One AI tick for `npc`. `nearest_target` is the closest living player
/// ship within sight range, already resolved by the engine via the
/// spatial index (kept out of this function so AI logic stays a pure,
/// unit-testable state transition rather than reaching into the grid
/// itself).
pub fn tick_npc(
    npc: &mut Npc,
    now_tick: u64,
    nearest_target: Option<(EntityId, Position)>,
    dt_secs: f64,
) -> NpcIntent {
    if !npc.is_alive() {
        return NpcIntent::default();
    }

    let fraction_hull = npc.hull_current / npc.hull_max.max(1.0);

    match npc.state {
        AiState::Idle | AiState::Patrol => {
            if let Some((target_id, target_pos)) = nearest_target {
                if npc.position.distance(target_pos) <= NPC_SIGHT_RANGE {
                    npc.target = Some(target_id);
                    npc.state = AiState::Engage;
                } else {
                    npc.state = AiState::Patrol;
                }
            }
        }
        AiState::Engage | AiState::Flank => {
            if fraction_hull <= FLEE_HULL_FRACTION {
                npc.state = AiState::Retreat;
                npc.target = None;
            } else if nearest_target.is_none() {
                npc.state = AiState::Patrol;
                npc.target = None;
            } else if npc.faction == Faction::Raider
                && npc.position.distance(nearest_target.unwrap().1) < ENGAGE_RANGE * 0.5
            {
                npc.state = AiState::Flank;
            } else {
                npc.state = AiState::Engage;
            }
        }
        AiState::Retreat => {
            if fraction_hull > FLEE_HULL_FRACTION * 1.5 {
                npc.state = AiState::Patrol;
            }
        }
        AiState::Dead => {}
    }

    let speed = BASE_SPEED * 0.8;
    let desired = match npc.state {
        AiState::Idle => Velocity::zero(),
        AiState::Patrol => patrol_velocity(npc, now_tick, speed),
        AiState::Engage => seek_velocity(npc.position, nearest_target.map(|t| t.1), speed),
        AiState::Flank => {
            let Some((_, target_pos)) = nearest_target else {
                return NpcIntent::default();
            };
            flank_velocity(npc.position, target_pos, speed)
        }
        AiState::Retreat => flee_velocity(npc.position, npc.home, speed),
        AiState::Dead => Velocity::zero(),
    };

    npc.velocity = desired;
    npc.position.x += npc.velocity.vx * dt_secs;
    npc.position.y += npc.velocity.vy * dt_secs;

    let should_fire = matches!(npc.state, AiState::Engage | AiState::Flank)
        && nearest_target
            .map(|(_, p)| npc.position.distance(p) <= ENGAGE_RANGE)
            .unwrap_or(false)
        && npc
            .last_fire_tick
            .map(|last| (now_tick - last) * TICK_MS >= 1200)
            .unwrap_or(true);

    if should_fire {
        npc.last_fire_tick = Some(now_tick);
    }

    NpcIntent {
        fire_at: should_fire.then_some(npc.target).flatten(),
    }
}

#[derive(Debug, Default)]
pub struct NpcIntent {
    pub fire_at: Option<EntityId>,
}

fn seek_velocity(from: Position, to: Option<Position>, speed: f64) -> Velocity {
    let Some(to) = to else { return Velocity::zero() };
    direction_velocity(from, to, speed)
}

fn flank_velocity(from: Position, target: Position, speed: f64) -> Velocity {
    let dx = target.x - from.x;
    let dy = target.y - from.y;
    let perp = Position::new(target.x - dy * 0.3, target.y + dx * 0.3);
    direction_velocity(from, perp, speed)
}

fn flee_velocity(from: Position, home: Position, speed: f64) -> Velocity {
    direction_velocity(from, home, speed)
}

fn patrol_velocity(npc: &Npc, now_tick: u64, speed: f64) -> Velocity {
    let angle = (now_tick as f64 * TICK_MS as f64 / 4000.0) % std::f64::consts::TAU;
    let target = Position::new(
        npc.home.x + PATROL_RADIUS * angle.cos(),
        npc.home.y + PATROL_RADIUS * angle.sin(),
    );
    direction_velocity(npc.position, target, speed * 0.4)
}

fn direction_velocity(from: Position, to: Position, speed: f64) -> Velocity {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist < 1.0 {
        return Velocity::zero();
    }
    Velocity::new(dx / dist * speed, dy / dist * speed)
}

/// Whether a ship at `radar_tier` would currently see this NPC, used by
/// the interest manager's all-entity snapshot path.
pub fn visible_to(radar_tier: u8, observer_pos: Position, npc_pos: Position) -> bool {
    observer_pos.distance(npc_pos) <= interest_radius(radar_tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc_at(pos: Position) -> Npc {
        Npc {
            id: EntityId::next(),
            faction: Faction::Raider,
            position: pos,
            velocity: Velocity::zero(),
            hull_current: 100.0,
            hull_max: 100.0,
            state: AiState::Patrol,
            target: None,
            home: pos,
            last_fire_tick: None,
            bounty_credits: 50,
        }
    }

    #[test]
    fn engages_when_target_in_sight() {
        let mut npc = npc_at(Position::new(0.0, 0.0));
        let target = Position::new(100.0, 0.0);
        tick_npc(&mut npc, 1, Some((EntityId::next(), target)), 0.05);
        assert_eq!(npc.state, AiState::Engage);
    }

    #[test]
    fn retreats_at_low_hull() {
        let mut npc = npc_at(Position::new(0.0, 0.0));
        npc.state = AiState::Engage;
        npc.hull_current = 10.0;
        let target = Position::new(50.0, 0.0);
        tick_npc(&mut npc, 1, Some((EntityId::next(), target)), 0.05);
        assert_eq!(npc.state, AiState::Retreat);
    }

    #[test]
    fn dead_npc_never_moves_again() {
        let mut npc = npc_at(Position::new(0.0, 0.0));
        npc.state = AiState::Dead;
        let intent = tick_npc(&mut npc, 1, None, 0.05);
        assert!(intent.fire_at.is_none());
        assert_eq!(npc.state, AiState::Dead);
    }
}
