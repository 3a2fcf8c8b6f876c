//! Shared tier tables, world constants, and input validators (C11).
//!
//! Tier tables are authored here, not lifted from a source file — the
//! retrieval pack's `original_source` was filtered down to zero kept files,
//! so `ENERGY_CORE.BOOST.*`, `CARGO_CAPACITY[tier]`, and
//! `UPGRADE_REQUIREMENTS` have no ground truth to copy. See the design notes for
//! an explicit authored decision. Values are internally consistent
//! (monotonically increasing, `value(tier) = base * MULT^(tier-1)` except
//! where a table is called out) and exercised by the tests below.

/// `value(tier) = base * TIER_MULTIPLIER^(tier-1)`, the default scaling law
/// for anything not covered by an explicit table.
pub const TIER_MULTIPLIER: f64 = 1.5;
pub const SHIELD_TIER_MULTIPLIER: f64 = 1.4;

pub const MIN_TIER: u8 = 1;
pub const MAX_TIER: u8 = 5;

pub const DEFAULT_HULL_HP: f64 = 100.0;
pub const DEFAULT_SHIELD_HP: f64 = 50.0;

pub const SECTOR_SIZE: f64 = 1000.0;
pub const STAR_SIZE_MAX: f64 = 80.0;
pub const BASE_RADAR_RANGE: f64 = 500.0;
pub const BASE_SPEED: f64 = 120.0;

pub const BASE_MINING_TIME_MS: u64 = 4_000;
pub const BASE_MINING_YIELD: u32 = 5;
pub const MINING_RANGE: f64 = 200.0;

pub const WORMHOLE_RANGE: f64 = 50.0;
pub const SELECTION_TIMEOUT_MS: u64 = 15_000;
pub const TRANSIT_DURATION_MS: u64 = 5_000;
pub const EXIT_OFFSET: f64 = 60.0;
pub const MAX_WORMHOLE_DESTINATIONS: usize = 5;
pub const WORMHOLE_RING_SEARCH_LIMIT: i32 = 20;

pub const RESPAWN_INVULNERABILITY_MS: u64 = 3_000;
pub const SHIELD_REGEN_COOLDOWN_MS: u64 = 4_000;
pub const SHIELD_REGEN_BASE_PER_SEC: f64 = 4.0;

pub const TICK_MS: u64 = 50;
pub const PERSIST_MS: u64 = 5_000;
pub const MAX_CATCHUP_TICKS: u32 = 3;

pub const LOOT_COLLECT_TIME_MS: u64 = 2_000;
pub const WRECKAGE_DECAY_MS: u64 = 120_000;

pub const MAX_FLEET_MEMBERS: usize = 4;
pub const POSITION_SYNC_RATE_MS: u64 = 100;

/// Maximum cargo units a ship of `cargo_tier` can carry.
pub fn cargo_capacity(cargo_tier: u8) -> u32 {
    const TABLE: [u32; 5] = [50, 100, 200, 400, 800];
    TABLE[tier_index(cargo_tier)]
}

/// Weapon cooldown reduction granted by energy core tier, applied as
/// `cooldown *= (1.0 - reduction)`.
pub fn energy_core_cooldown_reduction(energy_core_tier: u8) -> f64 {
    const TABLE: [f64; 5] = [0.0, 0.05, 0.10, 0.18, 0.28];
    TABLE[tier_index(energy_core_tier)]
}

/// Additional shield regen per second granted by energy core tier.
pub fn energy_core_shield_bonus(energy_core_tier: u8) -> f64 {
    const TABLE: [f64; 5] = [0.0, 1.0, 2.0, 3.5, 5.0];
    TABLE[tier_index(energy_core_tier)]
}

/// Boost speed multiplier and duration/cooldown, gated on energy core tier.
pub struct BoostProfile {
    pub speed_multiplier: f64,
    pub duration_ms: u64,
    pub cooldown_ms: u64,
}

pub fn energy_core_boost(energy_core_tier: u8) -> BoostProfile {
    const SPEED: [f64; 5] = [1.3, 1.4, 1.55, 1.7, 1.9];
    const DURATION_MS: [u64; 5] = [800, 900, 1_000, 1_200, 1_500];
    const COOLDOWN_MS: [u64; 5] = [6_000, 5_500, 5_000, 4_000, 3_000];
    let i = tier_index(energy_core_tier);
    BoostProfile {
        speed_multiplier: SPEED[i],
        duration_ms: DURATION_MS[i],
        cooldown_ms: COOLDOWN_MS[i],
    }
}

/// Credits + resource cost to upgrade a component from `tier` to `tier+1`.
pub struct UpgradeRequirement {
    pub credits: u64,
    pub resource: crate::types::ResourceType,
    pub resource_quantity: u32,
}

pub fn upgrade_requirement(current_tier: u8) -> Option<UpgradeRequirement> {
    use crate::types::ResourceType::*;
    if current_tier >= MAX_TIER {
        return None;
    }
    const CREDITS: [u64; 4] = [500, 1_500, 4_000, 10_000];
    const RESOURCE: [crate::types::ResourceType; 4] = [Iron, Copper, Titanium, Platinum];
    const QUANTITY: [u32; 4] = [20, 35, 50, 75];
    let i = (current_tier - 1) as usize;
    Some(UpgradeRequirement {
        credits: CREDITS[i],
        resource: RESOURCE[i],
        resource_quantity: QUANTITY[i],
    })
}

fn tier_index(tier: u8) -> usize {
    (tier.clamp(MIN_TIER, MAX_TIER) - 1) as usize
}

/// `base * TIER_MULTIPLIER^(tier-1)`.
pub fn scale(base: f64, tier: u8) -> f64 {
    base * TIER_MULTIPLIER.powi(tier as i32 - 1)
}

pub fn scale_shield(base: f64, tier: u8) -> f64 {
    base * SHIELD_TIER_MULTIPLIER.powi(tier as i32 - 1)
}

/// `BASE × MULT^(tier-1)` maxima — reconciled against a ship row on login.
pub fn hull_max(hull_tier: u8) -> f64 {
    scale(DEFAULT_HULL_HP, hull_tier)
}

pub fn shield_max(shield_tier: u8) -> f64 {
    scale_shield(DEFAULT_SHIELD_HP, shield_tier)
}

pub fn mining_duration_ms(mining_tier: u8) -> u64 {
    (BASE_MINING_TIME_MS as f64 / TIER_MULTIPLIER.powi(mining_tier as i32 - 1)) as u64
}

pub fn mining_yield(mining_tier: u8) -> u32 {
    (scale(BASE_MINING_YIELD as f64, mining_tier).floor() as u32).max(1)
}

pub fn interest_radius(radar_tier: u8) -> f64 {
    scale(BASE_RADAR_RANGE, radar_tier) * 2.0
}

// ---------------------------------------------------------------------
// Input validators
// ---------------------------------------------------------------------

/// `3-20 chars, alnum + underscore`, per the User data model invariant.
pub fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (3..=20).contains(&len)
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_valid_password(password: &str) -> bool {
    (8..=128).contains(&password.len())
}

pub fn is_finite_coordinate(v: f64) -> bool {
    v.is_finite() && v.abs() < 1.0e12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_validation() {
        assert!(is_valid_username("Ada_1"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(&"x".repeat(21)));
    }

    #[test]
    fn tier_scaling_monotonic() {
        for t in 1..MAX_TIER {
            assert!(hull_max(t) < hull_max(t + 1));
            assert!(cargo_capacity(t) < cargo_capacity(t + 1));
            assert!(mining_duration_ms(t) > mining_duration_ms(t + 1));
        }
    }

    #[test]
    fn mining_yield_never_zero() {
        assert_eq!(mining_yield(1), BASE_MINING_YIELD);
        for t in 1..=MAX_TIER {
            assert!(mining_yield(t) >= 1);
        }
    }

    #[test]
    fn interest_radius_matches_formula() {
        assert_eq!(interest_radius(1), BASE_RADAR_RANGE * 2.0);
    }
}
