//! The shared damage model: shield absorbs first,
//! overflow goes to hull, shield regen gates on a post-hit cooldown.

use starhold_core::constants::{
    energy_core_shield_bonus, scale, SHIELD_REGEN_BASE_PER_SEC, SHIELD_REGEN_COOLDOWN_MS, TICK_MS,
};
use starhold_core::WeaponType;

pub const BASE_WEAPON_DAMAGE: f64 = 10.0;
pub const BASE_WEAPON_COOLDOWN_MS: u64 = 600;
pub const BASE_PROJECTILE_SPEED: f64 = 400.0;

pub fn weapon_damage(tier: u8, weapon_type: WeaponType) -> f64 {
    let multiplier = match weapon_type {
        WeaponType::Blaster => 1.0,
        WeaponType::Railgun => 1.8,
        WeaponType::MissileLauncher => 1.4,
        WeaponType::PlasmaCannon => 1.2,
    };
    scale(BASE_WEAPON_DAMAGE, tier) * multiplier
}

pub fn weapon_cooldown_ms(tier: u8, energy_core_tier: u8) -> u64 {
    let base = BASE_WEAPON_COOLDOWN_MS as f64 / starhold_core::constants::TIER_MULTIPLIER.powi(tier as i32 - 1);
    let reduction = starhold_core::constants::energy_core_cooldown_reduction(energy_core_tier);
    (base * (1.0 - reduction)) as u64
}

pub fn projectile_speed(tier: u8) -> f64 {
    scale(BASE_PROJECTILE_SPEED, tier)
}

/// Result of one damage application: what's left, and whether the shield
/// took any of it (drives the client's shield-flash vs. hull-flash vfx).
#[derive(Debug, Clone, Copy)]
pub struct DamageOutcome {
    pub hull_after: f64,
    pub shield_after: f64,
    pub is_shield_hit: bool,
}

/// Applies `amount` damage to `(hull, shield)`, shield-first.
pub fn apply_damage(hull: f64, shield: f64, amount: f64) -> DamageOutcome {
    let absorbed = amount.min(shield);
    let shield_after = shield - absorbed;
    let overflow = amount - absorbed;
    let hull_after = (hull - overflow).max(0.0);
    DamageOutcome {
        hull_after,
        shield_after,
        is_shield_hit: absorbed > 0.0,
    }
}

/// Per-tick shield regeneration, applied only once `last_hit_tick` is more
/// than `SHIELD_REGEN_COOLDOWN_MS` in the past.
pub fn regen_shield(
    shield: f64,
    shield_max: f64,
    energy_core_tier: u8,
    now_tick: u64,
    last_hit_tick: Option<u64>,
) -> f64 {
    if let Some(last_hit) = last_hit_tick {
        let elapsed_ms = now_tick.saturating_sub(last_hit) * TICK_MS;
        if elapsed_ms < SHIELD_REGEN_COOLDOWN_MS {
            return shield;
        }
    }
    let per_tick = (SHIELD_REGEN_BASE_PER_SEC + energy_core_shield_bonus(energy_core_tier))
        * (TICK_MS as f64 / 1000.0);
    (shield + per_tick).min(shield_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shield_absorbs_before_hull() {
        let out = apply_damage(100.0, 20.0, 15.0);
        assert_eq!(out.shield_after, 5.0);
        assert_eq!(out.hull_after, 100.0);
        assert!(out.is_shield_hit);
    }

    #[test]
    fn overflow_reaches_hull() {
        let out = apply_damage(100.0, 10.0, 30.0);
        assert_eq!(out.shield_after, 0.0);
        assert_eq!(out.hull_after, 80.0);
        assert!(out.is_shield_hit);
    }

    #[test]
    fn zero_shield_is_not_a_shield_hit() {
        let out = apply_damage(100.0, 0.0, 10.0);
        assert!(!out.is_shield_hit);
    }

    #[test]
    fn regen_blocked_within_cooldown() {
        let shield = regen_shield(10.0, 50.0, 1, 100, Some(95));
        assert_eq!(shield, 10.0);
    }

    #[test]
    fn regen_applies_after_cooldown() {
        let shield = regen_shield(10.0, 50.0, 1, 1000, Some(0));
        assert!(shield > 10.0);
    }
}
