//! Row types for the tables in `schema.rs`, and the conversions between
//! them and `starhold_core`'s in-memory types.

use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use starhold_core::constants::{hull_max, shield_max};
use starhold_core::{ComponentKind, Position, ResourceType, UserId, Velocity, WeaponType};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = ships, primary_key(user_id))]
pub struct ShipRow {
    pub user_id: i64,
    pub position_x: f64,
    pub position_y: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub rotation: f64,
    pub hull_current: f64,
    pub hull_max: f64,
    pub shield_current: f64,
    pub shield_max: f64,
    pub credits: i64,
    pub engine_tier: i16,
    pub weapon_tier: i16,
    pub shield_tier: i16,
    pub mining_tier: i16,
    pub cargo_tier: i16,
    pub radar_tier: i16,
    pub energy_core_tier: i16,
    pub hull_tier: i16,
    pub weapon_type: String,
    pub ship_color_id: i32,
    pub profile_id: i32,
    pub last_sector_x: i32,
    pub last_sector_y: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ships)]
pub struct NewShip {
    pub user_id: i64,
    pub position_x: f64,
    pub position_y: f64,
    pub hull_current: f64,
    pub hull_max: f64,
    pub shield_current: f64,
    pub shield_max: f64,
    pub last_sector_x: i32,
    pub last_sector_y: i32,
}

impl ShipRow {
    pub fn position(&self) -> Position {
        Position::new(self.position_x, self.position_y)
    }

    pub fn velocity(&self) -> Velocity {
        Velocity::new(self.velocity_x, self.velocity_y)
    }

    pub fn weapon_type(&self) -> WeaponType {
        parse_weapon_type(&self.weapon_type)
    }

    pub fn tier_of(&self, component: ComponentKind) -> u8 {
        (match component {
            ComponentKind::Engine => self.engine_tier,
            ComponentKind::Weapon => self.weapon_tier,
            ComponentKind::Shield => self.shield_tier,
            ComponentKind::Mining => self.mining_tier,
            ComponentKind::Cargo => self.cargo_tier,
            ComponentKind::Radar => self.radar_tier,
            ComponentKind::EnergyCore => self.energy_core_tier,
            ComponentKind::Hull => self.hull_tier,
        }) as u8
    }

    /// True if stored maxima don't match the tier formula (invariant 1);
    /// the login path self-heals by writing the reconciled values back.
    pub fn needs_max_reconciliation(&self) -> bool {
        (self.hull_max - hull_max(self.hull_tier as u8)).abs() > f64::EPSILON
            || (self.shield_max - shield_max(self.shield_tier as u8)).abs() > f64::EPSILON
    }
}

pub fn parse_weapon_type(s: &str) -> WeaponType {
    match s {
        "railgun" => WeaponType::Railgun,
        "missile_launcher" => WeaponType::MissileLauncher,
        "plasma_cannon" => WeaponType::PlasmaCannon,
        _ => WeaponType::Blaster,
    }
}

pub fn weapon_type_str(w: WeaponType) -> &'static str {
    match w {
        WeaponType::Blaster => "blaster",
        WeaponType::Railgun => "railgun",
        WeaponType::MissileLauncher => "missile_launcher",
        WeaponType::PlasmaCannon => "plasma_cannon",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = inventory, primary_key(user_id, resource_type))]
pub struct InventoryRow {
    pub user_id: i64,
    pub resource_type: String,
    pub quantity: i32,
}

pub fn resource_type_str(r: ResourceType) -> &'static str {
    match r {
        ResourceType::Iron => "iron",
        ResourceType::Copper => "copper",
        ResourceType::Titanium => "titanium",
        ResourceType::Gold => "gold",
        ResourceType::Platinum => "platinum",
        ResourceType::IceCrystal => "ice_crystal",
        ResourceType::ExoticMatter => "exotic_matter",
    }
}

pub fn parse_resource_type(s: &str) -> Option<ResourceType> {
    Some(match s {
        "iron" => ResourceType::Iron,
        "copper" => ResourceType::Copper,
        "titanium" => ResourceType::Titanium,
        "gold" => ResourceType::Gold,
        "platinum" => ResourceType::Platinum,
        "ice_crystal" => ResourceType::IceCrystal,
        "exotic_matter" => ResourceType::ExoticMatter,
        _ => return None,
    })
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = relics, primary_key(user_id, relic_type))]
pub struct RelicRow {
    pub user_id: i64,
    pub relic_type: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = market_listings)]
pub struct MarketListingRow {
    pub id: i64,
    pub seller_id: i64,
    pub seller_name: String,
    pub resource_type: String,
    pub quantity: i32,
    pub price_per_unit: i64,
    pub listed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = market_listings)]
pub struct NewMarketListing<'a> {
    pub seller_id: i64,
    pub seller_name: &'a str,
    pub resource_type: &'a str,
    pub quantity: i32,
    pub price_per_unit: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = fleets)]
pub struct FleetRow {
    pub id: i64,
    pub name: String,
    pub leader_id: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = fleet_members, primary_key(fleet_id, user_id))]
pub struct FleetMemberRow {
    pub fleet_id: i64,
    pub user_id: i64,
}

pub fn user_id_of(row: &ShipRow) -> UserId {
    UserId(row.user_id)
}
