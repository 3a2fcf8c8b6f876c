//! The durable store (C3): a connection-pooled Postgres database accessed
//! through `diesel-async`. Every multi-row mutation (`list_item`,
//! `buy_item`, `cancel_listing`, `upgrade`) runs inside a single
//! transaction ("all multi-row operations must execute
//! in a single transaction").

use crate::error::{StoreError, StoreResult};
use crate::models::*;
use crate::schema::*;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use starhold_core::constants::{cargo_capacity, hull_max, shield_max, upgrade_requirement};
use starhold_core::{ComponentKind, Position, ResourceType, UserId};
use tracing::warn;

#[derive(Clone)]
pub struct Store {
    pool: Pool<AsyncPgConnection>,
}

impl Store {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager).max_size(16).build()?;
        Ok(Self { pool })
    }

    async fn conn(
        &self,
    ) -> StoreResult<diesel_async::pooled_connection::deadpool::Object<AsyncPgConnection>> {
        Ok(self.pool.get().await?)
    }

    // -- Users / ships --------------------------------------------------

    /// Registers a new user and their starting ship in one transaction.
    /// `spawn` must already satisfy the deep-space spawn invariant;
    /// the store itself has no knowledge of stars.
    pub async fn register_user(
        &self,
        username: &str,
        password_hash: &str,
        spawn: Position,
    ) -> StoreResult<(UserId, ShipRow)> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let exists = users::table
                    .filter(users::username.eq(username))
                    .select(users::id)
                    .first::<i64>(conn)
                    .await
                    .optional()?;
                if exists.is_some() {
                    return Err(StoreError::UsernameTaken);
                }

                let user: UserRow = diesel::insert_into(users::table)
                    .values(NewUser {
                        username,
                        password_hash,
                    })
                    .get_result(conn)
                    .await?;

                let ship: ShipRow = diesel::insert_into(ships::table)
                    .values(NewShip {
                        user_id: user.id,
                        position_x: spawn.x,
                        position_y: spawn.y,
                        hull_current: hull_max(1),
                        hull_max: hull_max(1),
                        shield_current: shield_max(1),
                        shield_max: shield_max(1),
                        last_sector_x: 0,
                        last_sector_y: 0,
                    })
                    .get_result(conn)
                    .await?;

                Ok((UserId(user.id), ship))
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserRow>> {
        let mut conn = self.conn().await?;
        Ok(users::table
            .filter(users::username.eq(username))
            .first::<UserRow>(&mut conn)
            .await
            .optional()?)
    }

    /// Fetches a ship row, reconciling `hull_max`/`shield_max` in place if
    /// they no longer match the tier formula (login-time self-heal).
    pub async fn get_ship_reconciled(&self, user_id: UserId) -> StoreResult<ShipRow> {
        let mut conn = self.conn().await?;
        let ship: ShipRow = ships::table
            .find(user_id.0)
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(StoreError::UserNotFound)?;

        if ship.needs_max_reconciliation() {
            let new_hull_max = hull_max(ship.hull_tier as u8);
            let new_shield_max = shield_max(ship.shield_tier as u8);
            let updated: ShipRow = diesel::update(ships::table.find(user_id.0))
                .set((
                    ships::hull_max.eq(new_hull_max),
                    ships::shield_max.eq(new_shield_max),
                    ships::hull_current.eq(ship.hull_current.min(new_hull_max)),
                    ships::shield_current.eq(ship.shield_current.min(new_shield_max)),
                ))
                .get_result(&mut conn)
                .await?;
            return Ok(updated);
        }
        Ok(ship)
    }

    /// Best-effort position flush on disconnect / periodic persistence
    /// on a periodic persistence flush: failures are logged, never propagated.
    pub async fn save_ship_state(
        &self,
        user_id: UserId,
        pos: Position,
        vel: starhold_core::Velocity,
        rotation: f64,
        hull_current: f64,
        shield_current: f64,
        sector: (i32, i32),
    ) {
        let result = async {
            let mut conn = self.conn().await?;
            diesel::update(ships::table.find(user_id.0))
                .set((
                    ships::position_x.eq(pos.x),
                    ships::position_y.eq(pos.y),
                    ships::velocity_x.eq(vel.vx),
                    ships::velocity_y.eq(vel.vy),
                    ships::rotation.eq(rotation),
                    ships::hull_current.eq(hull_current),
                    ships::shield_current.eq(shield_current),
                    ships::last_sector_x.eq(sector.0),
                    ships::last_sector_y.eq(sector.1),
                ))
                .execute(&mut conn)
                .await?;
            StoreResult::Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(%user_id, error = %e, "failed to persist ship state (best-effort)");
        }
    }

    pub async fn set_ship_credits(&self, user_id: UserId, credits: i64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::update(ships::table.find(user_id.0))
            .set(ships::credits.eq(credits.max(0)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn set_ship_cosmetics(
        &self,
        user_id: UserId,
        profile_id: Option<u32>,
        color_id: Option<u32>,
    ) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        if let Some(p) = profile_id {
            diesel::update(ships::table.find(user_id.0))
                .set(ships::profile_id.eq(p as i32))
                .execute(&mut conn)
                .await?;
        }
        if let Some(c) = color_id {
            diesel::update(ships::table.find(user_id.0))
                .set(ships::ship_color_id.eq(c as i32))
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    // -- Inventory / relics ----------------------------------------------

    pub async fn get_inventory(&self, user_id: UserId) -> StoreResult<Vec<InventoryRow>> {
        let mut conn = self.conn().await?;
        Ok(inventory::table
            .filter(inventory::user_id.eq(user_id.0))
            .load(&mut conn)
            .await?)
    }

    pub async fn get_relics(&self, user_id: UserId) -> StoreResult<Vec<RelicRow>> {
        let mut conn = self.conn().await?;
        Ok(relics::table
            .filter(relics::user_id.eq(user_id.0))
            .load(&mut conn)
            .await?)
    }

    pub async fn has_relic(
        &self,
        user_id: UserId,
        relic: starhold_core::RelicType,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let name = relic_type_str(relic);
        let count: i64 = relics::table
            .filter(relics::user_id.eq(user_id.0))
            .filter(relics::relic_type.eq(name))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count > 0)
    }

    /// Credits `quantity` of `resource` to the user's inventory, clipped to
    /// the cargo ceiling. Used by mining completion and loot collection.
    /// Returns the amount actually credited (may be less than `quantity`).
    pub async fn credit_inventory(
        &self,
        user_id: UserId,
        resource: ResourceType,
        quantity: u32,
        cargo_tier: u8,
    ) -> StoreResult<u32> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let current_total: i64 = inventory::table
                    .filter(inventory::user_id.eq(user_id.0))
                    .select(diesel::dsl::sum(inventory::quantity))
                    .first::<Option<i64>>(conn)
                    .await?
                    .unwrap_or(0);

                let room = (cargo_capacity(cargo_tier) as i64 - current_total).max(0);
                let to_credit = (quantity as i64).min(room) as u32;
                if to_credit == 0 {
                    return Ok(0);
                }

                let resource_str = resource_type_str(resource);
                diesel::insert_into(inventory::table)
                    .values(InventoryRow {
                        user_id: user_id.0,
                        resource_type: resource_str.to_string(),
                        quantity: to_credit as i32,
                    })
                    .on_conflict((inventory::user_id, inventory::resource_type))
                    .do_update()
                    .set(inventory::quantity.eq(inventory::quantity + to_credit as i32))
                    .execute(conn)
                    .await?;

                Ok(to_credit)
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn credit_wallet(&self, user_id: UserId, amount: i64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::update(ships::table.find(user_id.0))
            .set(ships::credits.eq(ships::credits + amount))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn grant_relic(&self, user_id: UserId, relic: starhold_core::RelicType) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::insert_into(relics::table)
            .values(RelicRow {
                user_id: user_id.0,
                relic_type: relic_type_str(relic).to_string(),
            })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    // -- Marketplace --------------------------------------------------------

    pub async fn get_listings(&self, resource: Option<ResourceType>) -> StoreResult<Vec<MarketListingRow>> {
        let mut conn = self.conn().await?;
        let mut query = market_listings::table.into_boxed();
        if let Some(r) = resource {
            query = query.filter(market_listings::resource_type.eq(resource_type_str(r)));
        }
        Ok(query.order(market_listings::listed_at.asc()).load(&mut conn).await?)
    }

    pub async fn get_my_listings(&self, user_id: UserId) -> StoreResult<Vec<MarketListingRow>> {
        let mut conn = self.conn().await?;
        Ok(market_listings::table
            .filter(market_listings::seller_id.eq(user_id.0))
            .order(market_listings::listed_at.asc())
            .load(&mut conn)
            .await?)
    }

    /// Atomic {decrement inventory row, insert listing}. Fails if the
    /// seller lacks `quantity` of `resource`.
    pub async fn list_item(
        &self,
        seller_id: UserId,
        seller_name: &str,
        resource: ResourceType,
        quantity: u32,
        price_per_unit: u64,
    ) -> StoreResult<MarketListingRow> {
        let mut conn = self.conn().await?;
        let resource_str = resource_type_str(resource).to_string();
        conn.transaction::<_, StoreError, _>(|conn| {
            let resource_str = resource_str.clone();
            async move {
                let held: Option<InventoryRow> = inventory::table
                    .find((seller_id.0, &resource_str))
                    .first(conn)
                    .await
                    .optional()?;
                let held_qty = held.map(|r| r.quantity).unwrap_or(0);
                if held_qty < quantity as i32 {
                    return Err(StoreError::InsufficientQuantity);
                }

                diesel::update(inventory::table.find((seller_id.0, &resource_str)))
                    .set(inventory::quantity.eq(inventory::quantity - quantity as i32))
                    .execute(conn)
                    .await?;

                let listing: MarketListingRow = diesel::insert_into(market_listings::table)
                    .values(NewMarketListing {
                        seller_id: seller_id.0,
                        seller_name,
                        resource_type: &resource_str,
                        quantity: quantity as i32,
                        price_per_unit: price_per_unit as i64,
                    })
                    .get_result(conn)
                    .await?;

                Ok(listing)
            }
            .scope_boxed()
        })
        .await
    }

    /// Atomic {verify listing + quantity, debit buyer, credit seller,
    /// shrink/delete listing, credit buyer inventory}. The store never
    /// trusts a cached listing snapshot: it re-reads and locks the row
    /// inside the transaction, so a racing cancel loses with
    /// `ListingNotFound`.
    pub async fn buy_item(
        &self,
        buyer_id: UserId,
        listing_id: i64,
        quantity: u32,
        buyer_cargo_tier: u8,
    ) -> StoreResult<(MarketListingRow, u32)> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let listing: MarketListingRow = market_listings::table
                    .find(listing_id)
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or(StoreError::ListingNotFound)?;

                if listing.quantity < quantity as i32 {
                    return Err(StoreError::InsufficientQuantity);
                }

                let total_price = listing.price_per_unit * quantity as i64;

                let buyer: ShipRow = ships::table.find(buyer_id.0).first(conn).await?;
                if buyer.credits < total_price {
                    return Err(StoreError::InsufficientCredits);
                }

                let current_total: i64 = inventory::table
                    .filter(inventory::user_id.eq(buyer_id.0))
                    .select(diesel::dsl::sum(inventory::quantity))
                    .first::<Option<i64>>(conn)
                    .await?
                    .unwrap_or(0);
                let room = cargo_capacity(buyer_cargo_tier) as i64 - current_total;
                if room < quantity as i64 {
                    return Err(StoreError::CargoFull);
                }

                diesel::update(ships::table.find(buyer_id.0))
                    .set(ships::credits.eq(ships::credits - total_price))
                    .execute(conn)
                    .await?;
                diesel::update(ships::table.find(listing.seller_id))
                    .set(ships::credits.eq(ships::credits + total_price))
                    .execute(conn)
                    .await?;

                let remaining = listing.quantity - quantity as i32;
                if remaining == 0 {
                    diesel::delete(market_listings::table.find(listing_id))
                        .execute(conn)
                        .await?;
                } else {
                    diesel::update(market_listings::table.find(listing_id))
                        .set(market_listings::quantity.eq(remaining))
                        .execute(conn)
                        .await?;
                }

                diesel::insert_into(inventory::table)
                    .values(InventoryRow {
                        user_id: buyer_id.0,
                        resource_type: listing.resource_type.clone(),
                        quantity: quantity as i32,
                    })
                    .on_conflict((inventory::user_id, inventory::resource_type))
                    .do_update()
                    .set(inventory::quantity.eq(inventory::quantity + quantity as i32))
                    .execute(conn)
                    .await?;

                Ok((listing, quantity))
            }
            .scope_boxed()
        })
        .await
    }

    /// Atomic {verify ownership, return quantity to inventory, delete
    /// listing}.
    pub async fn cancel_listing(&self, user_id: UserId, listing_id: i64) -> StoreResult<MarketListingRow> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let listing: MarketListingRow = market_listings::table
                    .find(listing_id)
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or(StoreError::ListingNotFound)?;

                if listing.seller_id != user_id.0 {
                    return Err(StoreError::NotOwner);
                }

                diesel::insert_into(inventory::table)
                    .values(InventoryRow {
                        user_id: user_id.0,
                        resource_type: listing.resource_type.clone(),
                        quantity: listing.quantity,
                    })
                    .on_conflict((inventory::user_id, inventory::resource_type))
                    .do_update()
                    .set(inventory::quantity.eq(inventory::quantity + listing.quantity))
                    .execute(conn)
                    .await?;

                diesel::delete(market_listings::table.find(listing_id))
                    .execute(conn)
                    .await?;

                Ok(listing)
            }
            .scope_boxed()
        })
        .await
    }

    // -- Upgrades ----------------------------------------------------------

    /// Atomic {verify credits and resource cost, debit both, bump tier,
    /// recompute max HP/shield}.
    pub async fn upgrade(&self, user_id: UserId, component: ComponentKind) -> StoreResult<ShipRow> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let ship: ShipRow = ships::table.find(user_id.0).first(conn).await?;
                let current_tier = ship.tier_of(component);
                let requirement = upgrade_requirement(current_tier).ok_or(StoreError::MaxTier)?;

                if ship.credits < requirement.credits as i64 {
                    return Err(StoreError::InsufficientCredits);
                }

                let resource_str = resource_type_str(requirement.resource);
                let held: Option<InventoryRow> = inventory::table
                    .find((user_id.0, resource_str))
                    .first(conn)
                    .await
                    .optional()?;
                if held.map(|r| r.quantity).unwrap_or(0) < requirement.resource_quantity as i32 {
                    return Err(StoreError::InsufficientResources);
                }

                diesel::update(inventory::table.find((user_id.0, resource_str)))
                    .set(inventory::quantity.eq(inventory::quantity - requirement.resource_quantity as i32))
                    .execute(conn)
                    .await?;

                let new_tier = (current_tier + 1) as i16;
                diesel::update(ships::table.find(user_id.0))
                    .set(ships::credits.eq(ship.credits - requirement.credits as i64))
                    .execute(conn)
                    .await?;

                match component {
                    ComponentKind::Engine => {
                        diesel::update(ships::table.find(user_id.0))
                            .set(ships::engine_tier.eq(new_tier))
                            .execute(conn)
                            .await?;
                    }
                    ComponentKind::Weapon => {
                        diesel::update(ships::table.find(user_id.0))
                            .set(ships::weapon_tier.eq(new_tier))
                            .execute(conn)
                            .await?;
                    }
                    ComponentKind::Shield => {
                        let new_shield_max = shield_max(new_tier as u8);
                        diesel::update(ships::table.find(user_id.0))
                            .set((
                                ships::shield_tier.eq(new_tier),
                                ships::shield_max.eq(new_shield_max),
                                ships::shield_current.eq(ship.shield_current.min(new_shield_max)),
                            ))
                            .execute(conn)
                            .await?;
                    }
                    ComponentKind::Mining => {
                        diesel::update(ships::table.find(user_id.0))
                            .set(ships::mining_tier.eq(new_tier))
                            .execute(conn)
                            .await?;
                    }
                    ComponentKind::Cargo => {
                        diesel::update(ships::table.find(user_id.0))
                            .set(ships::cargo_tier.eq(new_tier))
                            .execute(conn)
                            .await?;
                    }
                    ComponentKind::Radar => {
                        diesel::update(ships::table.find(user_id.0))
                            .set(ships::radar_tier.eq(new_tier))
                            .execute(conn)
                            .await?;
                    }
                    ComponentKind::EnergyCore => {
                        diesel::update(ships::table.find(user_id.0))
                            .set(ships::energy_core_tier.eq(new_tier))
                            .execute(conn)
                            .await?;
                    }
                    ComponentKind::Hull => {
                        let new_hull_max = hull_max(new_tier as u8);
                        diesel::update(ships::table.find(user_id.0))
                            .set((
                                ships::hull_tier.eq(new_tier),
                                ships::hull_max.eq(new_hull_max),
                                ships::hull_current.eq(ship.hull_current.min(new_hull_max)),
                            ))
                            .execute(conn)
                            .await?;
                    }
                }

                let updated: ShipRow = ships::table.find(user_id.0).first(conn).await?;
                Ok(updated)
            }
            .scope_boxed()
        })
        .await
    }

    // -- Fleets --------------------------------------------------------------

    pub async fn create_fleet(&self, leader_id: UserId, name: &str) -> StoreResult<FleetRow> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let fleet: FleetRow = diesel::insert_into(fleets::table)
                    .values((fleets::name.eq(name), fleets::leader_id.eq(leader_id.0)))
                    .get_result(conn)
                    .await?;
                diesel::insert_into(fleet_members::table)
                    .values(FleetMemberRow {
                        fleet_id: fleet.id,
                        user_id: leader_id.0,
                    })
                    .execute(conn)
                    .await?;
                Ok(fleet)
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn fleet_of(&self, user_id: UserId) -> StoreResult<Option<(FleetRow, Vec<i64>)>> {
        let mut conn = self.conn().await?;
        let membership: Option<FleetMemberRow> = fleet_members::table
            .filter(fleet_members::user_id.eq(user_id.0))
            .first(&mut conn)
            .await
            .optional()?;
        let Some(membership) = membership else {
            return Ok(None);
        };
        let fleet: FleetRow = fleets::table.find(membership.fleet_id).first(&mut conn).await?;
        let members: Vec<i64> = fleet_members::table
            .filter(fleet_members::fleet_id.eq(fleet.id))
            .select(fleet_members::user_id)
            .load(&mut conn)
            .await?;
        Ok(Some((fleet, members)))
    }

    pub async fn add_fleet_member(&self, fleet_id: i64, user_id: UserId) -> StoreResult<()> {
        use starhold_core::constants::MAX_FLEET_MEMBERS;
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let count: i64 = fleet_members::table
                    .filter(fleet_members::fleet_id.eq(fleet_id))
                    .count()
                    .get_result(conn)
                    .await?;
                if count as usize >= MAX_FLEET_MEMBERS {
                    return Err(StoreError::FleetFull);
                }
                let already: i64 = fleet_members::table
                    .filter(fleet_members::user_id.eq(user_id.0))
                    .count()
                    .get_result(conn)
                    .await?;
                if already > 0 {
                    return Err(StoreError::AlreadyInFleet);
                }
                diesel::insert_into(fleet_members::table)
                    .values(FleetMemberRow {
                        fleet_id,
                        user_id: user_id.0,
                    })
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn remove_fleet_member(&self, fleet_id: i64, user_id: UserId) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::delete(
            fleet_members::table
                .filter(fleet_members::fleet_id.eq(fleet_id))
                .filter(fleet_members::user_id.eq(user_id.0)),
        )
        .execute(&mut conn)
        .await?;
        Ok(())
    }
}

fn relic_type_str(r: starhold_core::RelicType) -> &'static str {
    use starhold_core::RelicType::*;
    match r {
        WormholeGem => "wormhole_gem",
        ScannerCore => "scanner_core",
        ShieldHarmonizer => "shield_harmonizer",
    }
}
