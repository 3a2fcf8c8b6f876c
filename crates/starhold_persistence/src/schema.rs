// Mirrors migrations/2026-01-01-000000_init/up.sql.

diesel::table! {
    users (id) {
        id -> Int8,
        username -> Text,
        password_hash -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ships (user_id) {
        user_id -> Int8,
        position_x -> Double,
        position_y -> Double,
        velocity_x -> Double,
        velocity_y -> Double,
        rotation -> Double,
        hull_current -> Double,
        hull_max -> Double,
        shield_current -> Double,
        shield_max -> Double,
        credits -> Int8,
        engine_tier -> Int2,
        weapon_tier -> Int2,
        shield_tier -> Int2,
        mining_tier -> Int2,
        cargo_tier -> Int2,
        radar_tier -> Int2,
        energy_core_tier -> Int2,
        hull_tier -> Int2,
        weapon_type -> Text,
        ship_color_id -> Int4,
        profile_id -> Int4,
        last_sector_x -> Int4,
        last_sector_y -> Int4,
    }
}

diesel::table! {
    inventory (user_id, resource_type) {
        user_id -> Int8,
        resource_type -> Text,
        quantity -> Int4,
    }
}

diesel::table! {
    relics (user_id, relic_type) {
        user_id -> Int8,
        relic_type -> Text,
    }
}

diesel::table! {
    market_listings (id) {
        id -> Int8,
        seller_id -> Int8,
        seller_name -> Text,
        resource_type -> Text,
        quantity -> Int4,
        price_per_unit -> Int8,
        listed_at -> Timestamptz,
    }
}

diesel::table! {
    fleets (id) {
        id -> Int8,
        name -> Text,
        leader_id -> Int8,
    }
}

diesel::table! {
    fleet_members (fleet_id, user_id) {
        fleet_id -> Int8,
        user_id -> Int8,
    }
}

diesel::joinable!(ships -> users (user_id));
diesel::joinable!(inventory -> users (user_id));
diesel::joinable!(relics -> users (user_id));
diesel::joinable!(market_listings -> users (seller_id));
diesel::joinable!(fleet_members -> fleets (fleet_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    ships,
    inventory,
    relics,
    market_listings,
    fleets,
    fleet_members,
);
