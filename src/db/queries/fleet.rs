//! Driver, vehicle and booking lookups

use std::collections::HashMap;

use anyhow::Result;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::types::fleet::{BookingRef, Driver, Vehicle};

pub async fn get_driver<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Driver>> {
    let driver = sqlx::query_as::<_, Driver>("SELECT id, name, email, status FROM drivers WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(driver)
}

pub async fn get_vehicle<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(
        "SELECT id, license_plate, capacity_kg, capacity_m3 FROM vehicles WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(vehicle)
}

/// Bookings keyed by id; unknown ids are simply absent
pub async fn get_bookings<'e, E: PgExecutor<'e>>(executor: E, ids: &[Uuid]) -> Result<HashMap<Uuid, BookingRef>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, BookingRef>(
        "SELECT id, customer_id, total_gbp FROM bookings WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|b| (b.id, b)).collect())
}
