//! Drop database queries

use anyhow::Result;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::services::planning::NewDrop;
use crate::types::drop::{DropStatus, RouteDrop};

const DROP_COLUMNS: &str = r#"
    id, route_id, booking_id, customer_id, sequence, pickup_address,
    delivery_address, pickup_lat, pickup_lng, delivery_lat, delivery_lng,
    quoted_price, saved_distance, weight, volume, time_window_start,
    time_window_end, status, created_at
"#;

/// Insert drops in order, returning the stored rows
pub async fn insert_drops(conn: &mut PgConnection, route_id: Uuid, drops: &[NewDrop]) -> Result<Vec<RouteDrop>> {
    let sql = format!(
        r#"
        INSERT INTO drops (
            id, route_id, booking_id, customer_id, sequence, pickup_address,
            delivery_address, pickup_lat, pickup_lng, delivery_lat, delivery_lng,
            quoted_price, saved_distance, weight, volume, time_window_start,
            time_window_end, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {}
        "#,
        DROP_COLUMNS
    );

    let mut inserted = Vec::with_capacity(drops.len());
    for drop in drops {
        let row = sqlx::query_as::<_, RouteDrop>(&sql)
            .bind(Uuid::new_v4())
            .bind(route_id)
            .bind(drop.booking_id)
            .bind(drop.customer_id)
            .bind(drop.sequence)
            .bind(&drop.pickup_address)
            .bind(&drop.delivery_address)
            .bind(drop.pickup_lat)
            .bind(drop.pickup_lng)
            .bind(drop.delivery_lat)
            .bind(drop.delivery_lng)
            .bind(drop.quoted_price)
            .bind(drop.saved_distance)
            .bind(drop.weight)
            .bind(drop.volume)
            .bind(drop.time_window_start)
            .bind(drop.time_window_end)
            .bind(drop.status)
            .fetch_one(&mut *conn)
            .await?;
        inserted.push(row);
    }

    Ok(inserted)
}

pub async fn delete_drops_for_route(conn: &mut PgConnection, route_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM drops WHERE route_id = $1")
        .bind(route_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Drops of the given routes, each route's drops by time window
pub async fn list_drops_for_routes<'e, E: PgExecutor<'e>>(executor: E, route_ids: &[Uuid]) -> Result<Vec<RouteDrop>> {
    if route_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        r#"
        SELECT {}
        FROM drops
        WHERE route_id = ANY($1)
        ORDER BY route_id, time_window_start ASC, sequence ASC
        "#,
        DROP_COLUMNS
    );

    let drops = sqlx::query_as::<_, RouteDrop>(&sql)
        .bind(route_ids)
        .fetch_all(executor)
        .await?;

    Ok(drops)
}

pub async fn lock_drop(conn: &mut PgConnection, id: Uuid) -> Result<Option<RouteDrop>> {
    let sql = format!("SELECT {} FROM drops WHERE id = $1 FOR UPDATE", DROP_COLUMNS);
    let drop = sqlx::query_as::<_, RouteDrop>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(drop)
}

pub async fn set_drop_status(conn: &mut PgConnection, id: Uuid, status: DropStatus) -> Result<RouteDrop> {
    let sql = format!("UPDATE drops SET status = $2 WHERE id = $1 RETURNING {}", DROP_COLUMNS);
    let drop = sqlx::query_as::<_, RouteDrop>(&sql)
        .bind(id)
        .bind(status)
        .fetch_one(conn)
        .await?;

    Ok(drop)
}
