//! Route database queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::types::route::{Route, RouteStatus, SequenceEntry, ServiceTier};

const ROUTE_COLUMNS: &str = r#"
    id, reference, driver_id, vehicle_id, start_time, status, service_tier,
    total_drops, optimized_distance_km, estimated_duration_minutes,
    optimized_sequence, optimization_score, quoted_total_gbp,
    admin_adjusted_price, driver_payout, route_notes, admin_notes,
    is_modified_by_admin, created_at, updated_at
"#;

/// Row values for a new route
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub id: Uuid,
    pub reference: String,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub status: RouteStatus,
    pub service_tier: ServiceTier,
    pub total_drops: i32,
    pub optimized_distance_km: f64,
    pub estimated_duration_minutes: i32,
    pub optimized_sequence: Vec<SequenceEntry>,
    pub optimization_score: f64,
    pub quoted_total_gbp: f64,
    pub route_notes: Option<String>,
    pub admin_notes: String,
}

/// Filters for [`list_routes`]
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    pub status: Option<RouteStatus>,
    pub driver_id: Option<Uuid>,
    /// Half-open `[from, to)` range on `start_time`
    pub starts_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

pub async fn reference_exists(conn: &mut PgConnection, reference: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM routes WHERE reference = $1)")
        .bind(reference)
        .fetch_one(conn)
        .await?;

    Ok(exists)
}

pub async fn insert_route(conn: &mut PgConnection, route: &NewRoute) -> Result<Route> {
    let sql = format!(
        r#"
        INSERT INTO routes (
            id, reference, driver_id, vehicle_id, start_time, status, service_tier,
            total_drops, optimized_distance_km, estimated_duration_minutes,
            optimized_sequence, optimization_score, quoted_total_gbp,
            route_notes, admin_notes, is_modified_by_admin
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, true)
        RETURNING {}
        "#,
        ROUTE_COLUMNS
    );

    let created = sqlx::query_as::<_, Route>(&sql)
        .bind(route.id)
        .bind(&route.reference)
        .bind(route.driver_id)
        .bind(route.vehicle_id)
        .bind(route.start_time)
        .bind(route.status)
        .bind(route.service_tier)
        .bind(route.total_drops)
        .bind(route.optimized_distance_km)
        .bind(route.estimated_duration_minutes)
        .bind(Json(&route.optimized_sequence))
        .bind(route.optimization_score)
        .bind(route.quoted_total_gbp)
        .bind(&route.route_notes)
        .bind(&route.admin_notes)
        .fetch_one(conn)
        .await?;

    Ok(created)
}

pub async fn get_route<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Route>> {
    let sql = format!("SELECT {} FROM routes WHERE id = $1", ROUTE_COLUMNS);
    let route = sqlx::query_as::<_, Route>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(route)
}

/// Read a route and hold its row lock until the transaction ends
pub async fn lock_route(conn: &mut PgConnection, id: Uuid) -> Result<Option<Route>> {
    let sql = format!("SELECT {} FROM routes WHERE id = $1 FOR UPDATE", ROUTE_COLUMNS);
    let route = sqlx::query_as::<_, Route>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(route)
}

/// Multi-drop routes (more than one drop), newest start first
pub async fn list_routes<'e, E: PgExecutor<'e>>(executor: E, filter: &RouteFilter) -> Result<Vec<Route>> {
    let (from, to) = filter.starts_between.unzip();
    let sql = format!(
        r#"
        SELECT {}
        FROM routes
        WHERE total_drops > 1
          AND ($1::route_status IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR driver_id = $2)
          AND ($3::timestamptz IS NULL OR start_time >= $3)
          AND ($4::timestamptz IS NULL OR start_time < $4)
        ORDER BY start_time DESC
        "#,
        ROUTE_COLUMNS
    );

    let routes = sqlx::query_as::<_, Route>(&sql)
        .bind(filter.status)
        .bind(filter.driver_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

    Ok(routes)
}

/// Write back every mutable column of `route`
pub async fn save_route(conn: &mut PgConnection, route: &Route) -> Result<Route> {
    let sql = format!(
        r#"
        UPDATE routes
        SET driver_id = $2, vehicle_id = $3, start_time = $4, status = $5,
            service_tier = $6, total_drops = $7, optimized_distance_km = $8,
            estimated_duration_minutes = $9, optimized_sequence = $10,
            optimization_score = $11, quoted_total_gbp = $12,
            admin_adjusted_price = $13, driver_payout = $14, route_notes = $15,
            admin_notes = $16, is_modified_by_admin = true, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        ROUTE_COLUMNS
    );

    let saved = sqlx::query_as::<_, Route>(&sql)
        .bind(route.id)
        .bind(route.driver_id)
        .bind(route.vehicle_id)
        .bind(route.start_time)
        .bind(route.status)
        .bind(route.service_tier)
        .bind(route.total_drops)
        .bind(route.optimized_distance_km)
        .bind(route.estimated_duration_minutes)
        .bind(&route.optimized_sequence)
        .bind(route.optimization_score)
        .bind(route.quoted_total_gbp)
        .bind(route.admin_adjusted_price)
        .bind(route.driver_payout)
        .bind(&route.route_notes)
        .bind(&route.admin_notes)
        .fetch_one(conn)
        .await?;

    Ok(saved)
}

/// Remove a route; its drops go with it (ON DELETE CASCADE)
pub async fn delete_route(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM routes WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
