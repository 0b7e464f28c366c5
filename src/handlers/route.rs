//! Multi-drop route handlers

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use futures::StreamExt;
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{publish_error, publish_result};
use crate::auth::{self, AuthInfo};
use crate::db::queries;
use crate::db::queries::audit;
use crate::db::queries::route::{NewRoute, RouteFilter};
use crate::error::RouteError;
use crate::services::planning::{self, RoutePlan};
use crate::services::{pricing, reference, sequencing, validation};
use crate::types::{
    CreateRouteRequest, DeleteRouteRequest, DeleteRouteResponse, DropInput, GetRouteRequest,
    ListRoutesRequest, ListRoutesResponse, ReassignRouteRequest, Request, Route, RouteDrop,
    RouteMutationResponse, RouteStatus, RouteWithDrops, SequencePreviewRequest,
    SequencePreviewResponse, UpdateRouteRequest,
};

// ==========================================================================
// Subscriber loops
// ==========================================================================

/// Handle multidrop.route.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.route.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRoutesRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        if let Err(e) = auth::extract_admin(&request, &jwt_secret) {
            warn!("Rejected multidrop.route.list: {}", e);
            publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
            continue;
        }

        let result = list_routes(&pool, &request.payload).await;
        publish_result(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle multidrop.route.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.route.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<GetRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        if let Err(e) = auth::extract_admin(&request, &jwt_secret) {
            warn!("Rejected multidrop.route.get: {}", e);
            publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
            continue;
        }

        let result = get_route(&pool, request.payload.route_id).await;
        publish_result(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle multidrop.route.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.route.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        let admin = match auth::extract_admin(&request, &jwt_secret) {
            Ok(info) => info,
            Err(e) => {
                warn!("Rejected multidrop.route.create: {}", e);
                publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
                continue;
            }
        };

        let result = create_route(&pool, &admin, request.payload).await;
        publish_result(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle multidrop.route.update messages
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.route.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        let admin = match auth::extract_admin(&request, &jwt_secret) {
            Ok(info) => info,
            Err(e) => {
                warn!("Rejected multidrop.route.update: {}", e);
                publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
                continue;
            }
        };

        let result = update_route(&pool, &admin, request.payload).await;
        publish_result(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle multidrop.route.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.route.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<DeleteRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        let admin = match auth::extract_admin(&request, &jwt_secret) {
            Ok(info) => info,
            Err(e) => {
                warn!("Rejected multidrop.route.delete: {}", e);
                publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
                continue;
            }
        };

        let result = delete_route(&pool, &admin, request.payload).await;
        publish_result(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle multidrop.route.reassign messages
pub async fn handle_reassign(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.route.reassign message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ReassignRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        let admin = match auth::extract_admin(&request, &jwt_secret) {
            Ok(info) => info,
            Err(e) => {
                warn!("Rejected multidrop.route.reassign: {}", e);
                publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
                continue;
            }
        };

        let result = reassign_route(&pool, &admin, request.payload).await;
        publish_result(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Handle multidrop.route.sequence.preview messages
pub async fn handle_sequence_preview(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.route.sequence.preview message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<SequencePreviewRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        if let Err(e) = auth::extract_admin(&request, &jwt_secret) {
            warn!("Rejected multidrop.route.sequence.preview: {}", e);
            publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
            continue;
        }

        let response = preview_sequence(request.payload.drops);
        publish_result(&client, reply, request.id, Ok::<_, RouteError>(response)).await?;
    }

    Ok(())
}

// ==========================================================================
// Operations
// ==========================================================================

pub async fn list_routes(pool: &PgPool, request: &ListRoutesRequest) -> Result<ListRoutesResponse, RouteError> {
    let filter = RouteFilter {
        status: parse_status_filter(request.status.as_deref())?,
        driver_id: request.driver_id,
        starts_between: request.date.map(utc_day).transpose()?,
    };

    let routes = queries::route::list_routes(pool, &filter).await?;
    let ids: Vec<Uuid> = routes.iter().map(|r| r.id).collect();
    let drops = queries::drop::list_drops_for_routes(pool, &ids).await?;

    let items = attach_drops(routes, drops);
    Ok(ListRoutesResponse { count: items.len(), items })
}

pub async fn get_route(pool: &PgPool, route_id: Uuid) -> Result<RouteWithDrops, RouteError> {
    let route = queries::route::get_route(pool, route_id)
        .await?
        .ok_or(RouteError::RouteNotFound(route_id))?;
    let drops = queries::drop::list_drops_for_routes(pool, &[route_id]).await?;

    Ok(RouteWithDrops { route, drops })
}

pub async fn create_route(
    pool: &PgPool,
    admin: &AuthInfo,
    request: CreateRouteRequest,
) -> Result<RouteMutationResponse, RouteError> {
    let bypass = request.force_create || request.skip_validation;

    let driver = match request.driver_id {
        Some(id) => queries::fleet::get_driver(pool, id).await?,
        None => None,
    };
    let vehicle = match request.vehicle_id {
        Some(id) => queries::fleet::get_vehicle(pool, id).await?,
        None => None,
    };

    let mut issues = Vec::new();
    issues.extend(validation::check_drop_count(request.drops.len()));
    if let Some(id) = request.driver_id {
        issues.extend(validation::check_driver(id, driver.as_ref()));
    }
    if let Some(id) = request.vehicle_id {
        issues.extend(validation::check_vehicle(id, vehicle.as_ref()));
    }
    issues.extend(validation::check_capacity(&request.drops, vehicle.as_ref()));
    issues.extend(validation::check_addresses(&request.drops));
    let warnings = validation::enforce(issues, bypass)?;

    let bookings = queries::fleet::get_bookings(pool, &booking_ids(&request.drops)).await?;
    let prepared = planning::prepare_drops(request.drops, request.auto_optimize);
    let plan = planning::plan_route(prepared, request.start_time, request.service_tier, &bookings)?;

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let new_route = NewRoute {
        id: Uuid::new_v4(),
        reference: reference::unique_reference(&mut tx).await?,
        driver_id: request.driver_id,
        vehicle_id: request.vehicle_id,
        start_time: request.start_time,
        status: planning::initial_status(request.driver_id),
        service_tier: request.service_tier,
        total_drops: plan.drops.len() as i32,
        optimized_distance_km: plan.metrics.total_distance_km,
        estimated_duration_minutes: plan.metrics.estimated_duration_minutes,
        optimized_sequence: plan.sequence.clone(),
        optimization_score: plan.score,
        quoted_total_gbp: plan.quoted_total_gbp,
        route_notes: request.notes,
        admin_notes: planning::admin_note("Created", &admin.email, now),
    };

    let route = queries::route::insert_route(&mut tx, &new_route).await?;
    let drops = queries::drop::insert_drops(&mut tx, route.id, &plan.drops).await?;
    audit::record(
        &mut tx,
        admin.user_id,
        audit::CREATE_ROUTE,
        route.id,
        json!({
            "reference": route.reference,
            "totalDrops": route.total_drops,
            "optimized": plan.optimized,
            "optimizationScore": plan.score,
            "warnings": warnings,
        }),
    )
    .await?;
    tx.commit().await?;

    info!(
        "Created multi-drop route {} ({}) with {} drops by {}",
        route.reference, route.id, drops.len(), admin.email
    );

    let message = format!(
        "Multi-drop route {} created with {} drops",
        route.reference,
        drops.len()
    );
    Ok(RouteMutationResponse {
        route: RouteWithDrops { route, drops },
        optimized: plan.optimized,
        optimization_score: plan.score,
        warnings,
        message,
    })
}

pub async fn update_route(
    pool: &PgPool,
    admin: &AuthInfo,
    request: UpdateRouteRequest,
) -> Result<RouteMutationResponse, RouteError> {
    let bypass = request.force_update || request.skip_validation;
    let mut tx = pool.begin().await?;

    let existing = queries::route::lock_route(&mut tx, request.route_id)
        .await?
        .ok_or(RouteError::RouteNotFound(request.route_id))?;

    let mut issues = Vec::new();
    if let Some(status) = request.status {
        issues.extend(validation::check_status_transition(existing.status, status));
    }
    if let Some(id) = request.driver_id {
        let driver = queries::fleet::get_driver(&mut *tx, id).await?;
        issues.extend(validation::check_driver(id, driver.as_ref()));
    }
    let vehicle = match request.vehicle_id.or(existing.vehicle_id) {
        Some(id) => queries::fleet::get_vehicle(&mut *tx, id).await?,
        None => None,
    };
    if let Some(id) = request.vehicle_id {
        issues.extend(validation::check_vehicle(id, vehicle.as_ref()));
    }
    if let Some(drops) = &request.drops {
        issues.extend(validation::check_route_open(existing.status));
        issues.extend(validation::check_drop_count(drops.len()));
        issues.extend(validation::check_capacity(drops, vehicle.as_ref()));
        issues.extend(validation::check_addresses(drops));
    }
    let warnings = validation::enforce(issues, bypass)?;

    let mut route = existing.clone();
    apply_route_changes(&mut route, &request);
    route.admin_notes = Some(planning::admin_note("Updated", &admin.email, Utc::now()));

    let mut optimized = false;
    let drops_replaced = request.drops.is_some();
    if let Some(drops) = request.drops {
        let bookings = queries::fleet::get_bookings(&mut *tx, &booking_ids(&drops)).await?;
        let prepared = planning::prepare_drops(drops, request.auto_optimize);
        let plan = planning::plan_route(prepared, route.start_time, route.service_tier, &bookings)?;

        let removed = queries::drop::delete_drops_for_route(&mut tx, route.id).await?;
        queries::drop::insert_drops(&mut tx, route.id, &plan.drops).await?;
        debug!("Replaced {} drops of route {} with {}", removed, route.id, plan.drops.len());

        optimized = plan.optimized;
        apply_plan(&mut route, &plan);
    } else if route.service_tier != existing.service_tier {
        let drops = queries::drop::list_drops_for_routes(&mut *tx, &[route.id]).await?;
        route.quoted_total_gbp =
            pricing::quoted_total(drops.iter().map(|d| d.quoted_price), route.service_tier);
    }

    let route = queries::route::save_route(&mut tx, &route).await?;
    let drops = queries::drop::list_drops_for_routes(&mut *tx, &[route.id]).await?;
    audit::record(
        &mut tx,
        admin.user_id,
        audit::UPDATE_ROUTE,
        route.id,
        json!({
            "previousStatus": existing.status,
            "status": route.status,
            "dropsReplaced": drops_replaced,
            "warnings": warnings,
        }),
    )
    .await?;
    tx.commit().await?;

    info!("Updated multi-drop route {} by {}", route.reference, admin.email);

    let message = format!("Route {} updated", route.reference);
    let optimization_score = route.optimization_score;
    Ok(RouteMutationResponse {
        route: RouteWithDrops { route, drops },
        optimized,
        optimization_score,
        warnings,
        message,
    })
}

pub async fn delete_route(
    pool: &PgPool,
    admin: &AuthInfo,
    request: DeleteRouteRequest,
) -> Result<DeleteRouteResponse, RouteError> {
    let mut tx = pool.begin().await?;

    let mut route = queries::route::lock_route(&mut tx, request.route_id)
        .await?
        .ok_or(RouteError::RouteNotFound(request.route_id))?;

    if request.hard_delete {
        let issues = validation::check_hard_delete(route.status).into_iter().collect();
        let warnings = validation::enforce(issues, request.force_delete)?;

        queries::route::delete_route(&mut tx, route.id).await?;
        audit::record(
            &mut tx,
            admin.user_id,
            audit::DELETE_ROUTE,
            route.id,
            json!({ "reference": route.reference, "status": route.status, "warnings": warnings }),
        )
        .await?;
        tx.commit().await?;

        info!("Deleted multi-drop route {} by {}", route.reference, admin.email);
        return Ok(DeleteRouteResponse {
            route_id: route.id,
            hard_deleted: true,
            warnings,
            message: format!("Route {} deleted", route.reference),
        });
    }

    let issues = validation::check_status_transition(route.status, RouteStatus::Cancelled)
        .into_iter()
        .collect();
    let warnings = validation::enforce(issues, request.force_delete)?;

    let previous = route.status;
    route.status = RouteStatus::Cancelled;
    route.admin_notes = Some(planning::admin_note("Cancelled", &admin.email, Utc::now()));
    queries::route::save_route(&mut tx, &route).await?;
    audit::record(
        &mut tx,
        admin.user_id,
        audit::CANCEL_ROUTE,
        route.id,
        json!({ "reference": route.reference, "previousStatus": previous, "warnings": warnings }),
    )
    .await?;
    tx.commit().await?;

    info!("Cancelled multi-drop route {} by {}", route.reference, admin.email);
    Ok(DeleteRouteResponse {
        route_id: route.id,
        hard_deleted: false,
        warnings,
        message: format!("Route {} cancelled", route.reference),
    })
}

pub async fn reassign_route(
    pool: &PgPool,
    admin: &AuthInfo,
    request: ReassignRouteRequest,
) -> Result<RouteMutationResponse, RouteError> {
    let mut tx = pool.begin().await?;

    let existing = queries::route::lock_route(&mut tx, request.route_id)
        .await?
        .ok_or(RouteError::RouteNotFound(request.route_id))?;
    let driver = queries::fleet::get_driver(&mut *tx, request.driver_id).await?;

    let mut issues = Vec::new();
    issues.extend(validation::check_route_open(existing.status));
    issues.extend(validation::check_driver(request.driver_id, driver.as_ref()));
    let warnings = validation::enforce(issues, request.force)?;

    let mut route = existing.clone();
    assign_driver(&mut route, request.driver_id);
    let note = planning::admin_note("Reassigned", &admin.email, Utc::now());
    route.admin_notes = Some(match &request.reason {
        Some(reason) => format!("{}: {}", note, reason),
        None => note,
    });

    let route = queries::route::save_route(&mut tx, &route).await?;
    let drops = queries::drop::list_drops_for_routes(&mut *tx, &[route.id]).await?;
    audit::record(
        &mut tx,
        admin.user_id,
        audit::REASSIGN_DRIVER,
        route.id,
        json!({
            "previousDriverId": existing.driver_id,
            "newDriverId": request.driver_id,
            "reason": request.reason,
            "warnings": warnings,
        }),
    )
    .await?;
    tx.commit().await?;

    info!(
        "Reassigned route {} from {:?} to {} by {}",
        route.reference, existing.driver_id, request.driver_id, admin.email
    );

    let message = match &driver {
        Some(d) => format!("Route {} reassigned to {}", route.reference, d.name),
        None => format!("Route {} reassigned", route.reference),
    };
    let optimization_score = route.optimization_score;
    Ok(RouteMutationResponse {
        route: RouteWithDrops { route, drops },
        optimized: false,
        optimization_score,
        warnings,
        message,
    })
}

/// Run the heuristic without touching the database
pub fn preview_sequence(drops: Vec<DropInput>) -> SequencePreviewResponse {
    let sequenced = sequencing::sequence_drops(drops);
    SequencePreviewResponse {
        reordered: sequenced.reordered(),
        order: sequenced.order,
        optimization_score: sequenced.score,
        algorithm: sequencing::ALGORITHM.to_string(),
    }
}

// ==========================================================================
// Helpers
// ==========================================================================

fn parse_status_filter(status: Option<&str>) -> Result<Option<RouteStatus>, RouteError> {
    match status {
        None | Some("all") | Some("") => Ok(None),
        Some(s) => serde_json::from_value(json!(s))
            .map(Some)
            .map_err(|_| RouteError::InvalidRequest(format!("Unknown route status '{}'", s))),
    }
}

/// `[00:00, next 00:00)` of `date` in UTC
fn utc_day(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), RouteError> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| RouteError::InvalidRequest(format!("Invalid date {}", date)))?;
    let from = Utc.from_utc_datetime(&midnight);
    Ok((from, from + Duration::days(1)))
}

/// Group drops under their routes, keeping the routes' order
fn attach_drops(routes: Vec<Route>, drops: Vec<RouteDrop>) -> Vec<RouteWithDrops> {
    let mut by_route: HashMap<Uuid, Vec<RouteDrop>> = HashMap::new();
    for drop in drops {
        by_route.entry(drop.route_id).or_default().push(drop);
    }

    routes
        .into_iter()
        .map(|route| {
            let mut drops = by_route.remove(&route.id).unwrap_or_default();
            drops.sort_by_key(|d| (d.time_window_start, d.sequence));
            RouteWithDrops { route, drops }
        })
        .collect()
}

fn booking_ids(drops: &[DropInput]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = drops.iter().filter_map(|d| d.booking_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Copy the scalar fields of an update onto the stored route
fn apply_route_changes(route: &mut Route, request: &UpdateRouteRequest) {
    if let Some(id) = request.driver_id {
        assign_driver(route, id);
    }
    if let Some(id) = request.vehicle_id {
        route.vehicle_id = Some(id);
    }
    if let Some(start) = request.start_time {
        route.start_time = start;
    }
    if let Some(tier) = request.service_tier {
        route.service_tier = tier;
    }
    if let Some(notes) = &request.notes {
        route.route_notes = Some(notes.clone());
    }
    if let Some(pricing) = request.adjusted_pricing {
        if pricing.total_price.is_some() {
            route.admin_adjusted_price = pricing.total_price;
        }
        if pricing.driver_payout.is_some() {
            route.driver_payout = pricing.driver_payout;
        }
    }
    if let Some(status) = request.status {
        route.status = status;
    }
}

fn apply_plan(route: &mut Route, plan: &RoutePlan) {
    route.total_drops = plan.drops.len() as i32;
    route.optimized_distance_km = plan.metrics.total_distance_km;
    route.estimated_duration_minutes = plan.metrics.estimated_duration_minutes;
    route.optimized_sequence = Json(plan.sequence.clone());
    route.optimization_score = plan.score;
    route.quoted_total_gbp = plan.quoted_total_gbp;
}

/// A route waiting for a driver becomes planned once it has one
fn assign_driver(route: &mut Route, driver_id: Uuid) {
    route.driver_id = Some(driver_id);
    if route.status == RouteStatus::PendingAssignment {
        route.status = RouteStatus::Planned;
    }
}
