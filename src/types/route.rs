//! Route types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{DropInput, RouteDrop};
use crate::services::validation::ValidationIssue;

/// Multi-drop route entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Route {
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
    pub optimized_sequence: Json<Vec<SequenceEntry>>,
    pub optimization_score: f64,
    pub quoted_total_gbp: f64,
    pub admin_adjusted_price: Option<f64>,
    pub driver_payout: Option<f64>,
    pub route_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub is_modified_by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Route status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "route_status", rename_all = "snake_case")]
pub enum RouteStatus {
    PendingAssignment,
    Planned,
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl RouteStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RouteStatus::PendingAssignment => "pending_assignment",
            RouteStatus::Planned => "planned",
            RouteStatus::Active => "active",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
            RouteStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RouteStatus::Completed | RouteStatus::Cancelled | RouteStatus::Failed)
    }

    /// Staying in the same status is always allowed.
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        use RouteStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (PendingAssignment, Planned)
                | (PendingAssignment, Cancelled)
                | (Planned, PendingAssignment)
                | (Planned, Active)
                | (Planned, Cancelled)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Cancelled)
        )
    }

    /// Routes that never started can be removed outright.
    pub const fn allows_hard_delete(self) -> bool {
        matches!(self, RouteStatus::Planned | RouteStatus::PendingAssignment)
    }
}

/// Service tier, drives the quoted total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "service_tier", rename_all = "snake_case")]
pub enum ServiceTier {
    Economy,
    #[default]
    Standard,
    Priority,
}

/// One entry of the persisted visiting order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceEntry {
    pub sequence: i32,
    pub booking_id: Option<Uuid>,
    pub address: String,
    pub estimated_arrival: DateTime<Utc>,
}

/// Route together with its drops, ordered by time window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWithDrops {
    #[serde(flatten)]
    pub route: Route,
    pub drops: Vec<RouteDrop>,
}

/// Request to create a multi-drop route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub drops: Vec<DropInput>,
    #[serde(default)]
    pub service_tier: ServiceTier,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub auto_optimize: bool,
    #[serde(default)]
    pub force_create: bool,
    #[serde(default)]
    pub skip_validation: bool,
}

/// Admin price override
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustedPricing {
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub driver_payout: Option<f64>,
}

/// Request to update a route. A `drops` list replaces every drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRouteRequest {
    pub route_id: Uuid,
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub drops: Option<Vec<DropInput>>,
    #[serde(default)]
    pub status: Option<RouteStatus>,
    #[serde(default)]
    pub service_tier: Option<ServiceTier>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub adjusted_pricing: Option<AdjustedPricing>,
    #[serde(default)]
    pub auto_optimize: bool,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub skip_validation: bool,
}

/// Reply to create/update
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMutationResponse {
    pub route: RouteWithDrops,
    pub optimized: bool,
    pub optimization_score: f64,
    pub warnings: Vec<ValidationIssue>,
    pub message: String,
}

/// Request to cancel or remove a route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRouteRequest {
    pub route_id: Uuid,
    #[serde(default)]
    pub hard_delete: bool,
    #[serde(default)]
    pub force_delete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRouteResponse {
    pub route_id: Uuid,
    pub hard_deleted: bool,
    pub warnings: Vec<ValidationIssue>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRouteRequest {
    pub route_id: Uuid,
}

/// Filters for listing multi-drop routes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRoutesRequest {
    /// Route status, or "all"
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    /// UTC day on which the route starts
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRoutesResponse {
    pub items: Vec<RouteWithDrops>,
    pub count: usize,
}

/// Request to hand a route to another driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignRouteRequest {
    pub route_id: Uuid,
    pub driver_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub force: bool,
}

/// Dry run of the sequencing heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencePreviewRequest {
    pub drops: Vec<DropInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencePreviewResponse {
    /// Input indices in visiting order
    pub order: Vec<usize>,
    pub optimization_score: f64,
    pub reordered: bool,
    pub algorithm: String,
}
