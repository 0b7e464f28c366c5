//! Drop types (a single pickup/delivery within a route)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Drop status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "drop_status", rename_all = "snake_case")]
pub enum DropStatus {
    Pending,
    Completed,
    Failed,
}

impl DropStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            DropStatus::Pending => "pending",
            DropStatus::Completed => "completed",
            DropStatus::Failed => "failed",
        }
    }

    /// Only `pending -> completed | failed` moves a drop.
    pub const fn can_transition_to(self, next: DropStatus) -> bool {
        matches!(
            (self, next),
            (DropStatus::Pending, DropStatus::Completed) | (DropStatus::Pending, DropStatus::Failed)
        )
    }
}

/// Drop entity as stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RouteDrop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub sequence: i32,
    pub pickup_address: String,
    pub delivery_address: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub delivery_lat: Option<f64>,
    pub delivery_lng: Option<f64>,
    pub quoted_price: f64,
    pub saved_distance: Option<f64>,
    pub weight: f64,
    pub volume: f64,
    pub time_window_start: DateTime<Utc>,
    pub time_window_end: DateTime<Utc>,
    pub status: DropStatus,
    pub created_at: DateTime<Utc>,
}

/// A drop as submitted on route create/update.
///
/// Every field is optional; missing values are coerced when the drop is
/// planned and reported through advisory validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropInput {
    #[serde(default)]
    pub booking_id: Option<Uuid>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub pickup_address: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    /// Legacy single-address field, used when `deliveryAddress` is absent
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub pickup: Option<Coordinates>,
    #[serde(default)]
    pub delivery: Option<Coordinates>,
    #[serde(default)]
    pub saved_distance: Option<f64>,
    #[serde(default)]
    pub base_distance_miles: Option<f64>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub estimated_minutes: Option<i32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub status: Option<DropStatus>,
}

impl DropInput {
    pub fn delivery_address_or_empty(&self) -> &str {
        self.delivery_address
            .as_deref()
            .or(self.address.as_deref())
            .unwrap_or("")
    }

    /// Saved distance, falling back to `baseDistanceMiles`
    pub fn saved_or_base_distance(&self) -> Option<f64> {
        self.saved_distance
            .filter(|d| d.is_finite())
            .or(self.base_distance_miles.filter(|d| d.is_finite()))
    }
}

/// Request to move a drop to a terminal status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDropStatusRequest {
    pub drop_id: Uuid,
    pub status: DropStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_input_accepts_sparse_payload() {
        let input: DropInput = serde_json::from_str(r#"{"savedDistance": 3.5}"#).unwrap();
        assert_eq!(input.saved_distance, Some(3.5));
        assert!(input.booking_id.is_none());
        assert_eq!(input.delivery_address_or_empty(), "");
    }

    #[test]
    fn test_drop_input_prefers_saved_over_base_distance() {
        let input: DropInput =
            serde_json::from_str(r#"{"savedDistance": 2.0, "baseDistanceMiles": 9.0}"#).unwrap();
        assert_eq!(input.saved_or_base_distance(), Some(2.0));

        let input: DropInput = serde_json::from_str(r#"{"baseDistanceMiles": 9.0}"#).unwrap();
        assert_eq!(input.saved_or_base_distance(), Some(9.0));
    }

    #[test]
    fn test_delivery_address_falls_back_to_legacy_field() {
        let input: DropInput = serde_json::from_str(r#"{"address": "1 Queen St, Glasgow"}"#).unwrap();
        assert_eq!(input.delivery_address_or_empty(), "1 Queen St, Glasgow");
    }

    #[test]
    fn test_drop_status_transitions() {
        assert!(DropStatus::Pending.can_transition_to(DropStatus::Completed));
        assert!(DropStatus::Pending.can_transition_to(DropStatus::Failed));
        assert!(!DropStatus::Completed.can_transition_to(DropStatus::Failed));
        assert!(!DropStatus::Failed.can_transition_to(DropStatus::Pending));
        assert!(!DropStatus::Pending.can_transition_to(DropStatus::Pending));
    }

    #[test]
    fn test_drop_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&DropStatus::Completed).unwrap(), "\"completed\"");
    }
}
