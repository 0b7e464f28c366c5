//! Drivers, vehicles and bookings referenced by routes

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Driver as seen by route management
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: String,
}

impl Driver {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Vehicle with its load capacity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub license_plate: String,
    pub capacity_kg: f64,
    pub capacity_m3: f64,
}

/// The booking fields a drop copies
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingRef {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub total_gbp: f64,
}
