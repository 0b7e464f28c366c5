//! Route planning: metrics, time windows and the persisted visiting order

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::defaults::{DEFAULT_DROP_MINUTES, DROP_SLOT_MINUTES};
use crate::error::RouteError;
use crate::services::pricing;
use crate::services::sequencing::{self, ALGORITHM};
use crate::types::{BookingRef, DropInput, DropStatus, RouteStatus, SequenceEntry, ServiceTier};

/// Route-level sums over the submitted drops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteMetrics {
    pub total_distance_km: f64,
    pub estimated_duration_minutes: i32,
}

/// Drops after optional sequencing
#[derive(Debug, Clone)]
pub struct PreparedDrops {
    pub drops: Vec<DropInput>,
    pub optimized: bool,
    pub score: f64,
}

/// A drop ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewDrop {
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
}

/// Everything a route row needs besides its identity
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub drops: Vec<NewDrop>,
    pub sequence: Vec<SequenceEntry>,
    pub metrics: RouteMetrics,
    pub quoted_total_gbp: f64,
    pub optimized: bool,
    pub score: f64,
}

/// Run the sequencing heuristic when asked to and when there is something to
/// reorder (more than two drops).
pub fn prepare_drops(drops: Vec<DropInput>, auto_optimize: bool) -> PreparedDrops {
    if !auto_optimize || drops.len() <= 2 {
        return PreparedDrops {
            drops,
            optimized: false,
            score: 1.0,
        };
    }

    let count = drops.len();
    let sequenced = sequencing::sequence_drops(drops);
    info!(
        "Applied {} to {} drops (reordered: {}, score: {:.3})",
        ALGORITHM,
        count,
        sequenced.reordered(),
        sequenced.score
    );

    PreparedDrops {
        drops: sequenced.drops,
        optimized: true,
        score: sequenced.score,
    }
}

/// Delivery slot of the drop at 0-based `position`. Fails when the slot
/// falls outside the representable date range.
pub fn time_window(
    start: DateTime<Utc>,
    position: usize,
) -> Result<(DateTime<Utc>, DateTime<Utc>), RouteError> {
    let out_of_range = || {
        RouteError::InvalidRequest(format!(
            "startTime {} leaves no room for drop {}",
            start.to_rfc3339(),
            position.saturating_add(1)
        ))
    };

    let slots = i64::try_from(position).map_err(|_| out_of_range())?;
    let offset = slots
        .checked_mul(DROP_SLOT_MINUTES)
        .and_then(Duration::try_minutes)
        .ok_or_else(out_of_range)?;
    let window_start = start.checked_add_signed(offset).ok_or_else(out_of_range)?;
    let window_end = Duration::try_minutes(DROP_SLOT_MINUTES)
        .and_then(|slot| window_start.checked_add_signed(slot))
        .ok_or_else(out_of_range)?;

    Ok((window_start, window_end))
}

/// Distance and duration sums. Negative or overflowing minutes are rejected.
pub fn route_metrics(drops: &[DropInput]) -> Result<RouteMetrics, RouteError> {
    let total_distance_km = drops.iter().map(|d| d.distance_km.unwrap_or(0.0)).sum();

    let mut estimated_duration_minutes: i32 = 0;
    for (index, drop) in drops.iter().enumerate() {
        let minutes = drop.estimated_minutes.unwrap_or(DEFAULT_DROP_MINUTES);
        if minutes < 0 {
            return Err(RouteError::InvalidRequest(format!(
                "Drop {} has negative estimatedMinutes ({})",
                index + 1,
                minutes
            )));
        }
        estimated_duration_minutes = estimated_duration_minutes
            .checked_add(minutes)
            .ok_or_else(|| RouteError::InvalidRequest("Total estimatedMinutes is too large".to_string()))?;
    }

    Ok(RouteMetrics {
        total_distance_km,
        estimated_duration_minutes,
    })
}

/// Status of a freshly created route
pub fn initial_status(driver_id: Option<Uuid>) -> RouteStatus {
    if driver_id.is_some() {
        RouteStatus::Planned
    } else {
        RouteStatus::PendingAssignment
    }
}

/// Turn ordered drop inputs into insertable drops plus the route-level
/// figures. `bookings` supplies quoted prices and customers for drops that
/// reference a booking; unknown bookings quote zero.
pub fn plan_route(
    prepared: PreparedDrops,
    start: DateTime<Utc>,
    tier: ServiceTier,
    bookings: &HashMap<Uuid, BookingRef>,
) -> Result<RoutePlan, RouteError> {
    let metrics = route_metrics(&prepared.drops)?;

    let drops = prepared
        .drops
        .iter()
        .enumerate()
        .map(|(position, input)| plan_drop(input, position, start, bookings))
        .collect::<Result<Vec<NewDrop>, RouteError>>()?;

    let sequence = drops
        .iter()
        .map(|drop| SequenceEntry {
            sequence: drop.sequence,
            booking_id: drop.booking_id,
            address: drop.delivery_address.clone(),
            estimated_arrival: drop.time_window_start,
        })
        .collect();

    let quoted_total_gbp = pricing::quoted_total(drops.iter().map(|d| d.quoted_price), tier);

    Ok(RoutePlan {
        drops,
        sequence,
        metrics,
        quoted_total_gbp,
        optimized: prepared.optimized,
        score: prepared.score,
    })
}

fn plan_drop(
    input: &DropInput,
    position: usize,
    start: DateTime<Utc>,
    bookings: &HashMap<Uuid, BookingRef>,
) -> Result<NewDrop, RouteError> {
    let booking = input.booking_id.and_then(|id| bookings.get(&id));
    let (time_window_start, time_window_end) = time_window(start, position)?;

    Ok(NewDrop {
        booking_id: input.booking_id,
        customer_id: booking.and_then(|b| b.customer_id).or(input.customer_id),
        sequence: position as i32 + 1,
        pickup_address: input.pickup_address.clone().unwrap_or_default(),
        delivery_address: input.delivery_address_or_empty().to_string(),
        pickup_lat: input.pickup.map(|c| c.lat),
        pickup_lng: input.pickup.map(|c| c.lng),
        delivery_lat: input.delivery.map(|c| c.lat),
        delivery_lng: input.delivery.map(|c| c.lng),
        quoted_price: booking.map(|b| b.total_gbp).unwrap_or(0.0),
        saved_distance: input.saved_or_base_distance(),
        weight: input.weight.unwrap_or(0.0),
        volume: input.volume.unwrap_or(0.0),
        time_window_start,
        time_window_end,
        status: input.status.unwrap_or(DropStatus::Pending),
    })
}

/// Note stamped on the route by every admin mutation
pub fn admin_note(action: &str, admin_email: &str, at: DateTime<Utc>) -> String {
    format!("{} by admin {} at {}", action, admin_email, at.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn drop_with(saved: f64, address: &str) -> DropInput {
        DropInput {
            saved_distance: Some(saved),
            delivery_address: Some(address.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_time_windows_are_thirty_minute_slots() {
        let (s0, e0) = time_window(start(), 0).unwrap();
        assert_eq!(s0, start());
        assert_eq!(e0, start() + Duration::minutes(30));

        let (s3, e3) = time_window(start(), 3).unwrap();
        assert_eq!(s3, start() + Duration::minutes(90));
        assert_eq!(e3, start() + Duration::minutes(120));
    }

    #[test]
    fn test_time_window_past_the_calendar_is_rejected() {
        // Ten minutes before the last representable instant
        let late = DateTime::<Utc>::MAX_UTC - Duration::minutes(10);
        assert!(matches!(time_window(late, 0), Err(RouteError::InvalidRequest(_))));
        assert!(matches!(time_window(start(), usize::MAX), Err(RouteError::InvalidRequest(_))));

        let drops = vec![drop_with(1.0, "a"), drop_with(2.0, "b")];
        let result = plan_route(prepare_drops(drops, false), late, ServiceTier::Standard, &HashMap::new());
        match result {
            Err(err) => assert_eq!(err.code(), "INVALID_REQUEST"),
            Ok(_) => panic!("expected far-future start to be rejected"),
        }
    }

    #[test]
    fn test_route_metrics_defaults() {
        let drops = vec![
            DropInput { distance_km: Some(12.5), estimated_minutes: Some(45), ..Default::default() },
            DropInput::default(),
        ];
        let metrics = route_metrics(&drops).unwrap();
        assert!((metrics.total_distance_km - 12.5).abs() < f64::EPSILON);
        assert_eq!(metrics.estimated_duration_minutes, 75);
    }

    #[test]
    fn test_route_metrics_rejects_overflowing_minutes() {
        let drops = vec![
            DropInput { estimated_minutes: Some(i32::MAX), ..Default::default() },
            DropInput { estimated_minutes: Some(1), ..Default::default() },
        ];
        assert!(matches!(route_metrics(&drops), Err(RouteError::InvalidRequest(_))));

        let drops = vec![
            DropInput { estimated_minutes: Some(i32::MAX), ..Default::default() },
            DropInput { estimated_minutes: Some(0), ..Default::default() },
        ];
        assert_eq!(route_metrics(&drops).unwrap().estimated_duration_minutes, i32::MAX);
    }

    #[test]
    fn test_route_metrics_rejects_negative_minutes() {
        let drops = vec![
            DropInput { estimated_minutes: Some(20), ..Default::default() },
            DropInput { estimated_minutes: Some(-5), ..Default::default() },
        ];
        match route_metrics(&drops) {
            Err(RouteError::InvalidRequest(msg)) => assert!(msg.contains("Drop 2")),
            other => panic!("expected invalid request, got {:?}", other.map(|m| m.estimated_duration_minutes)),
        }
    }

    #[test]
    fn test_prepare_drops_without_auto_optimize_keeps_order() {
        let drops = vec![drop_with(9.0, "a"), drop_with(1.0, "b"), drop_with(5.0, "c")];
        let prepared = prepare_drops(drops, false);
        assert!(!prepared.optimized);
        assert_eq!(prepared.score, 1.0);
        assert_eq!(prepared.drops[1].delivery_address.as_deref(), Some("b"));
    }

    #[test]
    fn test_prepare_drops_skips_two_drop_routes() {
        let drops = vec![drop_with(9.0, "a"), drop_with(1.0, "b")];
        let prepared = prepare_drops(drops, true);
        assert!(!prepared.optimized);
        assert_eq!(prepared.score, 1.0);
    }

    #[test]
    fn test_prepare_drops_sequences_longer_routes() {
        let drops = vec![drop_with(9.0, "a"), drop_with(6.0, "b"), drop_with(1.0, "c")];
        let prepared = prepare_drops(drops, true);
        assert!(prepared.optimized);
        let order: Vec<_> = prepared
            .drops
            .iter()
            .map(|d| d.delivery_address.clone().unwrap())
            .collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        // avg(9, 1) = 5
        assert!((prepared.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_plan_route_copies_booking_price_and_customer() {
        let booking_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();
        let mut bookings = HashMap::new();
        bookings.insert(
            booking_id,
            BookingRef { id: booking_id, customer_id: Some(customer_id), total_gbp: 120.0 },
        );

        let drops = vec![
            DropInput {
                booking_id: Some(booking_id),
                delivery_address: Some("1 High St".to_string()),
                delivery: Some(Coordinates { lat: 51.5, lng: -0.12 }),
                weight: Some(80.0),
                ..Default::default()
            },
            DropInput {
                booking_id: Some(Uuid::new_v4()),
                address: Some("2 Low Rd".to_string()),
                ..Default::default()
            },
        ];

        let plan = plan_route(prepare_drops(drops, false), start(), ServiceTier::Standard, &bookings).unwrap();

        assert_eq!(plan.drops.len(), 2);
        assert_eq!(plan.drops[0].quoted_price, 120.0);
        assert_eq!(plan.drops[0].customer_id, Some(customer_id));
        assert_eq!(plan.drops[0].delivery_lat, Some(51.5));
        assert_eq!(plan.drops[0].weight, 80.0);
        assert_eq!(plan.drops[0].status, DropStatus::Pending);
        // Unknown booking quotes zero
        assert_eq!(plan.drops[1].quoted_price, 0.0);
        assert_eq!(plan.drops[1].delivery_address, "2 Low Rd");
        assert_eq!(plan.drops[1].sequence, 2);
        assert_eq!(plan.quoted_total_gbp, 120.0);
    }

    #[test]
    fn test_plan_route_sequence_snapshot_follows_final_order() {
        let drops = vec![drop_with(9.0, "a"), drop_with(6.0, "b"), drop_with(1.0, "c")];
        let plan = plan_route(prepare_drops(drops, true), start(), ServiceTier::Economy, &HashMap::new()).unwrap();

        let addresses: Vec<_> = plan.sequence.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(addresses, vec!["a", "c", "b"]);
        assert_eq!(plan.sequence[2].sequence, 3);
        assert_eq!(plan.sequence[2].estimated_arrival, start() + Duration::minutes(60));
        assert_eq!(plan.drops[2].time_window_end, start() + Duration::minutes(90));
        assert!(plan.optimized);
    }

    #[test]
    fn test_initial_status_depends_on_driver() {
        assert_eq!(initial_status(None), RouteStatus::PendingAssignment);
        assert_eq!(initial_status(Some(Uuid::new_v4())), RouteStatus::Planned);
    }

    #[test]
    fn test_admin_note_format() {
        let note = admin_note("Updated", "ops@speedy-van.co.uk", start());
        assert_eq!(note, "Updated by admin ops@speedy-van.co.uk at 2026-03-02T08:00:00+00:00");
    }
}
