//! Advisory validation for route mutations.
//!
//! Checks collect issues instead of failing fast. [`enforce`] then either
//! rejects the request or, when the caller set an override flag
//! (`forceCreate`, `forceUpdate`, `forceDelete`, `skipValidation`), lets it
//! through and hands the issues back as warnings.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::defaults::{MAX_DROPS_PER_ROUTE, MIN_DROPS_PER_ROUTE};
use crate::error::RouteError;
use crate::services::capacity::{total_load, Capacity};
use crate::types::{DropInput, DropStatus, Driver, RouteStatus, Vehicle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    TooFewDrops,
    TooManyDrops,
    DriverNotFound,
    DriverNotActive,
    VehicleNotFound,
    CapacityExceeded,
    MissingDeliveryAddress,
    InvalidStatusTransition,
    RouteClosed,
    RouteNotDeletable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_index: Option<usize>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            drop_index: None,
        }
    }

    fn at_drop(mut self, index: usize) -> Self {
        self.drop_index = Some(index);
        self
    }
}

pub fn check_drop_count(count: usize) -> Option<ValidationIssue> {
    if count < MIN_DROPS_PER_ROUTE {
        Some(ValidationIssue::new(
            IssueCode::TooFewDrops,
            format!("At least {} drops are required for a multi-drop route (got {})", MIN_DROPS_PER_ROUTE, count),
        ))
    } else if count > MAX_DROPS_PER_ROUTE {
        Some(ValidationIssue::new(
            IssueCode::TooManyDrops,
            format!("Maximum {} drops allowed per route (got {})", MAX_DROPS_PER_ROUTE, count),
        ))
    } else {
        None
    }
}

/// `driver` is the lookup result for `requested`
pub fn check_driver(requested: Uuid, driver: Option<&Driver>) -> Option<ValidationIssue> {
    match driver {
        None => Some(ValidationIssue::new(
            IssueCode::DriverNotFound,
            format!("Driver {} not found", requested),
        )),
        Some(d) if !d.is_active() => Some(ValidationIssue::new(
            IssueCode::DriverNotActive,
            format!("Driver {} is not active (status: {})", d.name, d.status),
        )),
        Some(_) => None,
    }
}

pub fn check_vehicle(requested: Uuid, vehicle: Option<&Vehicle>) -> Option<ValidationIssue> {
    if vehicle.is_none() {
        return Some(ValidationIssue::new(
            IssueCode::VehicleNotFound,
            format!("Vehicle {} not found", requested),
        ));
    }
    None
}

pub fn check_capacity(drops: &[DropInput], vehicle: Option<&Vehicle>) -> Option<ValidationIssue> {
    let capacity = Capacity::for_vehicle(vehicle);
    let load = total_load(drops);
    if capacity.fits(&load) {
        return None;
    }
    Some(ValidationIssue::new(
        IssueCode::CapacityExceeded,
        format!(
            "Load {:.1} kg / {:.1} m³ exceeds capacity {:.1} kg / {:.1} m³",
            load.weight_kg, load.volume_m3, capacity.max_weight_kg, capacity.max_volume_m3
        ),
    ))
}

pub fn check_addresses(drops: &[DropInput]) -> Vec<ValidationIssue> {
    drops
        .iter()
        .enumerate()
        .filter(|(_, d)| d.delivery_address_or_empty().trim().is_empty())
        .map(|(i, _)| {
            ValidationIssue::new(
                IssueCode::MissingDeliveryAddress,
                format!("Drop {} has no delivery address", i + 1),
            )
            .at_drop(i)
        })
        .collect()
}

pub fn check_status_transition(from: RouteStatus, to: RouteStatus) -> Option<ValidationIssue> {
    if from.can_transition_to(to) {
        return None;
    }
    Some(ValidationIssue::new(
        IssueCode::InvalidStatusTransition,
        format!("Route cannot move from {} to {}", from.as_str(), to.as_str()),
    ))
}

/// A finished route keeps its drops and driver as history.
pub fn check_route_open(status: RouteStatus) -> Option<ValidationIssue> {
    if !status.is_terminal() {
        return None;
    }
    Some(ValidationIssue::new(
        IssueCode::RouteClosed,
        format!("Route is {} and can no longer be changed", status.as_str()),
    ))
}

pub fn check_drop_transition(from: DropStatus, to: DropStatus) -> Option<ValidationIssue> {
    if from.can_transition_to(to) {
        return None;
    }
    Some(ValidationIssue::new(
        IssueCode::InvalidStatusTransition,
        format!("Drop cannot move from {} to {}", from.as_str(), to.as_str()),
    ))
}

pub fn check_hard_delete(status: RouteStatus) -> Option<ValidationIssue> {
    if status.allows_hard_delete() {
        return None;
    }
    Some(ValidationIssue::new(
        IssueCode::RouteNotDeletable,
        format!("Can only hard delete planned routes (status: {})", status.as_str()),
    ))
}

/// Reject on any issue unless `bypass` is set, in which case the issues are
/// returned for the reply's `warnings`.
pub fn enforce(issues: Vec<ValidationIssue>, bypass: bool) -> Result<Vec<ValidationIssue>, RouteError> {
    if issues.is_empty() {
        return Ok(issues);
    }
    if !bypass {
        return Err(RouteError::Validation(issues));
    }
    for issue in &issues {
        warn!("Validation overridden: {:?} - {}", issue.code, issue.message);
    }
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(status: &str) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: "Sam Carter".to_string(),
            email: "sam@speedy-van.co.uk".to_string(),
            status: status.to_string(),
        }
    }

    fn addressed(address: &str) -> DropInput {
        DropInput { delivery_address: Some(address.to_string()), ..Default::default() }
    }

    #[test]
    fn test_drop_count_bounds() {
        assert_eq!(check_drop_count(1).unwrap().code, IssueCode::TooFewDrops);
        assert!(check_drop_count(2).is_none());
        assert!(check_drop_count(20).is_none());
        assert_eq!(check_drop_count(21).unwrap().code, IssueCode::TooManyDrops);
    }

    #[test]
    fn test_driver_checks() {
        let id = Uuid::new_v4();
        assert_eq!(check_driver(id, None).unwrap().code, IssueCode::DriverNotFound);
        assert_eq!(
            check_driver(id, Some(&driver("suspended"))).unwrap().code,
            IssueCode::DriverNotActive
        );
        assert!(check_driver(id, Some(&driver("active"))).is_none());
    }

    #[test]
    fn test_vehicle_check() {
        assert_eq!(check_vehicle(Uuid::new_v4(), None).unwrap().code, IssueCode::VehicleNotFound);
    }

    #[test]
    fn test_capacity_check_uses_van_fit_without_vehicle() {
        let heavy = vec![
            DropInput { weight: Some(600.0), ..Default::default() },
            DropInput { weight: Some(600.0), ..Default::default() },
        ];
        assert_eq!(check_capacity(&heavy, None).unwrap().code, IssueCode::CapacityExceeded);
        assert!(check_capacity(&heavy[..1], None).is_none());
    }

    #[test]
    fn test_missing_addresses_are_reported_per_drop() {
        let drops = vec![addressed("1 High St"), DropInput::default(), addressed("   ")];
        let issues = check_addresses(&drops);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].drop_index, Some(1));
        assert_eq!(issues[1].drop_index, Some(2));
    }

    #[test]
    fn test_status_and_delete_checks() {
        assert!(check_status_transition(RouteStatus::Planned, RouteStatus::Active).is_none());
        assert_eq!(
            check_status_transition(RouteStatus::Completed, RouteStatus::Planned).unwrap().code,
            IssueCode::InvalidStatusTransition
        );
        assert!(check_route_open(RouteStatus::Active).is_none());
        assert_eq!(check_route_open(RouteStatus::Cancelled).unwrap().code, IssueCode::RouteClosed);
        assert!(check_drop_transition(DropStatus::Pending, DropStatus::Failed).is_none());
        assert_eq!(
            check_drop_transition(DropStatus::Completed, DropStatus::Pending).unwrap().code,
            IssueCode::InvalidStatusTransition
        );
        assert!(check_hard_delete(RouteStatus::Planned).is_none());
        assert_eq!(check_hard_delete(RouteStatus::Active).unwrap().code, IssueCode::RouteNotDeletable);
    }

    #[test]
    fn test_enforce_rejects_without_bypass() {
        let issues = vec![check_drop_count(1).unwrap()];
        match enforce(issues, false) {
            Err(RouteError::Validation(found)) => assert_eq!(found.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_enforce_returns_warnings_with_bypass() {
        let issues = vec![check_drop_count(1).unwrap(), check_drop_count(30).unwrap()];
        let warnings = enforce(issues, true).unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(enforce(vec![], false).unwrap().is_empty());
    }

    #[test]
    fn test_issue_serialization() {
        let issue = check_addresses(&[DropInput::default()]).remove(0);
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "MISSING_DELIVERY_ADDRESS");
        assert_eq!(json["dropIndex"], 0);

        let json = serde_json::to_value(check_drop_count(0).unwrap()).unwrap();
        assert!(json.get("dropIndex").is_none());
    }
}
