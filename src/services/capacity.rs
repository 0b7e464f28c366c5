//! Load capacity checks

use crate::defaults::{VAN_FIT_VOLUME_M3, VAN_FIT_WEIGHT_KG};
use crate::types::{DropInput, Vehicle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capacity {
    pub max_weight_kg: f64,
    pub max_volume_m3: f64,
}

impl Capacity {
    /// Standard van used for economy multi-drop runs
    pub const fn van_fit() -> Self {
        Self {
            max_weight_kg: VAN_FIT_WEIGHT_KG,
            max_volume_m3: VAN_FIT_VOLUME_M3,
        }
    }

    pub fn for_vehicle(vehicle: Option<&Vehicle>) -> Self {
        match vehicle {
            Some(v) => Self {
                max_weight_kg: v.capacity_kg,
                max_volume_m3: v.capacity_m3,
            },
            None => Self::van_fit(),
        }
    }

    pub fn fits(&self, load: &Load) -> bool {
        load.weight_kg <= self.max_weight_kg && load.volume_m3 <= self.max_volume_m3
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Load {
    pub weight_kg: f64,
    pub volume_m3: f64,
}

pub fn total_load(drops: &[DropInput]) -> Load {
    drops.iter().fold(Load::default(), |acc, d| Load {
        weight_kg: acc.weight_kg + d.weight.unwrap_or(0.0),
        volume_m3: acc.volume_m3 + d.volume.unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn load_drop(weight: f64, volume: f64) -> DropInput {
        DropInput { weight: Some(weight), volume: Some(volume), ..Default::default() }
    }

    #[test]
    fn test_total_load_treats_missing_as_zero() {
        let drops = vec![load_drop(100.0, 2.0), DropInput::default(), load_drop(50.5, 0.5)];
        assert_eq!(total_load(&drops), Load { weight_kg: 150.5, volume_m3: 2.5 });
    }

    #[test]
    fn test_van_fit_limits() {
        let van = Capacity::van_fit();
        assert!(van.fits(&Load { weight_kg: 1000.0, volume_m3: 15.0 }));
        assert!(!van.fits(&Load { weight_kg: 1000.1, volume_m3: 1.0 }));
        assert!(!van.fits(&Load { weight_kg: 10.0, volume_m3: 15.5 }));
    }

    #[test]
    fn test_vehicle_capacity_overrides_van_fit() {
        let luton = Vehicle {
            id: Uuid::new_v4(),
            license_plate: "SV24 LTN".to_string(),
            capacity_kg: 1400.0,
            capacity_m3: 20.0,
        };
        let capacity = Capacity::for_vehicle(Some(&luton));
        assert!(capacity.fits(&Load { weight_kg: 1200.0, volume_m3: 18.0 }));
        assert_eq!(Capacity::for_vehicle(None), Capacity::van_fit());
    }
}
