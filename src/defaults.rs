/// Length of each drop's delivery slot, counted from the route start.
pub const DROP_SLOT_MINUTES: i64 = 30;

/// Duration assumed for a drop that does not carry `estimatedMinutes`.
pub const DEFAULT_DROP_MINUTES: i32 = 30;

/// Sequencing key for drops without a saved distance.
pub const FALLBACK_SAVED_DISTANCE_KM: f64 = 5.0;

/// Average saved distance at which the optimization score reaches zero.
pub const SCORE_DISTANCE_SCALE_KM: f64 = 10.0;

pub const MIN_DROPS_PER_ROUTE: usize = 2;
pub const MAX_DROPS_PER_ROUTE: usize = 20;

/// Van-fit limits used when no vehicle is attached to the route.
pub const VAN_FIT_VOLUME_M3: f64 = 15.0;
pub const VAN_FIT_WEIGHT_KG: f64 = 1000.0;

pub const ECONOMY_MULTIPLIER: f64 = 0.85;
pub const PRIORITY_MULTIPLIER: f64 = 1.5;

/// Route references are `SV` followed by this many digits.
pub const REFERENCE_DIGITS: usize = 8;
pub const REFERENCE_PREFIX: &str = "SV";
pub const MAX_REFERENCE_ATTEMPTS: usize = 10;
