use crate::model::{DAY_MS, HOUR_MS, Ms};

/// Non-administrators may modify or cancel until this long before start.
pub const EDIT_WINDOW_MS: Ms = 2 * HOUR_MS;

/// Hard passenger bound, independent of any vehicle's seating.
pub const MIN_PASSENGERS: u32 = 1;
pub const MAX_PASSENGERS: u32 = 50;

/// Seating capacity accepted when registering a vehicle.
pub const MAX_SEATING_CAPACITY: u32 = 50;

// 2000-01-01 .. 2100-01-01
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

pub const MAX_RESERVATION_DURATION_MS: Ms = 90 * DAY_MS;
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * DAY_MS;

pub const MAX_RESERVATIONS_PER_VEHICLE: usize = 100_000;

pub const MAX_SHORT_TEXT_LEN: usize = 200;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 4_000;
pub const MAX_PHOTOS: usize = 32;

/// How many times a mutation re-resolves a reservation that moved vehicles
/// between lookup and lock acquisition.
pub const MAX_LOCK_RETRIES: usize = 3;
