use std::fmt;

use ulid::Ulid;

use crate::model::ReservationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Reservation,
    Vehicle,
    User,
    Role,
    ServiceRecord,
    DamageRecord,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Reservation => "reservation",
            Entity::Vehicle => "vehicle",
            Entity::User => "user",
            Entity::Role => "role",
            Entity::ServiceRecord => "service record",
            Entity::DamageRecord => "damage record",
        })
    }
}

/// The input rule a validation failure refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required(&'static str),
    Malformed(&'static str),
    TooLong { field: &'static str, max: usize },
    EndNotAfterStart,
    StartInPast,
    TimestampOutOfRange,
    DurationTooLong,
    QueryWindowTooWide,
    PassengerCount(u32),
    OverSeating { passengers: u32, seats: u32 },
    SeatingCapacity(u32),
    VehicleUnavailable(Ulid),
    InactiveUser(Ulid),
    TooManyPhotos(usize),
    NegativeCost(&'static str),
    ReservationLimit,
}

impl Rule {
    /// Field the rule is about, for problem-details pointers.
    pub fn field(&self) -> &'static str {
        match self {
            Rule::Required(f)
            | Rule::Malformed(f)
            | Rule::TooLong { field: f, .. }
            | Rule::NegativeCost(f) => f,
            Rule::EndNotAfterStart | Rule::DurationTooLong => "end_time",
            Rule::StartInPast | Rule::TimestampOutOfRange => "start_time",
            Rule::QueryWindowTooWide => "end_date",
            Rule::PassengerCount(_) | Rule::OverSeating { .. } => "passenger_count",
            Rule::SeatingCapacity(_) => "seating_capacity",
            Rule::VehicleUnavailable(_) | Rule::ReservationLimit => "vehicle_id",
            Rule::InactiveUser(_) => "user_id",
            Rule::TooManyPhotos(_) => "photos",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required(field) => write!(f, "{field} is required"),
            Rule::Malformed(field) => write!(f, "{field} is malformed"),
            Rule::TooLong { field, max } => write!(f, "{field} exceeds {max} characters"),
            Rule::EndNotAfterStart => write!(f, "end time must be after start time"),
            Rule::StartInPast => write!(f, "start time cannot be in the past"),
            Rule::TimestampOutOfRange => write!(f, "timestamp out of range"),
            Rule::DurationTooLong => write!(f, "reservation too long"),
            Rule::QueryWindowTooWide => write!(f, "query window too wide"),
            Rule::PassengerCount(n) => write!(f, "passenger count {n} outside 1..=50"),
            Rule::OverSeating { passengers, seats } => {
                write!(f, "{passengers} passengers exceed vehicle seating of {seats}")
            }
            Rule::SeatingCapacity(n) => write!(f, "seating capacity {n} outside 1..=50"),
            Rule::VehicleUnavailable(id) => {
                write!(f, "vehicle {id} is not available for reservation")
            }
            Rule::InactiveUser(id) => write!(f, "user {id} is inactive"),
            Rule::TooManyPhotos(n) => write!(f, "too many photos: {n}"),
            Rule::NegativeCost(field) => write!(f, "{field} cannot be negative"),
            Rule::ReservationLimit => write!(f, "too many reservations on vehicle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Overlaps an existing confirmed reservation on the same vehicle.
    Overlap(Ulid),
    NotConfirmed {
        id: Ulid,
        status: ReservationStatus,
    },
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    Duplicate {
        field: &'static str,
        value: String,
    },
    RoleInUse(Ulid),
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::Overlap(id) => write!(f, "overlapping reservation: {id}"),
            Conflict::NotConfirmed { id, status } => {
                write!(f, "reservation {id} is already {}", status.tag())
            }
            Conflict::InvalidTransition { from, to } => {
                write!(f, "cannot change status from {} to {}", from.tag(), to.tag())
            }
            Conflict::Duplicate { field, value } => write!(f, "{field} '{value}' already exists"),
            Conflict::RoleInUse(id) => write!(f, "role {id} is still assigned to users"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    Validation(Rule),
    Conflict(Conflict),
    Forbidden(&'static str),
    NotFound(Entity, Ulid),
    WalError(String),
}

impl EngineError {
    pub fn overlap(id: Ulid) -> Self {
        EngineError::Conflict(Conflict::Overlap(id))
    }

    pub fn duplicate(field: &'static str, value: impl Into<String>) -> Self {
        EngineError::Conflict(Conflict::Duplicate {
            field,
            value: value.into(),
        })
    }
}

impl From<Rule> for EngineError {
    fn from(rule: Rule) -> Self {
        EngineError::Validation(rule)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(rule) => write!(f, "validation failed: {rule}"),
            EngineError::Conflict(c) => write!(f, "conflict: {c}"),
            EngineError::Forbidden(why) => write!(f, "forbidden: {why}"),
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
