use ulid::Ulid;

use crate::access::Capability;
use crate::limits::*;
use crate::model::*;

use super::error::{Conflict, Rule};
use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn require(actor: &Actor, capability: Capability) -> Result<(), EngineError> {
    if actor.role.can(capability) {
        Ok(())
    } else {
        Err(EngineError::Forbidden("administrator privileges required"))
    }
}

/// Ordering first, then absolute bounds, then length.
pub(crate) fn validate_span(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start >= end {
        return Err(Rule::EndNotAfterStart.into());
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(Rule::TimestampOutOfRange.into());
    }
    let span = Span::new(start, end);
    if span.duration_ms() > MAX_RESERVATION_DURATION_MS {
        return Err(Rule::DurationTooLong.into());
    }
    Ok(span)
}

pub(crate) fn check_not_past(span: &Span, now: Ms) -> Result<(), EngineError> {
    if span.start < now {
        return Err(Rule::StartInPast.into());
    }
    Ok(())
}

pub(crate) fn check_required(field: &'static str, value: &str, max: usize) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(Rule::Required(field).into());
    }
    check_len(field, value, max)
}

pub(crate) fn check_optional(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), EngineError> {
    match value {
        Some(v) => check_len(field, v, max),
        None => Ok(()),
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), EngineError> {
    if value.chars().count() > max {
        return Err(Rule::TooLong { field, max }.into());
    }
    Ok(())
}

pub(crate) fn check_passengers(count: u32) -> Result<(), EngineError> {
    if !(MIN_PASSENGERS..=MAX_PASSENGERS).contains(&count) {
        return Err(Rule::PassengerCount(count).into());
    }
    Ok(())
}

pub(crate) fn check_reservable(vehicle: &Vehicle) -> Result<(), EngineError> {
    if !vehicle.is_reservable() {
        return Err(Rule::VehicleUnavailable(vehicle.id).into());
    }
    Ok(())
}

pub(crate) fn check_seating(passengers: u32, vehicle: &Vehicle) -> Result<(), EngineError> {
    if passengers > vehicle.seating_capacity {
        return Err(Rule::OverSeating {
            passengers,
            seats: vehicle.seating_capacity,
        }
        .into());
    }
    Ok(())
}

/// Any confirmed reservation overlapping `span` is a conflict. `exclude` is the
/// reservation being edited, whose prior interval does not count against itself.
pub(crate) fn check_no_conflict(
    vs: &VehicleState,
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match vs
        .overlapping(span)
        .find(|r| r.is_confirmed() && Some(r.id) != exclude)
    {
        Some(existing) => Err(EngineError::overlap(existing.id)),
        None => Ok(()),
    }
}

/// Administrators may always edit. Anyone else only their own confirmed
/// reservation, and only while at least the edit window remains before start.
pub fn can_edit(reservation: &Reservation, actor: &Actor, now: Ms) -> bool {
    if actor.role.can(Capability::OverrideReservations) {
        return true;
    }
    reservation.user_id == actor.id
        && reservation.is_confirmed()
        && reservation.span.start - now >= EDIT_WINDOW_MS
}

/// Status before authorization: cancelling twice is always a conflict.
pub(crate) fn check_cancel(reservation: &Reservation, actor: &Actor, now: Ms) -> Result<(), EngineError> {
    if !reservation.is_confirmed() {
        return Err(EngineError::Conflict(Conflict::NotConfirmed {
            id: reservation.id,
            status: reservation.status,
        }));
    }
    if !can_edit(reservation, actor, now) {
        return Err(EngineError::Forbidden(
            "only the owner may cancel, and not within two hours of start",
        ));
    }
    Ok(())
}
