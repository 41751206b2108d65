use ulid::Ulid;

use crate::access::Capability;
use crate::limits::*;
use crate::model::*;

use super::availability::free_windows;
use super::error::{Entity, Rule};
use super::{Engine, EngineError};

/// Pass-through listing filters. `from` bounds start inclusively, `to` bounds
/// end exclusively.
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub vehicle_id: Option<Ulid>,
    pub status: Option<ReservationStatus>,
    pub from: Option<Ms>,
    pub to: Option<Ms>,
}

impl ReservationFilter {
    fn matches(&self, r: &Reservation) -> bool {
        self.vehicle_id.is_none_or(|v| r.vehicle_id == v)
            && self.status.is_none_or(|s| r.status == s)
            && self.from.is_none_or(|from| r.span.start >= from)
            && self.to.is_none_or(|to| r.span.end < to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    pub vehicle_id: Ulid,
    pub window: Span,
    /// Active, not archived, and no confirmed reservation overlaps the window.
    pub available: bool,
    pub reservable: bool,
    pub conflicts: Vec<Reservation>,
    pub free: Vec<Span>,
}

fn check_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start >= end {
        return Err(Rule::EndNotAfterStart.into());
    }
    if end - start > MAX_QUERY_WINDOW_MS {
        return Err(Rule::QueryWindowTooWide.into());
    }
    Ok(Span::new(start, end))
}

impl Engine {
    /// Owner or an administrator.
    pub async fn get_reservation(&self, actor: &Actor, id: Ulid) -> Result<Reservation, EngineError> {
        let vehicle_id = self
            .reservation_index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        let shared = self
            .vehicle_state(&vehicle_id)
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        let reservation = shared
            .read()
            .await
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        if reservation.user_id != actor.id && !actor.role.can(Capability::ViewAllReservations) {
            return Err(EngineError::Forbidden("reservation belongs to another user"));
        }
        Ok(reservation)
    }

    /// Newest start first. Non-administrators only ever see their own.
    pub async fn list_reservations(&self, actor: &Actor, filter: &ReservationFilter) -> Vec<Reservation> {
        let see_all = actor.role.can(Capability::ViewAllReservations);
        let shared: Vec<_> = match filter.vehicle_id {
            Some(vid) => self.vehicle_state(&vid).into_iter().collect(),
            None => self.vehicles.iter().map(|e| e.value().clone()).collect(),
        };
        let mut out = Vec::new();
        for vs in shared {
            let guard = vs.read().await;
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| see_all || r.user_id == actor.id)
                    .filter(|r| filter.matches(r))
                    .cloned(),
            );
        }
        out.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(b.id.cmp(&a.id)));
        out
    }

    /// Confirmed reservations starting inside `[start, end)`, across the fleet.
    pub async fn calendar(&self, start: Ms, end: Ms) -> Result<Vec<Reservation>, EngineError> {
        let window = check_window(start, end)?;
        let shared: Vec<_> = self.vehicles.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for vs in shared {
            let guard = vs.read().await;
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.is_confirmed() && window.contains_instant(r.span.start))
                    .cloned(),
            );
        }
        out.sort_by(|a, b| a.span.start.cmp(&b.span.start).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    pub async fn vehicle_availability(
        &self,
        vehicle_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Availability, EngineError> {
        let window = check_window(start, end)?;
        let shared = self
            .vehicle_state(&vehicle_id)
            .ok_or(EngineError::NotFound(Entity::Vehicle, vehicle_id))?;
        let guard = shared.read().await;
        let conflicts: Vec<Reservation> = guard
            .overlapping(&window)
            .filter(|r| r.is_confirmed())
            .cloned()
            .collect();
        let reservable = guard.vehicle.is_reservable();
        Ok(Availability {
            vehicle_id,
            window,
            available: reservable && conflicts.is_empty(),
            reservable,
            conflicts,
            free: free_windows(&guard, &window),
        })
    }
}
