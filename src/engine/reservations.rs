use tracing::info;
use ulid::Ulid;

use crate::access::Capability;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::error::{Conflict, Entity, Rule};
use super::policy::{self, now_ms};
use super::{Engine, EngineError};

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub vehicle_id: Ulid,
    /// Book on behalf of someone else. Administrators only.
    pub user_id: Option<Ulid>,
    pub start: Ms,
    pub end: Ms,
    pub purpose: String,
    pub destination: String,
    pub passenger_count: u32,
    pub user_notes: Option<String>,
    pub admin_notes: Option<String>,
}

/// Partial update. `None` leaves a field alone; an empty note clears it.
#[derive(Debug, Clone, Default)]
pub struct ReservationPatch {
    pub vehicle_id: Option<Ulid>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
    pub purpose: Option<String>,
    pub destination: Option<String>,
    pub passenger_count: Option<u32>,
    pub user_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub status: Option<ReservationStatus>,
    pub user_id: Option<Ulid>,
}

impl ReservationPatch {
    /// Restricted fields that would change `current`. A value equal to the
    /// stored one counts as absent.
    fn touches_admin_fields(&self, current: &Reservation) -> bool {
        let notes_change = self
            .admin_notes
            .as_ref()
            .is_some_and(|n| clear_if_empty(n.clone()) != current.admin_notes);
        notes_change
            || self.status.is_some_and(|s| s != current.status)
            || self.user_id.is_some_and(|u| u != current.user_id)
    }
}

fn clear_if_empty(note: String) -> Option<String> {
    if note.trim().is_empty() { None } else { Some(note) }
}

fn record_outcome<T>(op: &'static str, result: &Result<T, EngineError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(EngineError::Validation(_)) => "invalid",
        Err(EngineError::Conflict(_)) => "conflict",
        Err(EngineError::Forbidden(_)) => "forbidden",
        Err(EngineError::NotFound(..)) => "not_found",
        Err(EngineError::WalError(_)) => "error",
    };
    metrics::counter!(observability::RESERVATION_DECISIONS_TOTAL, "op" => op, "outcome" => outcome)
        .increment(1);
}

impl Engine {
    pub async fn create_reservation(
        &self,
        actor: &Actor,
        req: NewReservation,
    ) -> Result<Reservation, EngineError> {
        let result = self.create_reservation_inner(actor, req, now_ms()).await;
        record_outcome("create", &result);
        result
    }

    async fn create_reservation_inner(
        &self,
        actor: &Actor,
        req: NewReservation,
        now: Ms,
    ) -> Result<Reservation, EngineError> {
        policy::check_required("purpose", &req.purpose, MAX_SHORT_TEXT_LEN)?;
        policy::check_required("destination", &req.destination, MAX_SHORT_TEXT_LEN)?;
        policy::check_optional("user_notes", req.user_notes.as_deref(), MAX_NOTES_LEN)?;
        policy::check_optional("admin_notes", req.admin_notes.as_deref(), MAX_NOTES_LEN)?;
        let span = policy::validate_span(req.start, req.end)?;
        policy::check_not_past(&span, now)?;
        policy::check_passengers(req.passenger_count)?;

        let owner = match req.user_id {
            Some(uid) if uid != actor.id => {
                if !actor.role.can(Capability::BookForOthers) {
                    return Err(EngineError::Forbidden(
                        "only administrators may book for other users",
                    ));
                }
                self.check_active_user(uid)?;
                uid
            }
            _ => actor.id,
        };
        if req.admin_notes.is_some() && !actor.role.can(Capability::OverrideReservations) {
            return Err(EngineError::Forbidden("admin notes are reserved for administrators"));
        }

        let mut guard = self.lock_vehicle(req.vehicle_id).await?;
        policy::check_reservable(&guard.vehicle)?;
        policy::check_seating(req.passenger_count, &guard.vehicle)?;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_VEHICLE {
            return Err(Rule::ReservationLimit.into());
        }
        policy::check_no_conflict(&guard, &span, None)?;

        let reservation = Reservation {
            id: Ulid::new(),
            vehicle_id: req.vehicle_id,
            user_id: owner,
            span,
            purpose: req.purpose.trim().to_string(),
            destination: req.destination.trim().to_string(),
            passenger_count: req.passenger_count,
            user_notes: req.user_notes.and_then(clear_if_empty),
            admin_notes: req.admin_notes.and_then(clear_if_empty),
            status: ReservationStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        self.persist_and_apply(&mut [&mut *guard], &event).await?;
        info!(
            "reservation {} created on vehicle {} for user {}",
            reservation.id, reservation.vehicle_id, reservation.user_id
        );
        Ok(reservation)
    }

    pub async fn edit_reservation(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let result = self.edit_reservation_inner(actor, id, patch, now_ms()).await;
        record_outcome("edit", &result);
        result
    }

    async fn edit_reservation_inner(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: ReservationPatch,
        now: Ms,
    ) -> Result<Reservation, EngineError> {
        for _ in 0..MAX_LOCK_RETRIES {
            let (mut source, current) = self.resolve_reservation_write(id).await?;
            let source_id = current.vehicle_id;
            let target_id = patch.vehicle_id.unwrap_or(source_id);

            if target_id == source_id {
                let candidate = self.merge_edit(&current, &patch, actor, &source, now)?;
                let event = Event::ReservationUpdated {
                    reservation: candidate.clone(),
                };
                self.persist_and_apply(&mut [&mut *source], &event).await?;
                info!("reservation {id} updated by {}", actor.id);
                return Ok(candidate);
            }

            if self.vehicle_state(&target_id).is_none() {
                self.authorize_edit(&current, &patch, actor, now)?;
                return Err(EngineError::NotFound(Entity::Vehicle, target_id));
            }

            // Re-lock both vehicles in id order; the reservation may have moved meanwhile.
            drop(source);
            let (mut source, mut target) = self.lock_pair(source_id, target_id).await?;
            let Some(current) = source.reservation(&id).cloned() else {
                continue;
            };
            let candidate = self.merge_edit(&current, &patch, actor, &target, now)?;
            let event = Event::ReservationMoved {
                reservation: candidate.clone(),
                from_vehicle_id: source_id,
            };
            self.persist_and_apply(&mut [&mut *source, &mut *target], &event)
                .await?;
            info!("reservation {id} moved from vehicle {source_id} to {target_id} by {}", actor.id);
            return Ok(candidate);
        }
        Err(EngineError::NotFound(Entity::Reservation, id))
    }

    fn authorize_edit(
        &self,
        current: &Reservation,
        patch: &ReservationPatch,
        actor: &Actor,
        now: Ms,
    ) -> Result<(), EngineError> {
        if !policy::can_edit(current, actor, now) {
            return Err(EngineError::Forbidden(
                "reservation can no longer be edited by this user",
            ));
        }
        if patch.touches_admin_fields(current) && !actor.role.can(Capability::OverrideReservations) {
            return Err(EngineError::Forbidden(
                "status, owner and admin notes are reserved for administrators",
            ));
        }
        Ok(())
    }

    /// Build the edited reservation and run every rule against `target`, the
    /// vehicle the candidate will live on. Touches no state.
    fn merge_edit(
        &self,
        current: &Reservation,
        patch: &ReservationPatch,
        actor: &Actor,
        target: &VehicleState,
        now: Ms,
    ) -> Result<Reservation, EngineError> {
        self.authorize_edit(current, patch, actor, now)?;

        let mut next = current.clone();
        if let Some(purpose) = &patch.purpose {
            policy::check_required("purpose", purpose, MAX_SHORT_TEXT_LEN)?;
            next.purpose = purpose.trim().to_string();
        }
        if let Some(destination) = &patch.destination {
            policy::check_required("destination", destination, MAX_SHORT_TEXT_LEN)?;
            next.destination = destination.trim().to_string();
        }
        if let Some(notes) = &patch.user_notes {
            policy::check_optional("user_notes", Some(notes), MAX_NOTES_LEN)?;
            next.user_notes = clear_if_empty(notes.clone());
        }
        if let Some(notes) = &patch.admin_notes {
            policy::check_optional("admin_notes", Some(notes), MAX_NOTES_LEN)?;
            next.admin_notes = clear_if_empty(notes.clone());
        }

        let start = patch.start.unwrap_or(current.span.start);
        let end = patch.end.unwrap_or(current.span.end);
        let moved = target.vehicle.id != current.vehicle_id;
        let retimed = start != current.span.start || end != current.span.end;
        if moved || retimed {
            next.span = policy::validate_span(start, end)?;
            policy::check_not_past(&next.span, now)?;
        }

        if let Some(count) = patch.passenger_count {
            next.passenger_count = count;
        }
        policy::check_passengers(next.passenger_count)?;

        if let Some(uid) = patch.user_id
            && uid != current.user_id
        {
            self.check_active_user(uid)?;
            next.user_id = uid;
        }

        if moved || retimed {
            policy::check_reservable(&target.vehicle)?;
        }
        if moved || patch.passenger_count.is_some() {
            policy::check_seating(next.passenger_count, &target.vehicle)?;
        }

        if let Some(status) = patch.status
            && status != current.status
        {
            if !current.status.can_transition_to(status) {
                return Err(EngineError::Conflict(Conflict::InvalidTransition {
                    from: current.status,
                    to: status,
                }));
            }
            next.status = status;
        }

        if (moved || retimed) && next.is_confirmed() {
            policy::check_no_conflict(target, &next.span, Some(current.id))?;
        }

        next.vehicle_id = target.vehicle.id;
        next.updated_at = now;
        Ok(next)
    }

    pub async fn cancel_reservation(
        &self,
        actor: &Actor,
        id: Ulid,
    ) -> Result<Reservation, EngineError> {
        let result = self.cancel_reservation_inner(actor, id, now_ms()).await;
        record_outcome("cancel", &result);
        result
    }

    async fn cancel_reservation_inner(
        &self,
        actor: &Actor,
        id: Ulid,
        now: Ms,
    ) -> Result<Reservation, EngineError> {
        let (mut guard, current) = self.resolve_reservation_write(id).await?;
        policy::check_cancel(&current, actor, now)?;

        let event = Event::ReservationCancelled {
            id,
            vehicle_id: current.vehicle_id,
            at: now,
        };
        self.persist_and_apply(&mut [&mut *guard], &event).await?;
        info!("reservation {id} cancelled by {}", actor.id);
        guard
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Reservation, id))
    }

    fn check_active_user(&self, user_id: Ulid) -> Result<(), EngineError> {
        let user = self
            .users
            .get(&user_id)
            .ok_or(EngineError::NotFound(Entity::User, user_id))?;
        if !user.is_active {
            return Err(Rule::InactiveUser(user_id).into());
        }
        Ok(())
    }
}
