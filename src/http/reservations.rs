use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tracing::{info, warn};
use ulid::Ulid;

use super::AppState;
use super::auth::Caller;
use super::dto::{
    CreateReservationReq, DateRangeQuery, ListReservationsQuery, ReservationDto,
    UpdateReservationReq,
};
use super::extract::{Body, Params, PathParam};
use super::problem::ProblemResponse;
use crate::engine::policy::now_ms;
use crate::engine::{ReservationFilter, Rule};
use crate::model::{DAY_MS, Reservation};
use crate::reports::midnight_ms;

fn to_dto(state: &AppState, caller: &Caller, r: Reservation) -> ReservationDto {
    ReservationDto::new(r, &caller.actor, state.config.locale, now_ms())
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<ListReservationsQuery>,
) -> Json<Vec<ReservationDto>> {
    info!("listing reservations for {}: {:?}", caller.actor.id, query);
    let filter = ReservationFilter {
        vehicle_id: query.vehicle_id,
        status: query.status,
        from: query.start_date.map(midnight_ms),
        to: query.end_date.map(|d| midnight_ms(d) + DAY_MS),
    };
    let rows = state.engine.list_reservations(&caller.actor, &filter).await;
    Json(rows.into_iter().map(|r| to_dto(&state, &caller, r)).collect())
}

pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<ReservationDto>, ProblemResponse> {
    match state.engine.get_reservation(&caller.actor, id).await {
        Ok(r) => Ok(Json(to_dto(&state, &caller, r))),
        Err(e) => {
            warn!("failed to get reservation {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateReservationReq>,
) -> Result<(StatusCode, Json<ReservationDto>), ProblemResponse> {
    info!("creating reservation on vehicle {} for {}", req.vehicle_id, caller.actor.id);
    match state.engine.create_reservation(&caller.actor, req.into()).await {
        Ok(r) => Ok((StatusCode::CREATED, Json(to_dto(&state, &caller, r)))),
        Err(e) => {
            warn!("failed to create reservation: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
    Body(req): Body<UpdateReservationReq>,
) -> Result<Json<ReservationDto>, ProblemResponse> {
    info!("updating reservation {id}: {:?}", req);
    match state.engine.edit_reservation(&caller.actor, id, req.into()).await {
        Ok(r) => Ok(Json(to_dto(&state, &caller, r))),
        Err(e) => {
            warn!("failed to update reservation {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn cancel(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<ReservationDto>, ProblemResponse> {
    info!("cancelling reservation {id}");
    match state.engine.cancel_reservation(&caller.actor, id).await {
        Ok(r) => Ok(Json(to_dto(&state, &caller, r))),
        Err(e) => {
            warn!("failed to cancel reservation {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

/// Confirmed reservations starting within `[start_date, end_date]`, fleet-wide.
pub async fn calendar(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<DateRangeQuery>,
) -> Result<Json<Vec<ReservationDto>>, ProblemResponse> {
    let (Some(start), Some(end)) = (query.start_date, query.end_date) else {
        let field = if query.start_date.is_none() { "start_date" } else { "end_date" };
        return Err(caller.fail(&Rule::Required(field).into()));
    };
    match state
        .engine
        .calendar(midnight_ms(start), midnight_ms(end) + DAY_MS)
        .await
    {
        Ok(rows) => Ok(Json(rows.into_iter().map(|r| to_dto(&state, &caller, r)).collect())),
        Err(e) => {
            warn!("failed to build calendar {start}..{end}: {e}");
            Err(caller.fail(&e))
        }
    }
}
