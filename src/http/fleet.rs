use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tracing::{info, warn};
use ulid::Ulid;

use super::AppState;
use super::auth::Caller;
use super::dto::{AvailabilityDto, AvailabilityQuery, CreateVehicleReq, ListVehiclesQuery, UpdateVehicleReq, VehicleDto};
use super::extract::{Body, Params, PathParam};
use super::problem::ProblemResponse;
use crate::engine::VehicleFilter;

/// Archived vehicles are only listed for administrators who ask for them.
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<ListVehiclesQuery>,
) -> Json<Vec<VehicleDto>> {
    let filter = VehicleFilter {
        status: query.status,
        fuel_type: query.fuel_type,
        transmission: query.transmission,
        include_archived: query.include_archived && caller.actor.role.is_admin(),
    };
    let vehicles = state.engine.list_vehicles(&filter).await;
    Json(
        vehicles
            .into_iter()
            .map(|v| VehicleDto::new(v, state.config.locale))
            .collect(),
    )
}

pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<VehicleDto>, ProblemResponse> {
    match state.engine.get_vehicle(id).await {
        Ok(v) => Ok(Json(VehicleDto::new(v, state.config.locale))),
        Err(e) => {
            warn!("failed to get vehicle {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateVehicleReq>,
) -> Result<(StatusCode, Json<VehicleDto>), ProblemResponse> {
    info!("creating vehicle {}", req.license_plate);
    match state.engine.create_vehicle(&caller.actor, req.into()).await {
        Ok(v) => Ok((StatusCode::CREATED, Json(VehicleDto::new(v, state.config.locale)))),
        Err(e) => {
            warn!("failed to create vehicle: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
    Body(req): Body<UpdateVehicleReq>,
) -> Result<Json<VehicleDto>, ProblemResponse> {
    info!("updating vehicle {id}: {:?}", req);
    match state.engine.update_vehicle(&caller.actor, id, req.into()).await {
        Ok(v) => Ok(Json(VehicleDto::new(v, state.config.locale))),
        Err(e) => {
            warn!("failed to update vehicle {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn archive(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<VehicleDto>, ProblemResponse> {
    info!("archiving vehicle {id}");
    state
        .engine
        .archive_vehicle(&caller.actor, id)
        .await
        .map(|v| Json(VehicleDto::new(v, state.config.locale)))
        .map_err(|e| caller.fail(&e))
}

pub async fn unarchive(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<VehicleDto>, ProblemResponse> {
    info!("unarchiving vehicle {id}");
    state
        .engine
        .unarchive_vehicle(&caller.actor, id)
        .await
        .map(|v| Json(VehicleDto::new(v, state.config.locale)))
        .map_err(|e| caller.fail(&e))
}

pub async fn availability(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
    Params(query): Params<AvailabilityQuery>,
) -> Result<Json<AvailabilityDto>, ProblemResponse> {
    let (start, end) = (query.start_time.timestamp_millis(), query.end_time.timestamp_millis());
    match state.engine.vehicle_availability(id, start, end).await {
        Ok(a) => Ok(Json(a.into())),
        Err(e) => {
            warn!("availability check for vehicle {id} failed: {e}");
            Err(caller.fail(&e))
        }
    }
}
