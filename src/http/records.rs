use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tracing::{info, warn};
use ulid::Ulid;

use super::AppState;
use super::auth::Caller;
use super::dto::{
    CreateDamageRecordReq, CreateServiceRecordReq, DamageRecordDto, ListRecordsQuery,
    ServiceRecordDto, UpdateDamageRecordReq, UpdateServiceRecordReq,
};
use super::extract::{Body, Params, PathParam};
use super::problem::ProblemResponse;

// ── Service records ──────────────────────────────────────────────

pub async fn list_service(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<ListRecordsQuery>,
) -> Result<Json<Vec<ServiceRecordDto>>, ProblemResponse> {
    state
        .engine
        .list_service_records(&caller.actor, query.vehicle_id)
        .map(|rows| Json(rows.into_iter().map(ServiceRecordDto::from).collect()))
        .map_err(|e| caller.fail(&e))
}

pub async fn get_service(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<ServiceRecordDto>, ProblemResponse> {
    state
        .engine
        .get_service_record(&caller.actor, id)
        .map(|r| Json(r.into()))
        .map_err(|e| caller.fail(&e))
}

pub async fn create_service(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateServiceRecordReq>,
) -> Result<(StatusCode, Json<ServiceRecordDto>), ProblemResponse> {
    info!("adding service record to vehicle {}", req.vehicle_id);
    match state.engine.create_service_record(&caller.actor, req.into()).await {
        Ok(r) => Ok((StatusCode::CREATED, Json(r.into()))),
        Err(e) => {
            warn!("failed to create service record: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn update_service(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
    Body(req): Body<UpdateServiceRecordReq>,
) -> Result<Json<ServiceRecordDto>, ProblemResponse> {
    info!("updating service record {id}");
    match state
        .engine
        .update_service_record(&caller.actor, id, req.into())
        .await
    {
        Ok(r) => Ok(Json(r.into())),
        Err(e) => {
            warn!("failed to update service record {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn delete_service(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<StatusCode, ProblemResponse> {
    info!("deleting service record {id}");
    match state.engine.delete_service_record(&caller.actor, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            warn!("failed to delete service record {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

// ── Damage records ───────────────────────────────────────────────

pub async fn list_damage(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<ListRecordsQuery>,
) -> Result<Json<Vec<DamageRecordDto>>, ProblemResponse> {
    let locale = state.config.locale;
    state
        .engine
        .list_damage_records(&caller.actor, query.vehicle_id, query.repair_status)
        .map(|rows| {
            Json(
                rows.into_iter()
                    .map(|r| DamageRecordDto::new(r, locale))
                    .collect(),
            )
        })
        .map_err(|e| caller.fail(&e))
}

pub async fn get_damage(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<DamageRecordDto>, ProblemResponse> {
    state
        .engine
        .get_damage_record(&caller.actor, id)
        .map(|r| Json(DamageRecordDto::new(r, state.config.locale)))
        .map_err(|e| caller.fail(&e))
}

pub async fn create_damage(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateDamageRecordReq>,
) -> Result<(StatusCode, Json<DamageRecordDto>), ProblemResponse> {
    info!("reporting damage on vehicle {}", req.vehicle_id);
    match state.engine.create_damage_record(&caller.actor, req.into()).await {
        Ok(r) => Ok((
            StatusCode::CREATED,
            Json(DamageRecordDto::new(r, state.config.locale)),
        )),
        Err(e) => {
            warn!("failed to create damage record: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn update_damage(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
    Body(req): Body<UpdateDamageRecordReq>,
) -> Result<Json<DamageRecordDto>, ProblemResponse> {
    info!("updating damage record {id}");
    match state
        .engine
        .update_damage_record(&caller.actor, id, req.into())
        .await
    {
        Ok(r) => Ok(Json(DamageRecordDto::new(r, state.config.locale))),
        Err(e) => {
            warn!("failed to update damage record {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn delete_damage(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<StatusCode, ProblemResponse> {
    info!("deleting damage record {id}");
    match state.engine.delete_damage_record(&caller.actor, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            warn!("failed to delete damage record {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}
