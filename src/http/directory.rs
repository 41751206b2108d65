use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tracing::{info, warn};
use ulid::Ulid;

use super::AppState;
use super::auth::Caller;
use super::dto::{
    CreateRoleReq, CreateUserReq, ListUsersQuery, MeDto, NavEntryDto, NavigationDto, RoleDto,
    UpdateRoleReq, UpdateUserReq, UserDto,
};
use super::extract::{Body, Params, PathParam};
use super::problem::ProblemResponse;
use crate::access::{self, Capability};
use crate::engine::policy;
use crate::model::{Role, User};

fn user_dto(state: &AppState, user: User) -> UserDto {
    let role = state.engine.get_role(user.role_id).ok();
    UserDto::new(user, role.as_ref(), state.config.locale)
}

fn navigation_for(role: Role) -> NavigationDto {
    NavigationDto {
        landing_route: access::landing_route(role),
        routes: access::navigation(role).into_iter().map(NavEntryDto::from).collect(),
    }
}

// ── Users ────────────────────────────────────────────────────────

pub async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<ListUsersQuery>,
) -> Result<Json<Vec<UserDto>>, ProblemResponse> {
    match state.engine.list_users(&caller.actor, query.active, query.role_id) {
        Ok(users) => Ok(Json(users.into_iter().map(|u| user_dto(&state, u)).collect())),
        Err(e) => {
            warn!("failed to list users: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<UserDto>, ProblemResponse> {
    match state.engine.get_user(&caller.actor, id) {
        Ok(u) => Ok(Json(user_dto(&state, u))),
        Err(e) => {
            warn!("failed to get user {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateUserReq>,
) -> Result<(StatusCode, Json<UserDto>), ProblemResponse> {
    info!("creating user {}", req.username);
    match state.engine.create_user(&caller.actor, req.into()).await {
        Ok(u) => Ok((StatusCode::CREATED, Json(user_dto(&state, u)))),
        Err(e) => {
            warn!("failed to create user: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
    Body(req): Body<UpdateUserReq>,
) -> Result<Json<UserDto>, ProblemResponse> {
    info!("updating user {id}: {:?}", req);
    match state.engine.update_user(&caller.actor, id, req.into()).await {
        Ok(u) => Ok(Json(user_dto(&state, u))),
        Err(e) => {
            warn!("failed to update user {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

async fn set_active(state: AppState, caller: Caller, id: Ulid, active: bool) -> Result<Json<UserDto>, ProblemResponse> {
    info!("setting user {id} active={active}");
    match state.engine.set_user_active(&caller.actor, id, active).await {
        Ok(u) => Ok(Json(user_dto(&state, u))),
        Err(e) => {
            warn!("failed to set user {id} active={active}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn activate_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<UserDto>, ProblemResponse> {
    set_active(state, caller, id, true).await
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<UserDto>, ProblemResponse> {
    set_active(state, caller, id, false).await
}

// ── Roles ────────────────────────────────────────────────────────

pub async fn list_roles(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<RoleDto>>, ProblemResponse> {
    policy::require(&caller.actor, Capability::ManageUsers).map_err(|e| caller.fail(&e))?;
    let roles = state.engine.list_roles();
    Ok(Json(
        roles
            .into_iter()
            .map(|r| RoleDto::new(r, state.config.locale))
            .collect(),
    ))
}

pub async fn get_role(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<Json<RoleDto>, ProblemResponse> {
    policy::require(&caller.actor, Capability::ManageUsers).map_err(|e| caller.fail(&e))?;
    state
        .engine
        .get_role(id)
        .map(|r| Json(RoleDto::new(r, state.config.locale)))
        .map_err(|e| caller.fail(&e))
}

pub async fn create_role(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateRoleReq>,
) -> Result<(StatusCode, Json<RoleDto>), ProblemResponse> {
    info!("creating role {}", req.name);
    match state.engine.create_role(&caller.actor, req.into()).await {
        Ok(r) => Ok((StatusCode::CREATED, Json(RoleDto::new(r, state.config.locale)))),
        Err(e) => {
            warn!("failed to create role: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn update_role(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
    Body(req): Body<UpdateRoleReq>,
) -> Result<Json<RoleDto>, ProblemResponse> {
    info!("updating role {id}: {:?}", req);
    match state.engine.update_role(&caller.actor, id, req.into()).await {
        Ok(r) => Ok(Json(RoleDto::new(r, state.config.locale))),
        Err(e) => {
            warn!("failed to update role {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

pub async fn delete_role(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<Ulid>,
) -> Result<StatusCode, ProblemResponse> {
    info!("deleting role {id}");
    match state.engine.delete_role(&caller.actor, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            warn!("failed to delete role {id}: {e}");
            Err(caller.fail(&e))
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

pub async fn me(State(state): State<AppState>, caller: Caller) -> Result<Json<MeDto>, ProblemResponse> {
    let user = state
        .engine
        .get_user(&caller.actor, caller.actor.id)
        .map_err(|e| caller.fail(&e))?;
    Ok(Json(MeDto {
        user: user_dto(&state, user),
        navigation: navigation_for(caller.actor.role),
    }))
}

pub async fn navigation(caller: Caller) -> Json<NavigationDto> {
    Json(navigation_for(caller.actor.role))
}
