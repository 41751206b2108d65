//! REST surface. Routes live here; handlers are grouped by resource.

mod auth;
mod directory;
mod dto;
mod extract;
mod fleet;
pub mod problem;
mod records;
mod reports;
pub mod request_id;
mod reservations;

pub use auth::{Caller, USER_ID_HEADER};

use std::sync::Arc;

use axum::Router;
use axum::http::{StatusCode, Uri};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::engine::Engine;
use crate::observability;

use problem::from_parts;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub config: Arc<Config>,
}

async fn health() -> impl IntoResponse {
    axum::Json(json!({ "status": "ok" }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    from_parts(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        "Not found",
        format!("no route for {}", uri.path()),
        uri.path(),
    )
}

pub fn router(state: AppState) -> Router {
    let timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(health))
        // reservations
        .route(
            "/api/reservations",
            get(reservations::list).post(reservations::create),
        )
        .route("/api/reservations/calendar", get(reservations::calendar))
        .route(
            "/api/reservations/{id}",
            get(reservations::get).put(reservations::update),
        )
        .route("/api/reservations/{id}/cancel", put(reservations::cancel))
        // vehicles
        .route("/api/vehicles", get(fleet::list).post(fleet::create))
        .route("/api/vehicles/{id}", get(fleet::get).put(fleet::update))
        .route("/api/vehicles/{id}/archive", put(fleet::archive))
        .route("/api/vehicles/{id}/unarchive", put(fleet::unarchive))
        .route("/api/vehicles/{id}/availability", get(fleet::availability))
        // users and roles
        .route(
            "/api/users",
            get(directory::list_users).post(directory::create_user),
        )
        .route(
            "/api/users/{id}",
            get(directory::get_user).put(directory::update_user),
        )
        .route("/api/users/{id}/activate", put(directory::activate_user))
        .route("/api/users/{id}/deactivate", put(directory::deactivate_user))
        .route(
            "/api/roles",
            get(directory::list_roles).post(directory::create_role),
        )
        .route(
            "/api/roles/{id}",
            get(directory::get_role)
                .put(directory::update_role)
                .delete(directory::delete_role),
        )
        .route("/api/auth/me", get(directory::me))
        .route("/api/navigation", get(directory::navigation))
        // records
        .route(
            "/api/service-records",
            get(records::list_service).post(records::create_service),
        )
        .route(
            "/api/service-records/{id}",
            get(records::get_service)
                .put(records::update_service)
                .delete(records::delete_service),
        )
        .route(
            "/api/damage-records",
            get(records::list_damage).post(records::create_damage),
        )
        .route(
            "/api/damage-records/{id}",
            get(records::get_damage)
                .put(records::update_damage)
                .delete(records::delete_damage),
        )
        // reports
        .route("/api/reports/dashboard", get(reports::dashboard))
        .route(
            "/api/reports/vehicle-utilization",
            get(reports::vehicle_utilization),
        )
        .route("/api/reports/cost-analysis", get(reports::cost_analysis))
        .route(
            "/api/reports/reservation-statistics",
            get(reports::reservation_statistics),
        )
        .route("/api/reports/export/{kind}", get(reports::export))
        .route_layer(from_fn(observability::track_http))
        .fallback(not_found)
        // Outermost first: SetRequestId -> PropagateRequestId -> Trace -> push_req_id -> Timeout
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    request_id::header(),
                    request_id::MakeReqId,
                ))
                .layer(PropagateRequestIdLayer::new(request_id::header()))
                .layer(request_id::trace_layer())
                .layer(from_fn(request_id::push_req_id_to_extensions))
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}
