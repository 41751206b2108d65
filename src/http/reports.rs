use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use tracing::{info, warn};

use super::AppState;
use super::auth::Caller;
use super::dto::DateRangeQuery;
use super::extract::{Params, PathParam};
use super::problem::{ProblemResponse, bad_request};
use crate::access::Capability;
use crate::engine::{EngineError, Rule, policy};
use crate::reports::{
    self, CostAnalysis, Dashboard, DateRange, ReportKind, ReservationStatistics, VehicleUtilization,
};

/// Both bounds or neither; a lone bound names the missing one.
fn optional_range(query: &DateRangeQuery) -> Result<Option<DateRange>, EngineError> {
    match (query.start_date, query.end_date) {
        (Some(from), Some(to)) => DateRange::new(from, to).map(Some),
        (None, None) => Ok(None),
        (None, Some(_)) => Err(Rule::Required("start_date").into()),
        (Some(_), None) => Err(Rule::Required("end_date").into()),
    }
}

fn required_range(query: &DateRangeQuery) -> Result<DateRange, EngineError> {
    optional_range(query)?.ok_or_else(|| Rule::Required("start_date").into())
}

fn authorize(caller: &Caller) -> Result<(), ProblemResponse> {
    policy::require(&caller.actor, Capability::ViewReports).map_err(|e| caller.fail(&e))
}

pub async fn dashboard(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Dashboard>, ProblemResponse> {
    authorize(&caller)?;
    let snap = state.engine.snapshot().await;
    Ok(Json(reports::dashboard(&snap, Utc::now())))
}

pub async fn vehicle_utilization(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<DateRangeQuery>,
) -> Result<Json<Vec<VehicleUtilization>>, ProblemResponse> {
    authorize(&caller)?;
    let range = required_range(&query).map_err(|e| caller.fail(&e))?;
    let snap = state.engine.snapshot().await;
    Ok(Json(reports::vehicle_utilization(&snap, range)))
}

pub async fn cost_analysis(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<DateRangeQuery>,
) -> Result<Json<CostAnalysis>, ProblemResponse> {
    authorize(&caller)?;
    let range = required_range(&query).map_err(|e| caller.fail(&e))?;
    let snap = state.engine.snapshot().await;
    Ok(Json(reports::cost_analysis(&snap, range)))
}

pub async fn reservation_statistics(
    State(state): State<AppState>,
    caller: Caller,
    Params(query): Params<DateRangeQuery>,
) -> Result<Json<ReservationStatistics>, ProblemResponse> {
    authorize(&caller)?;
    let range = optional_range(&query).map_err(|e| caller.fail(&e))?;
    let snap = state.engine.snapshot().await;
    Ok(Json(reports::reservation_statistics(
        &snap,
        range,
        Utc::now(),
        state.config.locale,
    )))
}

pub async fn export(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(kind): PathParam<String>,
    Params(query): Params<DateRangeQuery>,
) -> Result<impl IntoResponse, ProblemResponse> {
    authorize(&caller)?;
    let kind: ReportKind = kind
        .parse()
        .map_err(|msg: String| bad_request(msg, &caller.instance))?;
    let range = optional_range(&query).map_err(|e| caller.fail(&e))?;
    info!("exporting {kind:?} report for {}", caller.actor.id);

    let snap = state.engine.snapshot().await;
    match reports::export_csv(&snap, kind, range, Utc::now(), state.config.locale) {
        Ok(body) => Ok((
            [
                (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", kind.filename()),
                ),
            ],
            body,
        )),
        Err(e) => {
            warn!("export of {kind:?} failed: {e}");
            Err(caller.fail(&e))
        }
    }
}
