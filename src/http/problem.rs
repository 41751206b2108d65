//! RFC 9457 problem details and the single mapping from engine errors.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    /// Stable machine-readable code, e.g. `CONFLICT`.
    pub code: String,
    pub request_id: Option<String>,
    pub errors: Option<Vec<InvalidField>>,
}

/// One offending input field on a 400.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidField {
    pub detail: String,
    /// JSON Pointer into the request, e.g. `/passenger_count`.
    pub pointer: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_string(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
            request_id: None,
            errors: None,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.type_url = format!("https://fleetbook.dev/problems/{}", code.to_lowercase());
        self.code = code.to_string();
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<InvalidField>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Renders a [`Problem`] with its status and `application/problem+json`.
#[derive(Debug, Clone)]
pub struct ProblemResponse(pub Problem);

impl From<Problem> for ProblemResponse {
    fn from(p: Problem) -> Self {
        Self(p)
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = axum::Json(self.0).into_response();
        *resp.status_mut() = status;
        resp.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_PROBLEM_JSON));
        resp
    }
}

pub fn from_parts(
    status: StatusCode,
    code: &str,
    title: &str,
    detail: impl Into<String>,
    instance: &str,
) -> ProblemResponse {
    Problem::new(status, title, detail)
        .with_code(code)
        .with_instance(instance)
        .into()
}

pub fn bad_request(detail: impl Into<String>, instance: &str) -> ProblemResponse {
    from_parts(StatusCode::BAD_REQUEST, "VALIDATION", "Validation error", detail, instance)
}

pub fn unauthenticated(detail: impl Into<String>, instance: &str) -> ProblemResponse {
    from_parts(
        StatusCode::UNAUTHORIZED,
        "UNAUTHENTICATED",
        "Unauthenticated",
        detail,
        instance,
    )
}

pub fn map_engine_error(e: &EngineError, instance: &str) -> ProblemResponse {
    match e {
        EngineError::Validation(rule) => Problem::new(StatusCode::BAD_REQUEST, "Validation error", e.to_string())
            .with_code("VALIDATION")
            .with_instance(instance)
            .with_errors(vec![InvalidField {
                detail: rule.to_string(),
                pointer: format!("/{}", rule.field()),
            }])
            .into(),
        EngineError::Conflict(_) => {
            from_parts(StatusCode::CONFLICT, "CONFLICT", "Conflict", e.to_string(), instance)
        }
        EngineError::Forbidden(_) => {
            from_parts(StatusCode::FORBIDDEN, "FORBIDDEN", "Forbidden", e.to_string(), instance)
        }
        EngineError::NotFound(..) => {
            from_parts(StatusCode::NOT_FOUND, "NOT_FOUND", "Not found", e.to_string(), instance)
        }
        EngineError::WalError(_) => {
            // Logged here, never exposed to the client.
            tracing::error!(error = %e, "write-ahead log failure");
            from_parts(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Internal error",
                "the change could not be persisted",
                instance,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Conflict, Rule};
    use ulid::Ulid;

    #[test]
    fn problem_sets_status_and_content_type() {
        let resp = bad_request("invalid payload", "/api/vehicles").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let ct = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert_eq!(ct, APPLICATION_PROBLEM_JSON);
    }

    #[test]
    fn engine_errors_map_to_codes() {
        let cases = [
            (EngineError::Validation(Rule::StartInPast), 400, "VALIDATION"),
            (EngineError::overlap(Ulid::new()), 409, "CONFLICT"),
            (
                EngineError::Conflict(Conflict::RoleInUse(Ulid::new())),
                409,
                "CONFLICT",
            ),
            (EngineError::Forbidden("nope"), 403, "FORBIDDEN"),
            (
                EngineError::NotFound(crate::engine::Entity::Vehicle, Ulid::new()),
                404,
                "NOT_FOUND",
            ),
            (EngineError::WalError("disk full".into()), 500, "INTERNAL"),
        ];
        for (err, status, code) in cases {
            let ProblemResponse(p) = map_engine_error(&err, "/api/x");
            assert_eq!(p.status, status);
            assert_eq!(p.code, code);
            assert_eq!(p.instance, "/api/x");
        }
    }

    #[test]
    fn validation_points_at_field_and_hides_wal_detail() {
        let ProblemResponse(p) = map_engine_error(&Rule::PassengerCount(0).into(), "/");
        assert_eq!(p.errors.unwrap()[0].pointer, "/passenger_count");

        let ProblemResponse(p) = map_engine_error(&EngineError::WalError("disk full".into()), "/");
        assert!(!p.detail.contains("disk"));
    }
}
