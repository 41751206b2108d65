use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;
use ulid::Ulid;

use super::AppState;
use super::problem::{ProblemResponse, map_engine_error, unauthenticated};
use super::request_id::XRequestId;
use crate::engine::EngineError;
use crate::model::Actor;
use crate::observability;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated identity behind an `/api` request, plus what is needed
/// to render failures against it.
#[derive(Debug, Clone)]
pub struct Caller {
    pub actor: Actor,
    pub instance: String,
    pub request_id: Option<String>,
}

impl Caller {
    pub fn fail(&self, e: &EngineError) -> ProblemResponse {
        let mut resp = map_engine_error(e, &self.instance);
        resp.0.request_id = self.request_id.clone();
        resp
    }
}

/// Compares every byte regardless of where the first mismatch falls.
fn token_matches(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn reject(parts: &Parts, reason: &'static str) -> ProblemResponse {
    metrics::counter!(observability::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
    warn!("rejected {} {}: {reason}", parts.method, parts.uri.path());
    let mut resp = unauthenticated(reason, parts.uri.path());
    resp.0.request_id = parts.extensions.get::<XRequestId>().map(|r| r.0.clone());
    resp
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        match token {
            None => return Err(reject(parts, "missing bearer token")),
            Some(t) if !token_matches(t.as_bytes(), state.config.api_token.as_bytes()) => return Err(reject(parts, "invalid bearer token")),
            Some(_) => {}
        }

        let Some(user_id) = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Ulid::from_string(v.trim()).ok())
        else {
            return Err(reject(parts, "missing or malformed user id"));
        };
        let Some(actor) = state.engine.actor_for(user_id) else {
            return Err(reject(parts, "unknown or inactive user"));
        };

        Ok(Caller {
            actor,
            instance: parts.uri.path().to_owned(),
            request_id: parts.extensions.get::<XRequestId>().map(|r| r.0.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::token_matches;

    #[test]
    fn token_comparison() {
        assert!(token_matches(b"s3cret-token", b"s3cret-token"));
        assert!(!token_matches(b"s3cret-tokeX", b"s3cret-token"));
        assert!(!token_matches(b"X3cret-token", b"s3cret-token"));
        assert!(!token_matches(b"s3cret", b"s3cret-token"));
        assert!(!token_matches(b"s3cret-token-longer", b"s3cret-token"));
        assert!(!token_matches(b"", b"s3cret-token"));
    }
}
