use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::{DateTime, Days, NaiveTime, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use ulid::Ulid;

use fleetbook::config::Config;
use fleetbook::engine::Engine;
use fleetbook::http::{self, AppState, USER_ID_HEADER};

const TOKEN: &str = "test-token";

// ── Test infrastructure ──────────────────────────────────────

struct TestApp {
    router: Router,
    admin: Ulid,
}

async fn start_test_app() -> TestApp {
    let dir = std::env::temp_dir().join(format!("fleetbook_api_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();

    let mut config = Config::default();
    config.data_dir = dir;
    config.api_token = TOKEN.to_string();

    let engine = Arc::new(Engine::new(config.wal_path()).unwrap());
    let admin = engine
        .bootstrap("admin", "admin@example.com")
        .await
        .unwrap()
        .expect("fresh engine bootstraps an administrator");

    let state = AppState {
        engine,
        config: Arc::new(config),
    };
    TestApp {
        router: http::router(state),
        admin: admin.id,
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, user: Option<Ulid>, body: Option<Value>) -> Reply {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .header(USER_ID_HEADER, user.to_string());
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply { status, headers, body }
    }

    async fn get(&self, uri: &str, user: Ulid) -> Reply {
        self.call(Method::GET, uri, Some(user), None).await
    }

    async fn post(&self, uri: &str, user: Ulid, body: Value) -> Reply {
        self.call(Method::POST, uri, Some(user), Some(body)).await
    }

    async fn put(&self, uri: &str, user: Ulid, body: Option<Value>) -> Reply {
        self.call(Method::PUT, uri, Some(user), body).await
    }

    async fn create_vehicle(&self, plate: &str, seats: u32) -> Ulid {
        let reply = self
            .post(
                "/api/vehicles",
                self.admin,
                json!({
                    "make": "Skoda",
                    "model": "Octavia",
                    "license_plate": plate,
                    "fuel_type": "diesel",
                    "seating_capacity": seats,
                    "transmission": "manual",
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
        reply.json()["id"].as_str().unwrap().parse().unwrap()
    }

    async fn create_standard_user(&self, username: &str) -> Ulid {
        let roles = self.get("/api/roles", self.admin).await.json();
        let standard = roles
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["level"] == "standard")
            .unwrap()["id"]
            .clone();
        let reply = self
            .post(
                "/api/users",
                self.admin,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "full_name": username,
                    "role_id": standard,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
        reply.json()["id"].as_str().unwrap().parse().unwrap()
    }
}

/// 10:00 UTC a few days from now, far outside any edit window.
fn morning(days_ahead: u64) -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(days_ahead))
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
        .and_utc()
}

fn booking(vehicle: Ulid, start: DateTime<Utc>, hours: i64) -> Value {
    json!({
        "vehicle_id": vehicle,
        "start_time": start,
        "end_time": start + chrono::Duration::hours(hours),
        "purpose": "Client visit",
        "destination": "Brno",
    })
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_credentials() {
    let app = start_test_app().await;
    let reply = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "ok");
}

#[tokio::test]
async fn api_rejects_missing_or_wrong_credentials() {
    let app = start_test_app().await;

    let reply = app.call(Method::GET, "/api/vehicles", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.content_type(), "application/problem+json");
    assert_eq!(reply.json()["code"], "UNAUTHENTICATED");

    // Valid token, unknown user.
    let reply = app.get("/api/vehicles", Ulid::new()).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/vehicles")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .header(USER_ID_HEADER, app.admin.to_string())
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = start_test_app().await;
    let reply = app.get("/api/auth/me", app.admin).await;
    assert_eq!(reply.status, StatusCode::OK);
    let id = reply.headers.get("x-request-id").unwrap().to_str().unwrap();
    assert!(Ulid::from_string(id).is_ok());
}

#[tokio::test]
async fn overlapping_booking_is_a_conflict() {
    let app = start_test_app().await;
    let vehicle = app.create_vehicle("1AB 2345", 5).await;
    let start = morning(3);

    let first = app.post("/api/reservations", app.admin, booking(vehicle, start, 2)).await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.text());
    let body = first.json();
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["passenger_count"], 1);
    assert_eq!(body["can_edit"], true);

    let clash = app
        .post("/api/reservations", app.admin, booking(vehicle, start + chrono::Duration::hours(1), 2))
        .await;
    assert_eq!(clash.status, StatusCode::CONFLICT);
    assert_eq!(clash.content_type(), "application/problem+json");
    let problem = clash.json();
    assert_eq!(problem["code"], "CONFLICT");
    assert_eq!(problem["instance"], "/api/reservations");
    assert!(problem["request_id"].is_string());

    // Back-to-back is fine.
    let touching = app
        .post("/api/reservations", app.admin, booking(vehicle, start + chrono::Duration::hours(2), 1))
        .await;
    assert_eq!(touching.status, StatusCode::CREATED);
}

#[tokio::test]
async fn validation_errors_point_at_the_field() {
    let app = start_test_app().await;
    let vehicle = app.create_vehicle("2CD 3456", 4).await;

    let mut body = booking(vehicle, morning(3), 1);
    body["passenger_count"] = json!(9);
    let reply = app.post("/api/reservations", app.admin, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let problem = reply.json();
    assert_eq!(problem["code"], "VALIDATION");
    assert_eq!(problem["errors"][0]["pointer"], "/passenger_count");

    let mut body = booking(vehicle, morning(3), 1);
    body["purpose"] = json!("");
    let reply = app.post("/api/reservations", app.admin, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["errors"][0]["pointer"], "/purpose");

    // Malformed JSON never reaches the engine.
    let reply = app
        .post("/api/reservations", app.admin, json!({ "vehicle_id": "not-a-ulid" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.content_type(), "application/problem+json");
}

#[tokio::test]
async fn cancelling_twice_conflicts() {
    let app = start_test_app().await;
    let vehicle = app.create_vehicle("3EF 4567", 5).await;
    let alice = app.create_standard_user("alice").await;

    let created = app.post("/api/reservations", alice, booking(vehicle, morning(4), 3)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.json()["id"].as_str().unwrap().to_string();

    let uri = format!("/api/reservations/{id}/cancel");
    let first = app.put(&uri, alice, None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["status"], "cancelled");
    assert_eq!(first.json()["can_edit"], false);

    let second = app.put(&uri, alice, None).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn standard_users_are_scoped_to_their_own_data() {
    let app = start_test_app().await;
    let vehicle = app.create_vehicle("4GH 5678", 5).await;
    let alice = app.create_standard_user("alice").await;
    let bob = app.create_standard_user("bob").await;

    let reply = app.get("/api/users", alice).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["code"], "FORBIDDEN");

    let reply = app.get("/api/reports/dashboard", alice).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let created = app.post("/api/reservations", alice, booking(vehicle, morning(5), 2)).await;
    let id = created.json()["id"].as_str().unwrap().to_string();

    let reply = app.get(&format!("/api/reservations/{id}"), bob).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let listed = app.get("/api/reservations", bob).await.json();
    assert!(listed.as_array().unwrap().is_empty());
    let listed = app.get("/api/reservations", app.admin).await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Booking on someone else's behalf is admin-only.
    let mut body = booking(vehicle, morning(6), 1);
    body["user_id"] = json!(alice);
    let reply = app.post("/api/reservations", bob, body).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn navigation_depends_on_role() {
    let app = start_test_app().await;
    let alice = app.create_standard_user("alice").await;

    let admin_nav = app.get("/api/navigation", app.admin).await.json();
    assert_eq!(admin_nav["landing_route"], "/");
    assert_eq!(admin_nav["routes"].as_array().unwrap().len(), 7);

    let me = app.get("/api/auth/me", alice).await.json();
    assert_eq!(me["user"]["username"], "alice");
    assert_eq!(me["user"]["role"], "standard");
    assert_eq!(me["navigation"]["landing_route"], "/reservations");
    let keys: Vec<&str> = me["navigation"]["routes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, ["vehicles", "reservations"]);
}

#[tokio::test]
async fn availability_lists_conflicts() {
    let app = start_test_app().await;
    let vehicle = app.create_vehicle("5IJ 6789", 5).await;
    let start = morning(3);
    app.post("/api/reservations", app.admin, booking(vehicle, start, 2)).await;

    let from = (start - chrono::Duration::hours(2)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let to = (start + chrono::Duration::hours(6)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let reply = app
        .get(
            &format!("/api/vehicles/{vehicle}/availability?start_time={from}&end_time={to}"),
            app.admin,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let body = reply.json();
    assert_eq!(body["available"], false);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_routes_and_ids_are_problems() {
    let app = start_test_app().await;

    let reply = app.get("/api/nowhere", app.admin).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.content_type(), "application/problem+json");

    let reply = app.get(&format!("/api/vehicles/{}", Ulid::new()), app.admin).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json()["code"], "NOT_FOUND");

    let reply = app.get("/api/vehicles/not-a-ulid", app.admin).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cost_report_exports_as_csv() {
    let app = start_test_app().await;
    let vehicle = app.create_vehicle("6KL 7890", 5).await;
    let today = Utc::now().date_naive();

    let reply = app
        .post(
            "/api/service-records",
            app.admin,
            json!({
                "vehicle_id": vehicle,
                "service_date": today,
                "service_type": "Oil change",
                "description": "5W-30, filter",
                "cost": 1500.0,
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());

    let uri = format!("/api/reports/export/cost-analysis?start_date={today}&end_date={today}");
    let reply = app.get(&uri, app.admin).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    assert!(reply.content_type().starts_with("text/csv"));
    let disposition = reply.headers.get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap();
    assert!(disposition.contains("cost_analysis.csv"));

    let csv = reply.text();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("Vehicle,Service Costs,Damage Costs,Total Costs"));
    assert!(lines.next().unwrap().contains("Skoda Octavia (6KL 7890)"));

    // Range is mandatory for cost exports.
    let reply = app.get("/api/reports/export/cost-analysis", app.admin).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app.get("/api/reports/export/bogus", app.admin).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}
