use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use busline_api::middleware::CustomerClaims;
use busline_api::state::{AppState, AuthConfig, Backends};
use busline_api::app;
use busline_core::identity::StaticCustomerDirectory;
use busline_core::ticketing::LoggingTicketDispatcher;
use busline_core::ManualClock;
use busline_order::BookingRules;
use busline_store::memory::{demo_schedule, InMemoryStore, ScheduleSeed};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    seed: ScheduleSeed,
}

fn travel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
}

async fn test_app() -> TestApp {
    let seed = demo_schedule(&[travel_date()]);
    let store = Arc::new(InMemoryStore::new());
    store.add_schedule(seed.clone()).await;

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap()));
    let customers = StaticCustomerDirectory::new()
        .with_customer("user-1", Uuid::new_v4())
        .with_customer("user-2", Uuid::new_v4());

    let state = AppState::new(
        Backends {
            schedules: store.clone(),
            bookings: store.clone(),
            places: store.clone(),
            customers: Arc::new(customers),
            tickets: Arc::new(LoggingTicketDispatcher),
            clock: clock.clone(),
        },
        BookingRules::default(),
        AuthConfig { secret: SECRET.to_string() },
    );

    TestApp { router: app(state), clock, seed }
}

fn token(sub: &str, role: &str) -> String {
    let claims = CustomerClaims {
        sub: sub.to_string(),
        email: None,
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(router: &Router, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, json)
}

impl TestApp {
    fn booking_body(&self, seats: &[&str]) -> Value {
        json!({
            "schedule_id": self.seed.schedule.id,
            "travel_date": travel_date(),
            "seat_numbers": seats,
            "passengers": seats.iter().map(|s| json!({ "name": format!("Rider {}", s), "age": 28 })).collect::<Vec<_>>(),
            "boarding_stop_id": self.seed.stops[0].id,
            "dropping_stop_id": self.seed.stops[2].id,
        })
    }

    fn seats_uri(&self) -> String {
        format!("/v1/schedules/{}/seats?travel_date={}", self.seed.schedule.id, travel_date())
    }
}

#[tokio::test]
async fn test_search_and_seat_map() {
    let t = test_app().await;

    let (status, body) = send(
        &t.router,
        "POST",
        "/v1/schedules/search",
        None,
        Some(json!({ "source": "Bengaluru", "destination": "Chennai", "travel_date": "2026-10-20", "sort": "PRICE_ASC" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["bus_name"], "Cauvery Express");
    assert_eq!(body[0]["available_seats"], 10);

    let (status, layout) = send(&t.router, "GET", &t.seats_uri(), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(layout["bus"]["type"], "AC");
    assert_eq!(layout["bus"]["booked_seats"], 0);
    assert_eq!(layout["seats"].as_array().unwrap().len(), 10);
    assert_eq!(layout["seats"][0]["number"], "A1");
    assert_eq!(layout["seats"][0]["price"], 126.0);
}

#[tokio::test]
async fn test_search_past_date_is_bad_request() {
    let t = test_app().await;
    let (status, body) = send(
        &t.router,
        "POST",
        "/v1/schedules/search",
        None,
        Some(json!({ "source": "Bengaluru", "destination": "Chennai", "travel_date": "2026-10-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("past"));
}

#[tokio::test]
async fn test_booking_requires_customer_token() {
    let t = test_app().await;
    let body = t.booking_body(&["A1"]);

    let (status, _) = send(&t.router, "POST", "/v1/bookings", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.router, "POST", "/v1/bookings", Some("not-a-jwt"), Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = token("user-1", "ADMIN");
    let (status, _) = send(&t.router, "POST", "/v1/bookings", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_hold_then_pay() {
    let t = test_app().await;
    let owner = token("user-1", "CUSTOMER");

    let (status, held) = send(&t.router, "POST", "/v1/bookings", Some(&owner), Some(t.booking_body(&["A1", "A2"]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(held["total_amount"], 252.0);
    assert_eq!(held["boarding_point"], "Bengaluru");
    assert_eq!(held["seat_numbers"], json!(["A1", "A2"]));
    let booking_id = held["booking_id"].as_str().unwrap().to_string();
    let pnr = held["pnr"].as_str().unwrap().to_string();

    let (_, layout) = send(&t.router, "GET", &t.seats_uri(), None, None).await;
    assert_eq!(layout["bus"]["booked_seats"], 2);
    assert_eq!(layout["bus"]["available_seats"], 8);

    let other = token("user-2", "CUSTOMER");
    let (status, _) = send(&t.router, "GET", &format!("/v1/bookings/{}", booking_id), Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, record) = send(&t.router, "GET", &format!("/v1/bookings/{}", booking_id), Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["booking"]["status"], "PENDING");
    assert_eq!(record["seats"].as_array().unwrap().len(), 2);

    let payment_uri = format!("/v1/bookings/{}/payment", booking_id);
    let payment = json!({ "payment_reference_id": "pay_789", "success": true });
    let (status, paid) = send(&t.router, "POST", &payment_uri, None, Some(payment.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "CONFIRMED");
    assert_eq!(paid["pnr"], pnr.as_str());

    let (status, _) = send(&t.router, "POST", &payment_uri, None, Some(payment)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_taken_seat_is_conflict() {
    let t = test_app().await;
    let user = token("user-1", "CUSTOMER");

    let (status, _) = send(&t.router, "POST", "/v1/bookings", Some(&user), Some(t.booking_body(&["B4"]))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&t.router, "POST", "/v1/bookings", Some(&user), Some(t.booking_body(&["B3", "B4"]))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("B4"));
}

#[tokio::test]
async fn test_late_payment_is_gone() {
    let t = test_app().await;
    let user = token("user-1", "CUSTOMER");

    let (_, held) = send(&t.router, "POST", "/v1/bookings", Some(&user), Some(t.booking_body(&["P1"]))).await;
    let booking_id = held["booking_id"].as_str().unwrap().to_string();

    t.clock.advance(Duration::minutes(11));
    let (status, _) = send(
        &t.router,
        "POST",
        &format!("/v1/bookings/{}/payment", booking_id),
        None,
        Some(json!({ "payment_reference_id": "pay_late", "success": true })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_unknown_schedule_and_booking_are_not_found() {
    let t = test_app().await;
    let user = token("user-1", "CUSTOMER");

    let uri = format!("/v1/schedules/{}/seats?travel_date={}", Uuid::new_v4(), travel_date());
    let (status, _) = send(&t.router, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.router, "GET", &format!("/v1/bookings/{}", Uuid::new_v4()), Some(&user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
