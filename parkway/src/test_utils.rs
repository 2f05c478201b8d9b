//! Shared fixtures for unit and handler tests.

use crate::{
    AppState, build_router,
    config::{Config, DatabaseConfig, DummyConfig, EmailTransportConfig},
    db::{
        handlers::{Driveways, Users},
        models::{
            driveways::{DrivewayCreateDBRequest, DrivewayDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    payment_providers::{PaymentProvider, dummy::DummyProvider},
    storage::InMemoryStore,
    types::UserId,
};
use axum_test::TestServer;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::PgPool;
use std::sync::Arc;

/// `now + hours`, truncated to whole seconds so RFC 3339 round trips compare equal
pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    let now = Utc::now();
    let now = now - TimeDelta::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
    now + TimeDelta::hours(hours)
}

/// An active, available driveway priced at 10.00 per hour
pub fn driveway_request(owner_id: UserId, capacity: i32) -> DrivewayCreateDBRequest {
    DrivewayCreateDBRequest {
        owner_id,
        title: "Sunny driveway".to_string(),
        address: "1 Main St".to_string(),
        price_per_hour: Decimal::new(1000, 2),
        capacity,
        is_active: true,
        is_available: true,
    }
}

pub async fn create_pg_user(pool: &PgPool, email: &str) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            name: None,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_pg_driveway(pool: &PgPool, owner_id: UserId, capacity: i32) -> DrivewayDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Driveways::new(&mut conn)
        .create(&driveway_request(owner_id, capacity))
        .await
        .expect("Failed to create test driveway")
}

/// In-memory store, no payment processor, no emails, no metrics
pub fn create_test_config() -> Config {
    let temp_dir = std::env::temp_dir().join(format!("parkway-test-emails-{}", std::process::id()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        enable_metrics: false,
        ..Config::default()
    };
    config.email.transport = EmailTransportConfig::File {
        path: temp_dir.to_string_lossy().into_owned(),
    };
    config.notifications.send_emails = false;
    config
}

/// A router over an in-memory store seeded with an owner, a driver and a capacity-1 driveway
pub struct TestApp {
    pub server: TestServer,
    pub store: InMemoryStore,
    pub owner: UserDBResponse,
    pub driver: UserDBResponse,
    pub driveway: DrivewayDBResponse,
}

impl TestApp {
    /// Payments through an accepting dummy provider
    pub fn new() -> Self {
        Self::with_dummy(DummyConfig::default())
    }

    pub fn with_dummy(config: DummyConfig) -> Self {
        Self::with_payments(Some(Arc::new(DummyProvider::from(config))))
    }

    pub fn without_payments() -> Self {
        Self::with_payments(None)
    }

    pub fn with_payments(payments: Option<Arc<dyn PaymentProvider>>) -> Self {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", Some("Olive Owner"));
        let driver = store.insert_user("driver@example.com", Some("Dana Driver"));
        let driveway = store.insert_driveway(&driveway_request(owner.id, 1));

        let state = AppState::assemble(create_test_config(), Arc::new(store.clone()), payments).expect("Failed to assemble state");
        let router = build_router(&state).expect("Failed to build router");
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            owner,
            driver,
            driveway,
        }
    }

    pub fn booking_body(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
        json!({
            "driveway_id": self.driveway.id,
            "start_time": start.to_rfc3339(),
            "end_time": end.to_rfc3339(),
        })
    }

    /// Book the driveway as the driver; returns the booking id
    pub async fn create_booking(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let response = self
            .server
            .post("/api/v1/bookings")
            .add_header("x-parkway-user-id", self.driver.id.to_string())
            .json(&self.booking_body(start, end))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"]["id"]
            .as_str()
            .expect("booking id in response")
            .to_string()
    }
}
