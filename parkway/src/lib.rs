//! # parkway: driveway booking service
//!
//! Drivers book one slot of a privately owned driveway for a time window. Every driveway has
//! a capacity, and concurrent requests for the same window must never oversell it. Bookings
//! are created `pending`; when a payment processor is configured, an authorization is
//! created alongside the row so the client can confirm payment.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Bookings live in PostgreSQL
//! (migrations embedded and run at startup), or in a process-local store for development.
//!
//! A booking request flows through [`bookings::BookingService`]:
//!
//! 1. **Validation** of the JSON body, listing every bad field at once
//! 2. **Availability**: driveway exists and accepts bookings, requester is not the owner, the
//!    window is in the future and not too long, and an optimistic overlap count
//! 3. **Pricing** at the driveway's hourly rate
//! 4. **Transactional write**: the driveway row is locked, overlaps recounted, a payment
//!    authorization created, and the booking inserted, all in one transaction
//! 5. **Notifications** for the requester and owner, and a confirmation email, best effort
//!
//! The **storage layer** ([`storage`]) puts the persistence the workflow needs behind the
//! [`storage::BookingStore`] trait. The **payment layer** ([`payment_providers`]) talks to
//! Stripe, and also holds the payment intent bridge used to recover or re-create the
//! authorization of an existing booking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use parkway::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = parkway::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     parkway::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod bookings;
pub mod config;
pub mod db;
mod email;
pub mod errors;
mod notifications;
mod openapi;
pub mod payment_providers;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    bookings::{BookingRules, BookingService},
    config::{CorsOrigin, DatabaseConfig, PoolSettings},
    email::EmailService,
    notifications::Notifier,
    openapi::ApiDoc,
    payment_providers::{PaymentProvider, create_provider, intents::PaymentIntentBridge},
    storage::{BookingStore, InMemoryStore, PostgresStore},
};
use axum::{
    Json, Router,
    http::{self, HeaderValue},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{BookingId, DrivewayId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .bookings(bookings)
///     .payment_intents(bridge)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn BookingStore>,
    pub bookings: BookingService,
    pub payment_intents: PaymentIntentBridge,
}

impl AppState {
    /// Wire the booking services over `store`.
    ///
    /// `payments` is the processor built from `config.payment`; it is taken separately so tests
    /// can inject their own.
    pub fn assemble(config: Config, store: Arc<dyn BookingStore>, payments: Option<Arc<dyn PaymentProvider>>) -> anyhow::Result<Self> {
        let rules = BookingRules::from(&config.booking);

        let email = if config.notifications.send_emails {
            Some(Arc::new(EmailService::new(&config)?))
        } else {
            None
        };
        let notifier = Notifier::new(store.clone(), email, rules.currency.clone());
        let payment_intents = PaymentIntentBridge::new(store.clone(), payments.clone(), rules.currency.clone());
        let bookings = BookingService::new(store.clone(), payments, notifier, rules);

        Ok(AppState::builder()
            .config(config)
            .store(store)
            .bookings(bookings)
            .payment_intents(payment_intents)
            .build())
    }
}

/// Get the parkway database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

async fn connect_pool(url: &str, settings: &PoolSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(Some(settings.idle_timeout))
        .max_lifetime(Some(settings.max_lifetime))
        .connect(url)
        .await?;
    Ok(pool)
}

/// Open the configured store, running migrations for Postgres.
#[instrument(skip_all)]
async fn setup_store(config: &Config) -> anyhow::Result<(Arc<dyn BookingStore>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::External { url, pool } => {
            info!("Using external database");
            let pool = connect_pool(url, pool).await?;
            migrator().run(&pool).await?;
            Ok((Arc::new(PostgresStore::new(pool.clone())), Some(pool)))
        }
        DatabaseConfig::Memory => {
            warn!("Using in-memory store: bookings will be lost on shutdown");
            Ok((Arc::new(InMemoryStore::new()), None))
        }
    }
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let header_name = http::HeaderName::from_bytes(config.auth.proxy_header.header_name.as_bytes())?;
    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE, header_name])
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `/api/v1/*`: booking and availability routes
/// - `/healthz`: liveness
/// - `/docs` and `/api-docs/openapi.json`: API documentation
/// - `/internal/metrics`: Prometheus exposition, when `enable_metrics` is set
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/bookings", post(api::handlers::bookings::create_booking))
        .route("/bookings/{id}", get(api::handlers::bookings::get_booking))
        .route(
            "/bookings/{id}/payment-intent",
            post(api::handlers::bookings::create_payment_intent),
        )
        .route(
            "/driveways/{id}/availability",
            get(api::handlers::driveways::check_availability),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting parkway with configuration: {:#?}", config);

        let (store, pool) = setup_store(&config).await?;

        let payments = match config.payment.clone() {
            Some(payment_config) => Some(create_provider(payment_config)?),
            None => {
                if config.booking.require_payment {
                    warn!("No payment processor configured; booking requests will be refused");
                }
                None
            }
        };

        let app_state = AppState::assemble(config.clone(), store, payments)?;
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Parkway listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
