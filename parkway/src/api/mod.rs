//! HTTP API.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: request and response bodies
//!
//! Routes live under `/api/v1`:
//!
//! - `POST /bookings`, `GET /bookings/{id}`, `POST /bookings/{id}/payment-intent`
//! - `GET /driveways/{id}/availability`
//!
//! The OpenAPI document is served at `/api-docs/openapi.json` with a Scalar UI at `/docs`.

pub mod handlers;
pub mod models;
