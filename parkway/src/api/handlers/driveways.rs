//! HTTP handlers for driveway endpoints.

use crate::{
    AppState,
    api::models::{bookings::ApiResponse, driveways::AvailabilityQuery, users::CurrentUser},
    bookings::availability::AvailabilitySummary,
    errors::{Error, ErrorBody, FieldError, Result},
    types::DrivewayId,
};
use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::Json,
};

/// Check availability of a driveway
#[utoipa::path(
    get,
    path = "/driveways/{id}/availability",
    tag = "driveways",
    summary = "Check availability",
    description = "Apply the booking rules to a window without booking it, and report how many slots remain.",
    params(
        ("id" = String, Path, description = "Driveway ID"),
        AvailabilityQuery,
    ),
    responses(
        (status = 200, description = "Availability for the window", body = ApiResponse<AvailabilitySummary>),
        (status = 400, description = "Invalid window or booking rule violated", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 404, description = "Driveway not found", body = ErrorBody),
    ),
    security(("X-Parkway-User" = []))
)]
#[tracing::instrument(skip_all, fields(driveway_id = %id))]
pub async fn check_availability(
    State(state): State<AppState>,
    Path(id): Path<DrivewayId>,
    current_user: CurrentUser,
    query: std::result::Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<AvailabilitySummary>>> {
    let Query(window) = query.map_err(|e| Error::Validation {
        fields: vec![FieldError::new("query", e.body_text())],
    })?;

    let availability = state
        .bookings
        .check_availability(current_user.id, id, window.start_time, window.end_time)
        .await?;

    let message = if availability.is_available() {
        "Driveway is available"
    } else {
        "Driveway is fully booked for the requested window"
    };
    Ok(Json(ApiResponse::ok(message, availability.summary())))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::models::bookings::BookingStatus,
        test_utils::{TestApp, hours_from_now},
    };
    use axum::http::StatusCode;
    use serde_json::Value;

    fn window_query(start_h: i64, end_h: i64) -> Vec<(&'static str, String)> {
        vec![
            ("start_time", hours_from_now(start_h).to_rfc3339()),
            ("end_time", hours_from_now(end_h).to_rfc3339()),
        ]
    }

    #[tokio::test]
    async fn test_availability_reports_remaining_slots() {
        let app = TestApp::new();
        let path = format!("/api/v1/driveways/{}/availability", app.driveway.id);

        let response = app
            .server
            .get(&path)
            .add_query_params(window_query(2, 4))
            .add_header("x-parkway-user-id", app.driver.id.to_string())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["available"], true);
        assert_eq!(body["data"]["remaining"], 1);

        app.store.seed_booking(
            app.driveway.id,
            app.owner.id,
            hours_from_now(3),
            hours_from_now(5),
            BookingStatus::Pending,
        );
        let body: Value = app
            .server
            .get(&path)
            .add_query_params(window_query(2, 4))
            .add_header("x-parkway-user-id", app.driver.id.to_string())
            .await
            .json();
        assert_eq!(body["data"]["available"], false);
        assert_eq!(body["data"]["overlapping"], 1);
    }

    #[tokio::test]
    async fn test_availability_rejects_bad_query() {
        let app = TestApp::new();

        let response = app
            .server
            .get(&format!("/api/v1/driveways/{}/availability", app.driveway.id))
            .add_query_param("start_time", "soon")
            .add_header("x-parkway-user-id", app.driver.id.to_string())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        let message = body["message"].as_str().unwrap();
        assert!(message.starts_with("Invalid request: query:"), "{message}");
    }

    #[tokio::test]
    async fn test_availability_unknown_driveway() {
        let app = TestApp::new();

        let response = app
            .server
            .get(&format!("/api/v1/driveways/{}/availability", uuid::Uuid::new_v4()))
            .add_query_params(window_query(2, 4))
            .add_header("x-parkway-user-id", app.driver.id.to_string())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
