//! HTTP handlers for booking endpoints.

use crate::{
    AppState,
    api::models::{
        bookings::{ApiResponse, BookingCreate, BookingResponse},
        users::CurrentUser,
    },
    errors::{Error, ErrorBody, FieldError, Result},
    payment_providers::intents::PaymentIntentDetails,
    types::BookingId,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

/// Create a booking
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    summary = "Create a booking",
    description = "Reserve one slot of a driveway for a time window. Field names are also accepted in camelCase, \
                   and `resourceId` is accepted for `driveway_id`. When payments are configured the response carries \
                   the authorization's client secret.",
    request_body = BookingCreate,
    responses(
        (status = 201, description = "Booking created, pending confirmation", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Invalid request or booking rule violated", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 404, description = "Driveway not found", body = ErrorBody),
        (status = 409, description = "Driveway fully booked for the window", body = ErrorBody),
        (status = 503, description = "Payments required but not configured", body = ErrorBody),
    ),
    security(("X-Parkway-User" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn create_booking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>)> {
    let body: Value = serde_json::from_slice(&body).map_err(|e| Error::Validation {
        fields: vec![FieldError::new("body", format!("must be a JSON object: {e}"))],
    })?;

    // Run to completion even if the client goes away mid-request
    let service = state.bookings.clone();
    let task = tokio::spawn(async move { service.create_booking(current_user.id, &body).await });
    let details = task.await.map_err(|e| Error::Internal {
        operation: format!("complete booking task: {e}"),
    })??;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Booking created successfully", BookingResponse::from(details))),
    ))
}

/// Get a booking
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    summary = "Get a booking",
    description = "Visible to the requester and to the driveway's owner.",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details", body = ApiResponse<BookingResponse>),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Not the requester or owner", body = ErrorBody),
        (status = 404, description = "Booking not found", body = ErrorBody),
    ),
    security(("X-Parkway-User" = []))
)]
#[tracing::instrument(skip_all, fields(booking_id = %id))]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<BookingResponse>>> {
    let details = state.bookings.get_booking(current_user.id, id).await?;
    Ok(Json(ApiResponse::ok("Booking retrieved", BookingResponse::from(details))))
}

/// Get or create the payment intent for a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/payment-intent",
    tag = "bookings",
    summary = "Get or create a payment intent",
    description = "Returns the booking's stored authorization when the processor still reports the booking's amount, \
                   otherwise creates a new one. Only the requester may call this.",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Authorization ready for client confirmation", body = ApiResponse<PaymentIntentDetails>),
        (status = 400, description = "Processor rejected the request", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Not the requester", body = ErrorBody),
        (status = 404, description = "Booking not found", body = ErrorBody),
        (status = 500, description = "Processor error", body = ErrorBody),
        (status = 503, description = "Payments not configured", body = ErrorBody),
    ),
    security(("X-Parkway-User" = []))
)]
#[tracing::instrument(skip_all, fields(booking_id = %id))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaymentIntentDetails>>> {
    // A created authorization must be stored even if the client goes away
    let bridge = state.payment_intents.clone();
    let task = tokio::spawn(async move { bridge.ensure_for_booking(current_user.id, id).await });
    let details = task.await.map_err(|e| Error::Internal {
        operation: format!("complete payment intent task: {e}"),
    })??;
    Ok(Json(ApiResponse::ok("Payment intent ready", details)))
}
