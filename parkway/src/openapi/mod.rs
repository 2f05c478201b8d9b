//! OpenAPI document for the `/api/v1` surface, served at `/api-docs/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{
    api::{
        self,
        models::{
            bookings::{BookingCreate, BookingResponse},
            driveways::DrivewaySummary,
            users::UserSummary,
        },
    },
    bookings::availability::AvailabilitySummary,
    db::models::bookings::{BookingStatus, PaymentStatus, VehicleInfo},
    errors::{ErrorBody, FieldError},
    payment_providers::intents::PaymentIntentDetails,
};

/// Proxy header identity scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-Parkway-User".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-parkway-user-id",
                    "Id of the authenticated user, set by the trusted proxy in front of the service.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Parkway API", description = "Driveway bookings with capacity-safe writes and payment authorization."),
    servers((url = "/api/v1", description = "Parkway API")),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::bookings::create_booking,
        api::handlers::bookings::get_booking,
        api::handlers::bookings::create_payment_intent,
        api::handlers::driveways::check_availability,
    ),
    components(schemas(
        BookingCreate,
        BookingResponse,
        BookingStatus,
        PaymentStatus,
        VehicleInfo,
        DrivewaySummary,
        UserSummary,
        AvailabilitySummary,
        PaymentIntentDetails,
        ErrorBody,
        FieldError,
    )),
    tags(
        (name = "bookings", description = "Create bookings and manage their payment authorization."),
        (name = "driveways", description = "Availability of driveways for a time window."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "/bookings",
                "/bookings/{id}",
                "/bookings/{id}/payment-intent",
                "/driveways/{id}/availability",
            ]
        );
        assert!(doc.components.unwrap().security_schemes.contains_key("X-Parkway-User"));
    }
}
