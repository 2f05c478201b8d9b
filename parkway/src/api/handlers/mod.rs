//! HTTP handlers, one module per resource.
//!
//! - [`bookings`]: booking creation, lookup and payment intents
//! - [`driveways`]: availability checks
//!
//! Handlers authenticate through the [`CurrentUser`](crate::api::models::users::CurrentUser)
//! extractor and return [`crate::errors::Result`], so failures render as the JSON error envelope.

pub mod bookings;
pub mod driveways;
