//! Database record models matching table schemas.
//!
//! These structs correspond directly to table rows. Repositories in
//! [`crate::db::handlers`] return them, and the storage layer in
//! [`crate::storage`] passes them through to the booking workflow.
//!
//! Database models are distinct from API models ([`crate::api::models`]) so that
//! storage and wire representations can evolve independently. Conversions live on
//! the API side as `From` impls.
//!
//! - [`users`]: requesters and driveway owners
//! - [`driveways`]: the schedulable resource with its hourly rate and capacity
//! - [`bookings`]: reservations, their lifecycle and payment status
//! - [`notifications`]: in-app notifications emitted after a booking commits

pub mod bookings;
pub mod driveways;
pub mod notifications;
pub mod users;
