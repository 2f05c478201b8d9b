//! API request and response models.
//!
//! API models are kept separate from the row types in [`crate::db::models`] so the public
//! contract can evolve independently of storage. All of them carry `utoipa` schemas.
//!
//! - [`bookings`]: booking responses and the success envelope
//! - [`driveways`]: driveway summaries and availability queries
//! - [`users`]: the authenticated caller and user summaries

pub mod bookings;
pub mod driveways;
pub mod users;
