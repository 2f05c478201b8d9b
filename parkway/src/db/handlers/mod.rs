//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection`, which may be a pooled connection or an
//! open transaction. Callers that need atomicity begin a transaction and build the
//! repositories from it:
//!
//! ```ignore
//! use parkway::db::handlers::{Bookings, Driveways};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!
//!     let driveway = Driveways::new(&mut tx).lock_for_booking(driveway_id).await?;
//!     let taken = Bookings::new(&mut tx).count_overlapping(driveway_id, start, end).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! - [`Users`]: requester and owner accounts
//! - [`Driveways`]: driveway lookups and the booking row lock
//! - [`Bookings`]: overlap counting, inserts and payment-intent attachment
//! - [`Notifications`]: bulk notification inserts

pub mod bookings;
pub mod driveways;
pub mod notifications;
pub mod users;

pub use bookings::Bookings;
pub use driveways::Driveways;
pub use notifications::Notifications;
pub use users::Users;
