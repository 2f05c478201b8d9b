//! Database layer for data persistence and access.
//!
//! This module implements the Postgres data access layer using SQLx. It follows the
//! repository pattern; the storage abstraction in [`crate::storage`] composes these
//! repositories into the atomic booking unit.
//!
//! ```text
//! ┌─────────────┐
//! │  Workflow   │  (bookings::BookingService)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Storage   │  (storage::BookingStore - postgres or in-memory)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded at compile time:
//!
//! ```ignore
//! parkway::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
