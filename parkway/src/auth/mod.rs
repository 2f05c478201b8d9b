//! Caller authentication.
//!
//! Parkway sits behind a trusted proxy that authenticates users and forwards their id in a
//! header (default `x-parkway-user-id`, see [`crate::config::ProxyHeaderAuthConfig`]). The
//! [`current_user`] extractor resolves that id against the store; handlers take a
//! [`CurrentUser`](crate::api::models::users::CurrentUser) argument to require it.
//!
//! ```ignore
//! async fn handler(current_user: CurrentUser) -> Result<String> {
//!     Ok(format!("Hello, {}!", current_user.email))
//! }
//! ```

pub mod current_user;
