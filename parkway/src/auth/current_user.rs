use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
    storage::BookingStore,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};
use uuid::Uuid;

/// Resolve the caller from the proxy header.
///
/// Returns:
/// - None: header absent
/// - Some(Ok(user)): header names a known user
/// - Some(Err(error)): header present but malformed or the user is unknown
#[instrument(skip(parts, store))]
async fn try_proxy_header_auth(parts: &Parts, header_name: &str, store: &dyn BookingStore) -> Option<Result<CurrentUser>> {
    let raw = parts.headers.get(header_name)?;

    let user_id = match raw.to_str().ok().and_then(|s| Uuid::parse_str(s.trim()).ok()) {
        Some(id) => id,
        None => {
            return Some(Err(Error::Unauthenticated {
                message: Some(format!("Invalid {header_name} header")),
            }));
        }
    };

    match store.get_user(user_id).await {
        Ok(Some(user)) => Some(Ok(user.into())),
        Ok(None) => Some(Err(Error::Unauthenticated {
            message: Some("Unknown user".to_string()),
        })),
        Err(e) => Some(Err(e.into())),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header_name = &state.config.auth.proxy_header.header_name;

        match try_proxy_header_auth(parts, header_name, state.store.as_ref()).await {
            Some(Ok(user)) => {
                debug!("Authenticated user {} from proxy header", user.id);
                Ok(user)
            }
            Some(Err(e)) => {
                trace!("Proxy header authentication failed: {:?}", e);
                Err(e)
            }
            None => Err(Error::Unauthenticated { message: None }),
        }
    }
}
