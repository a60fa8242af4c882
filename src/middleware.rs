//! Authorization gate for protected routes
//!
//! [`auth_middleware`] authenticates the session cookie; [`ensure_owner`] is
//! the per-operation ownership check every protected service call performs
//! before it writes anything.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::debug;

use crate::config::SESSION_COOKIE;
use crate::database::Document;
use crate::error::AppError;
use crate::state::AppState;

/// Identity verified from the session cookie, attached to the request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub email: String,
}

/// Rejects requests without a valid session cookie with 401.
///
/// On success the verified [`AuthUser`] is inserted into the request
/// extensions for handlers to pick up. The store is never touched here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers()).ok_or_else(|| {
        debug!(path = %request.uri().path(), "missing session cookie");
        AppError::Unauthorized
    })?;

    let email = state.tokens.verify(token)?;

    request.extensions_mut().insert(AuthUser { email });
    Ok(next.run(request).await)
}

/// Extracts the session token from the `Cookie` header, if any
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
}

/// Fails with 403 unless `claimed` is the verified identity
pub fn ensure_owner(user: &AuthUser, claimed: &str) -> Result<(), AppError> {
    if user.email == claimed {
        Ok(())
    } else {
        debug!(verified = %user.email, claimed = %claimed, "ownership check failed");
        Err(AppError::Forbidden)
    }
}

/// Fails with 403 unless the stored `owner_field` of `doc` is the verified identity
pub fn ensure_document_owner(
    user: &AuthUser,
    doc: &Document,
    owner_field: &str,
) -> Result<(), AppError> {
    match doc.get(owner_field).and_then(Value::as_str) {
        Some(owner) => ensure_owner(user, owner),
        None => Err(AppError::Forbidden),
    }
}
