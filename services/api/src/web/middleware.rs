//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use docgen_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::{error::HttpError, state::AppState};

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// Sessions are issued by the identity service and only read here. If valid,
/// the user id is inserted into the request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    // 1. Extract cookie header
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(HttpError::Unauthorized)?;

    // 2. Parse session ID from cookie
    let auth_session_id = session_cookie(cookie_header).ok_or(HttpError::Unauthorized)?;

    // 3. Validate auth session in database, get user_id
    let user_id = match state.db.validate_auth_session(auth_session_id).await {
        Ok(user_id) => user_id,
        Err(PortError::Unauthorized) | Err(PortError::NotFound(_)) => {
            debug!("Rejected unknown or expired auth session");
            return Err(HttpError::Unauthorized);
        }
        Err(e) => {
            error!("Failed to validate auth session: {:?}", e);
            return Err(HttpError::Internal);
        }
    };

    // 4. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}

fn session_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_among_other_cookies() {
        assert_eq!(session_cookie("theme=dark; session=abc123"), Some("abc123"));
        assert_eq!(session_cookie("session=xyz"), Some("xyz"));
        assert_eq!(session_cookie("theme=dark"), None);
        assert_eq!(session_cookie("session="), None);
    }
}
