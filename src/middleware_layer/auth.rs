use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, services::auth as auth_service, state::AppState};

/// The header the client attaches its credential to.
pub const TOKEN_HEADER: &str = "x-auth-token";

/// Extracts the credential from the request headers. `x-auth-token` wins over
/// an `Authorization: Bearer` header.
///
/// # Arguments
///
/// * `headers` - The request headers.
///
/// # Returns
///
/// An `Option` containing the token if found.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let from_custom = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty());

    from_custom.or_else(|| {
        headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

/// A middleware that requires a valid credential to be present and puts the
/// resolved `Caller` into the request extensions.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The downstream `Response`, or a 401 when the credential is missing or
/// rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking authentication...");

    let Some(token) = extract_token(request.headers()) else {
        tracing::warn!("❌ No credential on request to {}", request.uri().path());
        return AppError::Unauthenticated.into_response();
    };

    let caller = match auth_service::resolve_caller(&state, token).await {
        Ok(caller) => caller,
        Err(e) => return e.into_response(),
    };

    tracing::debug!("✅ User authenticated: {}", caller.id);
    request.extensions_mut().insert(caller);

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn custom_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("abc"));
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz"),
        );
        assert_eq!(extract_token(&headers), Some("abc"));
    }

    #[test]
    fn bearer_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz"),
        );
        assert_eq!(extract_token(&headers), Some("xyz"));
    }

    #[test]
    fn blank_or_foreign_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("  "));
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(extract_token(&headers), None);
    }
}
