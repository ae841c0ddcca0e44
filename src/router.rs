use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::{AppError, Result},
    handlers,
    middleware_layer::{self, auth::TOKEN_HEADER},
    services::photos::PUBLIC_PREFIX,
    state::AppState,
};

/// Room left in a request body for multipart framing around the photo.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

fn cors(state: &AppState) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(&state.config.cors_origin).map_err(|e| {
        AppError::Internal(format!("Invalid CORS_ORIGIN {}: {}", state.config.cors_origin, e))
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(TOKEN_HEADER),
        ])
        .max_age(Duration::from_secs(86400)))
}

/// Builds the HTTP surface over the given state.
///
/// The returned router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`, since the
/// credential routes are throttled per peer address.
pub fn router(state: AppState) -> Result<Router> {
    let credential_routes = middleware_layer::rate_limit::limit_auth_attempts(
        Router::new()
            .route("/api/auth/register", post(handlers::auth::register))
            .route("/api/auth/login", post(handlers::auth::login)),
        &state.config,
    )?;

    let public_routes = Router::new()
        .route("/api/books", get(handlers::books::list_books))
        .route("/api/books/search", get(handlers::books::search_books))
        .route("/api/books/{id}", get(handlers::books::get_book));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/updatedetails", put(handlers::auth::update_details))
        .route("/api/auth/updatepassword", put(handlers::auth::update_password))
        .route("/api/books", post(handlers::books::create_book))
        .route(
            "/api/books/{id}",
            put(handlers::books::update_book).delete(handlers::books::delete_book),
        )
        .route("/api/books/{id}/photo", put(handlers::books::upload_photo))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ));

    let body_limit = state.config.max_file_upload.saturating_mul(2) + MULTIPART_OVERHEAD;
    let uploads = ServeDir::new(state.photos.root());
    let cors = cors(&state)?;

    Ok(Router::new()
        .merge(credential_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(PUBLIC_PREFIX, uploads)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state))
}
