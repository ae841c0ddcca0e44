use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::Result,
    models::auth::{
        AuthResponse, DataResponse, LoginRequest, RegisterRequest, UpdateDetailsRequest,
        UpdatePasswordRequest,
    },
    services::{auth as auth_service, authz::Caller},
    state::AppState,
};

/// Handles user registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    tracing::info!("📝 Registration attempt for {}", payload.email);

    let (user, token) = auth_service::register(&state, payload).await?;

    let response = AuthResponse {
        success: true,
        token,
        user: Some(user.profile()),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for {}", payload.email);

    let (user, token) = auth_service::login(&state, payload).await?;
    tracing::info!("✅ User logged in: {}", user.id);

    let response = AuthResponse {
        success: true,
        token,
        user: None,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns the caller's profile.
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Response> {
    let user = auth_service::current_user(&state, caller.id).await?;
    Ok(Json(DataResponse::new(user.profile())).into_response())
}

/// Handles changes to the caller's own profile.
#[axum::debug_handler]
pub async fn update_details(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<UpdateDetailsRequest>,
) -> Result<Response> {
    tracing::info!("✏️ Profile update for user: {}", caller.id);

    let user = auth_service::update_details(&state, caller.id, payload).await?;
    Ok(Json(DataResponse::new(user.profile())).into_response())
}

/// Handles changing the caller's password.
#[axum::debug_handler]
pub async fn update_password(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Response> {
    let token = auth_service::update_password(&state, caller.id, payload).await?;

    let response = AuthResponse {
        success: true,
        token,
        user: None,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
