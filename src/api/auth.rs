// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication endpoints: credentials, Google sign-in, email confirmation.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{
        AuthResponse, AuthorizationUrlResponse, ConfirmEmailRequest, CredentialsRequest,
        GoogleAuthRequest, StatusResponse,
    },
    state::AppState,
};

/// Turn a JSON extraction failure into the standard error body.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Register a new account with email and password.
///
/// The account starts with an unconfirmed email; call
/// `/v1/auth/confirm/send` to start confirmation.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "Auth",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid email or password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let req = body(payload)?;
    req.validate()?;

    let ctx = state.request_context();
    let session = state.auth.register(&ctx, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Invalid email or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let req = body(payload)?;
    req.validate()?;

    let ctx = state.request_context();
    let session = state.auth.login(&ctx, &req.email, &req.password).await?;
    Ok(Json(session.into()))
}

/// Get the Google consent URL.
///
/// The returned `state` is single-use and expires after ten minutes.
#[utoipa::path(
    get,
    path = "/v1/auth/google/url",
    tag = "Auth",
    responses(
        (status = 200, description = "Consent URL", body = AuthorizationUrlResponse),
        (status = 503, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn google_url(State(state): State<AppState>) -> Result<Json<AuthorizationUrlResponse>, ApiError> {
    let ctx = state.request_context();
    let url = state.auth.generate_authorization_url(&ctx).await?;
    Ok(Json(url.into()))
}

/// Complete Google sign-in with the code and state from the callback.
#[utoipa::path(
    post,
    path = "/v1/auth/google",
    tag = "Auth",
    request_body = GoogleAuthRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid or expired state", body = ErrorBody),
        (status = 502, description = "Provider error", body = ErrorBody)
    )
)]
pub async fn google_login(
    State(state): State<AppState>,
    payload: Result<Json<GoogleAuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let req = body(payload)?;
    req.validate()?;

    let ctx = state.request_context();
    let session = state.auth.federated_login(&ctx, &req.code, &req.state).await?;
    Ok(Json(session.into()))
}

/// Send a confirmation link to the caller's email.
///
/// Recipient and account come from the session token.
#[utoipa::path(
    post,
    path = "/v1/auth/confirm/send",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 202, description = "Confirmation link issued", body = StatusResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 409, description = "Email already confirmed", body = ErrorBody),
        (status = 503, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn send_confirmation(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let ctx = state.request_context();
    state.auth.send_confirmation(&ctx, user.user_id, &user.email).await?;
    Ok((StatusCode::ACCEPTED, Json(StatusResponse::ok())))
}

/// Confirm the caller's email with a token from a confirmation link.
#[utoipa::path(
    post,
    path = "/v1/auth/confirm",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = ConfirmEmailRequest,
    responses(
        (status = 200, description = "Email confirmed", body = StatusResponse),
        (status = 400, description = "Invalid or expired link", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Link belongs to another account", body = ErrorBody)
    )
)]
pub async fn confirm_email(
    State(state): State<AppState>,
    Auth(user): Auth,
    payload: Result<Json<ConfirmEmailRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let req = body(payload)?;
    req.validate()?;

    let ctx = state.request_context();
    state.auth.confirm_email(&ctx, &req.token, &user).await?;
    Ok(Json(StatusResponse::ok()))
}
