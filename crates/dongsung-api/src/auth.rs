use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use dongsung_types::api::{
    ChangePasswordRequest, Claims, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest,
};

use crate::error::ApiError;
use crate::{AppState, blocking};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 6;

/// Login failures never say which half was wrong.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let username = req.username.trim().to_string();

    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ApiError::invalid(format!(
            "Username must be {}-{} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    check_password(&req.password)?;

    let st = state.clone();
    let created = blocking(move || {
        let hash = st.hasher.hash(&req.password)?;
        Ok(st.db.create_user(&username, &hash)?.map(|id| (id, username)))
    })
    .await?;

    let Some((user_id, username)) = created else {
        return Err(ApiError::Conflict("User already exists".into()));
    };

    info!("Registered user {} ({})", username, user_id);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user_id,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let username = req.username.trim().to_string();

    let st = state.clone();
    let name = username.clone();
    let user = blocking(move || {
        let Some(user) = st.db.get_user_by_username(&name)? else {
            return Ok(None);
        };
        let ok = st.hasher.verify(&req.password, &user.password)?;
        Ok(ok.then_some(user))
    })
    .await?;

    let Some(user) = user else {
        warn!("Failed login for '{}'", username);
        return Err(ApiError::invalid(INVALID_CREDENTIALS));
    };

    let token = state.sessions.issue(user.id, &user.username)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Change the signed-in member's password after checking the current one.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    check_password(&req.new_password)?;

    let st = state.clone();
    let user_id = claims.sub;
    blocking(move || {
        let user = st
            .db
            .get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        if !st.hasher.verify(&req.current_password, &user.password)? {
            return Err(ApiError::invalid("Current password is incorrect"));
        }
        let hash = st.hasher.hash(&req.new_password)?;
        st.db.set_user_password(user_id, &hash)?;
        Ok(())
    })
    .await?;

    info!("User {} changed their password", claims.username);
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Reset a password knowing only the username. Unauthenticated, so it is
/// switchable and every use is logged.
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.policy.allow_username_reset {
        return Err(ApiError::Forbidden("Password reset is disabled".into()));
    }

    let Json(req) = payload?;
    check_password(&req.new_password)?;
    let username = req.username.trim().to_string();

    let st = state.clone();
    let target = username.clone();
    let updated = blocking(move || {
        let hash = st.hasher.hash(&req.new_password)?;
        Ok(st.db.set_user_password_by_username(&target, &hash)?)
    })
    .await?;

    if !updated {
        return Err(ApiError::NotFound("User not found".into()));
    }

    warn!("Password for '{}' reset by username", username);
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
