use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use dongsung_db::models::ShareRow;
use dongsung_types::api::{CreateShareRequest, Envelope, MessageResponse, PasswordRequest, ShareResponse, UpdateShareRequest};

use crate::error::{ApiError, settle};
use crate::{AppState, blocking, parse_date, parse_id, required, timestamp};

const SHARE_NOT_FOUND: &str = "Share not found";
const WRONG_PASSWORD: &str = "Incorrect password";

/// GET /api/word-shares/{date}
pub async fn get_shares(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&date)?;

    let st = state.clone();
    let rows = blocking(move || Ok(st.db.get_shares(date)?)).await?;

    let shares = rows.into_iter().map(share_response).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::success(shares)))
}

/// POST /api/word-shares
pub async fn create_share(
    State(state): State<AppState>,
    payload: Result<Json<CreateShareRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let author_name = required(&req.author_name, "Author name is required")?.trim().to_string();
    required(&req.password, "Password is required")?;
    required(&req.content, "Content is required")?;

    let st = state.clone();
    let row = blocking(move || {
        Ok(st
            .db
            .create_share(req.date, &author_name, &req.content, &st.hasher.secret(&req.password))?)
    })
    .await?;

    info!("Share {} posted for {}", row.id, row.date);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Share created", share_response(row)?)),
    ))
}

/// PUT /api/word-shares/{id}
pub async fn update_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateShareRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = payload?;
    required(&req.password, "Password is required")?;
    required(&req.content, "Content is required")?;

    let st = state.clone();
    let outcome = blocking(move || Ok(st.db.update_share(id, &req.content, &st.hasher.secret(&req.password))?)).await?;
    let row = settle(outcome, SHARE_NOT_FOUND, WRONG_PASSWORD)?;

    Ok(Json(Envelope::new("Share updated", share_response(row)?)))
}

/// DELETE /api/word-shares/{id}
pub async fn delete_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = payload?;
    required(&req.password, "Password is required")?;

    let st = state.clone();
    let outcome = blocking(move || Ok(st.db.delete_share(id, &st.hasher.secret(&req.password))?)).await?;
    settle(outcome, SHARE_NOT_FOUND, WRONG_PASSWORD)?;

    Ok(Json(MessageResponse::new("Share deleted")))
}

fn share_response(row: ShareRow) -> Result<ShareResponse, ApiError> {
    Ok(ShareResponse {
        id: row.id,
        date: row.date,
        author_name: row.author_name,
        content: row.content,
        created_at: timestamp(&row.created_at)?,
        updated_at: timestamp(&row.updated_at)?,
    })
}
