use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use dongsung_db::models::{CommentRow, DailyPhotoRow};
use dongsung_types::api::{
    Claims, CommentResponse, CreateCommentRequest, DailyPhotoResponse, DateCounts, Envelope, MessageResponse,
};

use crate::error::{ApiError, settle};
use crate::uploads::UploadForm;
use crate::{AppState, blocking, parse_date, parse_id, required, timestamp};

// -- Daily photos --

/// POST /api/daily-photos — stores the date's photo, replacing the current
/// one (and its comments) subject to the replace policy.
pub async fn upload_daily_photo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    form: UploadForm,
) -> Result<impl IntoResponse, ApiError> {
    let result = save_daily_photo(&state, &claims, &form).await;
    if result.is_err() {
        state.uploads.discard(form.all_files()).await;
    }
    result
}

async fn save_daily_photo(
    state: &AppState,
    claims: &Claims,
    form: &UploadForm,
) -> Result<(StatusCode, Json<Envelope<DailyPhotoResponse>>), ApiError> {
    let date = parse_date(form.required("date")?)?;
    let image_url = match form.files("image") {
        [one] => one.clone(),
        [] => return Err(ApiError::invalid("An image is required")),
        _ => return Err(ApiError::invalid("Only one image may be uploaded")),
    };

    let st = state.clone();
    let user_id = claims.sub;
    let policy = state.policy.photo_replace;
    let outcome = blocking(move || Ok(st.db.replace_daily_photo(date, &image_url, user_id, policy)?)).await?;
    let row = settle(
        outcome,
        "Daily photo not found",
        "Only the original uploader may replace this photo",
    )?;

    info!("Daily photo for {} uploaded by {}", date, claims.username);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Daily photo uploaded", photo_response(row)?)),
    ))
}

/// GET /api/daily-photos/{date} — `data` is null when there is no photo.
pub async fn get_daily_photo(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&date)?;

    let st = state.clone();
    let row = blocking(move || Ok(st.db.get_daily_photo(date)?)).await?;

    Ok(Json(Envelope::success(row.map(photo_response).transpose()?)))
}

/// GET /api/daily-photos/counts/all — comment count per photo date.
pub async fn photo_comment_counts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let counts: DateCounts = blocking(move || Ok(st.db.photo_comment_counts()?)).await?;

    Ok(Json(Envelope::success(counts)))
}

// -- Comments --

/// POST /api/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    required(&req.content, "Content is required")?;

    let st = state.clone();
    let user_id = claims.sub;
    let row = blocking(move || Ok(st.db.create_comment(req.daily_photo_id, user_id, &req.content)?))
        .await?
        .ok_or_else(|| ApiError::NotFound("Daily photo not found".into()))?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Comment created", comment_response(row)?)),
    ))
}

/// GET /api/comments/{dailyPhotoId}
pub async fn get_comments(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let photo_id = parse_id(&photo_id)?;

    let st = state.clone();
    let rows = blocking(move || Ok(st.db.get_comments(photo_id)?)).await?;

    let comments = rows.into_iter().map(comment_response).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::success(comments)))
}

/// DELETE /api/comments/{id} — authors only.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let st = state.clone();
    let user_id = claims.sub;
    let outcome = blocking(move || Ok(st.db.delete_comment(id, user_id)?)).await?;
    settle(outcome, "Comment not found", "You can only delete your own comments")?;

    Ok(Json(MessageResponse::new("Comment deleted")))
}

fn photo_response(row: DailyPhotoRow) -> Result<DailyPhotoResponse, ApiError> {
    Ok(DailyPhotoResponse {
        id: row.id,
        date: row.date,
        image_url: row.image_url,
        uploaded_by: row.uploaded_by,
        created_at: timestamp(&row.created_at)?,
    })
}

fn comment_response(row: CommentRow) -> Result<CommentResponse, ApiError> {
    Ok(CommentResponse {
        id: row.id,
        daily_photo_id: row.daily_photo_id,
        content: row.content,
        user_id: row.user_id,
        username: row.username,
        created_at: timestamp(&row.created_at)?,
    })
}
