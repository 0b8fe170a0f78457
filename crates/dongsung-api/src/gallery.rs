use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::info;

use dongsung_db::models::GalleryRow;
use dongsung_types::api::{Envelope, GalleryResponse, MessageResponse, PasswordRequest};

use crate::error::{ApiError, settle};
use crate::middleware::optional_session;
use crate::uploads::UploadForm;
use crate::{AppState, blocking, parse_id, required, timestamp};

const PHOTO_NOT_FOUND: &str = "Photo not found";

/// GET /api/gallery — newest first.
pub async fn get_gallery(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let rows = blocking(move || Ok(st.db.get_gallery()?)).await?;

    let photos = rows.into_iter().map(gallery_response).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::success(photos)))
}

/// POST /api/gallery — owned by the signed-in member, or, without a session,
/// anonymous and protected by the submitted password.
pub async fn upload_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: UploadForm,
) -> Result<impl IntoResponse, ApiError> {
    let result = save_photo(&state, &headers, &form).await;
    if result.is_err() {
        state.uploads.discard(form.all_files()).await;
    }
    result
}

async fn save_photo(
    state: &AppState,
    headers: &HeaderMap,
    form: &UploadForm,
) -> Result<(StatusCode, Json<Envelope<GalleryResponse>>), ApiError> {
    let session = optional_session(state, headers)?;
    let title = form.text("title").unwrap_or_default().trim().to_string();
    let image_url = match form.files("image") {
        [one] => one.clone(),
        [] => return Err(ApiError::invalid("An image is required")),
        _ => return Err(ApiError::invalid("Only one image may be uploaded")),
    };

    let st = state.clone();
    let row = match session {
        Some(claims) => {
            blocking(move || Ok(st.db.create_member_photo(claims.sub, &claims.username, &title, &image_url)?)).await?
        }
        None => {
            let author_name = form.required("authorName")?.trim().to_string();
            let password = form.required("password")?.to_string();
            blocking(move || {
                Ok(st
                    .db
                    .create_anonymous_photo(&author_name, &title, &image_url, &st.hasher.secret(&password))?)
            })
            .await?
        }
    };

    info!("Gallery photo {} uploaded by {}", row.id, row.author_name);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Photo uploaded", gallery_response(row)?)),
    ))
}

/// DELETE /api/gallery/{id} — member photos need their owner's session,
/// anonymous photos need `{ "password": ... }`.
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let st = state.clone();
    let photo = blocking(move || Ok(st.db.get_gallery_photo(id)?))
        .await?
        .ok_or_else(|| ApiError::NotFound(PHOTO_NOT_FOUND.into()))?;

    let st = state.clone();
    let outcome = if photo.user_id.is_some() {
        let claims = optional_session(&state, &headers)?
            .ok_or_else(|| ApiError::Unauthenticated("No token, authorization denied".into()))?;
        let outcome = blocking(move || Ok(st.db.delete_member_photo(id, claims.sub)?)).await?;
        settle(outcome, PHOTO_NOT_FOUND, "You can only delete your own photos")
    } else {
        let req: PasswordRequest = serde_json::from_slice(&body)
            .map_err(|e| ApiError::invalid(format!("Invalid request body: {}", e)))?;
        required(&req.password, "Password is required")?;
        let outcome = blocking(move || Ok(st.db.delete_anonymous_photo(id, &st.hasher.secret(&req.password))?)).await?;
        settle(outcome, PHOTO_NOT_FOUND, "Incorrect password")
    };
    outcome?;

    Ok(Json(MessageResponse::new("Photo deleted")))
}

fn gallery_response(row: GalleryRow) -> Result<GalleryResponse, ApiError> {
    Ok(GalleryResponse {
        id: row.id,
        author_name: row.author_name,
        title: row.title,
        image_url: row.image_url,
        user_id: row.user_id,
        created_at: timestamp(&row.created_at)?,
    })
}
