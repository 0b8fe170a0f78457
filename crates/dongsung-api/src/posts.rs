use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::info;

use dongsung_db::models::PostRow;
use dongsung_db::posts::NewPost;
use dongsung_types::api::{Claims, DateCounts, Envelope, PostResponse};

use crate::error::ApiError;
use crate::uploads::UploadForm;
use crate::words::MAX_IMAGES;
use crate::{AppState, blocking, parse_date, timestamp};

/// GET /api/posts — newest first.
pub async fn get_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let rows = blocking(move || Ok(st.db.get_posts()?)).await?;

    let posts = rows
        .into_iter()
        .map(|row| post_response(row, None))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::success(posts)))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    form: UploadForm,
) -> Result<impl IntoResponse, ApiError> {
    let result = save_post(&state, &claims, &form).await;
    if result.is_err() {
        state.uploads.discard(form.all_files()).await;
    }
    result
}

async fn save_post(
    state: &AppState,
    claims: &Claims,
    form: &UploadForm,
) -> Result<(StatusCode, Json<Envelope<PostResponse>>), ApiError> {
    let title = form.required("title")?.to_string();
    let content = form.required("content")?.to_string();
    let created_at = match form.text("createdAt").map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_created_at(raw)?),
        _ => None,
    };

    let images = form.files("images").to_vec();
    if images.len() > MAX_IMAGES {
        return Err(ApiError::invalid(format!("At most {} images per post", MAX_IMAGES)));
    }

    let st = state.clone();
    let user_id = claims.sub;
    let author_name = claims.username.clone();
    let all_images = images.clone();
    let row = blocking(move || {
        let post = NewPost {
            title: &title,
            content: &content,
            image_url: images.first().map(String::as_str),
            author_name: &author_name,
            user_id,
            created_at,
        };
        Ok(st.db.create_post(&post)?)
    })
    .await?;

    info!("Post {} created by {}", row.id, claims.username);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Post created", post_response(row, Some(all_images))?)),
    ))
}

/// GET /api/posts/date/{date}
pub async fn get_posts_on(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&date)?;

    let st = state.clone();
    let rows = blocking(move || Ok(st.db.get_posts_on(date)?)).await?;

    let posts = rows
        .into_iter()
        .map(|row| post_response(row, None))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::success(posts)))
}

/// GET /api/posts/counts — posts per creation day.
pub async fn post_counts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let counts: DateCounts = blocking(move || Ok(st.db.post_counts()?)).await?;

    Ok(Json(Envelope::success(counts)))
}

/// Client-chosen creation time: RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), or a
/// bare date meaning midnight UTC.
fn parse_created_at(raw: &str) -> Result<NaiveDateTime, ApiError> {
    if let Ok(t) = raw.parse::<DateTime<Utc>>() {
        return Ok(t.naive_utc());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(t);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| ApiError::invalid(format!("Invalid createdAt '{}'", raw)))
}

fn post_response(row: PostRow, all_images: Option<Vec<String>>) -> Result<PostResponse, ApiError> {
    Ok(PostResponse {
        id: row.id,
        title: row.title,
        content: row.content,
        image_url: row.image_url,
        author_name: row.author_name,
        user_id: row.user_id,
        created_at: timestamp(&row.created_at)?,
        all_images,
    })
}
