use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use dongsung_db::models::DailyWordRecord;
use dongsung_db::words::{Upserted, WordDraft};
use dongsung_types::api::{DailyWordResponse, Envelope, ImageResponse, MessageResponse, PasswordRequest};

use crate::error::{ApiError, settle};
use crate::uploads::UploadForm;
use crate::{AppState, blocking, parse_date, required, timestamp};

pub(crate) const MAX_IMAGES: usize = 10;

const WORD_NOT_FOUND: &str = "Daily word not found";
const WRONG_PASSWORD: &str = "Incorrect password";

/// GET /api/daily-words/{date} — `data` is null when nothing was posted.
pub async fn get_daily_word(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&date)?;

    let st = state.clone();
    let record = blocking(move || Ok(st.db.get_daily_word(date)?)).await?;

    Ok(Json(Envelope::success(record.map(word_response).transpose()?)))
}

/// POST /api/daily-words — first submission for a date creates the word and
/// sets its password; later submissions are edits and must match it.
pub async fn upsert_daily_word(State(state): State<AppState>, form: UploadForm) -> Result<Response, ApiError> {
    let result = save_daily_word(&state, &form).await;
    if result.is_err() {
        state.uploads.discard(form.all_files()).await;
    }
    result
}

async fn save_daily_word(state: &AppState, form: &UploadForm) -> Result<Response, ApiError> {
    let date = parse_date(form.required("date")?)?;
    let title = form.required("title")?.to_string();
    let content = form.required("content")?.to_string();
    let author_name = form.required("authorName")?.trim().to_string();
    let password = form.required("password")?.to_string();
    let passage = form.text("passage").unwrap_or_default().to_string();
    let remove_images = parse_id_list(form.text("deleteImages").unwrap_or_default());

    let new_images = form.files("image").to_vec();
    if new_images.len() > MAX_IMAGES {
        return Err(ApiError::invalid(format!("At most {} images per upload", MAX_IMAGES)));
    }
    let file_url = match form.files("file") {
        [] => None,
        [one] => Some(one.clone()),
        _ => return Err(ApiError::invalid("Only one file may be attached")),
    };

    let st = state.clone();
    let outcome = blocking(move || {
        let draft = WordDraft {
            title: &title,
            passage: &passage,
            content: &content,
            author_name: &author_name,
            file_url: file_url.as_deref(),
            new_images: &new_images,
            remove_images: &remove_images,
        };
        Ok(st.db.upsert_daily_word(date, &draft, &st.hasher.secret(&password))?)
    })
    .await?;

    let response = match settle(outcome, WORD_NOT_FOUND, WRONG_PASSWORD)? {
        Upserted::Created(record) => (
            StatusCode::CREATED,
            Json(Envelope::new("Daily word created", word_response(record)?)),
        )
            .into_response(),
        Upserted::Updated(record) => Json(Envelope::new("Daily word updated", word_response(record)?)).into_response(),
    };
    Ok(response)
}

/// DELETE /api/daily-words/{date}
pub async fn delete_daily_word(
    State(state): State<AppState>,
    Path(date): Path<String>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&date)?;
    let Json(req) = payload?;
    required(&req.password, "Password is required")?;

    let st = state.clone();
    let outcome = blocking(move || Ok(st.db.delete_daily_word(date, &st.hasher.secret(&req.password))?)).await?;
    settle(outcome, WORD_NOT_FOUND, WRONG_PASSWORD)?;

    Ok(Json(MessageResponse::new("Daily word deleted")))
}

/// `"3, 7,9"` → `[3, 7, 9]`. Blank and non-numeric entries are skipped, as
/// older clients send them.
fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                debug!("Skipping non-numeric image id '{}'", s);
                None
            }
        })
        .collect()
}

fn word_response(record: DailyWordRecord) -> Result<DailyWordResponse, ApiError> {
    let DailyWordRecord { word, images } = record;
    Ok(DailyWordResponse {
        id: word.id,
        date: word.date,
        title: word.title,
        passage: word.passage,
        content: word.content,
        author_name: word.author_name,
        image_url: word.image_url,
        file_url: word.file_url,
        created_at: timestamp(&word.created_at)?,
        updated_at: timestamp(&word.updated_at)?,
        images: images
            .into_iter()
            .map(|image| ImageResponse {
                legacy: image.id.is_none(),
                id: image.id,
                image_url: image.image_url,
                sort_order: image.sort_order,
            })
            .collect(),
    })
}
