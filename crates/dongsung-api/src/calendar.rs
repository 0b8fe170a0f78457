use axum::{Json, extract::State, response::IntoResponse};

use dongsung_types::api::{CalendarDay, CalendarSummary, Envelope};

use crate::error::ApiError;
use crate::{AppState, blocking};

/// GET /api/calendar/summary — every date with a daily word or shares.
pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let days = blocking(move || Ok(st.db.calendar_summary()?)).await?;

    let summary: CalendarSummary = days
        .into_iter()
        .map(|(date, day)| {
            (
                date,
                CalendarDay {
                    has_word: day.has_word,
                    share_count: day.share_count,
                },
            )
        })
        .collect();
    Ok(Json(Envelope::success(summary)))
}
