use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};

use crate::middleware::require_auth;
use crate::{AppState, auth, calendar, gallery, photos, posts, shares, words};

/// Every `/api/*` route. Static files and cross-cutting layers (CORS,
/// tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/reset-password", post(auth::reset_password))
        .route("/api/posts/date/{date}", get(posts::get_posts_on))
        .route("/api/posts/counts", get(posts::post_counts))
        .route("/api/daily-words", post(words::upsert_daily_word))
        .route(
            "/api/daily-words/{date}",
            get(words::get_daily_word).delete(words::delete_daily_word),
        )
        .route("/api/word-shares", post(shares::create_share))
        // GET takes a date, PUT/DELETE a share id; matchit needs one name.
        .route(
            "/api/word-shares/{key}",
            get(shares::get_shares).put(shares::update_share).delete(shares::delete_share),
        )
        .route("/api/calendar/summary", get(calendar::summary))
        .route("/api/gallery", get(gallery::get_gallery).post(gallery::upload_photo))
        .route("/api/gallery/{id}", delete(gallery::delete_photo));

    let protected_routes = Router::new()
        .route("/api/users/password", put(auth::change_password))
        .route("/api/posts", get(posts::get_posts).post(posts::create_post))
        .route("/api/daily-photos", post(photos::upload_daily_photo))
        .route("/api/daily-photos/counts/all", get(photos::photo_comment_counts))
        .route("/api/daily-photos/{date}", get(photos::get_daily_photo))
        .route("/api/comments", post(photos::create_comment))
        // GET takes a photo id, DELETE a comment id.
        .route(
            "/api/comments/{id}",
            get(photos::get_comments).delete(photos::delete_comment),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let body_limit = state.policy.max_upload_bytes;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
