use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use dongsung_types::api::Claims;

use crate::AppState;
use crate::error::ApiError;

/// Legacy header older clients send the raw token in.
const LEGACY_TOKEN_HEADER: &str = "x-auth-token";

/// Signs and checks session tokens.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64, username: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: (chrono::Utc::now() + self.ttl).timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthenticated("Token is not valid".into()))
    }
}

/// Token from `Authorization: Bearer …`, falling back to `x-auth-token`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    headers
        .get(LEGACY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Session for routes open to members and guests alike. No token means a
/// guest; a bad token is still an error.
pub fn optional_session(state: &AppState, headers: &HeaderMap) -> Result<Option<Claims>, ApiError> {
    session_token(headers)
        .map(|token| state.sessions.verify(&token))
        .transpose()
}

/// Validate the session token and expose its [`Claims`] as a request
/// extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(req.headers())
        .ok_or_else(|| ApiError::Unauthenticated("No token, authorization denied".into()))?;

    let claims = state.sessions.verify(&token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
