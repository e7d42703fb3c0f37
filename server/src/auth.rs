//! Host authentication: bcrypt password checks, HS256 session tokens carried
//! in an HttpOnly cookie, and the [`AdminSession`] extractor that guards the
//! host routes.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap,
    },
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use database::AdminRecord;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

pub const COOKIE_NAME: &str = "taptap_admin_token";
const JWT_ISSUER: &str = "tap-tap-trivia";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl_secs: i64,
    cookie_secure: bool,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(secret: &str, token_ttl_secs: i64, cookie_secure: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[JWT_ISSUER]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl_secs,
            cookie_secure,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn issue_token(&self, admin: &AdminRecord) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: admin.id.to_string(),
            email: admin.email.clone(),
            exp: (now + Duration::seconds(self.token_ttl_secs)).timestamp(),
            iat: now.timestamp(),
            iss: JWT_ISSUER.to_string(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// `None` for anything that is not a live token signed with our secret.
    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| warn!(error = %e, "Rejected admin token"))
            .ok()
    }

    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, self.bcrypt_cost)
    }

    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(token, self.token_ttl_secs)
    }

    pub fn clear_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let secure = if self.cookie_secure { "; Secure" } else { "" };
        format!("{COOKIE_NAME}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age}{secure}")
    }
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// An authenticated host, taken from the admin cookie.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub admin_id: i64,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let claims = state.auth.verify_token(&token).ok_or(ApiError::Unauthorized)?;
        let admin_id = claims.sub.parse().map_err(|_| ApiError::Unauthorized)?;

        Ok(AdminSession {
            admin_id,
            email: claims.email,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = match (payload.email, payload.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email.trim().to_lowercase(), password)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Email and password are required".to_string(),
            ))
        }
    };

    let Some(admin) = state.store.find_admin_by_email(&email).await? else {
        warn!(email = %email, "Login for unknown admin");
        return Err(ApiError::Unauthorized);
    };

    let hash = admin.pass_hash.clone();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .unwrap_or(false);
    if !valid {
        warn!(admin_id = admin.id, "Login with wrong password");
        return Err(ApiError::Unauthorized);
    }

    let token = state.auth.issue_token(&admin)?;
    info!(admin_id = admin.id, "Admin logged in");

    Ok((
        [(SET_COOKIE, state.auth.session_cookie(&token))],
        Json(json!({ "success": true })),
    ))
}

pub async fn me_handler(
    State(state): State<AppState>,
    session: AdminSession,
) -> Result<impl IntoResponse, ApiError> {
    let admin = state
        .store
        .get_admin(session.admin_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({
        "id": admin.id,
        "email": admin.email,
        "name": admin.name,
    })))
}

pub async fn logout_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, state.auth.clear_cookie())],
        Json(json!({ "success": true })),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn admin() -> AdminRecord {
        AdminRecord {
            id: 7,
            email: "host@example.com".to_string(),
            name: "Host".to_string(),
            pass_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let auth = AuthService::new("secret", 3600, false);
        let token = auth.issue_token(&admin()).unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, "host@example.com");
        assert_eq!(claims.iss, JWT_ISSUER);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = AuthService::new("secret", 3600, false)
            .issue_token(&admin())
            .unwrap();
        assert!(AuthService::new("other", 3600, false)
            .verify_token(&token)
            .is_none());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let auth = AuthService::new("secret", -3600, false);
        let token = auth.issue_token(&admin()).unwrap();
        assert!(auth.verify_token(&token).is_none());
    }

    #[test]
    fn cookie_attributes() {
        let auth = AuthService::new("secret", 3600, true);
        let cookie = auth.session_cookie("abc");
        assert!(cookie.starts_with("taptap_admin_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));
        assert!(auth.clear_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn token_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; taptap_admin_token=tok123; lang=en"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("tok123"));

        headers.insert(COOKIE, HeaderValue::from_static("taptap_admin_token="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn password_hashes_verify() {
        let auth = AuthService::new("secret", 3600, false).with_bcrypt_cost(4);
        let hash = auth.hash_password("hunter2").unwrap();
        assert!(bcrypt::verify("hunter2", &hash).unwrap());
        assert!(!bcrypt::verify("hunter3", &hash).unwrap());
    }
}
