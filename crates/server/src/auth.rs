//! Staff sessions: login/logout handlers and the guard in front of the
//! record routes.
//!
//! A session is an HS256 JWT carried in the `session` cookie (browsers) or an
//! `Authorization: Bearer` header (scripts). Requests without a valid token
//! are sent to the login page with the original path and query, encoded, in
//! `next`. Accepted claims are stored in the request extensions.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{ApiError, ErrorCode};
use storage::StaffAccount;
use tracing::{debug, error, info, warn};

use crate::{app_state::AppState, http_error};

pub(crate) const SESSION_COOKIE: &str = "session";
const LOGIN_TEMPLATE: &str = "account/login.html";
const DEFAULT_LANDING: &str = "/equipment/search";
const BAD_CREDENTIALS: &str = "Please enter a correct username and password.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    /// Staff id.
    pub sub: String,
    /// Username, for logs.
    pub name: String,
    /// Session id.
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
}

pub(crate) struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl SessionKeys {
    pub(crate) fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl_seconds,
        }
    }

    pub(crate) fn issue(&self, account: &StaffAccount) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl_seconds);
        let claims = Claims {
            sub: account.staff_id.0.to_string(),
            name: account.username.clone(),
            sid: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub(crate) fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }

    fn cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.ttl_seconds
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoginView {
    pub template: String,
    pub username: String,
    pub next: Option<String>,
    pub errors: Vec<String>,
}

impl LoginView {
    fn new(username: String, next: Option<String>, errors: Vec<String>) -> Self {
        Self {
            template: LOGIN_TEMPLATE.to_string(),
            username,
            next,
            errors,
        }
    }
}

pub(crate) async fn login_page(Query(q): Query<LoginQuery>) -> Json<LoginView> {
    Json(LoginView::new(String::new(), q.next, Vec::new()))
}

pub(crate) async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    let account = match state.storage.verify_staff(&form.username, &form.password).await {
        Ok(account) => account,
        Err(error) => {
            return http_error(ApiError::new(
                ErrorCode::Internal,
                format!("staff lookup failed: {error:#}"),
            ))
            .into_response();
        }
    };
    let Some(account) = account else {
        warn!(username = %form.username, "rejected login");
        return Json(LoginView::new(
            form.username,
            form.next,
            vec![BAD_CREDENTIALS.to_string()],
        ))
        .into_response();
    };

    let token = match state.sessions.issue(&account) {
        Ok(token) => token,
        Err(error) => {
            error!(%error, "failed to encode session token");
            return Json(LoginView::new(
                form.username,
                form.next,
                vec!["Login is temporarily unavailable.".to_string()],
            ))
            .into_response();
        }
    };

    info!(staff = %account.username, "staff logged in");
    let target = safe_next(form.next.as_deref());
    with_cookie(Redirect::to(target), &state.sessions.cookie(&token))
}

pub(crate) async fn logout() -> Response {
    with_cookie(
        Redirect::to("/login"),
        &format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"),
    )
}

/// Route layer for everything that needs a logged-in staff member.
pub(crate) async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let target = request
        .uri()
        .path_and_query()
        .map_or(path.as_str(), |pq| pq.as_str())
        .to_string();
    let claims = session_token(request.headers()).and_then(|token| {
        state
            .sessions
            .verify(token)
            .map_err(|error| debug!(%error, %path, "invalid session token"))
            .ok()
    });

    match claims {
        Some(claims) => {
            debug!(staff = %claims.name, %path, "session accepted");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        None => {
            Redirect::to(&format!("/login?next={}", urlencoding::encode(&target))).into_response()
        }
    }
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => DEFAULT_LANDING,
    }
}

fn with_cookie(redirect: Redirect, cookie: &str) -> Response {
    let mut response = redirect.into_response();
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
