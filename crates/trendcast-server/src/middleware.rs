use std::{collections::HashSet, fmt, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use trendcast_core::{AppConfig, Environment};
use uuid::Uuid;

use crate::api::ApiError;

pub(crate) const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id for one request, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), String::from);
        Self(id)
    }
}

/// Who may call the protected API routes.
#[derive(Clone)]
pub enum AuthState {
    /// Every request passes; only allowed in development.
    Open,
    /// Requests must carry `Authorization: Bearer <key>` with a known key.
    Bearer(Arc<HashSet<String>>),
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("Open"),
            Self::Bearer(keys) => write!(f, "Bearer([{} redacted])", keys.len()),
        }
    }
}

impl AuthState {
    /// Pick the auth mode from `config.api_keys`.
    ///
    /// # Errors
    ///
    /// Fails when no keys are configured outside development.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        if !config.api_keys.is_empty() {
            return Ok(Self::bearer(config.api_keys.iter().cloned()));
        }
        if config.env != Environment::Development {
            anyhow::bail!("TRENDCAST_API_KEYS must list at least one key in {:?}", config.env);
        }
        tracing::warn!("no API keys configured; protected routes are open");
        Ok(Self::Open)
    }

    pub fn bearer<I>(keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::Bearer(Arc::new(keys.into_iter().map(Into::into).collect()))
    }

    fn admits(&self, headers: &HeaderMap) -> bool {
        match self {
            Self::Open => true,
            Self::Bearer(keys) => bearer_token(headers).is_some_and(|token| keys.contains(token)),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Tag the request with a [`RequestId`] and echo it on the response.
///
/// An incoming `x-request-id` is reused; otherwise a `UUIDv4` is minted.
pub async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let id = RequestId::from_headers(req.headers());
    let header = HeaderValue::from_str(&id.0).ok();
    req.extensions_mut().insert(id);

    let mut res = next.run(req).await;
    if let Some(header) = header {
        res.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
    res
}

/// Reject protected requests the [`AuthState`] does not admit with a 401
/// in the usual error envelope.
pub async fn require_api_key(State(auth): State<AuthState>, req: Request, next: Next) -> Response {
    if auth.admits(req.headers()) {
        return next.run(req).await;
    }
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    tracing::debug!(%request_id, path = %req.uri().path(), "request refused: bad api key");
    ApiError::new(request_id, "unauthorized", "missing or invalid bearer token").into_response()
}
