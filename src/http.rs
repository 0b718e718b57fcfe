use std::sync::Arc;

use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    api::{Error, ShortenPayload},
    url_service::{GetUrlError, PostUrlError, UrlRestService},
};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub url_service: Arc<dyn UrlRestService>,
    /// Overrides the request `Host` when building short URLs.
    pub public_base_url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(index))
        .route("/shorten", routing::post(post_shorten))
        .route("/urls", routing::get(list_urls))
        .route("/{id}", routing::get(get_url))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[instrument(skip(state))]
async fn get_url(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.url_service.get_url(&id).await {
        Ok(redirect) => (
            StatusCode::FOUND,
            [(header::LOCATION, redirect_location(&redirect.url))],
        )
            .into_response(),
        Err(GetUrlError::NotFound) => {
            (StatusCode::NOT_FOUND, Json(Error::new("Not found"))).into_response()
        }
        Err(GetUrlError::Db(err)) => internal_error(&err),
    }
}

#[instrument(skip(state, headers, payload))]
async fn post_shorten(
    State(state): State<AppState>,
    headers: HeaderMap,
    ShortenBody(payload): ShortenBody,
) -> Response {
    let ShortenPayload { long_url } = payload;
    let origin = match request_origin(&state, &headers) {
        Ok(origin) => origin,
        Err(response) => return response,
    };

    match state.url_service.post_url(long_url, &origin).await {
        Ok(shortened_url) => Json(shortened_url).into_response(),
        Err(PostUrlError::Internal(err)) => internal_error(&err),
        Err(
            error @ (PostUrlError::MissingUrl
            | PostUrlError::InvalidUrl(_)
            | PostUrlError::UnsupportedScheme(_)
            | PostUrlError::ControlCharacters),
        ) => {
            info!(?error, "User submitted a bad request");
            (StatusCode::BAD_REQUEST, Json(Error::new(error.to_string()))).into_response()
        }
    }
}

#[instrument(skip(state, headers))]
async fn list_urls(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let origin = match request_origin(&state, &headers) {
        Ok(origin) => origin,
        Err(response) => return response,
    };

    match state.url_service.list_urls(&origin).await {
        Ok(urls) => Json(urls).into_response(),
        Err(err) => internal_error(&err),
    }
}

/// The `POST /shorten` body, read as JSON or as an urlencoded form.
///
/// A missing body, an empty JSON body or any other content type carries no URL.
struct ShortenBody(ShortenPayload);

impl<S: Send + Sync> FromRequest<S> for ShortenBody {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mime = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|content_type| content_type.to_str().ok())
            .and_then(|content_type| content_type.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime == "application/x-www-form-urlencoded" {
            return Form::<ShortenPayload>::from_request(req, state)
                .await
                .map(|Form(payload)| Self(payload))
                .map_err(|rejection| unreadable_body(&rejection.body_text()));
        }

        if mime == "application/json" || mime.ends_with("+json") {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|rejection| unreadable_body(&rejection.body_text()))?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Self(ShortenPayload { long_url: None }));
            }
            return Json::<ShortenPayload>::from_bytes(&bytes)
                .map(|Json(payload)| Self(payload))
                .map_err(|rejection| unreadable_body(&rejection.body_text()));
        }

        Ok(Self(ShortenPayload { long_url: None }))
    }
}

fn unreadable_body(detail: &str) -> Response {
    info!(detail, "User submitted an unreadable body");
    (StatusCode::BAD_REQUEST, Json(Error::new(detail))).into_response()
}

/// Percent-encodes everything outside the URI character set, keeping
/// existing `%XX` escapes intact.
fn redirect_location(url: &str) -> String {
    let mut location = String::with_capacity(url.len());
    for (i, c) in url.char_indices() {
        match c {
            '%' => {
                let escape = url.as_bytes().get(i + 1..i + 3);
                if escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                    location.push('%');
                } else {
                    location.push_str("%25");
                }
            }
            '!' | '#'..=';' | '=' | '?'..='_' | 'a'..='z' | '|' | '~' => location.push(c),
            _ => location.push_str(&urlencoding::encode(c.encode_utf8(&mut [0; 4]))),
        }
    }
    location
}

/// Scheme + host the short URLs of this request should point at.
fn request_origin(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    if let Some(base_url) = &state.public_base_url {
        return Ok(base_url.clone());
    }

    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(|host| format!("http://{host}"))
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(Error::new("Missing Host header")),
            )
                .into_response()
        })
}

fn internal_error(err: &anyhow::Error) -> Response {
    let err_uuid = Uuid::new_v4();
    error!(%err_uuid, ?err, "Encountered an error during a request");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Error {
            error: "Internal server error".to_owned(),
            error_id: Some(err_uuid.to_string()),
        }),
    )
        .into_response()
}
