use std::sync::Arc;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use rearch::CapsuleHandle;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{error, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    api::{ListedUrl, Redirect, ShortenedUrl},
    short_id::ShortId,
    url_repo::{SaveUrlError, ShortLink, UrlRepository, url_repository_capsule},
};

/// Number of identifiers drawn before giving up on a create request.
pub const SAVE_ATTEMPTS: usize = 5;

pub fn url_rest_service_capsule(
    CapsuleHandle { mut get, .. }: CapsuleHandle,
) -> Arc<dyn UrlRestService> {
    let url_repo = Arc::clone(get.as_ref(url_repository_capsule));
    new_url_rest_service(url_repo)
}

/// Builds the [`UrlRestService`] on top of any [`UrlRepository`].
#[must_use]
pub fn new_url_rest_service(url_repo: Arc<dyn UrlRepository>) -> Arc<dyn UrlRestService> {
    Arc::new(UrlRestServiceImpl { url_repo })
}

/// The three operations of the shortener, independent of HTTP.
///
/// `origin` is the scheme + host prefix (e.g. `http://localhost:3000`)
/// used to build fully-qualified short URLs.
#[async_trait]
pub trait UrlRestService: Send + Sync {
    async fn get_url(&self, id: &str) -> Result<Redirect, GetUrlError>;
    async fn post_url(
        &self,
        long_url: Option<String>,
        origin: &str,
    ) -> Result<ShortenedUrl, PostUrlError>;
    async fn list_urls(&self, origin: &str) -> anyhow::Result<Vec<ListedUrl>>;
}

#[derive(Debug, Error)]
pub enum GetUrlError {
    #[error("not found")]
    NotFound,
    #[error("internal/database error: {0}")]
    Db(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum PostUrlError {
    #[error("URL is required")]
    MissingUrl,
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("URL scheme must be http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("URL must not contain control characters")]
    ControlCharacters,
    #[error("internal/database error: {0}")]
    Internal(anyhow::Error), // NOTE: no #[from] so we have to be explicit
}

struct UrlRestServiceImpl {
    url_repo: Arc<dyn UrlRepository>,
}

#[async_trait]
impl UrlRestService for UrlRestServiceImpl {
    #[instrument(skip(self))]
    async fn get_url(&self, id: &str) -> Result<Redirect, GetUrlError> {
        // NOTE: anything that could never have been generated is simply unknown
        let Ok(short_id) = ShortId::new(id.to_owned()) else {
            return Err(GetUrlError::NotFound);
        };

        match self.url_repo.retrieve_url(&short_id).await {
            Ok(Some(link)) => Ok(Redirect { url: link.long_url }),
            Ok(None) => Err(GetUrlError::NotFound),
            Err(err) => Err(GetUrlError::Db(err)),
        }
    }

    #[instrument(skip(self))]
    async fn post_url(
        &self,
        long_url: Option<String>,
        origin: &str,
    ) -> Result<ShortenedUrl, PostUrlError> {
        let long_url = long_url
            .filter(|url| !url.is_empty())
            .ok_or(PostUrlError::MissingUrl)?;
        let parsed = Url::parse(&long_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PostUrlError::UnsupportedScheme(parsed.scheme().to_owned()));
        }
        // NOTE: the parser silently drops tabs and newlines, but we redirect to the raw string
        if long_url.chars().any(char::is_control) {
            return Err(PostUrlError::ControlCharacters);
        }

        for attempt in 1..=SAVE_ATTEMPTS {
            let short_id = ShortId::generate(&mut rand::rng());
            let to_save = ShortLink {
                id: Uuid::new_v4(),
                short_id,
                long_url: long_url.clone(),
                created_at: OffsetDateTime::now_utc(),
            };

            match self.url_repo.save_url(to_save).await {
                Ok(saved) => {
                    return Ok(ShortenedUrl {
                        short_url: short_url(origin, &saved.short_id),
                    });
                }
                Err(SaveUrlError::ShortIdTaken) => {
                    warn!(attempt, "Generated ShortId that was already taken");
                }
                Err(SaveUrlError::Internal(err)) => {
                    error!(?err, "Encountered internal error while saving URL");
                    return Err(PostUrlError::Internal(err));
                }
            }
        }

        Err(PostUrlError::Internal(anyhow!(
            "Exhausted {SAVE_ATTEMPTS} attempts to allocate a short ID"
        )))
    }

    #[instrument(skip(self))]
    async fn list_urls(&self, origin: &str) -> anyhow::Result<Vec<ListedUrl>> {
        self.url_repo
            .list_urls()
            .await?
            .into_iter()
            .map(|link| listed_url(origin, link))
            .collect()
    }
}

fn short_url(origin: &str, short_id: &ShortId) -> String {
    format!("{}/{short_id}", origin.trim_end_matches('/'))
}

fn listed_url(
    origin: &str,
    ShortLink {
        id,
        short_id,
        long_url,
        created_at,
    }: ShortLink,
) -> anyhow::Result<ListedUrl> {
    Ok(ListedUrl {
        id: id.to_string(),
        short_url: short_url(origin, &short_id),
        short_id: short_id.into_inner(),
        long_url,
        created_at: created_at
            .format(&Rfc3339)
            .context("Failed to format creation timestamp")?,
    })
}
