use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rearch::CapsuleHandle;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DbConn, DbErr, EntityTrait, QueryOrder, SqlErr,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{config::db_conn_capsule, orm::short_link, short_id::ShortId};

pub fn url_repository_capsule(
    CapsuleHandle { mut get, .. }: CapsuleHandle,
) -> Arc<dyn UrlRepository> {
    let db = get.as_ref(db_conn_capsule).clone();
    Arc::new(UrlRepositoryImpl { db })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortLink {
    pub id: Uuid,
    pub short_id: ShortId,
    /// The URL exactly as it was submitted.
    pub long_url: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum SaveUrlError {
    #[error("short ID is already taken")]
    ShortIdTaken,
    #[error("internal/database error: {0}")]
    Internal(anyhow::Error),
}

#[async_trait]
pub trait UrlRepository: Send + Sync {
    async fn retrieve_url(&self, short_id: &ShortId) -> anyhow::Result<Option<ShortLink>>;

    /// Inserts a new [`ShortLink`]; never overwrites an existing one.
    async fn save_url(&self, link: ShortLink) -> Result<ShortLink, SaveUrlError>;

    /// All stored links, newest first.
    async fn list_urls(&self) -> anyhow::Result<Vec<ShortLink>>;
}

struct UrlRepositoryImpl {
    db: DbConn,
}

#[async_trait]
impl UrlRepository for UrlRepositoryImpl {
    #[instrument(skip(self))]
    async fn retrieve_url(&self, short_id: &ShortId) -> anyhow::Result<Option<ShortLink>> {
        <short_link::Entity as EntityTrait>::find_by_id(short_id.as_str())
            .one(&self.db)
            .await
            .context("Failed to retrieve short link")?
            .map(ShortLink::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn save_url(&self, link: ShortLink) -> Result<ShortLink, SaveUrlError> {
        let to_insert = short_link::ActiveModel {
            short_id: Set(link.short_id.into_inner()),
            id: Set(link.id),
            long_url: Set(link.long_url),
            created_at: Set(link.created_at),
        };

        match to_insert.insert(&self.db).await {
            Ok(model) => ShortLink::try_from(model).map_err(SaveUrlError::Internal),
            Err(err) if is_unique_violation(&err) => Err(SaveUrlError::ShortIdTaken),
            Err(err) => Err(SaveUrlError::Internal(
                anyhow::Error::new(err).context("Failed to insert short link"),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn list_urls(&self) -> anyhow::Result<Vec<ShortLink>> {
        short_link::Entity::find()
            .order_by_desc(short_link::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("Failed to list short links")?
            .into_iter()
            .map(ShortLink::try_from)
            .collect()
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl TryFrom<short_link::Model> for ShortLink {
    type Error = anyhow::Error;

    fn try_from(
        short_link::Model {
            short_id,
            id,
            long_url,
            created_at,
        }: short_link::Model,
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id,
            short_id: ShortId::new(short_id).context("Stored short ID is invalid")?,
            long_url,
            created_at,
        })
    }
}
