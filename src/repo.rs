use crate::{config, error_code::ErrorCode};
use std::{fmt::Debug, str::FromStr, sync::Arc};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

pub(crate) mod sled;

pub(crate) type ArcRepo = Arc<dyn VideoRepo>;

#[derive(Clone, Debug)]
pub(crate) enum Repo {
    Sled(self::sled::SledRepo),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct VideoId {
    id: Uuid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct UserId {
    id: Uuid,
}

/// Everything tubely knows about one video
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub(crate) struct VideoRecord {
    pub(crate) id: VideoId,

    #[serde(rename = "userID")]
    pub(crate) user_id: UserId,

    pub(crate) title: String,

    pub(crate) description: String,

    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,

    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,

    #[serde(rename = "thumbnailURL")]
    pub(crate) thumbnail_url: Option<Url>,

    #[serde(rename = "videoURL")]
    pub(crate) video_url: Option<Url>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in sled")]
    SledError(#[from] crate::repo::sled::SledError),

    #[error("Video {0} already exists")]
    AlreadyExists(VideoId),

    #[error("Video {0} does not exist")]
    Missing(VideoId),
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
            Self::AlreadyExists(_) => ErrorCode::UNKNOWN_ERROR,
            Self::Missing(_) => ErrorCode::VIDEO_NOT_FOUND,
        }
    }
}

/// Keyed storage for video records
///
/// Each call is atomic for its one record. Nothing coordinates concurrent writers to the same
/// record, so the last `update` wins.
#[async_trait::async_trait(?Send)]
pub(crate) trait VideoRepo: Send + Sync + Debug {
    async fn health_check(&self) -> Result<(), RepoError>;

    async fn create(&self, record: &VideoRecord) -> Result<(), RepoError>;

    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, RepoError>;

    /// Replace an existing record. Fails with `Missing` rather than creating one.
    async fn update(&self, record: &VideoRecord) -> Result<(), RepoError>;
}

#[async_trait::async_trait(?Send)]
impl<T> VideoRepo for Arc<T>
where
    T: VideoRepo + ?Sized,
{
    async fn health_check(&self) -> Result<(), RepoError> {
        T::health_check(self).await
    }

    async fn create(&self, record: &VideoRecord) -> Result<(), RepoError> {
        T::create(self, record).await
    }

    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, RepoError> {
        T::get(self, id).await
    }

    async fn update(&self, record: &VideoRecord) -> Result<(), RepoError> {
        T::update(self, record).await
    }
}

impl Repo {
    #[tracing::instrument]
    pub(crate) fn open(config: config::Repo) -> color_eyre::Result<Self> {
        match config {
            config::Repo::Sled(config::Sled {
                path,
                cache_capacity,
            }) => {
                let repo = self::sled::SledRepo::build(path, cache_capacity)?;

                Ok(Self::Sled(repo))
            }
        }
    }

    pub(crate) fn to_arc(&self) -> ArcRepo {
        match self {
            Self::Sled(sled_repo) => Arc::new(sled_repo.clone()),
        }
    }
}

impl VideoId {
    pub(crate) fn generate() -> Self {
        VideoId { id: Uuid::new_v4() }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.id.as_bytes()
    }
}

impl FromStr for VideoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VideoId { id: s.parse()? })
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.id, f)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        UserId { id }
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.id, f)
    }
}

impl VideoRecord {
    /// A draft with no media attached yet
    pub(crate) fn draft(user_id: UserId, title: String, description: String) -> Self {
        let now = OffsetDateTime::now_utc();

        VideoRecord {
            id: VideoId::generate(),
            user_id,
            title,
            description,
            created_at: now,
            updated_at: now,
            thumbnail_url: None,
            video_url: None,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}
