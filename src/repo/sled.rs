use crate::{
    error_code::ErrorCode,
    future::WithMetrics,
    repo::{RepoError, VideoId, VideoRecord, VideoRepo},
};
use sled::{Db, Tree};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        crate::sync::spawn_blocking("sled-io", move || $expr)
            .await
            .map_err(SledError::from)
            .map_err(RepoError::from)?
            .map_err(SledError::from)
            .map_err(RepoError::from)?
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in database")]
    Sled(#[from] sled::Error),

    #[error("Invalid video record json")]
    Record(#[from] serde_json::Error),

    #[error("Operation panicked")]
    Panic,
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sled(_) => ErrorCode::SLED_ERROR,
            Self::Record(_) => ErrorCode::EXTRACT_RECORD,
            Self::Panic => ErrorCode::PANIC,
        }
    }
}

impl From<tokio::task::JoinError> for SledError {
    fn from(_: tokio::task::JoinError) -> Self {
        SledError::Panic
    }
}

#[derive(Clone)]
pub(crate) struct SledRepo {
    healthz_count: Arc<AtomicU64>,
    healthz: Tree,
    videos: Tree,
    _db: Db,
}

impl SledRepo {
    #[tracing::instrument]
    pub(crate) fn build(path: PathBuf, cache_capacity: u64) -> color_eyre::Result<Self> {
        let db = Self::open(path, cache_capacity)?;

        Ok(Self::new(db)?)
    }

    fn open(mut path: PathBuf, cache_capacity: u64) -> Result<Db, SledError> {
        path.push("v0.1.0");

        let db = ::sled::Config::new()
            .cache_capacity(cache_capacity)
            .path(path)
            .open()?;

        Ok(db)
    }

    pub(crate) fn new(db: Db) -> Result<Self, SledError> {
        Ok(SledRepo {
            healthz_count: Arc::new(AtomicU64::new(0)),
            healthz: db.open_tree("tubely-healthz-tree")?,
            videos: db.open_tree("tubely-videos-tree")?,
            _db: db,
        })
    }
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for SledRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        let next = self.healthz_count.fetch_add(1, Ordering::Relaxed);
        b!(self.healthz, {
            healthz.insert("healthz", &next.to_be_bytes()[..])
        });
        self.healthz.flush_async().await.map_err(SledError::from)?;
        b!(self.healthz, healthz.get("healthz"));
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self, record), fields(id = %record.id))]
    async fn create(&self, record: &VideoRecord) -> Result<(), RepoError> {
        let id = record.id;
        let value = serde_json::to_vec(record).map_err(SledError::from)?;

        let res = b!(self.videos, {
            videos.compare_and_swap(id.as_bytes(), None as Option<&[u8]>, Some(value))
        });

        if res.is_err() {
            return Err(RepoError::AlreadyExists(id));
        }

        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, RepoError> {
        let opt = async { Ok::<_, RepoError>(b!(self.videos, videos.get(id.as_bytes()))) }
            .with_metrics(crate::init_metrics::SLED_GET)
            .await?;

        opt.map(|ivec| serde_json::from_slice(&ivec))
            .transpose()
            .map_err(SledError::from)
            .map_err(RepoError::from)
    }

    #[tracing::instrument(level = "trace", skip(self, record), fields(id = %record.id))]
    async fn update(&self, record: &VideoRecord) -> Result<(), RepoError> {
        let id = record.id;
        let value = serde_json::to_vec(record).map_err(SledError::from)?;

        let previous = async {
            Ok::<_, RepoError>(b!(self.videos, {
                videos.fetch_and_update(id.as_bytes(), |current| {
                    current.map(|_| value.clone())
                })
            }))
        }
        .with_metrics(crate::init_metrics::SLED_SET)
        .await?;

        if previous.is_none() {
            return Err(RepoError::Missing(id));
        }

        Ok(())
    }
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}
