use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;
use url::Url;

use crate::{error_code::ErrorCode, repo::VideoId};

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Error staging upload")]
    Stage(#[from] crate::stage::StageError),

    #[error("Error probing video")]
    Probe(#[from] crate::discover::ProbeError),

    #[error("Error remuxing video")]
    Remux(#[from] crate::ffmpeg::RemuxError),

    #[error("Error in store")]
    Publish(#[from] crate::store::StoreError),

    #[error("Error in DB")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Published {url} but failed to record it")]
    Reconcile {
        url: Url,
        #[source]
        source: crate::repo::RepoError,
    },

    #[error("Video {0} does not exist")]
    NotFound(VideoId),

    #[error("Video belongs to someone else")]
    Forbidden,

    #[error("Missing or unknown bearer token")]
    Unauthenticated,

    #[error("Invalid video id")]
    InvalidVideoId(#[from] uuid::Error),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Stage(e) => e.error_code(),
            Self::Probe(e) => e.error_code(),
            Self::Remux(e) => e.error_code(),
            Self::Publish(e) => e.error_code(),
            Self::Repo(e) => e.error_code(),
            Self::Reconcile { .. } => ErrorCode::RECONCILE_PUBLISHED,
            Self::NotFound(_) => ErrorCode::VIDEO_NOT_FOUND,
            Self::Forbidden => ErrorCode::FORBIDDEN,
            Self::Unauthenticated => ErrorCode::UNAUTHENTICATED,
            Self::InvalidVideoId(_) => ErrorCode::INVALID_VIDEO_ID,
        }
    }

    /// Name of the pipeline stage this error came out of, for metrics labels
    pub(crate) const fn stage(&self) -> &'static str {
        match self {
            Self::Stage(_) => "stage",
            Self::Remux(_) => "remux",
            Self::Probe(_) => "probe",
            Self::Publish(_) => "publish",
            Self::Reconcile { .. } => "reconcile",
            Self::Repo(_)
            | Self::NotFound(_)
            | Self::Forbidden
            | Self::Unauthenticated
            | Self::InvalidVideoId(_) => "lookup",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            Some(UploadError::Stage(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::Probe(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::Remux(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::InvalidVideoId(_)) => StatusCode::BAD_REQUEST,
            Some(UploadError::Publish(crate::store::StoreError::FileStore(
                crate::store::file_store::FileError::InvalidKey(_),
            ))) => StatusCode::BAD_REQUEST,
            Some(UploadError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            Some(UploadError::Forbidden) => StatusCode::FORBIDDEN,
            Some(UploadError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(UploadError::Publish(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": self.root_cause().to_string(),
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}
