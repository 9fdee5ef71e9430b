use std::{fmt::Debug, path::Path};

use crate::{discover::Orientation, error_code::ErrorCode, formats::MediaFormat};

pub(crate) mod file_store;
pub(crate) mod object_store;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in file store")]
    FileStore(#[source] crate::store::file_store::FileError),

    #[error("Error in object store")]
    ObjectStore(#[source] crate::store::object_store::ObjectError),

    #[error("Requested file is not found")]
    FileNotFound(#[source] std::io::Error),

    #[error("Requested object is not found")]
    ObjectNotFound(#[source] crate::store::object_store::ObjectError),
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::FileStore(e) => e.error_code(),
            Self::ObjectStore(e) => e.error_code(),
            Self::FileNotFound(_) | Self::ObjectNotFound(_) => ErrorCode::ASSET_NOT_FOUND,
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_)) || matches!(self, Self::ObjectNotFound(_))
    }
}

impl From<crate::store::file_store::FileError> for StoreError {
    fn from(value: crate::store::file_store::FileError) -> Self {
        match value {
            crate::store::file_store::FileError::Io(e)
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::FileNotFound(e)
            }
            e => Self::FileStore(e),
        }
    }
}

impl From<crate::store::object_store::ObjectError> for StoreError {
    fn from(value: crate::store::object_store::ObjectError) -> Self {
        match value {
            e @ crate::store::object_store::ObjectError::Request(
                ::object_store::Error::NotFound { .. },
            ) => Self::ObjectNotFound(e),
            e => Self::ObjectStore(e),
        }
    }
}

/// Somewhere a finished file can be published so it's reachable by URL
#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Copy the file at `path` to `key`, replacing anything already there, and return the URL it
    /// can be fetched from
    async fn save_file(
        &self,
        key: &str,
        path: &Path,
        content_type: mime::Mime,
    ) -> Result<url::Url, StoreError>;

    fn public_url(&self, key: &str) -> Result<url::Url, StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Build the key a published video lives under: `{orientation}/{name}.{ext}`, or just
/// `{name}.{ext}` when orientation is not being tracked. Names are random so repeated uploads
/// never collide.
pub(crate) fn video_key(orientation: Option<Orientation>, format: MediaFormat) -> String {
    let name = uuid::Uuid::new_v4().simple();

    match orientation {
        Some(orientation) => format!("{orientation}/{name}.{}", format.extension()),
        None => format!("{name}.{}", format.extension()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{discover::Orientation, formats::MediaFormat};

    #[test]
    fn video_key_with_orientation() {
        let key = super::video_key(Some(Orientation::Portrait), MediaFormat::Mp4);

        let (segment, file) = key.split_once('/').unwrap();
        assert_eq!(segment, "portrait");

        let (name, ext) = file.split_once('.').unwrap();
        assert_eq!(ext, "mp4");
        assert_eq!(name.len(), 32);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn video_key_without_orientation() {
        let key = super::video_key(None, MediaFormat::Mp4);

        assert!(!key.contains('/'));
        assert!(key.ends_with(".mp4"));
    }

    #[test]
    fn video_keys_are_unique() {
        assert_ne!(
            super::video_key(None, MediaFormat::Mp4),
            super::video_key(None, MediaFormat::Mp4)
        );
    }
}
