use crate::{
    error_code::ErrorCode,
    formats::MediaFormat,
    store::{Store, StoreError},
};
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FileError {
    #[error("Failed to read or write file")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name {0}")]
    InvalidKey(String),

    #[error("Failed to build public URL")]
    Url(#[source] url::ParseError),
}

impl FileError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
            Self::InvalidKey(_) => ErrorCode::INVALID_ASSET_PATH,
            Self::Url(_) => ErrorCode::OBJECT_URL_ERROR,
        }
    }
}

/// A flat directory of public assets, served back over HTTP under `url_prefix`
#[derive(Clone, Debug)]
pub(crate) struct FileStore {
    root_dir: PathBuf,
    url_prefix: Url,
}

#[async_trait::async_trait(?Send)]
impl Store for FileStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        tokio::fs::metadata(&self.root_dir)
            .await
            .map_err(FileError::from)?;

        Ok(())
    }

    #[tracing::instrument(skip(self, _content_type))]
    async fn save_file(
        &self,
        key: &str,
        path: &Path,
        _content_type: mime::Mime,
    ) -> Result<Url, StoreError> {
        let target = self.path_for(key)?;

        // copy next to the target and rename over it, so readers only ever see a whole file
        let partial = self
            .root_dir
            .join(format!(".{key}.{}", uuid::Uuid::now_v7().simple()));

        if let Err(e) = tokio::fs::copy(path, &partial).await {
            safe_remove_file(&partial).await?;
            return Err(FileError::from(e).into());
        }

        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            safe_remove_file(&partial).await?;
            return Err(FileError::from(e).into());
        }

        self.public_url(key)
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        let url = format!("{}/{key}", self.url_prefix.as_str().trim_end_matches('/'));

        Url::parse(&url).map_err(|e| FileError::Url(e).into())
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;

        safe_remove_file(path).await?;

        Ok(())
    }
}

impl FileStore {
    #[tracing::instrument]
    pub(crate) async fn build(root_dir: PathBuf, url_prefix: Url) -> color_eyre::Result<Self> {
        tokio::fs::create_dir_all(&root_dir).await?;

        Ok(FileStore {
            root_dir,
            url_prefix,
        })
    }

    /// Resolve a key to a file inside the root directory. Keys are bare file names with a known
    /// extension, so nothing outside the directory can be reached.
    pub(crate) fn path_for(&self, key: &str) -> Result<PathBuf, FileError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && key
                .rsplit_once('.')
                .and_then(|(_, ext)| MediaFormat::from_extension(ext))
                .is_some();

        if !valid {
            return Err(FileError::InvalidKey(key.to_string()));
        }

        Ok(self.root_dir.join(key))
    }

    /// Read a stored file back, along with the format its extension names
    #[tracing::instrument(skip(self))]
    pub(crate) async fn read(&self, key: &str) -> Result<(Vec<u8>, MediaFormat), StoreError> {
        let path = self.path_for(key)?;

        let format = key
            .rsplit_once('.')
            .and_then(|(_, ext)| MediaFormat::from_extension(ext))
            .ok_or_else(|| FileError::InvalidKey(key.to_string()))?;

        let bytes = tokio::fs::read(path).await.map_err(FileError::from)?;

        Ok((bytes, format))
    }
}

async fn safe_remove_file<P: AsRef<Path>>(path: P) -> Result<(), FileError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
