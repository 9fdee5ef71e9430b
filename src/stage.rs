use actix_web::web::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::{
    error_code::ErrorCode,
    formats::{MediaFormat, UploadKind},
    tmp_file::{TmpDir, TmpFile},
};

pub(crate) const MEGABYTES: u64 = 1024 * 1024;

#[cfg(test)]
pub(crate) type BytesStream = futures_util::stream::Iter<std::iter::Once<std::io::Result<Bytes>>>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StageError {
    #[error("No content type was declared for the {0} upload")]
    MissingContentType(UploadKind),

    #[error("Content type {content_type} is not allowed for {kind} uploads")]
    UnsupportedContentType {
        kind: UploadKind,
        content_type: String,
    },

    #[error("File size {size} exceeds the {kind} upload limit of {max} bytes")]
    TooLarge { kind: UploadKind, size: u64, max: u64 },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Error reading upload")]
    Upload(#[source] std::io::Error),

    #[error("Error writing staged file")]
    Io(#[source] std::io::Error),
}

impl StageError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingContentType(_) | Self::UnsupportedContentType { .. } => {
                ErrorCode::VALIDATE_CONTENT_TYPE
            }
            Self::TooLarge { .. } => ErrorCode::VALIDATE_FILE_SIZE,
            Self::Empty => ErrorCode::VALIDATE_FILE_EMPTY,
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::Io(_) => ErrorCode::IO_ERROR,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Limits {
    kind: UploadKind,
    max_size: u64,
}

impl Limits {
    pub(crate) const fn new(kind: UploadKind, max_size: u64) -> Self {
        Limits { kind, max_size }
    }

    fn check(&self, size: u64) -> Result<(), StageError> {
        if size > self.max_size {
            return Err(StageError::TooLarge {
                kind: self.kind,
                size,
                max: self.max_size,
            });
        }

        Ok(())
    }
}

/// An incoming file as the HTTP layer hands it over
pub(crate) struct Upload<S> {
    content_type: Option<mime::Mime>,
    declared_size: Option<u64>,
    stream: S,
}

impl<S> Upload<S> {
    pub(crate) fn new(content_type: Option<mime::Mime>, declared_size: Option<u64>, stream: S) -> Self {
        Upload {
            content_type,
            declared_size,
            stream,
        }
    }
}

#[cfg(test)]
impl Upload<BytesStream> {
    pub(crate) fn from_bytes(content_type: Option<mime::Mime>, bytes: Bytes) -> Self {
        let declared_size = Some(bytes.len() as u64);

        Upload::new(
            content_type,
            declared_size,
            futures_util::stream::iter(std::iter::once(Ok(bytes))),
        )
    }
}

/// A request-scoped file on local disk. The file is removed when this is dropped.
#[derive(Debug)]
pub(crate) struct StagedFile {
    file: TmpFile,
    size: u64,
    format: MediaFormat,
}

impl StagedFile {
    pub(crate) fn new(file: TmpFile, size: u64, format: MediaFormat) -> Self {
        StagedFile { file, size, format }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.file
    }

    pub(crate) fn tmp_file(&self) -> &TmpFile {
        &self.file
    }

    pub(crate) const fn size(&self) -> u64 {
        self.size
    }

    pub(crate) const fn format(&self) -> MediaFormat {
        self.format
    }

    pub(crate) fn content_type(&self) -> mime::Mime {
        self.format.media_type()
    }

    /// Remove the file, logging rather than failing if that doesn't work
    pub(crate) async fn cleanup(self) {
        let path = self.file.to_path_buf();

        if let Err(e) = self.file.cleanup().await {
            tracing::warn!("Failed to remove staged file {}: {e}", path.display());
        }
    }
}

#[tracing::instrument(
    name = "Stage upload",
    skip(tmp_dir, upload),
    fields(kind = %limits.kind, content_type = ?upload.content_type, declared_size = ?upload.declared_size)
)]
pub(crate) async fn stage<S>(
    tmp_dir: &TmpDir,
    limits: Limits,
    upload: Upload<S>,
) -> Result<StagedFile, StageError>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    let Upload {
        content_type,
        declared_size,
        mut stream,
    } = upload;

    let content_type = content_type.ok_or(StageError::MissingContentType(limits.kind))?;

    let format =
        limits
            .kind
            .format_for(&content_type)
            .ok_or_else(|| StageError::UnsupportedContentType {
                kind: limits.kind,
                content_type: content_type.to_string(),
            })?;

    if let Some(size) = declared_size {
        limits.check(size)?;
    }

    let file = tmp_dir.tmp_file(Some(&format!(".{}", format.extension())));

    match write_limited(&file, &limits, &mut stream).await {
        Ok(size) => {
            tracing::debug!("Staged {size} bytes");
            metrics::counter!(crate::init_metrics::UPLOAD_STAGED, "kind" => limits.kind.as_str())
                .increment(1);

            Ok(StagedFile::new(file, size, format))
        }
        Err(e) => {
            StagedFile::new(file, 0, format).cleanup().await;
            Err(e)
        }
    }
}

async fn write_limited<S>(path: &Path, limits: &Limits, stream: &mut S) -> Result<u64, StageError>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(StageError::Io)?;

    let mut written: u64 = 0;

    while let Some(res) = stream.next().await {
        let mut bytes = res.map_err(StageError::Upload)?;

        written += bytes.len() as u64;
        limits.check(written)?;

        file.write_all_buf(&mut bytes)
            .await
            .map_err(StageError::Io)?;
    }

    file.flush().await.map_err(StageError::Io)?;

    if written == 0 {
        return Err(StageError::Empty);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{stage, Limits, StageError, Upload, MEGABYTES};
    use crate::{
        formats::{MediaFormat, UploadKind},
        tmp_file::TmpDir,
    };
    use actix_web::web::Bytes;

    async fn tmp_dir() -> std::sync::Arc<TmpDir> {
        TmpDir::init(std::env::temp_dir().join("tubely-tests"))
            .await
            .unwrap()
    }

    async fn entries(tmp_dir: &TmpDir) -> usize {
        let mut dir = tokio::fs::read_dir(tmp_dir.path()).await.unwrap();
        let mut count = 0;
        while dir.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }

    fn chunks(
        chunks: Vec<std::io::Result<Bytes>>,
    ) -> futures_util::stream::Iter<std::vec::IntoIter<std::io::Result<Bytes>>> {
        futures_util::stream::iter(chunks)
    }

    #[actix_web::test]
    async fn stages_allowed_video() {
        let tmp_dir = tmp_dir().await;
        let upload = Upload::new(
            Some("video/mp4".parse().unwrap()),
            Some(10),
            chunks(vec![Ok(Bytes::from_static(b"01234")), Ok(Bytes::from_static(b"56789"))]),
        );

        let staged = stage(&tmp_dir, Limits::new(UploadKind::Video, MEGABYTES), upload)
            .await
            .unwrap();

        assert_eq!(staged.size(), 10);
        assert_eq!(staged.format(), MediaFormat::Mp4);
        assert_eq!(staged.path().extension().unwrap(), "mp4");
        assert_eq!(tokio::fs::read(staged.path()).await.unwrap(), b"0123456789");

        staged.cleanup().await;
        assert_eq!(entries(&tmp_dir).await, 0);
    }

    #[actix_web::test]
    async fn declared_oversize_is_rejected_before_reading() {
        let tmp_dir = tmp_dir().await;
        let never_polled = futures_util::stream::poll_fn(
            |_| -> std::task::Poll<Option<std::io::Result<Bytes>>> {
                panic!("stream should not be read")
            },
        );
        let upload = Upload::new(
            Some("video/mp4".parse().unwrap()),
            Some(2 * 1024 * MEGABYTES),
            never_polled,
        );

        let err = stage(
            &tmp_dir,
            Limits::new(UploadKind::Video, 1024 * MEGABYTES),
            upload,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StageError::TooLarge { .. }));
        assert!(err.is_client_error());
        assert_eq!(entries(&tmp_dir).await, 0);
    }

    #[actix_web::test]
    async fn undeclared_oversize_is_removed() {
        let tmp_dir = tmp_dir().await;
        let upload = Upload::new(
            Some(mime::IMAGE_PNG),
            None,
            chunks(vec![Ok(Bytes::from_static(b"0123")), Ok(Bytes::from_static(b"4567"))]),
        );

        let err = stage(&tmp_dir, Limits::new(UploadKind::Thumbnail, 6), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::TooLarge { size: 8, max: 6, .. }));
        assert_eq!(entries(&tmp_dir).await, 0);
    }

    #[actix_web::test]
    async fn disallowed_type_is_rejected() {
        let tmp_dir = tmp_dir().await;
        let upload = Upload::from_bytes(Some(mime::IMAGE_GIF), Bytes::from_static(b"GIF89a"));

        let err = stage(&tmp_dir, Limits::new(UploadKind::Thumbnail, MEGABYTES), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::UnsupportedContentType { .. }));
        assert_eq!(entries(&tmp_dir).await, 0);
    }

    #[actix_web::test]
    async fn missing_type_is_rejected() {
        let tmp_dir = tmp_dir().await;
        let upload = Upload::from_bytes(None, Bytes::from_static(b"data"));

        let err = stage(&tmp_dir, Limits::new(UploadKind::Video, MEGABYTES), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::MissingContentType(UploadKind::Video)));
    }

    #[actix_web::test]
    async fn empty_upload_is_rejected() {
        let tmp_dir = tmp_dir().await;
        let upload = Upload::new(Some(mime::IMAGE_JPEG), None, chunks(vec![]));

        let err = stage(&tmp_dir, Limits::new(UploadKind::Thumbnail, MEGABYTES), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Empty));
        assert_eq!(entries(&tmp_dir).await, 0);
    }

    #[actix_web::test]
    async fn broken_upload_is_removed() {
        let tmp_dir = tmp_dir().await;
        let upload = Upload::new(
            Some("video/mp4".parse().unwrap()),
            None,
            chunks(vec![
                Ok(Bytes::from_static(b"0123")),
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "client went away",
                )),
            ]),
        );

        let err = stage(&tmp_dir, Limits::new(UploadKind::Video, MEGABYTES), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Upload(_)));
        assert!(err.is_client_error());
        assert_eq!(entries(&tmp_dir).await, 0);
    }
}
