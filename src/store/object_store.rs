use std::{path::Path, sync::Arc};

use object_store::{
    aws::AmazonS3Builder, path::Path as ObjectPath, Attribute, Attributes, PutMultipartOpts,
    PutOptions, PutPayload,
};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::{
    config::ObjectStorage,
    error_code::ErrorCode,
    future::WithMetrics,
    stage::MEGABYTES,
    store::{Store, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ObjectError {
    #[error("Failed to configure object storage")]
    Build(#[source] object_store::Error),

    #[error("Error making object storage request")]
    Request(#[source] object_store::Error),

    #[error("Failed to read file for upload")]
    Io(#[source] std::io::Error),

    #[error("Failed to build public URL")]
    Url(#[source] url::ParseError),
}

impl ObjectError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Build(_) | Self::Request(_) => ErrorCode::OBJECT_REQUEST_ERROR,
            Self::Io(_) => ErrorCode::OBJECT_IO_ERROR,
            Self::Url(_) => ErrorCode::OBJECT_URL_ERROR,
        }
    }
}

/// Where published objects can be fetched from, in order of preference
#[derive(Clone, Debug)]
enum PublicBase {
    Distribution(Url),
    Endpoint { endpoint: Url, bucket: String },
    Aws { bucket: String, region: String },
}

#[derive(Clone)]
pub(crate) struct ObjectStore {
    inner: Arc<dyn object_store::ObjectStore>,
    public_base: PublicBase,
    part_size: usize,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("inner", &self.inner.to_string())
            .field("public_base", &self.public_base)
            .field("part_size", &self.part_size)
            .finish()
    }
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        match self.inner.head(&ObjectPath::from("healthz")).await {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(ObjectError::Request(e).into()),
        }
    }

    #[tracing::instrument(skip(self, content_type), fields(content_type = %content_type))]
    async fn save_file(
        &self,
        key: &str,
        path: &Path,
        content_type: mime::Mime,
    ) -> Result<Url, StoreError> {
        let location = ObjectPath::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let size = tokio::fs::metadata(path)
            .await
            .map_err(ObjectError::Io)?
            .len();

        if size <= (self.part_size as u64) {
            self.put_single(&location, path, attributes)
                .with_metrics(crate::init_metrics::OBJECT_STORAGE_PUT)
                .await?;
        } else {
            self.put_multipart(&location, path, attributes)
                .with_metrics(crate::init_metrics::OBJECT_STORAGE_MULTIPART)
                .await?;
        }

        tracing::debug!("Saved {size} bytes to {key}");

        self.public_url(key)
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        let url = match &self.public_base {
            PublicBase::Distribution(base) => {
                format!("{}/{key}", base.as_str().trim_end_matches('/'))
            }
            PublicBase::Endpoint { endpoint, bucket } => {
                format!("{}/{bucket}/{key}", endpoint.as_str().trim_end_matches('/'))
            }
            PublicBase::Aws { bucket, region } => {
                format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
            }
        };

        Url::parse(&url).map_err(|e| ObjectError::Url(e).into())
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner
            .delete(&ObjectPath::from(key))
            .await
            .map_err(ObjectError::Request)?;

        Ok(())
    }
}

impl ObjectStore {
    pub(crate) fn build(config: &ObjectStorage) -> Result<Self, StoreError> {
        let ObjectStorage {
            endpoint,
            bucket_name,
            region,
            access_key,
            secret_key,
            session_token,
            distribution_url,
            part_size,
        } = config;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket_name)
            .with_region(region);

        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str().trim_end_matches('/'))
                .with_allow_http(endpoint.scheme() == "http");
        }
        if let Some(access_key) = access_key {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        if let Some(session_token) = session_token {
            builder = builder.with_token(session_token);
        }

        let inner = builder.build().map_err(ObjectError::Build)?;

        let public_base = match (distribution_url, endpoint) {
            (Some(distribution), _) => PublicBase::Distribution(distribution.clone()),
            (None, Some(endpoint)) => PublicBase::Endpoint {
                endpoint: endpoint.clone(),
                bucket: bucket_name.clone(),
            },
            (None, None) => PublicBase::Aws {
                bucket: bucket_name.clone(),
                region: region.clone(),
            },
        };

        Ok(Self::from_parts(
            Arc::new(inner),
            public_base,
            part_size * MEGABYTES as usize,
        ))
    }

    #[cfg(test)]
    pub(crate) fn in_memory(bucket: &str) -> Self {
        Self::from_parts(
            Arc::new(object_store::memory::InMemory::new()),
            PublicBase::Aws {
                bucket: bucket.to_string(),
                region: String::from("us-east-1"),
            },
            0,
        )
    }

    fn from_parts(
        inner: Arc<dyn object_store::ObjectStore>,
        public_base: PublicBase,
        part_size: usize,
    ) -> Self {
        ObjectStore {
            inner,
            public_base,
            // S3 refuses parts smaller than 5MiB, except for the last one
            part_size: part_size.max(5 * MEGABYTES as usize),
        }
    }

    async fn put_single(
        &self,
        location: &ObjectPath,
        path: &Path,
        attributes: Attributes,
    ) -> Result<(), ObjectError> {
        let bytes = tokio::fs::read(path).await.map_err(ObjectError::Io)?;

        self.inner
            .put_opts(
                location,
                PutPayload::from(bytes),
                PutOptions {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(ObjectError::Request)?;

        Ok(())
    }

    /// Parts are sent one at a time. If anything fails the upload is aborted so no partial object
    /// is ever visible at `location`.
    async fn put_multipart(
        &self,
        location: &ObjectPath,
        path: &Path,
        attributes: Attributes,
    ) -> Result<(), ObjectError> {
        let mut upload = self
            .inner
            .put_multipart_opts(
                location,
                PutMultipartOpts {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(ObjectError::Request)?;

        let res = async {
            let mut file = tokio::fs::File::open(path).await.map_err(ObjectError::Io)?;

            loop {
                let mut buf = Vec::with_capacity(self.part_size);
                (&mut file)
                    .take(self.part_size as u64)
                    .read_to_end(&mut buf)
                    .await
                    .map_err(ObjectError::Io)?;

                if buf.is_empty() {
                    break;
                }

                upload
                    .put_part(PutPayload::from(buf))
                    .await
                    .map_err(ObjectError::Request)?;

                metrics::counter!(crate::init_metrics::OBJECT_STORAGE_PARTS).increment(1);
            }

            upload.complete().await.map_err(ObjectError::Request)?;

            Ok::<_, ObjectError>(())
        }
        .await;

        if let Err(e) = res {
            if let Err(abort) = upload.abort().await {
                tracing::warn!("Failed to abort multipart upload: {abort}");
            }

            return Err(e);
        }

        Ok(())
    }
}
