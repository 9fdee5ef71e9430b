use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use actix_web::web::Bytes;
use url::Url;

use super::{ingest_thumbnail, ingest_video};
use crate::{
    config::{configure_without_clap, ConfigSource},
    error::{Error, UploadError},
    process::testing::{exited, FakeTools},
    repo::{sled::SledRepo, RepoError, UserId, VideoId, VideoRecord, VideoRepo},
    stage::{Upload, MEGABYTES},
    state::State,
    store::{file_store::FileStore, Store, StoreError},
    tmp_file::{ArcTmpDir, TmpDir},
};

/// Records what it's asked to publish without copying anything
#[derive(Clone, Debug, Default)]
struct RecordingStore {
    keys: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingStore {
    fn failing() -> Self {
        RecordingStore {
            fail: true,
            ..Default::default()
        }
    }

    fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait::async_trait(?Send)]
impl Store for RecordingStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_file(
        &self,
        key: &str,
        path: &Path,
        _content_type: mime::Mime,
    ) -> Result<Url, StoreError> {
        assert!(path.exists(), "published file must exist");

        if self.fail {
            return Err(StoreError::ObjectStore(
                crate::store::object_store::ObjectError::Io(std::io::Error::other("boom")),
            ));
        }

        self.keys.lock().unwrap().push(key.to_string());

        self.public_url(key)
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        Ok(format!("https://videos.s3.us-east-1.amazonaws.com/{key}")
            .parse()
            .unwrap())
    }

    async fn remove(&self, _: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Counts updates, and can be told to refuse them
#[derive(Debug)]
struct CountingRepo {
    inner: SledRepo,
    updates: AtomicUsize,
    fail_updates: bool,
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for CountingRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        self.inner.health_check().await
    }

    async fn create(&self, record: &VideoRecord) -> Result<(), RepoError> {
        self.inner.create(record).await
    }

    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, RepoError> {
        self.inner.get(id).await
    }

    async fn update(&self, record: &VideoRecord) -> Result<(), RepoError> {
        if self.fail_updates {
            return Err(RepoError::Missing(record.id));
        }

        self.updates.fetch_add(1, Ordering::Relaxed);
        self.inner.update(record).await
    }
}

struct Harness {
    state: State<RecordingStore>,
    repo: Arc<CountingRepo>,
    tools: Arc<FakeTools>,
    tmp_dir: ArcTmpDir,
    assets_dir: ArcTmpDir,
    owner: UserId,
    record: VideoRecord,
}

async fn harness(tools: FakeTools, store: RecordingStore) -> Harness {
    harness_with(tools, store, false).await
}

async fn harness_with(tools: FakeTools, store: RecordingStore, fail_updates: bool) -> Harness {
    let mut config = configure_without_clap(ConfigSource::empty(), None::<&str>)
        .unwrap()
        .config;
    config.media.video.max_file_size = 1;
    config.media.thumbnail.max_file_size = 1;

    let tmp_dir = TmpDir::init(std::env::temp_dir().join("tubely-tests"))
        .await
        .unwrap();
    let assets_dir = TmpDir::init(std::env::temp_dir().join("tubely-tests"))
        .await
        .unwrap();

    let assets = FileStore::build(
        assets_dir.path().to_path_buf(),
        "http://localhost:8091/assets".parse().unwrap(),
    )
    .await
    .unwrap();

    let db = sled::Config::new().temporary(true).open().unwrap();
    let repo = Arc::new(CountingRepo {
        inner: SledRepo::new(db).unwrap(),
        updates: AtomicUsize::new(0),
        fail_updates,
    });

    let owner = UserId::from(uuid::Uuid::new_v4());
    let record = VideoRecord::draft(owner, String::from("Boots"), String::from("A tour"));
    repo.create(&record).await.unwrap();

    let tools = Arc::new(tools);

    let state = State {
        config,
        tmp_dir: tmp_dir.clone(),
        repo: repo.clone(),
        store,
        assets,
        tools: tools.clone(),
    };

    Harness {
        state,
        repo,
        tools,
        tmp_dir,
        assets_dir,
        owner,
        record,
    }
}

fn video(len: usize) -> Upload<crate::stage::BytesStream> {
    Upload::from_bytes(
        Some(crate::formats::mimes::video_mp4()),
        Bytes::from(vec![7u8; len]),
    )
}

fn thumbnail(content_type: mime::Mime) -> Upload<crate::stage::BytesStream> {
    Upload::from_bytes(Some(content_type), Bytes::from_static(b"not really an image"))
}

async fn entries(path: &Path) -> Vec<String> {
    let mut dir = tokio::fs::read_dir(path).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = dir.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

fn kind(err: &Error) -> &UploadError {
    err.kind().expect("tubely error")
}

#[actix_web::test]
async fn publishes_landscape_video() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;

    let record = ingest_video(&h.state, h.record.id, h.owner, video(1024))
        .await
        .unwrap();

    let keys = h.state.store.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("landscape/"));
    assert!(keys[0].ends_with(".mp4"));

    let url = record.video_url.clone().unwrap();
    assert!(url.path().contains("/landscape/"));

    assert_eq!(h.repo.updates.load(Ordering::Relaxed), 1);
    let stored = h.repo.get(h.record.id).await.unwrap().unwrap();
    assert_eq!(stored.video_url, Some(url));
    assert!(stored.updated_at >= h.record.updated_at);

    assert_eq!(h.tools.commands(), vec!["ffmpeg", "ffprobe"]);
    let probed = h.tools.args("ffprobe").unwrap();
    assert!(probed
        .last()
        .unwrap()
        .to_string_lossy()
        .ends_with(".processed"));

    assert!(entries(h.tmp_dir.path()).await.is_empty());
}

#[actix_web::test]
async fn portrait_video_key() {
    let h = harness(FakeTools::video(1080, 1920), RecordingStore::default()).await;

    ingest_video(&h.state, h.record.id, h.owner, video(1024))
        .await
        .unwrap();

    assert!(h.state.store.keys()[0].starts_with("portrait/"));
}

#[actix_web::test]
async fn unclassified_video_key() {
    let mut h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;
    h.state.config.media.classify_orientation = false;

    let record = ingest_video(&h.state, h.record.id, h.owner, video(1024))
        .await
        .unwrap();

    let key = &h.state.store.keys()[0];
    assert!(!key.contains('/'));

    let url = record.video_url.unwrap();
    assert!(url.as_str().ends_with(key.as_str()));
    assert!(!url.as_str().contains("landscape"));
}

#[actix_web::test]
async fn someone_elses_video_is_forbidden() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;
    let stranger = UserId::from(uuid::Uuid::new_v4());

    let err = ingest_video(&h.state, h.record.id, stranger, video(1024))
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), UploadError::Forbidden));
    assert!(h.state.store.keys().is_empty());
    assert!(h.tools.commands().is_empty());
    assert_eq!(h.repo.updates.load(Ordering::Relaxed), 0);
    assert!(entries(h.tmp_dir.path()).await.is_empty());
    assert_eq!(h.repo.get(h.record.id).await.unwrap(), Some(h.record));
}

#[actix_web::test]
async fn missing_video_is_not_found() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;
    let id = VideoId::generate();

    let err = ingest_video(&h.state, id, h.owner, video(1024))
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), UploadError::NotFound(missing) if *missing == id));
    assert!(h.tools.commands().is_empty());
}

#[actix_web::test]
async fn oversized_video_leaves_nothing_behind() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;

    let err = ingest_video(
        &h.state,
        h.record.id,
        h.owner,
        video(MEGABYTES as usize + 1),
    )
    .await
    .unwrap_err();

    assert!(matches!(kind(&err), UploadError::Stage(_)));
    assert_eq!(err.error_code().as_str(), "validate-file-size");
    assert!(entries(h.tmp_dir.path()).await.is_empty());
    assert!(h.tools.commands().is_empty());
    assert!(h.state.store.keys().is_empty());
}

#[actix_web::test]
async fn failed_remux_removes_staged_files() {
    let tools =
        FakeTools::video(1920, 1080).with_ffmpeg(exited(1, "", "Invalid data found when processing input"));
    let h = harness(tools, RecordingStore::default()).await;

    let err = ingest_video(&h.state, h.record.id, h.owner, video(1024))
        .await
        .unwrap_err();

    match kind(&err) {
        UploadError::Remux(crate::ffmpeg::RemuxError::Status { code, stderr }) => {
            assert_eq!(*code, Some(1));
            assert!(stderr.contains("Invalid data found"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert!(entries(h.tmp_dir.path()).await.is_empty());
    assert!(h.state.store.keys().is_empty());
    assert_eq!(h.repo.updates.load(Ordering::Relaxed), 0);
}

#[actix_web::test]
async fn cancelled_ingest_removes_staged_files() {
    let h = harness(
        FakeTools::video(1920, 1080).with_hanging_ffmpeg(),
        RecordingStore::default(),
    )
    .await;

    let res = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        ingest_video(&h.state, h.record.id, h.owner, video(1024)),
    )
    .await;

    assert!(res.is_err(), "ingest should still be waiting on ffmpeg");
    assert_eq!(h.tools.commands(), vec!["ffmpeg"]);

    assert!(entries(h.tmp_dir.path()).await.is_empty());
    assert!(h.state.store.keys().is_empty());
    assert_eq!(h.repo.updates.load(Ordering::Relaxed), 0);
}

#[actix_web::test]
async fn failed_probe_removes_staged_files() {
    let tools = FakeTools::video(1920, 1080).with_ffprobe(exited(1, "", "moov atom not found"));
    let h = harness(tools, RecordingStore::default()).await;

    let err = ingest_video(&h.state, h.record.id, h.owner, video(1024))
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), UploadError::Probe(_)));
    assert!(entries(h.tmp_dir.path()).await.is_empty());
    assert!(h.state.store.keys().is_empty());
}

#[actix_web::test]
async fn failed_publish_leaves_record_alone() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::failing()).await;

    let err = ingest_video(&h.state, h.record.id, h.owner, video(1024))
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), UploadError::Publish(_)));
    assert!(entries(h.tmp_dir.path()).await.is_empty());
    assert_eq!(h.repo.updates.load(Ordering::Relaxed), 0);
    assert_eq!(
        h.repo.get(h.record.id).await.unwrap().unwrap().video_url,
        None
    );
}

#[actix_web::test]
async fn failed_update_reports_published_url() {
    let h = harness_with(FakeTools::video(1920, 1080), RecordingStore::default(), true).await;

    let err = ingest_video(&h.state, h.record.id, h.owner, video(1024))
        .await
        .unwrap_err();

    match kind(&err) {
        UploadError::Reconcile { url, .. } => {
            assert!(url.as_str().ends_with(&h.state.store.keys()[0]));
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert_eq!(err.error_code().as_str(), "reconcile-published");
    assert!(entries(h.tmp_dir.path()).await.is_empty());
}

#[actix_web::test]
async fn thumbnail_is_saved_as_asset() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;

    let record = ingest_thumbnail(&h.state, h.record.id, h.owner, thumbnail(mime::IMAGE_PNG))
        .await
        .unwrap();

    let name = format!("{}.png", h.record.id);

    assert_eq!(
        record.thumbnail_url.unwrap().as_str(),
        format!("http://localhost:8091/assets/{name}")
    );
    assert_eq!(entries(h.assets_dir.path()).await, vec![name]);
    assert!(entries(h.tmp_dir.path()).await.is_empty());
    assert!(h.tools.commands().is_empty());
    assert!(h.state.store.keys().is_empty());
    assert_eq!(h.repo.updates.load(Ordering::Relaxed), 1);
}

#[actix_web::test]
async fn thumbnail_replaces_other_extension() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;

    ingest_thumbnail(&h.state, h.record.id, h.owner, thumbnail(mime::IMAGE_PNG))
        .await
        .unwrap();
    let record = ingest_thumbnail(&h.state, h.record.id, h.owner, thumbnail(mime::IMAGE_JPEG))
        .await
        .unwrap();

    let name = format!("{}.jpg", h.record.id);

    assert!(record.thumbnail_url.unwrap().as_str().ends_with(&name));
    assert_eq!(entries(h.assets_dir.path()).await, vec![name]);
}

#[actix_web::test]
async fn thumbnail_requires_owner() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;
    let stranger = UserId::from(uuid::Uuid::new_v4());

    let err = ingest_thumbnail(&h.state, h.record.id, stranger, thumbnail(mime::IMAGE_PNG))
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), UploadError::Forbidden));
    assert!(entries(h.assets_dir.path()).await.is_empty());
    assert!(entries(h.tmp_dir.path()).await.is_empty());
}

#[actix_web::test]
async fn thumbnail_rejects_video_type() {
    let h = harness(FakeTools::video(1920, 1080), RecordingStore::default()).await;

    let err = ingest_thumbnail(
        &h.state,
        h.record.id,
        h.owner,
        thumbnail(crate::formats::mimes::video_mp4()),
    )
    .await
    .unwrap_err();

    assert_eq!(err.error_code().as_str(), "validate-content-type");
    assert!(entries(h.assets_dir.path()).await.is_empty());
}
