use std::io;

use actix_web::web::Bytes;
use futures_core::Stream;

use crate::{
    error::Error,
    formats::UploadKind,
    future::WithMetrics,
    repo::{UserId, VideoId, VideoRecord},
    stage::{stage, Limits, Upload, MEGABYTES},
    state::State,
    store::Store,
};

/// Store a thumbnail in the assets directory as `{video_id}.{ext}`
///
/// No external tools run and nothing is sent to object storage. A thumbnail previously saved
/// with the other extension is removed so only one is ever served.
#[tracing::instrument(
    name = "Ingest thumbnail",
    skip(state, video_id, requester, upload),
    fields(video_id = %video_id, requester = %requester)
)]
pub(crate) async fn ingest_thumbnail<S, B>(
    state: &State<S>,
    video_id: VideoId,
    requester: UserId,
    upload: Upload<B>,
) -> Result<VideoRecord, Error>
where
    B: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let res = do_ingest_thumbnail(state, video_id, requester, upload)
        .with_metrics(crate::init_metrics::INGEST_THUMBNAIL)
        .await;

    super::count_outcome(UploadKind::Thumbnail, &res);

    res
}

async fn do_ingest_thumbnail<S, B>(
    state: &State<S>,
    video_id: VideoId,
    requester: UserId,
    upload: Upload<B>,
) -> Result<VideoRecord, Error>
where
    B: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let mut record = super::owned_record(state, video_id, requester).await?;

    let limits = Limits::new(
        UploadKind::Thumbnail,
        state.config.media.thumbnail.max_file_size * MEGABYTES,
    );

    let staged = stage(&state.tmp_dir, limits, upload).await?;
    let format = staged.format();

    let key = format!("{video_id}.{}", format.extension());

    let res = state
        .assets
        .save_file(&key, staged.path(), staged.content_type())
        .await;

    staged.cleanup().await;

    let url = res?;

    for stale in UploadKind::Thumbnail
        .formats()
        .iter()
        .filter(|other| **other != format)
    {
        let stale_key = format!("{video_id}.{}", stale.extension());

        if let Err(e) = state.assets.remove(&stale_key).await {
            tracing::warn!("Failed to remove stale thumbnail {stale_key}: {e}");
        }
    }

    record.thumbnail_url = Some(url.clone());
    record.touch();

    super::record_published(state, &record, url).await?;

    Ok(record)
}
