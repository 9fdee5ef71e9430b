use std::io;

use actix_web::web::Bytes;
use futures_core::Stream;
use url::Url;

use crate::{
    discover::probe,
    error::{Error, UploadError},
    ffmpeg::remux_fast_start,
    formats::UploadKind,
    future::WithMetrics,
    repo::{UserId, VideoId, VideoRecord, VideoRepo},
    stage::{stage, Limits, StagedFile, Upload, MEGABYTES},
    state::State,
    store::{video_key, Store},
};

mod thumbnail;

#[cfg(test)]
mod tests;

pub(crate) use thumbnail::ingest_thumbnail;

/// Look up a record and make sure `requester` owns it. Runs before anything touches disk.
async fn owned_record<S>(
    state: &State<S>,
    video_id: VideoId,
    requester: UserId,
) -> Result<VideoRecord, Error> {
    let Some(record) = state.repo.get(video_id).await? else {
        return Err(UploadError::NotFound(video_id).into());
    };

    if record.user_id != requester {
        return Err(UploadError::Forbidden.into());
    }

    Ok(record)
}

/// Persist a record whose media has already been published. A failure here leaves an object
/// nothing points to, so it's reported with the published URL attached.
async fn record_published<S>(
    state: &State<S>,
    record: &VideoRecord,
    url: Url,
) -> Result<(), Error> {
    if let Err(source) = state.repo.update(record).await {
        tracing::error!(
            video_id = %record.id,
            url = %url,
            "Published media but failed to update the record: {source}"
        );

        return Err(UploadError::Reconcile { url, source }.into());
    }

    Ok(())
}

fn count_outcome<T>(kind: UploadKind, res: &Result<T, Error>) {
    match res {
        Ok(_) => {
            metrics::counter!(crate::init_metrics::INGEST_PUBLISHED, "kind" => kind.as_str())
                .increment(1);
        }
        Err(e) => {
            let stage = e.kind().map(UploadError::stage).unwrap_or("other");

            metrics::counter!(
                crate::init_metrics::INGEST_FAILED,
                "kind" => kind.as_str(),
                "stage" => stage,
                "code" => e.error_code().as_str()
            )
            .increment(1);
        }
    }
}

/// Take a video upload all the way from the request body to a published, recorded object
#[tracing::instrument(
    name = "Ingest video",
    skip(state, video_id, requester, upload),
    fields(video_id = %video_id, requester = %requester)
)]
pub(crate) async fn ingest_video<S, B>(
    state: &State<S>,
    video_id: VideoId,
    requester: UserId,
    upload: Upload<B>,
) -> Result<VideoRecord, Error>
where
    S: Store,
    B: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let res = do_ingest_video(state, video_id, requester, upload)
        .with_metrics(crate::init_metrics::INGEST_VIDEO)
        .await;

    count_outcome(UploadKind::Video, &res);

    res
}

async fn do_ingest_video<S, B>(
    state: &State<S>,
    video_id: VideoId,
    requester: UserId,
    upload: Upload<B>,
) -> Result<VideoRecord, Error>
where
    S: Store,
    B: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let mut record = owned_record(state, video_id, requester).await?;

    let limits = Limits::new(
        UploadKind::Video,
        state.config.media.video.max_file_size * MEGABYTES,
    );

    let staged = stage(&state.tmp_dir, limits, upload).await?;

    let remuxed = match remux_fast_start(&*state.tools, &staged).await {
        Ok(remuxed) => remuxed,
        Err(e) => {
            staged.cleanup().await;
            return Err(e.into());
        }
    };

    tracing::debug!(
        staged = staged.size(),
        remuxed = remuxed.size(),
        "Remuxed video for fast start"
    );

    let res = publish_video(state, &remuxed).await;

    remuxed.cleanup().await;
    staged.cleanup().await;

    let url = res?;

    record.video_url = Some(url.clone());
    record.touch();

    record_published(state, &record, url).await?;

    Ok(record)
}

async fn publish_video<S: Store>(state: &State<S>, remuxed: &StagedFile) -> Result<Url, Error> {
    let discovery = probe(&*state.tools, remuxed.path()).await?;

    let orientation = state
        .config
        .media
        .classify_orientation
        .then_some(discovery.orientation);

    let key = video_key(orientation, remuxed.format());

    let url = state
        .store
        .save_file(&key, remuxed.path(), remuxed.content_type())
        .await?;

    Ok(url)
}
