mod auth;
mod config;
mod discover;
mod error;
mod error_code;
mod ffmpeg;
mod formats;
mod future;
mod ingest;
mod init_metrics;
mod init_tracing;
mod process;
mod repo;
mod serde_str;
mod stage;
mod state;
mod store;
mod sync;
mod tmp_file;

use actix_web::{
    http::header::{CacheControl, CacheDirective, CONTENT_LENGTH, CONTENT_TYPE},
    web, App, HttpRequest, HttpResponse, HttpServer,
};
use futures_core::Stream;
use futures_util::TryStreamExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{path::Path, sync::Arc};
use tracing_actix_web::TracingLogger;

use self::{
    auth::{Authenticator, Requester},
    error::{Error, UploadError},
    init_tracing::init_tracing,
    process::{ProcessRunner, ToolRunner},
    repo::{Repo, VideoId, VideoRecord, VideoRepo},
    stage::Upload,
    state::State,
    store::{file_store::FileStore, object_store::ObjectStore, Store},
    tmp_file::TmpDir,
};

pub use self::config::{ConfigSource, TubelyConfiguration};

#[derive(Debug, serde::Deserialize)]
struct NewVideo {
    title: String,
    description: String,
}

#[tracing::instrument(name = "Creating video", skip(state, new_video))]
async fn create_video<S>(
    Requester(user_id): Requester,
    new_video: web::Json<NewVideo>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let NewVideo { title, description } = new_video.into_inner();

    let record = VideoRecord::draft(user_id, title, description);
    state.repo.create(&record).await?;

    tracing::info!(video_id = %record.id, "Created draft video");

    Ok(HttpResponse::Created().json(&record))
}

#[tracing::instrument(name = "Fetching video", skip(state))]
async fn get_video<S>(
    video_id: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video_id = video_id.parse::<VideoId>()?;

    let Some(record) = state.repo.get(video_id).await? else {
        return Err(UploadError::NotFound(video_id).into());
    };

    Ok(HttpResponse::Ok().json(&record))
}

/// Describe the raw request body as an upload, taking its type and size from the headers
fn request_upload(
    req: &HttpRequest,
    body: web::Payload,
) -> Upload<impl Stream<Item = std::io::Result<web::Bytes>> + Unpin> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok());

    let declared_size = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    Upload::new(content_type, declared_size, body.map_err(std::io::Error::other))
}

#[tracing::instrument(name = "Uploading video", skip(req, body, state))]
async fn upload_video<S: Store + 'static>(
    Requester(requester): Requester,
    video_id: web::Path<String>,
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video_id = video_id.parse::<VideoId>()?;

    let record =
        ingest::ingest_video(&state, video_id, requester, request_upload(&req, body)).await?;

    Ok(HttpResponse::Ok().json(&record))
}

#[tracing::instrument(name = "Uploading thumbnail", skip(req, body, state))]
async fn upload_thumbnail<S: 'static>(
    Requester(requester): Requester,
    video_id: web::Path<String>,
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video_id = video_id.parse::<VideoId>()?;

    let record =
        ingest::ingest_thumbnail(&state, video_id, requester, request_upload(&req, body)).await?;

    Ok(HttpResponse::Ok().json(&record))
}

#[tracing::instrument(name = "Serving asset", skip(state))]
async fn serve_asset<S>(
    file: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let (bytes, format) = state.assets.read(&file).await?;

    // thumbnails are replaced in place, so the same URL can change underneath a cache
    Ok(HttpResponse::Ok()
        .insert_header(CacheControl(vec![CacheDirective::NoStore]))
        .content_type(format.media_type().to_string())
        .body(bytes))
}

async fn healthz<S: Store>(state: web::Data<State<S>>) -> Result<HttpResponse, Error> {
    state.repo.health_check().await?;
    state.store.health_check().await?;
    state.assets.health_check().await?;
    Ok(HttpResponse::Ok().finish())
}

fn configure_endpoints<S: Store + 'static>(
    config: &mut web::ServiceConfig,
    state: State<S>,
    authenticator: Authenticator,
) {
    config
        .app_data(web::Data::new(state))
        .app_data(web::Data::new(authenticator))
        .route("/healthz", web::get().to(healthz::<S>))
        .service(
            web::scope("/api")
                .service(web::resource("/videos").route(web::post().to(create_video::<S>)))
                .service(
                    web::resource("/videos/{video_id}").route(web::get().to(get_video::<S>)),
                )
                .service(
                    web::resource("/video_upload/{video_id}")
                        .route(web::post().to(upload_video::<S>)),
                )
                .service(
                    web::resource("/thumbnail_upload/{video_id}")
                        .route(web::post().to(upload_thumbnail::<S>)),
                ),
        )
        .service(web::resource("/assets/{file}").route(web::get().to(serve_asset::<S>)));
}

async fn launch<S: Store + Send + 'static>(
    state: State<S>,
    authenticator: Authenticator,
) -> std::io::Result<()> {
    let address = state.config.server.address;

    tracing::info!("Starting tubely on {address}");

    HttpServer::new(move || {
        let state = state.clone();
        let authenticator = authenticator.clone();

        App::new()
            .wrap(TracingLogger::default())
            .configure(move |sc| configure_endpoints(sc, state, authenticator))
    })
    .bind(address)?
    .run()
    .await
}

impl<P: AsRef<Path>, T: serde::Serialize> ConfigSource<P, T> {
    /// Initialize the tubely configuration
    ///
    /// This takes an optional save_to path, which the generated configuration will be saved into.
    /// Dumping the defaults this way is a quick look at everything that can be tweaked.
    ///
    /// When running tubely as a library, configuration is limited to environment variables,
    /// configuration files, and in-memory values. Commandline options are not available.
    ///
    /// ```rust
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     tubely::ConfigSource::memory(serde_json::json!({
    ///         "server": {
    ///             "address": "127.0.0.1:8091"
    ///         },
    ///         "repo": {
    ///             "type": "sled",
    ///             "path": "./sled-repo"
    ///         },
    ///         "store": {
    ///             "bucket_name": "videos",
    ///             "region": "us-east-2"
    ///         }
    ///     })).init::<&str>(None)?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn init<Q: AsRef<Path>>(self, save_to: Option<Q>) -> color_eyre::Result<TubelyConfiguration> {
        config::configure_without_clap(self, save_to)
    }
}

impl TubelyConfiguration {
    /// Build the tubely configuration from commandline arguments
    ///
    /// This is probably not useful for 3rd party applications that handle their own commandline
    pub fn build_default() -> color_eyre::Result<Self> {
        config::configure()
    }

    /// Install the default tubely tracer
    ///
    /// This is probably not useful for 3rd party applications that install their own tracing
    /// subscribers.
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;

            init_metrics::init_metrics();
        }

        Ok(self)
    }

    /// Run the tubely application
    pub async fn run(self) -> color_eyre::Result<()> {
        let TubelyConfiguration { config } = self;

        let tmp_dir = TmpDir::init(&config.server.temporary_directory).await?;

        let repo = Repo::open(config.repo.clone())?;
        let store = ObjectStore::build(&config.store)?;
        let assets =
            FileStore::build(config.assets.path.clone(), config.assets.url_prefix.clone()).await?;
        let tools: Arc<dyn ToolRunner> = Arc::new(ProcessRunner::new(config.media.process_timeout));

        if config.auth.tokens.is_empty() {
            tracing::warn!("No auth tokens are configured, every authenticated request will fail");
        }
        let authenticator = Authenticator::new(&config.auth.tokens);

        let state = State {
            config: config.clone(),
            tmp_dir: tmp_dir.clone(),
            repo: repo.to_arc(),
            store,
            assets,
            tools,
        };

        launch(state, authenticator).await?;

        tmp_dir.cleanup().await?;

        Ok(())
    }
}
