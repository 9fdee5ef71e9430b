use crate::{
    config::primitives::{LogFormat, Targets},
    serde_str::Serde,
};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};
use url::Url;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            log_spans,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            save_to,
            address,
            temporary_directory,
            metrics_prometheus_address,
            media_process_timeout,
            media_classify_orientation,
            media_video_max_file_size,
            media_thumbnail_max_file_size,
            assets_path,
            assets_url_prefix,
            repo_path,
            repo_cache_capacity,
            store_endpoint,
            store_bucket_name,
            store_region,
            store_access_key,
            store_secret_key,
            store_session_token,
            store_distribution_url,
            store_part_size,
        } = self;

        let server = Server {
            address,
            temporary_directory,
        };

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets.map(Serde::new),
                log_spans,
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets.map(Serde::new),
            },
        };

        let metrics = Metrics {
            prometheus_address: metrics_prometheus_address,
        };

        let media = Media {
            process_timeout: media_process_timeout,
            classify_orientation: media_classify_orientation,
            video: MediaLimits {
                max_file_size: media_video_max_file_size,
            }
            .set(),
            thumbnail: MediaLimits {
                max_file_size: media_thumbnail_max_file_size,
            }
            .set(),
        };

        let assets = Assets {
            path: assets_path,
            url_prefix: assets_url_prefix,
        };

        let repo = Sled {
            path: repo_path,
            cache_capacity: repo_cache_capacity,
        }
        .set();

        let store = ObjectStorage {
            endpoint: store_endpoint,
            bucket_name: store_bucket_name,
            region: store_region,
            access_key: store_access_key,
            secret_key: store_secret_key,
            session_token: store_session_token,
            distribution_url: store_distribution_url,
            part_size: store_part_size,
        };

        Output {
            config_format: ConfigFormat {
                server,
                tracing,
                metrics,
                media,
                assets,
                repo,
                store,
            },
            save_to,
            config_file,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    assets: Assets,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<Sled>,
    store: ObjectStorage,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    log_spans: bool,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classify_orientation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<MediaLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<MediaLimits>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MediaLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_file_size: Option<u64>,
}

impl MediaLimits {
    fn set(self) -> Option<Self> {
        if self.max_file_size.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Assets {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_prefix: Option<Url>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sled {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_capacity: Option<u64>,
}

impl Sled {
    fn set(self) -> Option<Self> {
        let any_set = self.path.is_some() || self.cache_capacity.is_some();

        if any_set {
            Some(self)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ObjectStorage {
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    part_size: Option<usize>,
}

/// Run the tubely video ingestion server
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the tubely configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stdout
    #[arg(long)]
    log_spans: bool,

    /// URL to send OpenTelemetry metrics
    #[arg(long)]
    opentelemetry_url: Option<Url>,
    /// Service Name to use for OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,
    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<Targets>,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    /// The address and port to bind the tubely web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The temporary directory tubely should stage uploads in
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// Whether to enable the prometheus scrape endpoint
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    /// Timeout, in seconds, for ffmpeg and ffprobe
    #[arg(long)]
    media_process_timeout: Option<u64>,
    /// Whether published videos are grouped by orientation
    #[arg(long)]
    media_classify_orientation: Option<bool>,
    /// The maximum size, in megabytes, for uploaded videos
    #[arg(long)]
    media_video_max_file_size: Option<u64>,
    /// The maximum size, in megabytes, for uploaded thumbnails
    #[arg(long)]
    media_thumbnail_max_file_size: Option<u64>,

    /// The directory thumbnails are kept in
    #[arg(long)]
    assets_path: Option<PathBuf>,
    /// The public URL the assets directory is served from
    #[arg(long)]
    assets_url_prefix: Option<Url>,

    /// The path to the sled database
    #[arg(long)]
    repo_path: Option<PathBuf>,
    /// The cache capacity, in bytes, allowed to sled for in-memory operations
    #[arg(long)]
    repo_cache_capacity: Option<u64>,

    /// The base endpoint for an S3-compatible object storage service
    #[arg(long)]
    store_endpoint: Option<Url>,
    /// The bucket in which to store videos
    #[arg(long)]
    store_bucket_name: Option<String>,
    /// The region the bucket is located in
    #[arg(long)]
    store_region: Option<String>,
    /// The Access Key for the user accessing the bucket
    #[arg(long)]
    store_access_key: Option<String>,
    /// The secret key for the user accessing the bucket
    #[arg(long)]
    store_secret_key: Option<String>,
    /// The session token for accessing the bucket
    #[arg(long)]
    store_session_token: Option<String>,
    /// Public front-end (such as a CDN) serving the bucket
    #[arg(long)]
    store_distribution_url: Option<Url>,
    /// Size, in megabytes, above which videos are sent as multipart uploads
    #[arg(long)]
    store_part_size: Option<usize>,
}
