use clap::Parser;

mod commandline;
mod defaults;
mod file;
mod primitives;

use commandline::{Args, Output};
use config::Config;
use defaults::Defaults;

pub(crate) use file::{
    ConfigFile as Configuration, ObjectStorage, OpenTelemetry, Repo, Sled, Token, Tracing,
};
pub(crate) use primitives::LogFormat;

/// Source for tubely's configuration when running as a library
pub enum ConfigSource<P, T> {
    /// A path to a configuration file
    File {
        /// The path
        path: P,
    },
    /// Configuration from any serializable value, such as a `serde_json::Value`
    Memory {
        /// The value
        values: T,
    },
    /// Only defaults and the environment
    Empty,
}

impl<T> ConfigSource<std::path::PathBuf, T>
where
    T: serde::Serialize,
{
    /// Configure tubely from an in-memory value
    pub fn memory(values: T) -> Self {
        ConfigSource::Memory { values }
    }
}

impl<P> ConfigSource<P, ()>
where
    P: AsRef<std::path::Path>,
{
    /// Configure tubely from a file
    pub fn file(path: P) -> Self {
        ConfigSource::File { path }
    }
}

impl ConfigSource<std::path::PathBuf, ()> {
    /// Configure tubely from defaults and the environment alone
    pub fn empty() -> Self {
        ConfigSource::Empty
    }
}

/// A fully resolved tubely configuration, ready to run
pub struct TubelyConfiguration {
    pub(crate) config: Configuration,
}

pub(crate) fn configure_without_clap<P: AsRef<std::path::Path>, T: serde::Serialize, Q: AsRef<std::path::Path>>(
    source: ConfigSource<P, T>,
    save_to: Option<Q>,
) -> color_eyre::Result<TubelyConfiguration> {
    let config = Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = match source {
        ConfigSource::Memory { values } => {
            config.add_source(config::Config::try_from(&values)?)
        }
        ConfigSource::File { path } => config.add_source(config::File::from(path.as_ref())),
        ConfigSource::Empty => config,
    };

    let built = config
        .add_source(
            config::Environment::with_prefix("TUBELY")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(TubelyConfiguration { config })
}

pub(crate) fn configure() -> color_eyre::Result<TubelyConfiguration> {
    let Output {
        config_format,
        save_to,
        config_file,
    } = Args::parse().into_output();

    let config = Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(
            config::Environment::with_prefix("TUBELY")
                .separator("__")
                .try_parsing(true),
        )
        .add_source(config::Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(TubelyConfiguration { config })
}

#[cfg(test)]
mod tests {
    use super::{configure_without_clap, ConfigSource, Repo};

    #[test]
    fn defaults_are_complete() {
        let configuration =
            configure_without_clap(ConfigSource::empty(), None::<&str>).expect("Valid defaults");

        let config = configuration.config;
        assert_eq!(config.server.address.port(), 8091);
        assert_eq!(config.media.video.max_file_size, 1024);
        assert_eq!(config.media.thumbnail.max_file_size, 10);
        assert!(config.media.classify_orientation);
        assert!(config.media.process_timeout.is_none());
        assert_eq!(config.store.part_size, 8);
        assert!(config.auth.tokens.is_empty());
        assert!(config.metrics.prometheus_address.is_none());
    }

    #[test]
    fn memory_values_override_nested_defaults() {
        let configuration = configure_without_clap(
            ConfigSource::memory(serde_json::json!({
                "media": {
                    "video": { "max_file_size": 2 }
                },
                "repo": {
                    "path": "./other-repo"
                },
                "store": {
                    "bucket_name": "videos",
                    "distribution_url": "https://cdn.example.com"
                },
                "auth": {
                    "tokens": [{
                        "token": "secret",
                        "user_id": "67e55044-10b1-426f-9247-bb680e5fe0c8"
                    }]
                }
            })),
            None::<&str>,
        )
        .expect("Valid configuration");

        let config = configuration.config;
        assert_eq!(config.media.video.max_file_size, 2);
        assert_eq!(config.media.thumbnail.max_file_size, 10);
        assert!(config.media.classify_orientation);
        assert_eq!(config.store.bucket_name, "videos");
        assert_eq!(config.store.region, "us-east-1");
        assert_eq!(config.auth.tokens.len(), 1);

        let Repo::Sled(sled) = config.repo;
        assert_eq!(sled.path, std::path::PathBuf::from("./other-repo"));
        assert_eq!(sled.cache_capacity, 1024 * 1024 * 64);
    }
}
