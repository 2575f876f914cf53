use std::{net::SocketAddr, path::PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Database configuration.
#[derive(Deserialize)]
pub struct Database {
    /// Database URL string.
    pub url: String,
}

/// HTTP server configuration.
#[derive(Deserialize)]
pub struct Server {
    /// Address, that HTTP server will listen on.
    pub address: SocketAddr,

    /// Bearer token required to access operator routes.
    pub operator_token: String,
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// AWS S3-compatible storage configuration.
///
/// Published draw manifests and render status documents are stored here.
#[derive(Deserialize)]
pub struct Storage {
    /// Access key identifier.
    pub access_key_id: String,

    /// Secret access key.
    pub secret_access_key: String,

    /// S3 region name.
    pub region: String,

    /// S3 endpoint URL.
    pub endpoint_url: String,

    /// S3 bucket name for published draw documents.
    pub bucket: String,

    /// Key prefix under which every published slug is namespaced.
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,
}

fn default_storage_prefix() -> String {
    String::from("draws")
}

/// External video render service configuration.
#[derive(Deserialize)]
pub struct Render {
    /// URL that accepts render job dispatches.
    pub dispatch_url: String,

    /// Optional bearer token sent along with each dispatch.
    #[serde(default)]
    pub dispatch_token: Option<String>,

    /// Shared secret the render service sends back in the `x-render-secret` header.
    pub callback_secret: String,

    /// Dispatch request timeout, in seconds.
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
}

fn default_render_timeout() -> u64 {
    10
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// General database configuration.
    pub database: Database,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: Option<Server>,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Storage configuration.
    ///
    /// Publishing is unavailable without it, while status reads degrade to a fallback response.
    #[serde(default)]
    pub storage: Option<Storage>,

    /// Render service configuration.
    #[serde(default)]
    pub render: Option<Render>,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// Nested keys are separated by a double underscore in environment variable names,
    /// e.g. `CONFIG_SERVER__OPERATOR_TOKEN`. See [`Env`] for more details.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.unwrap_or(PathBuf::from("Config.toml"))))
            .merge(Env::prefixed("CONFIG_").split("__"))
            .extract()
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            database: Database {
                url: String::from("sqlite::memory:"),
            },
            server: Some(Server {
                address: "127.0.0.1:3000".parse().unwrap(),
                operator_token: String::from("operator-test-token"),
            }),
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            storage: None,
            render: Some(Render {
                dispatch_url: String::from("http://127.0.0.1:9/render"),
                dispatch_token: None,
                callback_secret: String::from("render-test-secret"),
                timeout_secs: 1,
            }),
        }
    }
}
