//! Configuration data types for the relay.
//!
//! One section per concern: the HTTP server, the like-count source, the destination
//! that receives the count, and the polling behaviour.

use alloc::sync::Arc;
use core::time::Duration;
use std::path::{Component, Path, PathBuf};

use likesync_common::{DEFAULT_INPUT_NAME, DEFAULT_OBS_ENDPOINT, Template};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;

use crate::{
    fetcher::YOUTUBE_API_BASE,
    poll::{SessionConfig, SessionConfigError},
    sink::{SinkTarget, ValueFormat},
};

/// HTTP server binding configuration section.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP port for the control service.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Optional directory with a web UI. Unknown paths fall back to its `index.html`.
    /// Relative paths are resolved against the config file.
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            static_dir: None,
        }
    }
}

/// Where like counts are read from.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// YouTube Data API key.
    pub api_key: Arc<SecretString>,
    /// Video polled when a start request does not name one.
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl PartialEq for SourceConfig {
    fn eq(&self, other: &Self) -> bool {
        self.api_key.expose_secret() == other.api_key.expose_secret()
            && self.video_id == other.video_id
            && self.api_base == other.api_base
            && self.request_timeout_secs == other.request_timeout_secs
    }
}

/// The OBS input that displays the count.
#[derive(Debug, Deserialize, Clone)]
pub struct DestinationConfig {
    /// obs-websocket address, `host:port` or a `ws://` URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// obs-websocket server password, if authentication is enabled in OBS.
    #[serde(default)]
    pub password: Option<Arc<SecretString>>,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    /// Input setting that receives the value; `text` for a text source.
    #[serde(default = "default_property")]
    pub property: String,
    /// Display template such as `"{count} likes"`. Without one the bare count is written.
    #[serde(default)]
    pub template: Option<String>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            password: None,
            input_name: default_input_name(),
            property: default_property(),
            template: None,
        }
    }
}

impl PartialEq for DestinationConfig {
    fn eq(&self, other: &Self) -> bool {
        let same_password = match (&self.password, &other.password) {
            (&Some(ref p1), &Some(ref p2)) => p1.expose_secret() == p2.expose_secret(),
            (&None, &None) => true,
            _ => false,
        };
        same_password
            && self.endpoint == other.endpoint
            && self.input_name == other.input_name
            && self.property == other.property
            && self.template == other.template
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Wait after a failed fetch, in place of the regular interval.
    #[serde(default = "default_error_delay_secs")]
    pub error_delay_secs: u64,
    /// Start a session as soon as the service is up.
    #[serde(default)]
    pub autostart: bool,
    /// Also send changes to connected `/ws` listeners.
    #[serde(default = "do_broadcast")]
    pub broadcast: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            error_delay_secs: default_error_delay_secs(),
            autostart: false,
            broadcast: do_broadcast(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_api_base() -> String {
    YOUTUBE_API_BASE.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    10
}

fn default_endpoint() -> String {
    DEFAULT_OBS_ENDPOINT.to_string()
}

fn default_input_name() -> String {
    DEFAULT_INPUT_NAME.to_string()
}

fn default_property() -> String {
    "text".to_string()
}

const fn default_interval_secs() -> u64 {
    15
}

const fn default_error_delay_secs() -> u64 {
    30
}

const fn do_broadcast() -> bool {
    true
}

/// Root config structure for the relay.
///
/// ```toml
/// [server]
/// port = 8080
///
/// [source]
/// api_key = "AIza..."
/// video_id = "dQw4w9WgXcQ"
///
/// [destination]
/// input_name = "LikeAlertText"
/// template = "{count} likes"
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Per-start values that take precedence over the config file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionOverrides {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

impl RelayConfig {
    /// Builds the settings of one session from the config and `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if no video is given, the template is malformed,
    /// or any other session field is empty or zero.
    pub fn session_config(
        &self,
        overrides: &SessionOverrides,
    ) -> Result<SessionConfig, SessionConfigError> {
        let resource_id = overrides
            .video_id
            .as_ref()
            .or(self.source.video_id.as_ref())
            .cloned()
            .ok_or(SessionConfigError::Empty("video id"))?;

        let format = match overrides
            .template
            .as_deref()
            .or(self.destination.template.as_deref())
        {
            Some(template) => ValueFormat::Template(Template::parse(template)?),
            None => ValueFormat::Bare,
        };

        let config = SessionConfig {
            resource_id,
            credential: Arc::clone(&self.source.api_key),
            target: SinkTarget {
                endpoint: self.destination.endpoint.clone(),
                credential: self.destination.password.clone(),
                destination_name: self.destination.input_name.clone(),
                property: self.destination.property.clone(),
                format,
            },
            interval: Duration::from_secs(self.polling.interval_secs),
            error_delay: Duration::from_secs(self.polling.error_delay_secs),
            broadcast: self.polling.broadcast,
        };
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.request_timeout_secs)
    }
}

/// Resolves a path from the config file to an absolute one.
///
/// Absolute paths are returned as-is. Relative ones are joined onto the config file's
/// directory and normalized, without touching the filesystem.
pub fn resolve_config_relative_paths(config_path: &Path, relative_path: &str) -> PathBuf {
    let path = Path::new(relative_path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_path
            .parent()
            .map_or_else(|| path.to_path_buf(), |d| d.join(path))
    };
    normalize_path(&resolved)
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        use Component as C;
        match component {
            C::Normal(c) => result.push(c),
            C::ParentDir => {
                result.pop();
            }
            C::CurDir => {}
            C::RootDir | C::Prefix(_) => result.push(component),
        }
    }
    result
}
