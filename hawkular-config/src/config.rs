use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hawkular_client::HttpConfig;
use hawkular_log::{LogConfig, LogLevel};
use hawkular_reporter::ReporterConfig;
use serde::{Deserialize, Serialize};

/// The file name of the configuration within the config folder.
const CONFIG_FILE_NAME: &str = "config.yml";

/// Defines the source of a config error.
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

impl fmt::Display for ConfigErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErrorSource::None => Ok(()),
            ConfigErrorSource::File(file_name) => {
                write!(f, " (file {})", file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, " (field {name})"),
        }
    }
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to serialize the configuration.
    #[error("could not write config")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config")]
    BadJson,
    /// Invalid config value.
    #[error("invalid config value")]
    InvalidValue,
}

/// A configuration error.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: None,
        }
    }

    #[inline]
    fn wrap<E>(error: E, kind: ConfigErrorKind) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: Some(Box::new(error)),
        }
    }

    #[inline]
    fn for_field<E>(error: E, field: &'static str) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::wrap(error, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(path.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.source)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner
            .as_ref()
            .map(|error| error.as_ref() as &(dyn Error + 'static))
    }
}

/// Error returned for interval values that are not positive.
#[derive(Debug, thiserror::Error)]
#[error("interval must be at least one second")]
struct ZeroIntervalError;

/// Values that can be overridden from the command line or the environment.
///
/// All values are passed as strings and validated when applied with [`Config::apply_override`].
#[derive(Clone, Debug, Default)]
pub struct OverridableConfig {
    /// The base URI of the metrics server.
    pub uri: Option<String>,
    /// The tenant to report to.
    pub tenant: Option<String>,
    /// The prefix of all series names.
    pub prefix: Option<String>,
    /// The interval between reporting cycles in seconds.
    pub interval: Option<String>,
    /// The log level.
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct ConfigValues {
    #[serde(default)]
    logging: LogConfig,
    #[serde(default)]
    hawkular: HttpConfig,
    #[serde(default)]
    reporter: ReporterConfig,
}

impl ConfigValues {
    /// Loads the config file from the given folder, or returns defaults if there is no file.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = base.join(CONFIG_FILE_NAME);

        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => {
                return Err(ConfigError::wrap(error, ConfigErrorKind::CouldNotOpenFile).file(&path));
            }
        };

        serde_yaml::from_reader(io::BufReader::new(file))
            .map_err(|error| ConfigError::wrap(error, ConfigErrorKind::BadYaml).file(&path))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reporter.interval == 0 {
            return Err(ConfigError::wrap(ZeroIntervalError, ConfigErrorKind::InvalidValue));
        }

        Ok(())
    }
}

/// Config struct.
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Config {
    /// Loads a config from a given config folder.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = std::env::current_dir()
            .map(|dir| dir.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let values = ConfigValues::load(&path)?;
        values
            .validate()
            .map_err(|error| error.file(path.join(CONFIG_FILE_NAME)))?;

        Ok(Config { values, path })
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        let values: ConfigValues = serde_json::from_value(value)
            .map_err(|error| ConfigError::wrap(error, ConfigErrorKind::BadJson))?;
        values.validate()?;

        Ok(Config {
            values,
            path: PathBuf::new(),
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters).
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        if let Some(uri) = overrides.uri {
            url::Url::parse(&uri).map_err(|error| ConfigError::for_field(error, "uri"))?;
            self.values.hawkular.uri = uri;
        }

        if let Some(tenant) = overrides.tenant {
            if tenant.is_empty() {
                return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("tenant"));
            }
            self.values.hawkular.tenant = tenant;
        }

        if let Some(prefix) = overrides.prefix {
            self.values.reporter.prefix = Some(prefix).filter(|p| !p.is_empty());
        }

        if let Some(interval) = overrides.interval {
            let interval = interval
                .parse::<u64>()
                .map_err(|error| ConfigError::for_field(error, "interval"))?;

            if interval == 0 {
                return Err(ConfigError::for_field(ZeroIntervalError, "interval"));
            }
            self.values.reporter.interval = interval;
        }

        if let Some(level) = overrides.log_level {
            self.values.logging.level = level
                .parse::<LogLevel>()
                .map_err(|error| ConfigError::for_field(error, "log_level"))?;
        }

        Ok(self)
    }

    /// Serializes the effective configuration to YAML.
    ///
    /// Secrets are omitted.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|error| ConfigError::wrap(error, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the path of the config folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// Returns the connection settings of the metrics server.
    pub fn http(&self) -> &HttpConfig {
        &self.values.hawkular
    }

    /// Returns the reporter configuration.
    pub fn reporter(&self) -> &ReporterConfig {
        &self.values.reporter
    }

    /// Returns the base URI of the metrics server.
    pub fn uri(&self) -> &str {
        &self.values.hawkular.uri
    }

    /// Returns the tenant metrics are reported to.
    pub fn tenant(&self) -> &str {
        &self.values.hawkular.tenant
    }

    /// Returns the prefix of all series names.
    pub fn prefix(&self) -> Option<&str> {
        self.values.reporter.prefix.as_deref()
    }

    /// Returns the time between two reporting cycles.
    pub fn interval(&self) -> Duration {
        self.values.reporter.interval()
    }

    /// Returns the minimum time before tags of a series are sent again.
    pub fn tags_cache_duration(&self) -> Duration {
        Duration::from_millis(self.values.reporter.tags_cache_duration)
    }
}
