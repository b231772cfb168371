use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data: DataConfig,
    pub oracle: OracleConfig,
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Locations of the read-only and mutable data files the stores consume.
#[derive(Clone, Debug)]
pub struct DataConfig {
    pub catalog_path: PathBuf,
    /// Immutable original ledger; never written.
    pub orders_path: PathBuf,
    /// Mutable working copy, created from the original on first run.
    pub orders_working_copy: PathBuf,
    pub general_index_path: PathBuf,
    pub product_index_path: PathBuf,
    /// Minimum fuzzy-match score (0-100) a catalog candidate must reach.
    pub fuzzy_threshold: u8,
}

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub oracle_base_url: Option<String>,
    pub oracle_model: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                catalog_path: PathBuf::from("data/product_catalog.json"),
                orders_path: PathBuf::from("data/order_database.json"),
                orders_working_copy: PathBuf::from("data/order_database_copy.json"),
                general_index_path: PathBuf::from("data/general_index.json"),
                product_index_path: PathBuf::from("data/product_index.json"),
                fuzzy_threshold: 60,
            },
            oracle: OracleConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            embedding: EmbeddingConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "nomic-embed-text".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("helpline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(data) = patch.data {
            if let Some(catalog_path) = data.catalog_path {
                self.data.catalog_path = catalog_path;
            }
            if let Some(orders_path) = data.orders_path {
                self.data.orders_path = orders_path;
            }
            if let Some(orders_working_copy) = data.orders_working_copy {
                self.data.orders_working_copy = orders_working_copy;
            }
            if let Some(general_index_path) = data.general_index_path {
                self.data.general_index_path = general_index_path;
            }
            if let Some(product_index_path) = data.product_index_path {
                self.data.product_index_path = product_index_path;
            }
            if let Some(fuzzy_threshold) = data.fuzzy_threshold {
                self.data.fuzzy_threshold = fuzzy_threshold;
            }
        }

        if let Some(oracle) = patch.oracle {
            if let Some(base_url) = oracle.base_url {
                self.oracle.base_url = base_url;
            }
            if let Some(oracle_api_key_value) = oracle.api_key {
                self.oracle.api_key = Some(oracle_api_key_value.into());
            }
            if let Some(model) = oracle.model {
                self.oracle.model = model;
            }
            if let Some(timeout_secs) = oracle.timeout_secs {
                self.oracle.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = oracle.max_retries {
                self.oracle.max_retries = max_retries;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = base_url;
            }
            if let Some(embedding_api_key_value) = embedding.api_key {
                self.embedding.api_key = Some(embedding_api_key_value.into());
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HELPLINE_CATALOG_PATH") {
            self.data.catalog_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("HELPLINE_ORDERS_PATH") {
            self.data.orders_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("HELPLINE_ORDERS_WORKING_COPY") {
            self.data.orders_working_copy = PathBuf::from(value);
        }
        if let Some(value) = read_env("HELPLINE_GENERAL_INDEX_PATH") {
            self.data.general_index_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("HELPLINE_PRODUCT_INDEX_PATH") {
            self.data.product_index_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("HELPLINE_FUZZY_THRESHOLD") {
            self.data.fuzzy_threshold = parse_u8("HELPLINE_FUZZY_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("HELPLINE_ORACLE_BASE_URL") {
            self.oracle.base_url = value;
        }
        if let Some(value) = read_env("HELPLINE_ORACLE_API_KEY") {
            self.oracle.api_key = Some(value.into());
        }
        if let Some(value) = read_env("HELPLINE_ORACLE_MODEL") {
            self.oracle.model = value;
        }
        if let Some(value) = read_env("HELPLINE_ORACLE_TIMEOUT_SECS") {
            self.oracle.timeout_secs = parse_u64("HELPLINE_ORACLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HELPLINE_ORACLE_MAX_RETRIES") {
            self.oracle.max_retries = parse_u32("HELPLINE_ORACLE_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("HELPLINE_EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = read_env("HELPLINE_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(value.into());
        }
        if let Some(value) = read_env("HELPLINE_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("HELPLINE_EMBEDDING_TIMEOUT_SECS") {
            self.embedding.timeout_secs = parse_u64("HELPLINE_EMBEDDING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HELPLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HELPLINE_SERVER_PORT") {
            self.server.port = parse_u16("HELPLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("HELPLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HELPLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("HELPLINE_LOGGING_LEVEL").or_else(|| read_env("HELPLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HELPLINE_LOGGING_FORMAT").or_else(|| read_env("HELPLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(oracle_base_url) = overrides.oracle_base_url {
            self.oracle.base_url = oracle_base_url;
        }
        if let Some(oracle_model) = overrides.oracle_model {
            self.oracle.model = oracle_model;
        }
        if let Some(data_dir) = overrides.data_dir {
            self.data.catalog_path = data_dir.join("product_catalog.json");
            self.data.orders_path = data_dir.join("order_database.json");
            self.data.orders_working_copy = data_dir.join("order_database_copy.json");
            self.data.general_index_path = data_dir.join("general_index.json");
            self.data.product_index_path = data_dir.join("product_index.json");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_data(&self.data)?;
        validate_oracle(&self.oracle)?;
        validate_embedding(&self.embedding)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("helpline.toml"), PathBuf::from("config/helpline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_data(data: &DataConfig) -> Result<(), ConfigError> {
    if data.fuzzy_threshold == 0 || data.fuzzy_threshold > 100 {
        return Err(ConfigError::Validation(
            "data.fuzzy_threshold must be in range 1..=100".to_string(),
        ));
    }

    if data.orders_path == data.orders_working_copy {
        return Err(ConfigError::Validation(
            "data.orders_working_copy must differ from data.orders_path (the original is never mutated)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_oracle(oracle: &OracleConfig) -> Result<(), ConfigError> {
    if !oracle.base_url.starts_with("http://") && !oracle.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "oracle.base_url must start with http:// or https://".to_string(),
        ));
    }
    if oracle.timeout_secs == 0 || oracle.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "oracle.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if oracle.model.trim().is_empty() {
        return Err(ConfigError::Validation("oracle.model must not be empty".to_string()));
    }
    Ok(())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    if !embedding.base_url.starts_with("http://") && !embedding.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "embedding.base_url must start with http:// or https://".to_string(),
        ));
    }
    if embedding.timeout_secs == 0 || embedding.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "embedding.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if embedding.model.trim().is_empty() {
        return Err(ConfigError::Validation("embedding.model must not be empty".to_string()));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    data: Option<DataPatch>,
    oracle: Option<OraclePatch>,
    embedding: Option<EmbeddingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DataPatch {
    catalog_path: Option<PathBuf>,
    orders_path: Option<PathBuf>,
    orders_working_copy: Option<PathBuf>,
    general_index_path: Option<PathBuf>,
    product_index_path: Option<PathBuf>,
    fuzzy_threshold: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct OraclePatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
