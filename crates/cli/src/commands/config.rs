use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use helpline_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// Renders every effective config value with where it came from.
/// Secrets are redacted to their first four characters.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let doc = load_config_file_doc(config_file_path.as_deref());
    let file_path = config_file_path.as_deref();

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut line = |key: &str, env_var: &str, value: String| {
        lines.push(render_line(key, &value, field_source(key, env_var, doc.as_ref(), file_path)));
    };

    line(
        "data.catalog_path",
        "HELPLINE_CATALOG_PATH",
        config.data.catalog_path.display().to_string(),
    );
    line("data.orders_path", "HELPLINE_ORDERS_PATH", config.data.orders_path.display().to_string());
    line(
        "data.orders_working_copy",
        "HELPLINE_ORDERS_WORKING_COPY",
        config.data.orders_working_copy.display().to_string(),
    );
    line(
        "data.general_index_path",
        "HELPLINE_GENERAL_INDEX_PATH",
        config.data.general_index_path.display().to_string(),
    );
    line(
        "data.product_index_path",
        "HELPLINE_PRODUCT_INDEX_PATH",
        config.data.product_index_path.display().to_string(),
    );
    line(
        "data.fuzzy_threshold",
        "HELPLINE_FUZZY_THRESHOLD",
        config.data.fuzzy_threshold.to_string(),
    );

    line("oracle.base_url", "HELPLINE_ORACLE_BASE_URL", config.oracle.base_url.clone());
    line("oracle.model", "HELPLINE_ORACLE_MODEL", config.oracle.model.clone());
    line("oracle.api_key", "HELPLINE_ORACLE_API_KEY", redact_secret(config.oracle.api_key.as_ref()));
    line(
        "oracle.timeout_secs",
        "HELPLINE_ORACLE_TIMEOUT_SECS",
        config.oracle.timeout_secs.to_string(),
    );
    line(
        "oracle.max_retries",
        "HELPLINE_ORACLE_MAX_RETRIES",
        config.oracle.max_retries.to_string(),
    );

    line("embedding.base_url", "HELPLINE_EMBEDDING_BASE_URL", config.embedding.base_url.clone());
    line("embedding.model", "HELPLINE_EMBEDDING_MODEL", config.embedding.model.clone());
    line(
        "embedding.api_key",
        "HELPLINE_EMBEDDING_API_KEY",
        redact_secret(config.embedding.api_key.as_ref()),
    );

    line(
        "server.bind_address",
        "HELPLINE_SERVER_BIND_ADDRESS",
        config.server.bind_address.clone(),
    );
    line("server.port", "HELPLINE_SERVER_PORT", config.server.port.to_string());
    line(
        "server.graceful_shutdown_secs",
        "HELPLINE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        config.server.graceful_shutdown_secs.to_string(),
    );

    line("logging.level", "HELPLINE_LOG_LEVEL", config.logging.level.clone());
    line("logging.format", "HELPLINE_LOG_FORMAT", format!("{:?}", config.logging.format).to_lowercase());

    lines.join("\n")
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("  {key} = {value} ({source})")
}

fn field_source(key: &str, env_var: &str, doc: Option<&Value>, path: Option<&Path>) -> String {
    if env::var(env_var).is_ok() {
        return format!("env:{env_var}");
    }
    if let (Some(doc), Some(path)) = (doc, path) {
        if doc_contains(doc, key) {
            return format!("file:{}", path.display());
        }
    }
    "default".to_string()
}

fn doc_contains(doc: &Value, dotted_key: &str) -> bool {
    let mut current = doc;
    for part in dotted_key.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("helpline.toml"), PathBuf::from("config/helpline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) => {
            let exposed = secret.expose_secret();
            if exposed.len() <= 4 {
                "****".to_string()
            } else {
                format!("{}****", &exposed[..4])
            }
        }
        None => "(unset)".to_string(),
    }
}
