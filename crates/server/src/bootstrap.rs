use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use helpline_agent::{standard_registry, HttpEmbedder, HttpOracle, ToolRouter};
use helpline_core::config::{AppConfig, ConfigError, LoadOptions};
use helpline_store::{CatalogStore, OrderLedger, VectorIndex};

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<CatalogStore>,
    pub ledger: Arc<OrderLedger>,
    pub router: Arc<ToolRouter>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Builds the application from an already-loaded config. Store load
/// failures degrade to empty stores (the tools answer "unavailable");
/// only config and client construction abort startup.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let catalog = Arc::new(match CatalogStore::load(&config.data.catalog_path) {
        Ok(catalog) => {
            info!(
                event_name = "system.bootstrap.catalog_loaded",
                products = catalog.len(),
                "catalog loaded"
            );
            catalog
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.catalog_unavailable",
                error = %error,
                "catalog failed to load, continuing with an empty catalog"
            );
            CatalogStore::empty()
        }
    });

    let ledger =
        Arc::new(match OrderLedger::open(&config.data.orders_path, &config.data.orders_working_copy)
        {
            Ok(ledger) => {
                info!(event_name = "system.bootstrap.ledger_loaded", "order ledger loaded");
                ledger
            }
            Err(error) => {
                warn!(
                    event_name = "system.bootstrap.ledger_unavailable",
                    error = %error,
                    "order ledger failed to load, continuing with an empty in-memory ledger"
                );
                OrderLedger::in_memory(Vec::new())
            }
        });

    let general_index = Arc::new(load_index(&config.data.general_index_path, "general"));
    let product_index = Arc::new(load_index(&config.data.product_index_path, "product"));

    let oracle = HttpOracle::new(&config.oracle).map_err(BootstrapError::HttpClient)?;
    let embedder = HttpEmbedder::new(&config.embedding).map_err(BootstrapError::HttpClient)?;

    let registry = standard_registry(
        catalog.clone(),
        ledger.clone(),
        general_index,
        product_index,
        Arc::new(embedder),
        config.data.fuzzy_threshold,
    );
    let router = Arc::new(ToolRouter::new(Arc::new(oracle), registry));

    info!(
        event_name = "system.bootstrap.ready",
        capabilities = router.capability_count(),
        "application bootstrap complete"
    );
    Ok(Application { config, catalog, ledger, router })
}

fn load_index(path: &std::path::Path, name: &str) -> VectorIndex {
    match VectorIndex::load(path) {
        Ok(index) => {
            info!(
                event_name = "system.bootstrap.index_loaded",
                index = name,
                records = index.len(),
                "vector index loaded"
            );
            index
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.index_unavailable",
                index = name,
                error = %error,
                "vector index failed to load, continuing with an empty index"
            );
            VectorIndex::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use helpline_core::config::AppConfig;
    use tempfile::TempDir;

    use super::bootstrap_with_config;

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        let base = dir.path();
        config.data.catalog_path = base.join("product_catalog.json");
        config.data.orders_path = base.join("order_database.json");
        config.data.orders_working_copy = base.join("order_database_copy.json");
        config.data.general_index_path = base.join("general_index.json");
        config.data.product_index_path = base.join("product_index.json");
        config
    }

    #[tokio::test]
    async fn missing_data_files_degrade_to_empty_stores() {
        let dir = TempDir::new().expect("temp dir");
        let app = bootstrap_with_config(config_in(&dir)).await.expect("bootstrap succeeds");

        assert!(app.catalog.is_empty());
        assert!(app.ledger.is_empty().await);
        assert_eq!(app.router.capability_count(), 9);
    }

    #[tokio::test]
    async fn present_data_files_are_loaded() {
        let dir = TempDir::new().expect("temp dir");
        let config = config_in(&dir);
        fs::write(
            &config.data.catalog_path,
            r#"[{"product_id":"P-1","product_name":"iPhone 15","category":"Electronics","description":"flagship phone","price":799.00}]"#,
        )
        .expect("write catalog");
        fs::write(
            &config.data.orders_path,
            r#"[{"order_id":"A100","customer_id":"C0010","order_status":"Placed","order_date":"2025-11-02","products":[{"product_name":"iPhone 15","quantity":1}]}]"#,
        )
        .expect("write orders");

        let app = bootstrap_with_config(config).await.expect("bootstrap succeeds");
        assert_eq!(app.catalog.len(), 1);
        assert!(!app.ledger.is_empty().await);
        assert!(app.config.data.orders_working_copy.exists(), "working copy created on first run");
    }
}
