use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use helpline_core::{Product, Session};
use helpline_store::{CatalogStore, Embedder, VectorIndex};

use crate::oracle::CapabilitySpec;
use crate::tools::{missing_argument, str_argument, Tool, ToolOutcome};

/// Exact-or-near product lookup by name, backed by the fuzzy matcher.
pub struct SearchProducts {
    catalog: Arc<CatalogStore>,
    threshold: u8,
}

impl SearchProducts {
    pub fn new(catalog: Arc<CatalogStore>, threshold: u8) -> Self {
        Self { catalog, threshold }
    }
}

#[async_trait]
impl Tool for SearchProducts {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "search_products",
            description: "Find catalog items by exact or near-exact product name \
                          (e.g. \"iPhone\", \"galaxy\"). Not for vague descriptions.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The product name as the user said it"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, arguments: &Value, _session: &Session) -> ToolOutcome {
        let Some(query) = str_argument(arguments, "query") else {
            return missing_argument("query");
        };
        if self.catalog.is_empty() {
            return ToolOutcome::text("Catalog unavailable.");
        }

        let matches = self.catalog.lookup_by_name(query, 3, self.threshold);
        if matches.is_empty() {
            return ToolOutcome::text(format!("I couldn't find any products matching '{query}'."));
        }

        let products: Vec<Product> =
            matches.iter().map(|(product, _)| (*product).clone()).collect();
        ToolOutcome::products(describe_products(&products), products)
    }
}

/// Semantic catalog browse for vague shopping queries, backed by the
/// product vector index.
pub struct BrowseCatalog {
    catalog: Arc<CatalogStore>,
    product_index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    threshold: u8,
}

impl BrowseCatalog {
    pub fn new(
        catalog: Arc<CatalogStore>,
        product_index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        threshold: u8,
    ) -> Self {
        Self { catalog, product_index, embedder, threshold }
    }
}

#[async_trait]
impl Tool for BrowseCatalog {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "browse_catalog",
            description: "Find products by meaning for vague shopping queries \
                          (e.g. \"show me red shoes\", \"gifts for dad\", \
                          \"something for hiking\").",
            parameters: json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "What the user is shopping for, in their own words"
                    }
                },
                "required": ["description"]
            }),
        }
    }

    async fn execute(&self, arguments: &Value, _session: &Session) -> ToolOutcome {
        let Some(description) = str_argument(arguments, "description") else {
            return missing_argument("description");
        };
        if self.product_index.is_empty() {
            return ToolOutcome::text("Product search unavailable.");
        }

        let query = match self.embedder.embed(description).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!(error = %error, "embedding request failed");
                return ToolOutcome::text("Product search unavailable.");
            }
        };

        let hits = self.product_index.search(&query, 3);
        if hits.is_empty() {
            return ToolOutcome::text(format!(
                "I couldn't find any products matching '{description}'."
            ));
        }

        // Join index hits back to catalog rows; metadata names can drift
        // from the catalog file, so the join tolerates near misses.
        let products: Vec<Product> = hits
            .iter()
            .filter_map(|hit| hit.product_name())
            .filter_map(|name| self.catalog.resolve_name(name, self.threshold))
            .cloned()
            .collect();

        if products.is_empty() {
            let documents: Vec<&str> = hits.iter().map(|hit| hit.document()).collect();
            return ToolOutcome::text(documents.join("\n---\n"));
        }
        ToolOutcome::products(describe_products(&products), products)
    }
}

fn describe_products(products: &[Product]) -> String {
    let lines: Vec<String> = products
        .iter()
        .map(|product| format!("{} ({}): ${}", product.product_name, product.category, product.price))
        .collect();
    format!("Found {} matching product(s):\n{}", products.len(), lines.join("\n"))
}
