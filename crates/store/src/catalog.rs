use std::fs;
use std::path::Path;

use helpline_core::Product;

use crate::fuzzy::partial_ratio;
use crate::StoreError;

/// Read-only in-memory product table, loaded once at startup from a JSON
/// array. An empty catalog is a valid degraded state; dependent tools
/// check `is_empty` and answer "unavailable" instead of failing.
#[derive(Clone, Debug, Default)]
pub struct CatalogStore {
    products: Vec<Product>,
}

impl CatalogStore {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read(path)
            .map_err(|source| StoreError::ReadFile { path: path.to_path_buf(), source })?;
        let products: Vec<Product> = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::ParseFile { path: path.to_path_buf(), source })?;
        Ok(Self { products })
    }

    pub fn from_products(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Exact-or-near lookup over product names. Results come back highest
    /// score first; ties keep catalog order (stable sort). Candidates
    /// below `threshold` are dropped entirely. An empty result is a valid
    /// "no match" outcome, not an error.
    pub fn lookup_by_name(
        &self,
        query: &str,
        limit: usize,
        threshold: u8,
    ) -> Vec<(&Product, u8)> {
        let mut matches: Vec<(&Product, u8)> = self
            .products
            .iter()
            .map(|product| (product, partial_ratio(query, &product.product_name)))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.truncate(limit);
        matches
    }

    /// Resolves a product name coming from vector metadata. The join is
    /// by string equality; when the exact join misses we fall back to the
    /// fuzzy matcher before giving up (names drift between the index
    /// build and the catalog file).
    pub fn resolve_name(&self, product_name: &str, threshold: u8) -> Option<&Product> {
        if let Some(product) =
            self.products.iter().find(|product| product.product_name == product_name)
        {
            return Some(product);
        }
        self.lookup_by_name(product_name, 1, threshold).first().map(|(product, _)| *product)
    }
}
