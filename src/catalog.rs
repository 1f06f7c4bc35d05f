use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Products with stock strictly below this count show up in the low-stock report.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product ID already exists.")]
    DuplicateId(String),
    #[error("Product not found.")]
    NotFound(String),
    #[error("failed to access catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write catalog file: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub stock: u32,
}

/// Partial update for a catalog entry; `None` fields keep their current value.
#[derive(Debug, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<u32>,
}

/// The full product set, keyed by product id. Loaded once per session and
/// written back wholesale on save.
#[derive(Debug, Default)]
pub struct Catalog {
    products: BTreeMap<String, Product>,
}

impl Catalog {
    /// Loads the catalog from a CSV file. A missing file is an empty catalog,
    /// not an error. Rows that fail to parse are skipped with a diagnostic.
    pub fn load(path: &Path) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog::default();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(catalog),
            Err(e) => return Err(e.into()),
        };
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);
        for result in reader.into_deserialize::<Product>() {
            match result {
                Ok(product) => {
                    catalog.products.insert(product.id.clone(), product);
                }
                Err(e) => {
                    warn!("Failed to parse a product from the catalog file: {}. Skipping invalid record.", e);
                }
            }
        }
        Ok(catalog)
    }

    /// Writes every product back to the catalog file, replacing its contents.
    /// The header is written even when the catalog is empty.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(["id", "name", "price", "stock"])?;
        for product in self.products.values() {
            writer.serialize(product)?;
        }
        writer.flush().map_err(CatalogError::Io)
    }

    pub fn insert(&mut self, product: Product) -> Result<(), CatalogError> {
        if self.products.contains_key(&product.id) {
            return Err(CatalogError::DuplicateId(product.id));
        }
        self.products.insert(product.id.clone(), product);
        Ok(())
    }

    pub fn update(&mut self, id: &str, update: ProductUpdate) -> Result<(), CatalogError> {
        let product = self
            .products
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(price) = update.price {
            product.price = price;
        }
        if let Some(stock) = update.stock {
            product.stock = stock;
        }
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<(), CatalogError> {
        self.products
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Case-insensitive exact match on id or name; first hit in catalog order.
    pub fn find(&self, query: &str) -> Option<&Product> {
        let query = query.to_lowercase();
        self.products
            .values()
            .find(|p| p.id.to_lowercase() == query || p.name.to_lowercase() == query)
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Product> {
        self.products.get_mut(id)
    }

    pub fn low_stock(&self) -> impl Iterator<Item = &Product> {
        self.products
            .values()
            .filter(|p| p.stock < LOW_STOCK_THRESHOLD)
    }
}
