//! Public product catalog reads.

#[cfg(test)]
#[path = "catalog_test.rs"]
mod catalog_test;

use crate::net::backend::{RecordStore, StoreError};
use crate::net::types::Product;

pub const PRODUCTS_TABLE: &str = "products";
pub const CATALOG_COLUMNS: &str = "id,name,description,price,stock,image_url";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog read failed: {0}")]
    Store(#[from] StoreError),
    #[error("malformed product row: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Fetch every product visible to the caller. Row visibility is decided
/// remotely; an anonymous caller sees whatever the public policy allows.
///
/// # Errors
///
/// Returns an error if the read is rejected or a row does not parse.
pub async fn list_products(records: &dyn RecordStore) -> Result<Vec<Product>, CatalogError> {
    let rows = records.select(PRODUCTS_TABLE, CATALOG_COLUMNS).await?;
    rows.into_iter()
        .map(|row| serde_json::from_value::<Product>(row).map_err(CatalogError::from))
        .collect()
}
