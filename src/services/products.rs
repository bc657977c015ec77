//! Admin product publishing: validation, image upload, insert.
//!
//! DESIGN
//! ======
//! The image (when present) is uploaded before the row insert so the row
//! always carries its final public URL; an upload failure aborts the
//! whole operation with nothing inserted. Whether the caller may insert
//! at all is decided remotely per row.

#[cfg(test)]
#[path = "products_test.rs"]
mod products_test;

use uuid::Uuid;

use crate::net::backend::{ObjectStorage, RecordStore, StoreError};
use crate::net::types::Product;

use super::catalog::PRODUCTS_TABLE;

pub const IMAGE_BUCKET: &str = "product-images";
/// Folder inside the bucket served by the public-read policy.
const IMAGE_FOLDER: &str = "public";
const FALLBACK_EXTENSION: &str = "bin";

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("invalid product: {0}")]
    Invalid(String),
    #[error("image upload failed: {0}")]
    Upload(#[source] StoreError),
    #[error("product insert failed: {0}")]
    Insert(#[source] StoreError),
    #[error("malformed backend response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Product fields as entered in the admin form.
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
}

impl NewProduct {
    /// Mirror of the admin form rules: non-blank name, positive price,
    /// non-negative stock.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Invalid` describing the first failing field.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::Invalid("name must not be empty".to_owned()));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ProductError::Invalid("price must be greater than zero".to_owned()));
        }
        if self.stock < 0 {
            return Err(ProductError::Invalid("stock must not be negative".to_owned()));
        }
        Ok(())
    }
}

/// Image file handed in by the admin form.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn image_extension(file_name: &str) -> Option<&str> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(extension)
}

/// Collision-free storage path for an uploaded image, keeping the
/// original extension.
#[must_use]
pub fn unique_image_path(file_name: &str) -> String {
    let extension = image_extension(file_name).unwrap_or(FALLBACK_EXTENSION);
    format!("{IMAGE_FOLDER}/{}.{extension}", Uuid::new_v4())
}

/// Validate, upload the image if any, then insert the product row.
/// Returns the created product as stored by the backend.
///
/// # Errors
///
/// Returns an error on validation failure, a rejected upload or insert,
/// or an unparseable representation row.
pub async fn create_product(
    records: &dyn RecordStore,
    storage: &dyn ObjectStorage,
    new_product: &NewProduct,
    image: Option<ImageUpload>,
) -> Result<Product, ProductError> {
    new_product.validate()?;

    let image_url = match image {
        Some(image) => {
            let path = unique_image_path(&image.file_name);
            let url = storage
                .upload(IMAGE_BUCKET, &path, image.bytes, &image.content_type)
                .await
                .map_err(ProductError::Upload)?;
            Some(url)
        }
        None => None,
    };

    let record = serde_json::json!({
        "name": new_product.name,
        "description": new_product.description,
        "price": new_product.price,
        "stock": new_product.stock,
        "image_url": image_url,
    });
    let row = records
        .insert(PRODUCTS_TABLE, record)
        .await
        .map_err(ProductError::Insert)?;
    Ok(serde_json::from_value(row)?)
}
