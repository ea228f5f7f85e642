//! Capability traits for the remote collaborators.
//!
//! The pipeline only talks to the catalog and the search engine through these traits.
//! Production wiring injects the HTTP clients from `vesta-client`; tests inject fakes.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{CatalogEntity, Category, ProductType, SearchRecord};

/// Read access to the upstream product catalog.
///
/// Implementations must report a missing resource as [`AppError::NotFound`] so the resolver
/// can tell "does not exist" apart from transient failures.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn get_product(&self, id: &str) -> Result<CatalogEntity, AppError>;

    async fn get_product_type(&self, id: &str) -> Result<ProductType, AppError>;

    async fn get_category(&self, id: &str) -> Result<Category, AppError>;
}

/// Low-level operations of the search engine.
#[async_trait]
pub trait SearchIndexApi: Send + Sync {
    /// Reads the settings of `index`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(settings))` - the index exists
    /// * `Ok(None)` - the search engine explicitly reported that the index does not exist
    /// * `Err(AppError)` - anything else
    async fn get_settings(&self, index: &str) -> Result<Option<Value>, AppError>;

    /// Applies `settings` to `index`, creating it if needed.
    async fn set_settings(&self, index: &str, settings: &Map<String, Value>)
        -> Result<(), AppError>;

    /// Writes `record`, replacing any record with the same object id.
    async fn put_record(&self, index: &str, record: &SearchRecord) -> Result<(), AppError>;

    async fn delete_record(&self, index: &str, object_id: &str) -> Result<(), AppError>;
}
