use std::sync::Arc;

use tracing::{debug, instrument};

use crate::api::SearchIndexApi;
use crate::error::{AppError, IndexError, IndexOperation};
use crate::models::{IndexConfig, SearchRecord};

/// Keeps the search index configured and applies single-record writes.
///
/// All three operations are safe to repeat: the pipeline sees at-least-once delivery.
#[derive(Clone)]
pub struct IndexManager {
    api: Arc<dyn SearchIndexApi>,
}

impl IndexManager {
    pub fn new(api: Arc<dyn SearchIndexApi>) -> Self {
        Self { api }
    }

    /// Creates the index with `config.settings` if the search engine reports it missing.
    ///
    /// Only an explicit not-found triggers creation; any other failure to read the settings
    /// is returned as an error. Existing settings are left untouched. A conflict while creating
    /// means another worker won the race and counts as success.
    #[instrument(skip(self, config), fields(index = %config.name))]
    pub async fn ensure_index(&self, config: &IndexConfig) -> Result<(), IndexError> {
        config.validate()?;

        let existing = self
            .api
            .get_settings(&config.name)
            .await
            .map_err(|cause| {
                IndexError::remote(&config.name, IndexOperation::ReadSettings, cause)
            })?;

        if existing.is_some() {
            debug!("Index already exists. No changes to configuration.");
            return Ok(());
        }

        match self.api.set_settings(&config.name, &config.settings).await {
            Ok(()) => {
                debug!(
                    settings = config.settings.len(),
                    "Index created with configuration"
                );
                Ok(())
            }
            Err(AppError::Conflict(msg)) => {
                debug!(reason = %msg, "Index was created concurrently");
                Ok(())
            }
            Err(cause) => Err(IndexError::remote(
                &config.name,
                IndexOperation::CreateIndex,
                cause,
            )),
        }
    }

    /// Writes `record`, overwriting any record with the same object id.
    #[instrument(
        skip(self, config, record),
        fields(index = %config.name, object_id = %record.object_id)
    )]
    pub async fn upsert(
        &self,
        config: &IndexConfig,
        record: &SearchRecord,
    ) -> Result<(), IndexError> {
        config.validate()?;
        self.api
            .put_record(&config.name, record)
            .await
            .map_err(|cause| IndexError::remote(&config.name, IndexOperation::PutRecord, cause))?;
        debug!("Record saved");
        Ok(())
    }

    /// Deletes the record for `entity_id`. Deleting a record that is not there succeeds.
    #[instrument(skip(self, config), fields(index = %config.name))]
    pub async fn remove(&self, config: &IndexConfig, entity_id: &str) -> Result<(), IndexError> {
        config.validate()?;
        match self.api.delete_record(&config.name, entity_id).await {
            Ok(()) => {
                debug!("Record removed");
                Ok(())
            }
            Err(AppError::NotFound(_)) => {
                debug!("Record was not in the index");
                Ok(())
            }
            Err(cause) => Err(IndexError::remote(
                &config.name,
                IndexOperation::DeleteRecord,
                cause,
            )),
        }
    }
}
