//! Sync orchestration for product change notifications.
//!
//! One call to [`SyncService::handle`] processes one push request from start to finish:
//!
//! ```text
//! Decoding -> Resolving -> Transforming -> IndexEnsuring -> Writing -> Done
//!     \___________\______________\_______________\____________\____> Failed
//! ```
//!
//! Unpublish notifications skip `Resolving` and `Transforming`; unknown notification types
//! go straight from `Decoding` to `Done`. The service holds no per-event state and can be
//! shared across concurrent requests.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::api::{CatalogApi, SearchIndexApi};
use crate::config::{EnsureIndexPolicy, SyncSettings};
use crate::decoder::{EventDecoder, PushEnvelope};
use crate::error::{
    error_chain, DecodeError, ErrorClass, IndexError, IndexOperation, ResolveError, SyncError,
};
use crate::index::IndexManager;
use crate::models::{ChangeEvent, ChangeType, IndexConfig, SearchRecord};
use crate::resolver::EntityResolver;

/// Steps of the per-notification state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Decoding,
    Resolving,
    Transforming,
    IndexEnsuring,
    Writing,
    Done,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Decoding => "decoding",
            SyncStage::Resolving => "resolving",
            SyncStage::Transforming => "transforming",
            SyncStage::IndexEnsuring => "ensuring index",
            SyncStage::Writing => "writing",
            SyncStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Successful end states of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The product record was written to the index.
    Indexed { object_id: String },
    /// The product record was removed from the index.
    Removed { object_id: String },
    /// The notification type is not one the pipeline acts on.
    Skipped { entity_id: String },
}

/// The terminal failure of a notification: the stage it stopped in plus the original error.
#[derive(Debug, thiserror::Error)]
#[error("sync failed while {stage}")]
pub struct SyncFailure {
    pub stage: SyncStage,
    /// `None` when decoding failed before an id was known.
    pub entity_id: Option<String>,
    #[source]
    pub error: SyncError,
}

/// One entry of the caller-facing error details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub message: String,
    pub referenced_by: &'static str,
}

impl SyncFailure {
    fn new(stage: SyncStage, entity_id: Option<&str>, error: impl Into<SyncError>) -> Self {
        Self {
            stage,
            entity_id: entity_id.map(str::to_string),
            error: error.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.error.class()
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }

    fn product_id(&self) -> &str {
        self.entity_id.as_deref().unwrap_or("unknown")
    }

    /// Returns a message that is safe to show to the caller.
    ///
    /// Remote failures are reduced to what was being attempted; the cause chain only goes to
    /// the log.
    pub fn user_message(&self) -> String {
        let id = self.product_id();
        match &self.error {
            SyncError::Decode(DecodeError::MissingEnvelope)
            | SyncError::Decode(DecodeError::MalformedPayload(_)) => {
                "Invalid or missing product data".to_string()
            }
            SyncError::Decode(DecodeError::MissingEntityId)
            | SyncError::Resolve(ResolveError::EntityNotFound(_)) => {
                format!("Product with ID {} not found", id)
            }
            SyncError::Resolve(ResolveError::SubResourceFailure { .. }) => {
                format!("Failed to resolve product {} from the catalog", id)
            }
            SyncError::Index(IndexError::ConfigInvalid { .. }) => {
                "Search index configuration is invalid".to_string()
            }
            SyncError::Index(IndexError::RemoteFailure { operation, .. }) => match operation {
                IndexOperation::DeleteRecord => {
                    format!("Failed to remove product {} from the search index", id)
                }
                _ => format!("Failed to index product {} in the search index", id),
            },
        }
    }

    pub fn detail(&self) -> FailureDetail {
        let id = self.product_id();
        let (message, referenced_by) = match &self.error {
            SyncError::Decode(DecodeError::MissingEnvelope)
            | SyncError::Decode(DecodeError::MalformedPayload(_)) => (
                "Product data is invalid or missing".to_string(),
                "Pub/Sub Event",
            ),
            SyncError::Decode(DecodeError::MissingEntityId)
            | SyncError::Resolve(ResolveError::EntityNotFound(_)) => {
                (format!("Product {} does not exist", id), "Product Service")
            }
            SyncError::Resolve(ResolveError::SubResourceFailure { resource, id, .. }) => {
                (format!("Failed to fetch {} {}", resource, id), "Catalog Service")
            }
            SyncError::Index(IndexError::ConfigInvalid { index, reason }) => (
                format!("Index '{}' cannot be used: {}", index, reason),
                "Search Index Service",
            ),
            SyncError::Index(IndexError::RemoteFailure {
                index, operation, ..
            }) => (
                format!("Could not {} on index '{}'", operation, index),
                "Search Index Service",
            ),
        };
        FailureDetail {
            message,
            referenced_by,
        }
    }
}

/// The sync orchestrator.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use vesta_core::{CatalogApi, SearchIndexApi, SyncService, SyncSettings};
///
/// # async fn example(
/// #     catalog: Arc<dyn CatalogApi>,
/// #     search: Arc<dyn SearchIndexApi>,
/// #     body: &[u8],
/// # ) {
/// let service = SyncService::new(catalog, search, SyncSettings::default());
/// match service.handle(body).await {
///     Ok(outcome) => println!("{:?}", outcome),
///     Err(failure) => eprintln!("{}", failure.user_message()),
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct SyncService {
    decoder: EventDecoder,
    resolver: EntityResolver,
    index: IndexManager,
    default_index: IndexConfig,
    ensure_index: EnsureIndexPolicy,
}

impl SyncService {
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        search: Arc<dyn SearchIndexApi>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            decoder: EventDecoder::new(settings.untyped_events),
            resolver: EntityResolver::new(catalog),
            index: IndexManager::new(search),
            default_index: settings.index,
            ensure_index: settings.ensure_index,
        }
    }

    /// Processes one raw push request.
    ///
    /// Writes exactly one log line for the terminal state: info on success, warn for
    /// caller faults, error (with the full cause chain) for everything else.
    pub async fn handle(&self, body: &[u8]) -> Result<SyncOutcome, SyncFailure> {
        let result = self.run(body).await;
        match &result {
            Ok(outcome) => info!(?outcome, "Notification processed"),
            Err(failure) => match failure.class() {
                ErrorClass::ClientInput | ErrorClass::NotFound => warn!(
                    stage = %failure.stage,
                    entity_id = failure.entity_id.as_deref().unwrap_or("unknown"),
                    error = %error_chain(&failure.error),
                    "Rejected notification"
                ),
                ErrorClass::Internal | ErrorClass::External => error!(
                    stage = %failure.stage,
                    entity_id = failure.entity_id.as_deref().unwrap_or("unknown"),
                    retryable = failure.is_retryable(),
                    error = %error_chain(&failure.error),
                    "Failed to sync notification"
                ),
            },
        }
        result
    }

    async fn run(&self, body: &[u8]) -> Result<SyncOutcome, SyncFailure> {
        let envelope = PushEnvelope::parse(body)
            .map_err(|e| SyncFailure::new(SyncStage::Decoding, None, e))?;
        let event = self
            .decoder
            .decode_envelope(&envelope)
            .map_err(|e| SyncFailure::new(SyncStage::Decoding, None, e))?;

        debug!(
            entity_id = event.entity_id(),
            change_type = ?event.change_type(),
            message_id = envelope.message_id().unwrap_or("-"),
            "Decoded notification"
        );

        match event.change_type() {
            ChangeType::Published => self.publish(&event, &envelope).await,
            ChangeType::Unpublished => self.unpublish(&event, &envelope).await,
            ChangeType::Unknown => {
                debug!(
                    entity_id = event.entity_id(),
                    "Ignoring notification type the pipeline does not act on"
                );
                Ok(SyncOutcome::Skipped {
                    entity_id: event.entity_id().to_string(),
                })
            }
        }
    }

    #[instrument(skip_all, fields(entity_id = event.entity_id()))]
    async fn publish(
        &self,
        event: &ChangeEvent,
        envelope: &PushEnvelope,
    ) -> Result<SyncOutcome, SyncFailure> {
        let id = Some(event.entity_id());

        // A bad per-request index override fails before any catalog call.
        let config = self
            .index_config(envelope)
            .map_err(|e| SyncFailure::new(SyncStage::IndexEnsuring, id, e))?;

        transition(SyncStage::Resolving);
        let resolved = self
            .resolver
            .resolve(event.entity_id())
            .await
            .map_err(|e| SyncFailure::new(SyncStage::Resolving, id, e))?;

        transition(SyncStage::Transforming);
        let record = SearchRecord::from(resolved);

        transition(SyncStage::IndexEnsuring);
        self.index
            .ensure_index(&config)
            .await
            .map_err(|e| SyncFailure::new(SyncStage::IndexEnsuring, id, e))?;

        transition(SyncStage::Writing);
        self.index
            .upsert(&config, &record)
            .await
            .map_err(|e| SyncFailure::new(SyncStage::Writing, id, e))?;

        transition(SyncStage::Done);
        Ok(SyncOutcome::Indexed {
            object_id: record.object_id,
        })
    }

    #[instrument(skip_all, fields(entity_id = event.entity_id()))]
    async fn unpublish(
        &self,
        event: &ChangeEvent,
        envelope: &PushEnvelope,
    ) -> Result<SyncOutcome, SyncFailure> {
        let id = Some(event.entity_id());

        transition(SyncStage::IndexEnsuring);
        let config = self
            .index_config(envelope)
            .map_err(|e| SyncFailure::new(SyncStage::IndexEnsuring, id, e))?;
        if self.ensure_index.applies_to_removal() {
            self.index
                .ensure_index(&config)
                .await
                .map_err(|e| SyncFailure::new(SyncStage::IndexEnsuring, id, e))?;
        }

        transition(SyncStage::Writing);
        self.index
            .remove(&config, event.entity_id())
            .await
            .map_err(|e| SyncFailure::new(SyncStage::Writing, id, e))?;

        transition(SyncStage::Done);
        Ok(SyncOutcome::Removed {
            object_id: event.entity_id().to_string(),
        })
    }

    fn index_config(&self, envelope: &PushEnvelope) -> Result<IndexConfig, IndexError> {
        envelope.index_config(&self.default_index)
    }
}

fn transition(stage: SyncStage) {
    debug!(stage = %stage, "Sync transition");
}
