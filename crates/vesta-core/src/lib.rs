//! Vesta Core - the catalog-to-search sync pipeline.
//!
//! A push notification goes through the [`decoder`], the [`resolver`], the [`transform`]
//! step and the [`index`] manager, driven by the [`sync`] orchestrator. Remote systems are
//! reached only through the traits in [`api`].

pub mod api;
pub mod config;
pub mod decoder;
pub mod error;
pub mod index;
pub mod models;
pub mod resolver;
pub mod sync;
pub mod transform;

pub use api::{CatalogApi, SearchIndexApi};
pub use config::{
    default_index_config_path, load_index_settings, EnsureIndexPolicy, HttpConfig, SyncSettings,
    UntypedEventPolicy,
};
pub use decoder::{decode, EventDecoder, PushEnvelope};
pub use error::{AppError, DecodeError, ErrorClass, IndexError, ResolveError, SyncError};
pub use index::IndexManager;
pub use models::{
    CatalogEntity, Category, ChangeEvent, ChangeType, IndexConfig, LocalizedString, ProductType,
    ResolvedProduct, SearchRecord, Variant,
};
pub use resolver::EntityResolver;
pub use sync::{FailureDetail, SyncFailure, SyncOutcome, SyncService, SyncStage};
pub use transform::transform;
