//! Vesta Client - HTTP clients for the systems the sync pipeline talks to
//!
//! - [`commercetools`] - the commercetools catalog API (read side)
//! - [`algolia`] - the Algolia search API (write side)
//!
//! # Overview
//!
//! Both clients implement the capability traits from `vesta-core`
//! ([`CatalogApi`](vesta_core::CatalogApi) and [`SearchIndexApi`](vesta_core::SearchIndexApi)),
//! so the pipeline never depends on them directly. They handle authentication,
//! request building, response parsing and error mapping.

mod http;

pub mod algolia;
pub mod commercetools;

// Re-export main client types
pub use algolia::AlgoliaClient;
pub use commercetools::{CommercetoolsClient, CommercetoolsCredentials};
