//! Core types shared by every stowage crate.
//!
//! This crate defines:
//! - Configuration for the object store, the catalog, and the audit engine
//! - The canonical object-store layout for bundle archives and manifest trees
//! - The shared error type

pub mod config;
pub mod error;
pub mod layout;

pub use config::{AppConfig, AuditConfig, BillingScope, CatalogConfig, IndexStrategy, StorageConfig};
pub use error::{Error, Result};
pub use layout::{StoreLocation, archive_key, manifest_prefix, parse_location};
