//! # readstat-core
//!
//! A library for decoding an e-reader's embedded database into a reading
//! catalog and a sequence of reading events.
//!
//! This crate provides the core functionality for:
//! - Decoding the variant wire format stored in opaque blob columns
//! - Building book and article entities from content rows
//! - Reconstructing progress, finish and reading-session events from event rows
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`variant`]: Variant wire format decoding
//! - [`content`]: Content ID splitting and catalog construction
//! - [`events`]: Event dispatch and reading session stitching
//! - [`row`]: Typed rows over positional database columns
//! - [`config`]: Firmware codes, keys and thresholds
//! - [`error`]: Error types and handling
//!
//! Fetching rows is left to the caller. Each build call consumes an
//! iterator of rows and holds no state afterwards.
//!
//! ## Example
//!
//! ```
//! use readstat_core::{build_catalog, build_events, ContentRow, EventRow, VariantDecoder};
//!
//! let content = vec![Ok(ContentRow {
//!     content_id: "/mnt/onboard/b.epub".to_string(),
//!     title: "A Book".to_string(),
//!     ..ContentRow::default()
//! })];
//! let catalog = build_catalog(content)?;
//! assert_eq!(catalog.get("b.epub").unwrap().title, "A Book");
//!
//! let events = vec![Ok(EventRow {
//!     event_type: 5,
//!     last_occurrence: 1_700_000_000,
//!     content_id: "/mnt/onboard/b.epub".to_string(),
//!     ..EventRow::default()
//! })];
//! let events = build_events(events, &VariantDecoder::new())?;
//! assert_eq!(events[0].kind().as_str(), "Finish");
//! # Ok::<(), readstat_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`BlobDecoder`]: Customize how event blobs are decoded

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod row;
pub mod variant;

// Re-export primary types for convenience
pub use config::{CatalogConfig, DecoderConfig, EventCodes, ReconstructorConfig};
pub use content::{build_catalog, BookEntity, Catalog, ContentCatalog};
pub use error::{Error, Result};
pub use events::{build_events, DomainEvent, EventKind, EventReconstructor, ReadingSession};
pub use row::{ColumnValue, ContentRow, EventRow};
pub use variant::{BlobDecoder, Variant, VariantDecoder, VariantMap, VariantReader};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
