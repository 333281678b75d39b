//! Durable content-addressed storage for build artifacts.
//!
//! The store is a flat directory of immutable blobs, each named by the
//! lowercase hex digest of the unit it was saved for. No sharding, no
//! manifest, no sidecar metadata. Concurrent invocations sharing the
//! directory (parallel CI jobs on one cache volume) are safe: the
//! content-addressing invariant means two entries under the same name are
//! byte-identical, so "destination already exists" always resolves as
//! success.

#![warn(missing_docs)]

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{ArtifactStore, PutOutcome};
