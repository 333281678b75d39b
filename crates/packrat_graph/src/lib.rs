//! Dependency graph construction for the packrat build cache.
//!
//! This crate defines the compilation unit data model, the contract for
//! the external build metadata provider, and the cycle-safe memoizing
//! resolver that turns unit requests into a deduplicated graph with full
//! transitive import sets.

#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod resolve;
pub mod unit;

pub use error::UnitError;
pub use provider::{MetadataProvider, ProviderError, StaticProvider, UnitDescriptor};
pub use resolve::{resolve, UnitRequest};
pub use unit::{FlagSet, Graph, SourceSet, Unit, UnitId, UnitKind};
