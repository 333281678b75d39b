//! The build metadata provider contract.
//!
//! The resolver never talks to the host toolchain directly; it asks a
//! [`MetadataProvider`] to describe each unit. The CLI supplies a provider
//! that shells out to `go list -json`; [`StaticProvider`] serves prepared
//! descriptors from memory, useful for testing and for embedding prebuilt
//! metadata without invoking the toolchain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::unit::{FlagSet, SourceSet};

/// Everything the provider knows about one unit.
///
/// Descriptors are plain data: all fields are provider-computed facts,
/// and the resolver derives graph structure from them.
#[derive(Clone, Debug, Default)]
pub struct UnitDescriptor {
    /// Canonical import identity. Empty for a local path the toolchain
    /// could not map into a tree; the resolver then assigns a pseudo key.
    pub import_path: String,
    /// Directory containing the unit's sources.
    pub dir: PathBuf,
    /// Root of the source tree containing the unit, if any.
    pub root: Option<PathBuf>,
    /// Install target path; absent units cannot be cached.
    pub target: Option<PathBuf>,
    /// Whether the unit is part of the immutable toolchain distribution.
    pub standard: bool,
    /// Toolchain-computed "would rebuild" flag.
    pub rebuild_hint: bool,
    /// Source files partitioned by category, in the provider's order.
    pub sources: Vec<SourceSet>,
    /// Test-only source files.
    pub test_files: Vec<String>,
    /// Declared build-flag lists, in the provider's order.
    pub flags: Vec<FlagSet>,
    /// Direct import identities in declared order.
    pub imports: Vec<String>,
    /// Whether the unit contains foreign-function sources and therefore
    /// picks up the implicit foreign-runtime and syscall dependencies.
    pub uses_foreign: bool,
}

/// An opaque per-unit failure from the metadata provider.
///
/// Recorded as the affected unit's error; sibling resolution continues.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Description of the failure, surfaced verbatim to the user.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Supplies build metadata for compilation units.
pub trait MetadataProvider {
    /// Describes the unit named by `path`.
    ///
    /// `path` is either a canonical import identity or a local path; a
    /// local relative path is interpreted relative to `src_dir`. `options`
    /// carries the build-variant qualifiers for this resolution (e.g.
    /// `["race"]` for the instrumented variant).
    fn describe(
        &self,
        path: &str,
        src_dir: &Path,
        options: &[String],
    ) -> Result<UnitDescriptor, ProviderError>;
}

/// In-memory provider backed by a map of prepared descriptors.
///
/// Lookup is by the path handed to [`describe`](MetadataProvider::describe);
/// local relative paths are joined onto `src_dir` and matched against the
/// descriptor's directory.
#[derive(Default)]
pub struct StaticProvider {
    by_path: HashMap<String, UnitDescriptor>,
}

impl StaticProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor under its import path.
    pub fn insert(&mut self, descriptor: UnitDescriptor) {
        self.by_path
            .insert(descriptor.import_path.clone(), descriptor);
    }

    /// Registers a descriptor under an explicit lookup path, for local
    /// paths that differ from the canonical identity.
    pub fn insert_as(&mut self, path: impl Into<String>, descriptor: UnitDescriptor) {
        self.by_path.insert(path.into(), descriptor);
    }
}

impl MetadataProvider for StaticProvider {
    fn describe(
        &self,
        path: &str,
        _src_dir: &Path,
        _options: &[String],
    ) -> Result<UnitDescriptor, ProviderError> {
        self.by_path
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::new(format!("unknown unit {path:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_lookup() {
        let mut p = StaticProvider::new();
        p.insert(UnitDescriptor {
            import_path: "example.com/a".to_string(),
            dir: PathBuf::from("/src/a"),
            ..Default::default()
        });

        let desc = p
            .describe("example.com/a", Path::new("/src"), &[])
            .unwrap();
        assert_eq!(desc.dir, PathBuf::from("/src/a"));

        let err = p.describe("example.com/b", Path::new("/src"), &[]);
        assert!(err.is_err());
        assert!(err.unwrap_err().to_string().contains("example.com/b"));
    }

    #[test]
    fn insert_as_aliases_local_path() {
        let mut p = StaticProvider::new();
        p.insert_as(
            "./lib",
            UnitDescriptor {
                import_path: String::new(),
                dir: PathBuf::from("/work/lib"),
                ..Default::default()
            },
        );
        assert!(p.describe("./lib", Path::new("/work"), &[]).is_ok());
    }
}
