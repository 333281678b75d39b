//! Recursive content fingerprinting of compilation units.
//!
//! A unit's fingerprint is a deterministic digest over the toolchain
//! identity, the unit's canonical key, its declared build flags, the byte
//! content of every owned source file, and the fingerprints of its
//! non-standard-library dependencies. Identical inputs on the same
//! toolchain, OS, and architecture produce identical digests on every
//! machine, which is what makes cache entries shareable across a fleet.

#![warn(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::fs;

use packrat_common::{Fingerprint, FingerprintHasher};
use packrat_graph::{Graph, UnitId, UnitKind};

/// Identity of the host toolchain a graph was built against.
///
/// Probed from the toolchain itself, not compiled into this binary, so
/// digests follow the compiler actually producing the artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toolchain {
    /// Toolchain version string.
    pub version: String,
    /// Target operating system.
    pub os: String,
    /// Target architecture.
    pub arch: String,
}

/// Memoizing fingerprint computation over one graph.
///
/// Owns the per-run memo table; an indeterminate result (`None`) is
/// memoized like any other and never recomputed within the run. Build a
/// fresh context per graph build.
pub struct FingerprintContext<'g> {
    graph: &'g Graph,
    toolchain: Toolchain,
    memo: HashMap<UnitId, Option<Fingerprint>>,
}

impl<'g> FingerprintContext<'g> {
    /// Creates a context for the given graph and toolchain identity.
    pub fn new(graph: &'g Graph, toolchain: Toolchain) -> Self {
        Self {
            graph,
            toolchain,
            memo: HashMap::new(),
        }
    }

    /// Computes the unit's fingerprint, or `None` when it is indeterminate.
    ///
    /// A fingerprint is indeterminate when the unit carries a load error,
    /// when any owned source file cannot be read, or when any included
    /// dependency's fingerprint is itself indeterminate. Indeterminate
    /// units (and everything depending on them) become cache misses; the
    /// computation never raises.
    pub fn fingerprint(&mut self, id: UnitId) -> Option<Fingerprint> {
        if let Some(&memoized) = self.memo.get(&id) {
            return memoized;
        }
        let result = self.compute(id);
        self.memo.insert(id, result);
        result
    }

    fn compute(&mut self, id: UnitId) -> Option<Fingerprint> {
        let graph = self.graph;
        let unit = &graph[id];
        if unit.error.is_some() {
            return None;
        }

        let mut hasher = FingerprintHasher::new();

        // (1) Toolchain identity and the unit's canonical identity.
        hasher.update(self.toolchain.version.as_bytes());
        hasher.update(self.toolchain.os.as_bytes());
        hasher.update(self.toolchain.arch.as_bytes());
        hasher.update(unit.key.as_bytes());

        // (2) Declared build flags, category by category in provider order.
        for flag_set in &unit.flags {
            for value in &flag_set.values {
                hasher.update(value.as_bytes());
            }
        }

        // (3) Owned source files: fixed category order, lexical filename
        // order within a category, name then byte content. Content is what
        // invalidates dependents; names catch renamed-but-identical files.
        for source_set in &unit.sources {
            let mut files: Vec<&str> = source_set.files.iter().map(String::as_str).collect();
            files.sort_unstable();
            for file in files {
                hasher.update(file.as_bytes());
                let bytes = fs::read(unit.dir.join(file)).ok()?;
                hasher.update(&bytes);
            }
        }

        // (4) Dependency fingerprints, depth-first in declared-import
        // order, each reachable non-standard dependency folded in once.
        let mut seen = HashSet::new();
        if !self.hash_deps(id, &mut seen, &mut hasher) {
            return None;
        }

        Some(hasher.finish())
    }

    /// Folds dependency fingerprints into `hasher`. Returns `false` when
    /// any dependency is indeterminate, short-circuiting the whole digest.
    fn hash_deps(
        &mut self,
        id: UnitId,
        seen: &mut HashSet<UnitId>,
        hasher: &mut FingerprintHasher,
    ) -> bool {
        let graph = self.graph;
        let imports: Vec<UnitId> = graph[id].imports.clone();
        for dep in imports {
            // Standard-library units are immutable for a given toolchain
            // version; the version is already in the digest.
            if graph[dep].kind == UnitKind::Standard || !seen.insert(dep) {
                continue;
            }
            match self.fingerprint(dep) {
                Some(fp) => hasher.update(fp.as_bytes()),
                None => return false,
            }
            if !self.hash_deps(dep, seen, hasher) {
                return false;
            }
        }
        true
    }
}
