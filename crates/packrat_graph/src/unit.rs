//! Compilation units and the dependency graph that owns them.
//!
//! Units live in an id-indexed arena inside [`Graph`]; every reference
//! between units is a [`UnitId`], so a canonical key maps to exactly one
//! unit instance for the lifetime of one graph build and reuse is by
//! reference, never by copy.

use std::collections::HashMap;
use std::ops::Index;
use std::path::PathBuf;

use crate::error::UnitError;

/// Opaque, copyable ID for a compilation unit within one [`Graph`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UnitId(u32);

impl UnitId {
    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// What kind of unit this is, for caching and fingerprinting decisions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnitKind {
    /// Part of the immutable toolchain distribution. Excluded from
    /// recursive fingerprint hashing.
    Standard,
    /// Resolved via a local (non-canonical) path. Identified by a
    /// pseudo-import key derived from its directory.
    Local,
    /// An ordinary workspace or third-party unit.
    Ordinary,
}

/// One category of source files owned by a unit.
///
/// Categories arrive from the metadata provider in a fixed order and keep
/// that order; file contents are fingerprinted category by category.
#[derive(Clone, Debug)]
pub struct SourceSet {
    /// Provider-assigned category name (e.g. `"go"`, `"cgo"`, `"h"`).
    pub category: String,
    /// File names relative to the unit directory.
    pub files: Vec<String>,
    /// Whether files in this category are compiled into the artifact.
    /// Categories that merely feed the build (headers, prebuilt objects)
    /// are hashed but do not make a unit rebuildable on their own.
    pub compiled: bool,
}

/// One category of declared build flags.
#[derive(Clone, Debug)]
pub struct FlagSet {
    /// Provider-assigned category name (e.g. `"cgo_cflags"`).
    pub category: String,
    /// Flag values in provider order.
    pub values: Vec<String>,
}

/// A single compilation unit in the dependency graph.
#[derive(Debug)]
pub struct Unit {
    /// Canonical key: import identity plus any build-variant qualifier
    /// (an instrumented variant is a distinct unit from the plain one).
    pub key: String,
    /// Import identity without the variant qualifier.
    pub base_path: String,
    /// Directory containing the unit's sources.
    pub dir: PathBuf,
    /// Root of the source tree this unit belongs to, if known.
    pub root: Option<PathBuf>,
    /// Install target path. Units without one cannot be cached.
    pub target: Option<PathBuf>,
    /// Standard-library / local / ordinary.
    pub kind: UnitKind,
    /// Toolchain-reported "would rebuild" flag.
    pub rebuild_hint: bool,
    /// Source files by category, in provider order.
    pub sources: Vec<SourceSet>,
    /// Test-only source files. They decide whether a unit is rebuildable
    /// at all but never participate in fingerprints or mtime checks.
    pub test_files: Vec<String>,
    /// Declared build flags by category, in provider order.
    pub flags: Vec<FlagSet>,
    /// Direct imports in declared order (explicit then implicit).
    pub imports: Vec<UnitId>,
    /// Transitive dependency closure, sorted by key.
    pub deps: Vec<UnitId>,
    /// Set when this unit or anything in its closure failed to resolve.
    pub incomplete: bool,
    /// Load/resolution error for this unit only.
    pub error: Option<UnitError>,
}

impl Unit {
    /// Returns `true` if the unit owns any compilable source at all.
    ///
    /// A unit owning none (metadata-only or binary-only) cannot be
    /// rebuilt and therefore is never considered stale.
    pub fn has_compiled_sources(&self) -> bool {
        self.sources.iter().any(|s| s.compiled && !s.files.is_empty())
            || !self.test_files.is_empty()
    }

    /// Iterates all owned source files as paths relative to the unit dir.
    pub fn source_files(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .flat_map(|s| s.files.iter().map(String::as_str))
    }
}

/// A deduplicated dependency graph of compilation units.
///
/// Built fresh for every invocation by [`resolve`](crate::resolve::resolve);
/// no state is carried between runs.
#[derive(Default)]
pub struct Graph {
    units: Vec<Unit>,
    by_key: HashMap<String, UnitId>,
    roots: Vec<UnitId>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units in the graph.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the graph holds no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The requested roots, in request order.
    pub fn roots(&self) -> &[UnitId] {
        &self.roots
    }

    /// Looks up a unit by canonical key.
    pub fn get(&self, key: &str) -> Option<&Unit> {
        self.by_key.get(key).map(|&id| &self.units[id.0 as usize])
    }

    /// Looks up a unit id by canonical key.
    pub fn lookup(&self, key: &str) -> Option<UnitId> {
        self.by_key.get(key).copied()
    }

    /// Returns the roots plus their transitive closures, deduplicated
    /// and sorted by canonical key for stable reporting.
    pub fn report_order(&self) -> Vec<UnitId> {
        let mut seen = vec![false; self.units.len()];
        let mut all = Vec::new();
        for &root in &self.roots {
            if !seen[root.0 as usize] {
                seen[root.0 as usize] = true;
                all.push(root);
            }
            for &dep in &self[root].deps {
                if !seen[dep.0 as usize] {
                    seen[dep.0 as usize] = true;
                    all.push(dep);
                }
            }
        }
        all.sort_by(|&a, &b| self[a].key.cmp(&self[b].key));
        all
    }

    /// Collects every error carried by a requested root or its closure.
    ///
    /// The graph build as a whole fails only when this is non-empty;
    /// errors elsewhere in the graph leave unaffected siblings usable.
    pub fn root_errors(&self) -> Vec<(UnitId, &UnitError)> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.units.len()];
        for &root in &self.roots {
            for id in std::iter::once(root).chain(self[root].deps.iter().copied()) {
                if seen[id.0 as usize] {
                    continue;
                }
                seen[id.0 as usize] = true;
                if let Some(err) = &self[id].error {
                    out.push((id, err));
                }
            }
        }
        out
    }

    pub(crate) fn alloc(&mut self, unit: Unit) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        self.by_key.insert(unit.key.clone(), id);
        self.units.push(unit);
        id
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.0 as usize]
    }

    pub(crate) fn push_root(&mut self, id: UnitId) {
        self.roots.push(id);
    }
}

impl Index<UnitId> for Graph {
    type Output = Unit;

    fn index(&self, id: UnitId) -> &Unit {
        &self.units[id.0 as usize]
    }
}
