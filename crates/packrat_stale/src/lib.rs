//! Staleness evaluation over a resolved dependency graph.
//!
//! Decides, per unit, whether its installed artifact still faithfully
//! reflects its sources and dependencies, matching the host toolchain's
//! own freshness semantics. The walk reads file metadata only; it never
//! mutates anything. Results feed save/restore eligibility.

#![warn(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use packrat_graph::{Graph, UnitId};

/// Per-unit staleness flags for one evaluation.
pub struct StaleSet {
    flags: Vec<bool>,
}

impl StaleSet {
    /// Whether the unit's installed artifact is out of date.
    pub fn is_stale(&self, id: UnitId) -> bool {
        self.flags[id.as_raw() as usize]
    }
}

/// Evaluates staleness for every unit reachable from `roots`.
///
/// A post-order depth-first walk over the import graph, visiting each
/// unit once, so every unit's dependencies are decided before the unit
/// itself. Units outside the walk report as fresh.
pub fn evaluate(graph: &Graph, roots: &[UnitId]) -> StaleSet {
    // Trees containing a requested root. Units rooted elsewhere are
    // presumed fresh regardless of timestamps, which protects read-only
    // shared installations from forced rebuilds.
    let top_roots: HashSet<&PathBuf> = roots
        .iter()
        .filter_map(|&id| graph[id].root.as_ref())
        .collect();

    let mut flags = vec![false; graph.len()];
    let mut visited = vec![false; graph.len()];
    for &root in roots {
        walk(graph, root, &top_roots, &mut flags, &mut visited);
    }
    StaleSet { flags }
}

fn walk(
    graph: &Graph,
    id: UnitId,
    top_roots: &HashSet<&PathBuf>,
    flags: &mut Vec<bool>,
    visited: &mut Vec<bool>,
) {
    if visited[id.as_raw() as usize] {
        return;
    }
    visited[id.as_raw() as usize] = true;
    for &import in &graph[id].imports {
        walk(graph, import, top_roots, flags, visited);
    }
    flags[id.as_raw() as usize] = is_stale(graph, id, top_roots, flags);
}

fn is_stale(
    graph: &Graph,
    id: UnitId,
    top_roots: &HashSet<&PathBuf>,
    flags: &[bool],
) -> bool {
    let unit = &graph[id];

    // A unit that failed to load must be rebuilt to surface the failure.
    if unit.error.is_some() {
        return true;
    }

    // A unit owning no compilable source only exists as its installed
    // artifact. There is nothing to rebuild it from, so it is never stale.
    if !unit.has_compiled_sources() {
        return false;
    }

    // No install target, or the toolchain itself already says rebuild.
    let Some(target) = &unit.target else {
        return true;
    };
    if unit.rebuild_hint {
        return true;
    }

    // Completely unbuilt.
    let Some(built) = mtime(target) else {
        return true;
    };
    let newer_than_artifact =
        |path: &Path| mtime(path).map(|t| t > built).unwrap_or(true);

    // Stale if a dependency is, or if a dependency's artifact is newer.
    for &dep in &unit.deps {
        if flags[dep.as_raw() as usize] {
            return true;
        }
        if let Some(dep_target) = &graph[dep].target {
            if newer_than_artifact(dep_target) {
                return true;
            }
        }
    }

    // The artifact exists and postdates its dependencies. If the unit's
    // tree is disjoint from every requested root's tree, presume it
    // up to date no matter what the source timestamps say.
    if let Some(root) = &unit.root {
        if !top_roots.contains(root) {
            return false;
        }
    }

    for file in unit.source_files() {
        if newer_than_artifact(&unit.dir.join(file)) {
            return true;
        }
    }

    false
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
