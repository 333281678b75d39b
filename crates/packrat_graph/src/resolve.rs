//! Cycle-safe memoized graph resolution.
//!
//! A [`ResolveContext`] is owned by one graph build and carries every piece
//! of mutable resolution state: the graph under construction, a per-key
//! three-state resolution status, and the current import stack. Multiple
//! independent graph builds in one process never share state.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::error::UnitError;
use crate::provider::{MetadataProvider, UnitDescriptor};
use crate::unit::{Graph, Unit, UnitId, UnitKind};

/// Implicit dependency of units containing foreign-function sources.
const FOREIGN_RUNTIME: &str = "runtime/cgo";

/// Implicit dependency of foreign-function units, wrapping OS errno.
const OS_SUPPORT: &str = "syscall";

/// Implicit dependency of every unit built under the instrumented variant.
const RACE_RUNTIME: &str = "runtime/race";

// Standard-library units excluded from the implicit edges above, because
// they are the units providing that support and the edge would be a cycle.
const FOREIGN_EXCLUDE: &[&str] = &["runtime/cgo"];
const OS_SUPPORT_EXCLUDE: &[&str] = &["runtime/cgo", "runtime/race"];
const RACE_EXCLUDE: &[&str] = &["runtime/race", "runtime/cgo", "cmd/cgo", "syscall", "errors"];

/// The instrumented build-variant option name.
const RACE_OPTION: &str = "race";

/// One requested unit: a path plus optional build-variant options.
///
/// The textual form is `path` or `path:opt1,opt2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitRequest {
    /// Local path or canonical import identity.
    pub path: String,
    /// Build-variant options qualifying every unit in this resolution.
    pub options: Vec<String>,
}

impl UnitRequest {
    /// Parses a request of the form `path[:opt1,opt2]`.
    pub fn parse(arg: &str) -> Self {
        match arg.split_once(':') {
            Some((path, opts)) => Self {
                path: path.to_string(),
                options: opts.split(',').map(str::to_string).collect(),
            },
            None => Self {
                path: arg.to_string(),
                options: Vec::new(),
            },
        }
    }
}

/// Resolution status of one canonical key within a single graph build.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ResolveState {
    /// Never requested.
    Unvisited,
    /// Resolution has started and is still unwinding; a repeat visit
    /// through this state is an import cycle.
    InProgress(UnitId),
    /// Fully resolved.
    Resolved(UnitId),
}

/// Stack of canonical keys from a requested unit to the one being resolved.
#[derive(Default)]
struct ImportStack {
    entries: Vec<String>,
}

impl ImportStack {
    fn push(&mut self, key: String) {
        self.entries.push(key);
    }

    fn pop(&mut self) {
        self.entries.pop();
    }

    fn snapshot(&self) -> Vec<String> {
        self.entries.clone()
    }

    /// Whether this stack is a shorter import path than `other`.
    /// Equal lengths tie-break by lexicographic comparison, so the
    /// recorded diagnostic path is deterministic across traversal orders.
    fn shorter_than(&self, other: &[String]) -> bool {
        if self.entries.len() != other.len() {
            return self.entries.len() < other.len();
        }
        for (a, b) in self.entries.iter().zip(other) {
            if a != b {
                return a < b;
            }
        }
        false
    }
}

/// Resolves unit requests into a dependency graph.
///
/// Local relative request paths are interpreted relative to `cwd`. Every
/// failure short of a provider panic is recorded on the affected unit;
/// callers decide overall success from [`Graph::root_errors`].
pub fn resolve(
    provider: &dyn MetadataProvider,
    requests: &[UnitRequest],
    cwd: &Path,
) -> Graph {
    let mut ctx = ResolveContext {
        provider,
        graph: Graph::new(),
        status: BTreeMap::new(),
        stack: ImportStack::default(),
        options: Vec::new(),
    };

    let mut seen_requests: Vec<&UnitRequest> = Vec::new();
    for request in requests {
        if seen_requests.contains(&request) {
            continue;
        }
        seen_requests.push(request);
        ctx.options = request.options.clone();
        let id = ctx.resolve_request(&request.path, cwd);
        ctx.graph.push_root(id);
    }

    ctx.graph
}

struct ResolveContext<'a> {
    provider: &'a dyn MetadataProvider,
    graph: Graph,
    status: BTreeMap<String, ResolveState>,
    stack: ImportStack,
    options: Vec<String>,
}

impl ResolveContext<'_> {
    fn state(&self, key: &str) -> ResolveState {
        self.status
            .get(key)
            .copied()
            .unwrap_or(ResolveState::Unvisited)
    }

    /// Canonical key for a base identity under the active variant options.
    fn qualified_key(&self, base: &str) -> String {
        if self.options.is_empty() {
            base.to_string()
        } else {
            format!("{base}:{}", self.options.join(","))
        }
    }

    /// Resolves a command-line request.
    ///
    /// A local path that the provider can map to a canonical identity is
    /// resolved under that identity, so the unit keeps its install target
    /// and is cacheable. A pseudo identity (`_/...`) or a bare `.` means
    /// the directory lies outside every known tree; such a unit stays
    /// local, uncacheable but still resolvable. The probed descriptor is
    /// reused either way, so each root costs one provider call.
    fn resolve_request(&mut self, path: &str, cwd: &Path) -> UnitId {
        if is_local_path(path) {
            if let Ok(desc) = self.provider.describe(path, cwd, &self.options) {
                let canonical = desc.import_path.clone();
                if !canonical.is_empty() && canonical != "." && !canonical.starts_with("_/") {
                    return self.resolve_one_with(&canonical, cwd, Some(desc));
                }
                return self.resolve_one_with(path, cwd, Some(desc));
            }
        }
        self.resolve_one(path, cwd)
    }

    /// Resolves one unit named by `path`, which is either a canonical
    /// identity or a local path relative to `src_dir`.
    fn resolve_one(&mut self, path: &str, src_dir: &Path) -> UnitId {
        self.resolve_one_with(path, src_dir, None)
    }

    fn resolve_one_with(
        &mut self,
        path: &str,
        src_dir: &Path,
        prefetched: Option<UnitDescriptor>,
    ) -> UnitId {
        let is_local = is_local_path(path);
        let base = if is_local {
            pseudo_import_path(&clean_path(&src_dir.join(path)))
        } else {
            path.to_string()
        };
        let key = self.qualified_key(&base);

        self.stack.push(key.clone());
        let id = self.resolve_keyed(path, src_dir, base, key, is_local, prefetched);
        self.stack.pop();
        id
    }

    fn resolve_keyed(
        &mut self,
        path: &str,
        src_dir: &Path,
        base: String,
        key: String,
        is_local: bool,
        prefetched: Option<UnitDescriptor>,
    ) -> UnitId {
        match self.state(&key) {
            ResolveState::Resolved(id) => {
                self.reuse(id);
                return id;
            }
            ResolveState::InProgress(id) => {
                self.mark_cycle(id);
                return id;
            }
            ResolveState::Unvisited => {}
        }

        let id = self.graph.alloc(Unit {
            key: key.clone(),
            base_path: base.clone(),
            dir: PathBuf::new(),
            root: None,
            target: None,
            kind: if is_local {
                UnitKind::Local
            } else {
                UnitKind::Ordinary
            },
            rebuild_hint: false,
            sources: Vec::new(),
            test_files: Vec::new(),
            flags: Vec::new(),
            imports: Vec::new(),
            deps: Vec::new(),
            incomplete: false,
            error: None,
        });
        self.status.insert(key.clone(), ResolveState::InProgress(id));

        let described = match prefetched {
            Some(desc) => Ok(desc),
            None => self.provider.describe(path, src_dir, &self.options),
        };
        match described {
            Ok(desc) => self.populate(id, &base, is_local, desc),
            Err(e) => {
                let unit = self.graph.unit_mut(id);
                unit.incomplete = true;
                unit.error = Some(UnitError::Metadata {
                    path: path.to_string(),
                    reason: e.message,
                    import_stack: self.stack.snapshot(),
                });
            }
        }

        self.status.insert(key, ResolveState::Resolved(id));
        id
    }

    /// Fills a freshly allocated unit from its descriptor and recursively
    /// resolves every explicit and implicit import, unioning the children's
    /// transitive sets into this unit's own.
    fn populate(&mut self, id: UnitId, base: &str, is_local: bool, desc: UnitDescriptor) {
        {
            let unit = self.graph.unit_mut(id);
            unit.dir = desc.dir.clone();
            unit.root = desc.root.clone();
            // A local unit has no permanent install target.
            unit.target = if is_local { None } else { desc.target.clone() };
            if desc.standard {
                unit.kind = UnitKind::Standard;
            }
            unit.rebuild_hint = desc.rebuild_hint;
            unit.sources = desc.sources.clone();
            unit.test_files = desc.test_files.clone();
            unit.flags = desc.flags.clone();
        }

        let mut import_paths = desc.imports.clone();
        for implicit in self.implicit_imports(base, &desc) {
            if !import_paths.iter().any(|p| p == implicit) {
                import_paths.push(implicit.to_string());
            }
        }

        let mut imports = Vec::with_capacity(import_paths.len());
        let mut deps: BTreeMap<String, UnitId> = BTreeMap::new();
        let mut incomplete = false;
        for import in &import_paths {
            // "C" is a pseudo-import satisfied by the toolchain itself.
            if import == "C" {
                continue;
            }
            let child = self.resolve_one(import, &desc.dir);
            if self.graph[child].kind == UnitKind::Local
                && !is_local
                && self.graph[id].error.is_none()
            {
                let err = UnitError::LocalImportMisuse {
                    path: import.clone(),
                    import_stack: self.stack.snapshot(),
                };
                self.graph.unit_mut(id).error = Some(err);
            }
            deps.insert(self.graph[child].key.clone(), child);
            let child_deps: Vec<UnitId> = self.graph[child].deps.clone();
            for dep in child_deps {
                deps.insert(self.graph[dep].key.clone(), dep);
            }
            if self.graph[child].incomplete {
                incomplete = true;
            }
            imports.push(child);
        }

        let unit = self.graph.unit_mut(id);
        unit.imports = imports;
        unit.deps = deps.into_values().collect();
        if incomplete || unit.error.is_some() {
            unit.incomplete = true;
        }
    }

    /// Implicit dependencies of a unit, with the fixed exclusions that
    /// keep the support-providing units themselves cycle-free.
    fn implicit_imports(&self, base: &str, desc: &UnitDescriptor) -> Vec<&'static str> {
        let excluded = |list: &[&str]| desc.standard && list.contains(&base);
        let mut out = Vec::new();
        if desc.uses_foreign {
            if !excluded(FOREIGN_EXCLUDE) {
                out.push(FOREIGN_RUNTIME);
            }
            if !excluded(OS_SUPPORT_EXCLUDE) {
                out.push(OS_SUPPORT);
            }
        }
        if self.options.iter().any(|o| o == RACE_OPTION) && !excluded(RACE_EXCLUDE) {
            out.push(RACE_RUNTIME);
        }
        out
    }

    /// Attaches an import-cycle error to a unit found mid-resolution.
    ///
    /// Existing state on the unit is kept; only the error and the
    /// incomplete flag are recorded, so resolution terminates without
    /// discarding work and without infinite recursion.
    fn mark_cycle(&mut self, id: UnitId) {
        let stack = self.stack.snapshot();
        let unit = self.graph.unit_mut(id);
        if unit.error.is_none() {
            unit.error = Some(UnitError::ImportCycle {
                import_stack: stack,
            });
        }
        unit.incomplete = true;
    }

    /// Reuses an already-resolved unit, keeping the shortest discovered
    /// import path on any non-cycle error for diagnostics.
    fn reuse(&mut self, id: UnitId) {
        let replace = match &self.graph[id].error {
            Some(UnitError::ImportCycle { .. }) | None => false,
            Some(err) => self.stack.shorter_than(err.import_stack()),
        };
        if replace {
            let stack = self.stack.snapshot();
            if let Some(err) = &mut self.graph.unit_mut(id).error {
                err.set_import_stack(stack);
            }
        }
    }
}

/// Whether a request or import path is a local path rather than a
/// canonical identity.
fn is_local_path(path: &str) -> bool {
    path == "."
        || path == ".."
        || path.starts_with("./")
        || path.starts_with("../")
        || Path::new(path).is_absolute()
}

/// Lexically normalizes a path, resolving `.` and `..` components without
/// touching the filesystem.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Pseudo-import identity for a unit outside every known source tree.
///
/// Begins with `_/` followed by the sanitized absolute directory, so local
/// imports flow through ordinary resolution under a unique canonical key.
fn pseudo_import_path(dir: &Path) -> String {
    const ILLEGAL: &str = "!\"#$%&'()*,:;<=>?[\\]^{|}`";
    let mut out = String::from("_");
    for ch in dir.to_string_lossy().chars() {
        if ch == '/' {
            out.push('/');
        } else if ch.is_whitespace() || ch.is_control() || ILLEGAL.contains(ch) {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}
