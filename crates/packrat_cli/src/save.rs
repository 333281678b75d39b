//! `packrat save` — stash installed artifacts into the cache.
//!
//! Resolves the requested units into a graph, evaluates staleness, and for
//! every fresh unit with an installed artifact computes its fingerprint
//! and inserts the artifact into the store. Stale, targetless, and
//! indeterminate units report a placeholder instead of a digest.

use std::error::Error;
use std::io::Write;
use std::path::Path;

use packrat_fingerprint::{FingerprintContext, Toolchain};
use packrat_graph::{resolve, Graph, MetadataProvider, UnitRequest};
use packrat_stale::evaluate;
use packrat_store::{ArtifactStore, PutOutcome};

use crate::golist::GoListProvider;
use crate::report;
use crate::{GlobalArgs, UnitArgs};

/// Runs the `packrat save` command against the host toolchain.
pub fn run(args: &UnitArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let provider = GoListProvider::new()?;
    let toolchain = provider.toolchain().clone();
    let store = ArtifactStore::new(&crate::cache_dir());
    let cwd = std::env::current_dir()?;
    run_with(
        &provider,
        toolchain,
        &store,
        &args.requests(),
        &cwd,
        global,
        &mut std::io::stdout().lock(),
    )
}

/// Saves with an explicit provider, store, and output sink.
pub(crate) fn run_with(
    provider: &dyn MetadataProvider,
    toolchain: Toolchain,
    store: &ArtifactStore,
    requests: &[UnitRequest],
    cwd: &Path,
    global: &GlobalArgs,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    if !global.quiet {
        eprintln!("   Saving to {}", store.dir().display());
    }

    let graph = resolve(provider, requests, cwd);
    if global.verbose {
        eprintln!("   Resolved {} unit(s)", graph.len());
    }
    let stale = evaluate(&graph, graph.roots());
    let mut fingerprints = FingerprintContext::new(&graph, toolchain);

    for id in graph.report_order() {
        let unit = &graph[id];
        let fingerprint = match &unit.target {
            Some(target) if !stale.is_stale(id) => {
                fingerprints.fingerprint(id).map(|fp| (fp, target.clone()))
            }
            _ => None,
        };
        match fingerprint {
            Some((fp, target)) => {
                let marker = match store.put(&fp, &target)? {
                    PutOutcome::Inserted => report::MARK_INSERTED,
                    PutOutcome::AlreadyPresent => report::MARK_PRESENT,
                };
                writeln!(out, "{}", report::unit_line(Some(&fp), marker, &unit.key))?;
            }
            None => {
                writeln!(out, "{}", report::unit_line(None, report::MARK_PRESENT, &unit.key))?;
            }
        }
    }

    Ok(finish(&graph))
}

/// Surfaces errors carried by the requested roots' closures and picks the
/// exit code: unaffected siblings were still reported above, but the run
/// fails when any requested root is incomplete.
pub(crate) fn finish(graph: &Graph) -> i32 {
    let errors = graph.root_errors();
    for (_, err) in &errors {
        eprintln!("packrat: {}", err.render());
    }
    if errors.is_empty() {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore;
    use filetime::{set_file_mtime, FileTime};
    use packrat_graph::{SourceSet, StaticProvider, UnitDescriptor};
    use std::time::{Duration, SystemTime};

    fn toolchain() -> Toolchain {
        Toolchain {
            version: "go1.24.1".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
        }
    }

    fn quiet() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
        }
    }

    /// A built unit on disk: one source (old mtime) and one installed
    /// artifact (newer mtime).
    fn built_unit(root: &Path, path: &str, imports: &[&str]) -> UnitDescriptor {
        let dir = root.join("src").join(path);
        std::fs::create_dir_all(&dir).unwrap();
        let source = dir.join("unit.go");
        std::fs::write(&source, format!("package {path}\n")).unwrap();
        let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
        set_file_mtime(&source, old).unwrap();

        let target = root.join("pkg").join(format!("{path}.a"));
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, format!("artifact for {path}")).unwrap();

        UnitDescriptor {
            import_path: path.to_string(),
            dir,
            root: Some(root.to_path_buf()),
            target: Some(target),
            sources: vec![SourceSet {
                category: "go".to_string(),
                files: vec!["unit.go".to_string()],
                compiled: true,
            }],
            imports: imports.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Ages the chain's artifacts so dependencies predate dependents.
    fn chain(root: &Path) -> StaticProvider {
        let mut p = StaticProvider::new();
        let x = built_unit(root, "x", &[]);
        let y = built_unit(root, "y", &["x"]);
        let z = built_unit(root, "z", &["y"]);
        for (desc, age) in [(&x, 30u64), (&y, 20), (&z, 10)] {
            let t = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(age));
            set_file_mtime(desc.target.as_ref().unwrap(), t).unwrap();
        }
        p.insert(x);
        p.insert(y);
        p.insert(z);
        p
    }

    fn run_save(
        provider: &StaticProvider,
        store: &ArtifactStore,
        requests: &[UnitRequest],
        cwd: &Path,
    ) -> (i32, Vec<String>) {
        let mut out = Vec::new();
        let code = run_with(provider, toolchain(), store, requests, cwd, &quiet(), &mut out)
            .unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        (code, lines)
    }

    fn run_restore(
        provider: &StaticProvider,
        store: &ArtifactStore,
        requests: &[UnitRequest],
        cwd: &Path,
    ) -> (i32, Vec<String>) {
        let mut out = Vec::new();
        let code = restore::run_with(
            provider,
            toolchain(),
            store,
            requests,
            cwd,
            &quiet(),
            &mut out,
        )
        .unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        (code, lines)
    }

    fn digest_of(line: &str) -> &str {
        line[..32].trim_end()
    }

    #[test]
    fn save_then_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = chain(dir.path());
        let store = ArtifactStore::new(&dir.path().join("cache"));
        let requests = vec![UnitRequest::parse("z")];

        // Save: three distinct fingerprints, three fresh inserts.
        let (code, lines) = run_save(&provider, &store, &requests, dir.path());
        assert_eq!(code, 0);
        assert_eq!(lines.len(), 3);
        let saved: Vec<String> = lines.iter().map(|l| digest_of(l).to_string()).collect();
        assert!(saved.iter().all(|d| d != "-"), "all units saved: {lines:?}");
        assert_eq!(
            {
                let mut unique = saved.clone();
                unique.sort();
                unique.dedup();
                unique.len()
            },
            3,
            "fingerprints are distinct"
        );
        assert!(lines.iter().all(|l| l.contains('*')), "fresh inserts marked");
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 3);

        // Saving again finds every entry already present.
        let (_, again) = run_save(&provider, &store, &requests, dir.path());
        assert!(again.iter().all(|l| !l.contains('*')));

        // Delete all three artifacts, then restore.
        for key in ["x", "y", "z"] {
            std::fs::remove_file(dir.path().join("pkg").join(format!("{key}.a"))).unwrap();
        }
        let before_restore = SystemTime::now() - Duration::from_secs(1);
        let (code, lines) = run_restore(&provider, &store, &requests, dir.path());
        assert_eq!(code, 0);
        let restored: Vec<String> = lines.iter().map(|l| digest_of(l).to_string()).collect();
        assert_eq!(restored, saved, "restore recomputes the saved fingerprints");

        for key in ["x", "y", "z"] {
            let target = dir.path().join("pkg").join(format!("{key}.a"));
            let content = std::fs::read_to_string(&target).unwrap();
            assert_eq!(content, format!("artifact for {key}"));
            let mtime = std::fs::metadata(&target).unwrap().modified().unwrap();
            assert!(mtime >= before_restore, "restored artifact mtime is now");
        }
    }

    #[test]
    fn edit_after_save_misses_the_whole_dependent_chain() {
        let dir = tempfile::tempdir().unwrap();
        let provider = chain(dir.path());
        let store = ArtifactStore::new(&dir.path().join("cache"));
        let requests = vec![UnitRequest::parse("z")];

        let (code, _) = run_save(&provider, &store, &requests, dir.path());
        assert_eq!(code, 0);

        // Edit x's source after save, keeping its old mtime so only the
        // content differs.
        let x_source = dir.path().join("src/x/unit.go");
        std::fs::write(&x_source, "package x // edited\n").unwrap();
        let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
        set_file_mtime(&x_source, old).unwrap();

        let (code, lines) = run_restore(&provider, &store, &requests, dir.path());
        assert_eq!(code, 0);
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_eq!(
                digest_of(line),
                "-",
                "every unit transitively including x's content misses: {line}"
            );
        }
    }

    #[test]
    fn stale_and_targetless_units_report_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = StaticProvider::new();
        let mut local = built_unit(dir.path(), "tools", &[]);
        local.target = None;
        provider.insert(local);
        let mut dirty = built_unit(dir.path(), "dirty", &[]);
        dirty.rebuild_hint = true;
        provider.insert(dirty);

        let store = ArtifactStore::new(&dir.path().join("cache"));
        let requests = vec![UnitRequest::parse("tools"), UnitRequest::parse("dirty")];
        let (code, lines) = run_save(&provider, &store, &requests, dir.path());
        assert_eq!(code, 0);
        assert!(lines.iter().all(|l| digest_of(l) == "-"), "{lines:?}");
        assert!(!store.dir().exists() || std::fs::read_dir(store.dir()).unwrap().count() == 0);
    }

    #[test]
    fn load_errors_fail_the_run_but_siblings_still_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = StaticProvider::new();
        provider.insert(built_unit(dir.path(), "ok", &[]));
        provider.insert(built_unit(dir.path(), "broken", &["missing"]));

        let store = ArtifactStore::new(&dir.path().join("cache"));
        let requests = vec![UnitRequest::parse("broken"), UnitRequest::parse("ok")];
        let (code, lines) = run_save(&provider, &store, &requests, dir.path());
        assert_eq!(code, 1, "a requested root's closure carries an error");

        let ok_line = lines.iter().find(|l| l.ends_with("ok")).unwrap();
        assert_ne!(digest_of(ok_line), "-", "the unaffected sibling still saved");
    }
}
