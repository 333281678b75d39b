//! `packrat restore` — relink cached artifacts back to their install paths.
//!
//! Resolution and fingerprinting mirror `save`, but staleness is not
//! consulted: an entry either exists in the store under the recomputed
//! fingerprint or it does not. A unit whose fingerprint misses, is
//! indeterminate, or has no install target reports a placeholder.

use std::error::Error;
use std::io::Write;
use std::path::Path;

use packrat_fingerprint::{FingerprintContext, Toolchain};
use packrat_graph::{resolve, MetadataProvider, UnitRequest};
use packrat_store::ArtifactStore;

use crate::golist::GoListProvider;
use crate::report;
use crate::save;
use crate::{GlobalArgs, UnitArgs};

/// Runs the `packrat restore` command against the host toolchain.
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

/// Restores with an explicit provider, store, and output sink.
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
        eprintln!("   Restoring from {}", store.dir().display());
    }

    let graph = resolve(provider, requests, cwd);
    if global.verbose {
        eprintln!("   Resolved {} unit(s)", graph.len());
    }
    let mut fingerprints = FingerprintContext::new(&graph, toolchain);

    for id in graph.report_order() {
        let unit = &graph[id];
        let relinked = match (&unit.target, fingerprints.fingerprint(id)) {
            (Some(target), Some(fp)) => store.restore(&fp, target)?.then_some(fp),
            _ => None,
        };
        match relinked {
            Some(fp) => {
                writeln!(
                    out,
                    "{}",
                    report::unit_line(Some(&fp), report::MARK_INSERTED, &unit.key)
                )?;
            }
            None => {
                writeln!(out, "{}", report::unit_line(None, report::MARK_PRESENT, &unit.key))?;
            }
        }
    }

    Ok(save::finish(&graph))
}
