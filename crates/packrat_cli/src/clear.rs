//! `packrat clear` — remove the cache directory outright.

use std::error::Error;

use packrat_store::ArtifactStore;

use crate::GlobalArgs;

/// Runs the `packrat clear` command against the configured cache directory.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let store = ArtifactStore::new(&crate::cache_dir());
    run_with(&store, global)
}

pub(crate) fn run_with(store: &ArtifactStore, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    if !global.quiet {
        eprintln!("   Clearing {}", store.dir().display());
    }
    store.clear()?;
    Ok(0)
}
