//! Build metadata from the Go toolchain.
//!
//! [`GoListProvider`] shells out to `go list -json` per unit and decodes
//! the result into a [`UnitDescriptor`]. Toolchain identity is probed from
//! `go env` at construction, so fingerprints follow the compiler actually
//! producing the artifacts rather than whatever built this binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use packrat_fingerprint::Toolchain;
use packrat_graph::{FlagSet, MetadataProvider, ProviderError, SourceSet, UnitDescriptor};
use serde::Deserialize;

/// The instrumented build-variant option, mapped to `-tags race` and an
/// install suffix so instrumented artifacts land beside plain ones.
const RACE_OPTION: &str = "race";

/// One package as printed by `go list -json`.
///
/// Field names match the Go tool's output; everything is optional because
/// `go list -e` emits partial objects for broken packages.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ListedPackage {
    dir: String,
    import_path: String,
    root: String,
    target: String,
    standard: bool,
    stale: bool,

    go_files: Vec<String>,
    cgo_files: Vec<String>,
    c_files: Vec<String>,
    #[serde(rename = "CXXFiles")]
    cxx_files: Vec<String>,
    m_files: Vec<String>,
    h_files: Vec<String>,
    s_files: Vec<String>,
    swig_files: Vec<String>,
    #[serde(rename = "SwigCXXFiles")]
    swig_cxx_files: Vec<String>,
    syso_files: Vec<String>,

    #[serde(rename = "CgoCFLAGS")]
    cgo_cflags: Vec<String>,
    #[serde(rename = "CgoCPPFLAGS")]
    cgo_cppflags: Vec<String>,
    #[serde(rename = "CgoCXXFLAGS")]
    cgo_cxxflags: Vec<String>,
    #[serde(rename = "CgoLDFLAGS")]
    cgo_ldflags: Vec<String>,
    cgo_pkg_config: Vec<String>,

    imports: Vec<String>,
    test_go_files: Vec<String>,
    #[serde(rename = "XTestGoFiles")]
    x_test_go_files: Vec<String>,

    error: Option<ListedError>,
}

/// The error object `go list -e` attaches to unloadable packages.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ListedError {
    err: String,
}

/// Metadata provider backed by the host Go toolchain.
pub struct GoListProvider {
    toolchain: Toolchain,
}

impl GoListProvider {
    /// Probes the host toolchain and constructs a provider.
    ///
    /// Fails when no `go` binary is on the path; that is fatal to the
    /// invocation, not a per-unit error.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let output = Command::new("go")
            .args(["env", "GOVERSION", "GOOS", "GOARCH"])
            .output()
            .map_err(|e| format!("cannot run go: {e}"))?;
        if !output.status.success() {
            return Err(format!(
                "go env failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let mut next = || lines.next().unwrap_or("").trim().to_string();
        let toolchain = Toolchain {
            version: next(),
            os: next(),
            arch: next(),
        };
        if toolchain.version.is_empty() {
            return Err("go env returned no toolchain version".into());
        }
        Ok(Self { toolchain })
    }

    /// The probed toolchain identity.
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }
}

impl MetadataProvider for GoListProvider {
    fn describe(
        &self,
        path: &str,
        src_dir: &Path,
        options: &[String],
    ) -> Result<UnitDescriptor, ProviderError> {
        let mut cmd = Command::new("go");
        cmd.args(["list", "-json", "-e"]);
        if options.iter().any(|o| o == RACE_OPTION) {
            cmd.args(["-installsuffix", "race", "-tags", "race"]);
        }
        cmd.arg("--").arg(path);
        if src_dir.is_dir() {
            cmd.current_dir(src_dir);
        }

        let output = cmd
            .output()
            .map_err(|e| ProviderError::new(format!("cannot run go list: {e}")))?;
        if !output.status.success() {
            return Err(ProviderError::new(format!(
                "go list failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let listed: ListedPackage = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::new(format!("cannot decode go list output: {e}")))?;
        if let Some(err) = &listed.error {
            return Err(ProviderError::new(err.err.clone()));
        }

        Ok(descriptor(listed))
    }
}

/// Maps the decoded package to the provider contract.
///
/// Source categories keep the Go tool's order; only categories the
/// compiler consumes directly count as compiled. Test files are carried
/// separately so they gate rebuildability without entering fingerprints.
fn descriptor(listed: ListedPackage) -> UnitDescriptor {
    let source_set = |category: &str, files: &Vec<String>, compiled: bool| SourceSet {
        category: category.to_string(),
        files: files.clone(),
        compiled,
    };
    let flag_set = |category: &str, values: &Vec<String>| FlagSet {
        category: category.to_string(),
        values: values.clone(),
    };
    let optional_path = |s: &str| (!s.is_empty()).then(|| PathBuf::from(s));

    let uses_foreign = !listed.cgo_files.is_empty();
    let mut test_files = listed.test_go_files.clone();
    test_files.extend(listed.x_test_go_files.iter().cloned());

    UnitDescriptor {
        import_path: listed.import_path.clone(),
        dir: PathBuf::from(&listed.dir),
        root: optional_path(&listed.root),
        target: optional_path(&listed.target),
        standard: listed.standard,
        rebuild_hint: listed.stale,
        sources: vec![
            source_set("go", &listed.go_files, true),
            source_set("cgo", &listed.cgo_files, true),
            source_set("c", &listed.c_files, false),
            source_set("cxx", &listed.cxx_files, false),
            source_set("m", &listed.m_files, false),
            source_set("h", &listed.h_files, false),
            source_set("s", &listed.s_files, false),
            source_set("swig", &listed.swig_files, true),
            source_set("swigcxx", &listed.swig_cxx_files, true),
            source_set("syso", &listed.syso_files, false),
        ],
        test_files,
        flags: vec![
            flag_set("cgo_cflags", &listed.cgo_cflags),
            flag_set("cgo_cppflags", &listed.cgo_cppflags),
            flag_set("cgo_cxxflags", &listed.cgo_cxxflags),
            flag_set("cgo_ldflags", &listed.cgo_ldflags),
            flag_set("cgo_pkg_config", &listed.cgo_pkg_config),
        ],
        imports: listed.imports,
        uses_foreign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_go_list_json() {
        let json = r#"{
            "Dir": "/home/ci/src/example.com/app",
            "ImportPath": "example.com/app",
            "Root": "/home/ci",
            "Target": "/home/ci/pkg/linux_amd64/example.com/app.a",
            "Standard": false,
            "Stale": true,
            "GoFiles": ["main.go", "util.go"],
            "CgoFiles": ["ffi.go"],
            "HFiles": ["ffi.h"],
            "CgoCFLAGS": ["-O2"],
            "Imports": ["example.com/lib", "fmt"],
            "TestGoFiles": ["main_test.go"]
        }"#;
        let listed: ListedPackage = serde_json::from_str(json).unwrap();
        let desc = descriptor(listed);

        assert_eq!(desc.import_path, "example.com/app");
        assert_eq!(desc.root, Some(PathBuf::from("/home/ci")));
        assert!(desc.rebuild_hint);
        assert!(desc.uses_foreign);
        assert_eq!(desc.imports, ["example.com/lib", "fmt"]);
        assert_eq!(desc.test_files, ["main_test.go"]);

        let go = &desc.sources[0];
        assert_eq!(go.category, "go");
        assert_eq!(go.files, ["main.go", "util.go"]);
        assert!(go.compiled);
        let h = desc.sources.iter().find(|s| s.category == "h").unwrap();
        assert_eq!(h.files, ["ffi.h"]);
        assert!(!h.compiled);

        let cflags = &desc.flags[0];
        assert_eq!(cflags.category, "cgo_cflags");
        assert_eq!(cflags.values, ["-O2"]);
    }

    #[test]
    fn decode_error_object() {
        let json = r#"{
            "ImportPath": "example.com/broken",
            "Error": {"Err": "no Go files in /src/broken"}
        }"#;
        let listed: ListedPackage = serde_json::from_str(json).unwrap();
        assert_eq!(listed.error.unwrap().err, "no Go files in /src/broken");
    }

    #[test]
    fn empty_paths_become_none() {
        let listed: ListedPackage =
            serde_json::from_str(r#"{"ImportPath": "fmt", "Standard": true}"#).unwrap();
        let desc = descriptor(listed);
        assert!(desc.standard);
        assert!(desc.target.is_none());
        assert!(desc.root.is_none());
        assert!(!desc.uses_foreign);
    }
}
