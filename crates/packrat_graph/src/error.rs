//! Per-unit error taxonomy for graph resolution.
//!
//! These errors are attached to individual units and accumulated; they
//! never abort resolution of unrelated siblings. The run as a whole fails
//! only when a requested root or its closure carries one.

/// An error recorded against a single compilation unit.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UnitError {
    /// The build metadata provider failed to describe the unit.
    #[error("cannot load unit {path}: {reason}")]
    Metadata {
        /// The import path or local path that failed to load.
        path: String,
        /// The provider's opaque failure description.
        reason: String,
        /// Shortest known import path from a requested unit to this one.
        import_stack: Vec<String>,
    },

    /// The unit participates in an import cycle.
    #[error("import cycle not allowed")]
    ImportCycle {
        /// The import path describing the cycle.
        import_stack: Vec<String>,
    },

    /// A local-path unit was imported from a non-local unit.
    #[error("local import {path:?} in non-local unit")]
    LocalImportMisuse {
        /// The offending local import path as written.
        path: String,
        /// Import path from a requested unit to the importer.
        import_stack: Vec<String>,
    },
}

impl UnitError {
    /// The import stack recorded with this error.
    pub fn import_stack(&self) -> &[String] {
        match self {
            UnitError::Metadata { import_stack, .. }
            | UnitError::ImportCycle { import_stack }
            | UnitError::LocalImportMisuse { import_stack, .. } => import_stack,
        }
    }

    /// Replaces the recorded import stack.
    ///
    /// Used to keep the shortest discovered path for diagnostics. Cycle
    /// errors are never rewritten: their stack describes the cycle itself.
    pub(crate) fn set_import_stack(&mut self, stack: Vec<String>) {
        match self {
            UnitError::Metadata { import_stack, .. }
            | UnitError::LocalImportMisuse { import_stack, .. } => *import_stack = stack,
            UnitError::ImportCycle { .. } => {}
        }
    }

    /// Renders the error with its import chain, one hop per line.
    pub fn render(&self) -> String {
        let stack = self.import_stack();
        if stack.is_empty() {
            return self.to_string();
        }
        format!("{}\n\tunit {}", self, stack.join("\n\timports "))
    }
}
