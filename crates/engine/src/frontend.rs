//! Interface to the external frontend (parsing, type-checking, package
//! loading). The engine only consumes its output; partial success is the
//! normal case, so failing files never hide the rest of the load.

use crate::report::FileError;
use ir::PackageModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// What a frontend produced for a root path: the usable packages and the
/// per-file errors of everything that failed to parse or type-check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub packages: Vec<PackageModel>,
    pub errors: BTreeMap<String, Vec<FileError>>,
}

impl LoadOutcome {
    pub fn push_error(&mut self, file: impl Into<String>, error: FileError) {
        self.errors.entry(file.into()).or_default().push(error);
    }
}

/// A source frontend. Implementations live outside this crate.
pub trait Frontend {
    fn load(&self, root: &Path) -> anyhow::Result<LoadOutcome>;
}
