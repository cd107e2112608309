//! Resolved packages as seen by the deployment engine.
//!
//! The catalog is produced by the external dependency manager; this module
//! only reads it and exposes the metadata keys the engine understands.

mod catalog;
mod extra;

pub use catalog::PackageCatalog;
pub use extra::{ChmodRule, MapEntry, PackageExtra};

use std::path::PathBuf;

/// One resolved package. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// `vendor/name`, unique within a catalog
    pub name: String,
    pub version: String,
    /// Declared package type (e.g. `magento2-module`)
    pub package_type: String,
    /// Absolute directory the dependency manager installed the package into
    pub install_path: PathBuf,
    pub extra: PackageExtra,
}

impl Package {
    pub fn new(name: impl Into<String>, install_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            package_type: String::new(),
            install_path: install_path.into(),
            extra: PackageExtra::default(),
        }
    }

    pub fn with_extra(mut self, extra: PackageExtra) -> Self {
        self.extra = extra;
        self
    }
}
