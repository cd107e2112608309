//! Read-only catalog of resolved packages.

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{Package, PackageExtra};
use crate::error::DeployError;
use crate::runtime::{Runtime, normalize_path};

/// One entry of `vendor/composer/installed.json`.
#[derive(Deserialize, Debug)]
struct InstalledPackage {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default, rename = "type")]
    package_type: String,
    #[serde(default)]
    extra: Value,
    /// Relative to the `vendor/composer` directory
    #[serde(default, rename = "install-path")]
    install_path: Option<String>,
}

/// Newer dependency managers wrap the list in an object; older ones write a bare array.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum InstalledDocument {
    Wrapped { packages: Vec<InstalledPackage> },
    Bare(Vec<InstalledPackage>),
}

/// The resolved package set, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageCatalog {
    packages: Vec<Package>,
}

impl PackageCatalog {
    /// Build a catalog; package names must be unique.
    pub fn new(packages: Vec<Package>) -> Result<Self> {
        let mut seen = HashSet::new();
        for package in &packages {
            if !seen.insert(package.name.as_str()) {
                bail!("Package {} is listed more than once", package.name);
            }
        }
        Ok(Self { packages })
    }

    /// Path of the installed-package document inside a vendor directory.
    pub fn installed_json_path(vendor_dir: &Path) -> PathBuf {
        vendor_dir.join("composer").join("installed.json")
    }

    /// Load the catalog the dependency manager wrote into `vendor_dir`.
    ///
    /// A missing document means nothing is installed yet.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, vendor_dir: &Path) -> Result<Self> {
        let path = Self::installed_json_path(vendor_dir);
        if !runtime.exists(&path) {
            debug!("No installed package list at {:?}", path);
            return Ok(Self::default());
        }

        let content = runtime.read_to_string(&path)?;
        let document: InstalledDocument =
            serde_json::from_str(&content).map_err(|e| DeployError::Config {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let entries = match document {
            InstalledDocument::Wrapped { packages } => packages,
            InstalledDocument::Bare(packages) => packages,
        };

        let composer_dir = vendor_dir.join("composer");
        let packages = entries
            .into_iter()
            .map(|entry| {
                let install_path = match &entry.install_path {
                    Some(relative) => normalize_path(&composer_dir.join(relative)),
                    None => vendor_dir.join(&entry.name),
                };
                Package {
                    extra: PackageExtra::from_value(&entry.name, &entry.extra),
                    name: entry.name,
                    version: entry.version,
                    package_type: entry.package_type,
                    install_path,
                }
            })
            .collect();

        debug!("Loaded installed package list from {:?}", path);
        Self::new(packages).with_context(|| format!("Invalid package list in {:?}", path))
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::MapEntry;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    #[test]
    fn test_load_wrapped_document() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let vendor = dir.path().join("vendor");
        runtime.create_dir_all(&vendor.join("composer")).unwrap();
        runtime
            .write(
                &PackageCatalog::installed_json_path(&vendor),
                br#"{"packages": [
                    {"name": "acme/module-foo", "version": "1.2.0", "type": "magento2-module",
                     "install-path": "../acme/module-foo", "extra": {"map": [["", ""]]}},
                    {"name": "acme/lib-bar", "version": "0.1.0"}
                ]}"#,
            )
            .unwrap();

        let catalog = PackageCatalog::load(&runtime, &vendor).unwrap();
        assert_eq!(catalog.len(), 2);

        let foo = catalog.get("acme/module-foo").unwrap();
        assert_eq!(foo.version, "1.2.0");
        assert_eq!(foo.package_type, "magento2-module");
        assert_eq!(foo.install_path, vendor.join("acme/module-foo"));
        assert_eq!(foo.extra.map, Some(vec![MapEntry::whole_package()]));

        let bar = catalog.get("acme/lib-bar").unwrap();
        assert_eq!(bar.install_path, vendor.join("acme/lib-bar"));
        assert!(!bar.extra.has_mapping());
    }

    #[test]
    fn test_load_bare_array_document_keeps_order() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let vendor = dir.path().join("vendor");
        runtime.create_dir_all(&vendor.join("composer")).unwrap();
        runtime
            .write(
                &PackageCatalog::installed_json_path(&vendor),
                br#"[{"name": "b/two"}, {"name": "a/one"}]"#,
            )
            .unwrap();

        let catalog = PackageCatalog::load(&runtime, &vendor).unwrap();
        let names: Vec<_> = catalog.packages().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b/two", "a/one"]);
    }

    #[test]
    fn test_load_missing_document_is_empty() {
        let mut runtime = MockRuntime::new();
        let vendor = PathBuf::from("/srv/shop/vendor");
        runtime
            .expect_exists()
            .with(eq(vendor.join("composer/installed.json")))
            .returning(|_| false);

        let catalog = PackageCatalog::load(&runtime, &vendor).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_load_malformed_document_is_config_error() {
        let mut runtime = MockRuntime::new();
        let vendor = PathBuf::from("/srv/shop/vendor");
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("{not json".to_string()));

        let err = PackageCatalog::load(&runtime, &vendor).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::Config { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = PackageCatalog::new(vec![
            Package::new("acme/foo", "/a"),
            Package::new("acme/foo", "/b"),
        ]);
        assert!(result.is_err());
    }
}
