//! Immutable per-run state shared by every component.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use crate::config::ProjectConfig;
use crate::deploy::SortPriorityResolver;
use crate::package::{Package, PackageCatalog};
use crate::runtime::Runtime;

/// Configuration and catalog of one run. Built once, then only borrowed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub config: ProjectConfig,
    pub catalog: PackageCatalog,
}

impl RunContext {
    pub fn new(config: ProjectConfig, catalog: PackageCatalog) -> Self {
        Self { config, catalog }
    }

    /// Read `composer.json` from `project_dir` and the installed package list
    /// from the configured vendor directory.
    pub fn load<R: Runtime>(runtime: &R, project_dir: &Path) -> Result<Self> {
        let config = ProjectConfig::load(runtime, project_dir)
            .with_context(|| format!("Failed to load project configuration from {:?}", project_dir))?;
        let catalog = PackageCatalog::load(runtime, &config.vendor_dir)
            .context("Failed to load installed packages")?;
        debug!(
            "Loaded {} package(s), target root {:?}",
            catalog.len(),
            config.target_root
        );
        Ok(Self { config, catalog })
    }

    /// Catalog packages in deployment order.
    pub fn ordered_packages(&self) -> Vec<&Package> {
        SortPriorityResolver::new(&self.config.sort_priority).resolve(self.catalog.packages())
    }

    /// Catalog packages in catalog order.
    pub fn packages(&self) -> Vec<&Package> {
        self.catalog.packages().iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ProjectFixture;

    #[test]
    fn test_load_orders_packages_by_priority() {
        let mut fixture = ProjectFixture::new(
            r#"{"extra": {"magento-deploy-sort-priority": {"acme/module-b": 5, "acme/module-a": 10}}}"#,
        );
        fixture.install("acme/module-a", r#"{"map": [["", ""]]}"#);
        fixture.install("acme/module-b", r#"{"map": [["", ""]]}"#);
        fixture.install("acme/module-c", "null");
        fixture.write_installed_json();

        let ctx = fixture.context();
        let names: Vec<&str> = ctx.ordered_packages().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["acme/module-b", "acme/module-a", "acme/module-c"]);
        assert_eq!(ctx.packages().len(), 3);
    }

    #[test]
    fn test_load_empty_project() {
        let fixture = ProjectFixture::new("{}");
        let ctx = fixture.context();
        assert!(ctx.catalog.is_empty());
        assert_eq!(ctx.config.target_root, fixture.root());
    }

    #[test]
    fn test_load_rejects_malformed_composer_json() {
        let fixture = ProjectFixture::new("{not json");
        let err = RunContext::load(&crate::runtime::RealRuntime, &fixture.root()).unwrap_err();
        assert!(format!("{:#}", err).contains("composer.json"));
    }
}
