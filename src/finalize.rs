//! Side effects run after deployment: permission fix-ups, the vendor path
//! pointer and the regeneration sentinel.

use anyhow::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::{DeployError, Warning};
use crate::package::{ChmodRule, Package};
use crate::runtime::{Runtime, has_parent_traversal, shortest_path_from_dir};

const VAR_DIR: &str = "var";
const REGENERATE_SENTINEL: &str = ".regenerate";

pub struct PostDeployFinalizer<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> PostDeployFinalizer<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Apply every package's `chmod` rules below `target_root`.
    ///
    /// Rules are validated before anything is touched; a rejected rule
    /// produces a warning and no chmod.
    pub fn apply_permissions(&self, packages: &[&Package], target_root: &Path) -> Vec<Warning> {
        let mut warnings = Vec::new();
        for package in packages {
            for rule in &package.extra.chmod {
                if let Err(warning) = self.apply_rule(package, rule, target_root) {
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }
        warnings
    }

    fn apply_rule(&self, package: &Package, rule: &ChmodRule, target_root: &Path) -> Result<(), Warning> {
        let invalid = |reason: &str| DeployError::PermissionRuleInvalid {
            package: package.name.clone(),
            path: rule.path.clone().unwrap_or_default(),
            reason: reason.to_string(),
        };

        let (Some(path), Some(_)) = (rule.path.as_deref(), rule.mask.as_deref()) else {
            return Err(invalid("both path and mask are required"));
        };
        let relative = Path::new(path);
        if path.is_empty() || has_parent_traversal(relative) {
            return Err(invalid("path must stay inside the application root"));
        }
        let Some(mode) = rule.mode() else {
            return Err(invalid("mask is not an octal mode"));
        };

        let file = target_root.join(relative);
        if !self.runtime.exists(&file) {
            return Err(invalid("file does not exist"));
        }

        debug!("chmod {:o} {:?}", mode, file);
        self.runtime
            .set_permissions(&file, mode)
            .map_err(|e| DeployError::io(&package.name, &e))
    }

    /// Touch `<target_root>/var/.regenerate` so the application rebuilds its
    /// generated caches. Silently does nothing when `var` is not writable.
    /// Returns whether the sentinel was written.
    pub fn request_regeneration(&self, target_root: &Path) -> bool {
        let var = target_root.join(VAR_DIR);
        if !self.runtime.is_writable(&var) {
            debug!("{:?} is not writable, skipping regeneration request", var);
            return false;
        }
        match self.runtime.touch(&var.join(REGENERATE_SENTINEL)) {
            Ok(()) => true,
            Err(e) => {
                debug!("Failed to request regeneration: {:#}", e);
                false
            }
        }
    }

    /// Write `<target_root>/app/etc/vendor_path.php` pointing at `vendor_dir`,
    /// relative to the target root where possible.
    ///
    /// Both directories are resolved first, so a symlinked vendor dir is
    /// recorded by where it really lives.
    pub fn save_vendor_path(&self, target_root: &Path, vendor_dir: &Path) -> Result<PathBuf> {
        let resolve = |path: &Path| {
            self.runtime
                .canonicalize(path)
                .unwrap_or_else(|_| path.to_path_buf())
        };
        let relative = shortest_path_from_dir(&resolve(target_root), &resolve(vendor_dir));
        let relative = relative.to_string_lossy().replace('\\', "/");

        let etc = target_root.join("app").join("etc");
        self.runtime.create_dir_all(&etc)?;
        let file = etc.join("vendor_path.php");
        self.runtime
            .write(&file, vendor_path_file(&relative).as_bytes())?;
        info!("Wrote vendor path {:?} to {:?}", relative, file);
        Ok(file)
    }
}

fn vendor_path_file(relative: &str) -> String {
    let quoted = relative.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "<?php\n/**\n * Path to Composer vendor directory\n */\nreturn '{}';\n",
        quoted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageExtra;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn with_rules(rules: Vec<ChmodRule>) -> Package {
        Package::new("acme/module-foo", "/shop/vendor/acme/module-foo").with_extra(PackageExtra {
            chmod: rules,
            ..Default::default()
        })
    }

    #[test]
    fn test_traversal_rule_is_rejected_without_chmod() {
        let mut runtime = MockRuntime::new();
        runtime.expect_set_permissions().never();
        runtime.expect_exists().never();

        let package = with_rules(vec![ChmodRule::new("../../etc/passwd", "0644")]);
        let warnings = PostDeployFinalizer::new(&runtime).apply_permissions(&[&package], Path::new("/shop"));

        assert_eq!(
            warnings,
            vec![DeployError::PermissionRuleInvalid {
                package: "acme/module-foo".to_string(),
                path: "../../etc/passwd".to_string(),
                reason: "path must stay inside the application root".to_string(),
            }]
        );
    }

    #[test]
    fn test_invalid_rules_are_each_reported() {
        let mut runtime = MockRuntime::new();
        runtime.expect_set_permissions().never();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/shop/bin/missing")))
            .returning(|_| false);

        let package = with_rules(vec![
            ChmodRule {
                path: Some("bin/magento".to_string()),
                mask: None,
            },
            ChmodRule::new("/etc/passwd", "0644"),
            ChmodRule::new("bin/magento", "rwx"),
            ChmodRule::new("bin/magento", "0899"),
            ChmodRule::new("bin/missing", "0755"),
        ]);
        let warnings = PostDeployFinalizer::new(&runtime).apply_permissions(&[&package], Path::new("/shop"));

        assert_eq!(warnings.len(), 5);
        assert!(
            warnings
                .iter()
                .all(|w| matches!(w, DeployError::PermissionRuleInvalid { .. }))
        );
    }

    #[test]
    fn test_valid_rule_sets_mode() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/shop/bin/magento")))
            .returning(|_| true);
        runtime
            .expect_set_permissions()
            .with(eq(PathBuf::from("/shop/bin/magento")), eq(0o755))
            .times(1)
            .returning(|_, _| Ok(()));

        let package = with_rules(vec![ChmodRule::new("bin/magento", "0755")]);
        let warnings = PostDeployFinalizer::new(&runtime).apply_permissions(&[&package], Path::new("/shop"));
        assert!(warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_permissions_on_real_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let script = dir.path().join("bin/magento");
        RealRuntime.create_dir_all(script.parent().unwrap()).unwrap();
        RealRuntime.write(&script, b"#!/bin/sh\n").unwrap();

        let package = with_rules(vec![ChmodRule::new("bin/magento", "750")]);
        let warnings = PostDeployFinalizer::new(&RealRuntime).apply_permissions(&[&package], dir.path());

        assert!(warnings.is_empty());
        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn test_request_regeneration_touches_sentinel() {
        let dir = tempdir().unwrap();
        RealRuntime.create_dir_all(&dir.path().join("var")).unwrap();

        assert!(PostDeployFinalizer::new(&RealRuntime).request_regeneration(dir.path()));
        assert!(RealRuntime.exists(&dir.path().join("var/.regenerate")));
        // Touching again is fine
        assert!(PostDeployFinalizer::new(&RealRuntime).request_regeneration(dir.path()));
    }

    #[test]
    fn test_request_regeneration_skips_without_var() {
        let dir = tempdir().unwrap();
        assert!(!PostDeployFinalizer::new(&RealRuntime).request_regeneration(dir.path()));
        assert!(!RealRuntime.exists(&dir.path().join("var")));
    }

    #[test]
    fn test_request_regeneration_skips_unwritable_var() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_writable()
            .with(eq(PathBuf::from("/shop/var")))
            .returning(|_| false);
        runtime.expect_touch().never();

        assert!(!PostDeployFinalizer::new(&runtime).request_regeneration(Path::new("/shop")));
    }

    #[test]
    fn test_save_vendor_path() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("htdocs");
        let vendor = dir.path().join("vendor");

        let file = PostDeployFinalizer::new(&RealRuntime)
            .save_vendor_path(&root, &vendor)
            .unwrap();

        assert_eq!(file, root.join("app/etc/vendor_path.php"));
        assert_eq!(
            RealRuntime.read_to_string(&file).unwrap(),
            "<?php\n/**\n * Path to Composer vendor directory\n */\nreturn '../vendor';\n"
        );
    }

    #[test]
    fn test_save_vendor_path_inside_root() {
        let dir = tempdir().unwrap();
        RealRuntime.create_dir_all(&dir.path().join("vendor")).unwrap();

        let file = PostDeployFinalizer::new(&RealRuntime)
            .save_vendor_path(dir.path(), &dir.path().join("vendor"))
            .unwrap();
        assert!(RealRuntime.read_to_string(&file).unwrap().contains("return './vendor';"));

        let file = PostDeployFinalizer::new(&RealRuntime)
            .save_vendor_path(dir.path(), dir.path())
            .unwrap();
        assert!(RealRuntime.read_to_string(&file).unwrap().contains("return './';"));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_vendor_path_resolves_symlinked_vendor() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("shop");
        RealRuntime.create_dir_all(&root).unwrap();
        RealRuntime.create_dir_all(&dir.path().join("deps")).unwrap();
        RealRuntime
            .symlink(Path::new("../deps"), &root.join("vendor"))
            .unwrap();

        let file = PostDeployFinalizer::new(&RealRuntime)
            .save_vendor_path(&root, &root.join("vendor"))
            .unwrap();
        assert!(RealRuntime.read_to_string(&file).unwrap().contains("return '../deps';"));
    }

    #[test]
    fn test_save_vendor_path_keeps_absolute_across_root() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_canonicalize()
            .returning(|p| Ok(p.to_path_buf()));
        runtime
            .expect_create_dir_all()
            .with(eq(PathBuf::from("/srv/shop/app/etc")))
            .returning(|_| Ok(()));
        runtime
            .expect_write()
            .withf(|path, contents| {
                path == Path::new("/srv/shop/app/etc/vendor_path.php")
                    && String::from_utf8_lossy(contents).contains("return '/opt/vendor';")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        PostDeployFinalizer::new(&runtime)
            .save_vendor_path(Path::new("/srv/shop"), Path::new("/opt/vendor"))
            .unwrap();
    }

    #[test]
    fn test_vendor_path_file_escapes_quotes() {
        assert!(vendor_path_file("it's/vendor").contains("return 'it\\'s/vendor';"));
        assert!(vendor_path_file("./").contains("return './';"));
    }
}
