use anyhow::{Result, bail};
use log::{debug, info, warn};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::mirror::{FileMode, TreeMirror, remove_path};
use super::naming::{legacy_library_dir, module_dir};
use super::{DeployReport, DeployStrategySelector, DeploymentTask, Strategy, TaskStatus};
use crate::config::ProjectConfig;
use crate::error::{DeployError, Warning};
use crate::finalize::PostDeployFinalizer;
use crate::package::{MapEntry, Package};
use crate::runtime::{Runtime, has_parent_traversal, is_path_under, normalize_path, relative_path_from_dir};

const SYMLINK_PROBE: &str = ".modeploy-symlink-probe";

/// Deploys packages into the target tree, one task per package.
///
/// A failing package never stops the run; its task is marked failed and the
/// next one proceeds. Nothing is rolled back.
pub struct DeployManager<'a, R: Runtime> {
    runtime: &'a R,
    config: &'a ProjectConfig,
    selector: DeployStrategySelector<'a>,
    /// Result of the symlink probe, computed on first use
    symlink_support: OnceCell<bool>,
}

impl<'a, R: Runtime> DeployManager<'a, R> {
    pub fn new(runtime: &'a R, config: &'a ProjectConfig) -> Self {
        Self {
            runtime,
            config,
            selector: DeployStrategySelector::new(config),
            symlink_support: OnceCell::new(),
        }
    }

    /// Compute the tasks for `ordered` without touching the filesystem.
    ///
    /// Materializing tasks that share a target are already failed with
    /// [`DeployError::PathCollision`].
    pub fn plan(&self, ordered: &[&Package]) -> Vec<DeploymentTask> {
        let mut tasks: Vec<DeploymentTask> = ordered
            .iter()
            .map(|package| {
                DeploymentTask::new(
                    package.name.clone(),
                    self.selector.select_strategy(package),
                    module_dir(&self.config.target_root, &package.name),
                )
            })
            .collect();

        let mut by_target: HashMap<PathBuf, Vec<usize>> = HashMap::new();
        for (index, task) in tasks.iter().enumerate() {
            if task.strategy.materializes() {
                by_target.entry(task.target.clone()).or_default().push(index);
            }
        }

        for indices in by_target.values().filter(|i| i.len() > 1) {
            for &index in indices {
                let others = indices
                    .iter()
                    .filter(|&&other| other != index)
                    .map(|&other| tasks[other].package.clone())
                    .collect();
                let task = &mut tasks[index];
                task.status = TaskStatus::Failed(DeployError::PathCollision {
                    package: task.package.clone(),
                    others,
                    path: task.target.clone(),
                });
            }
        }

        tasks
    }

    /// Deploy `ordered` in the given order.
    pub fn deploy(&self, ordered: &[&Package]) -> DeployReport {
        let mut report = DeployReport {
            tasks: self.plan(ordered),
            warnings: Vec::new(),
        };

        for (task, package) in report.tasks.iter_mut().zip(ordered) {
            if let TaskStatus::Failed(err) = &task.status {
                warn!("{}", err);
                continue;
            }
            if !task.strategy.materializes() {
                debug!("Skipping {}: nothing to deploy", package.name);
                task.status = TaskStatus::Skipped;
                continue;
            }

            info!("Deploying {} ({}) to {:?}", package.name, task.strategy, task.target);
            task.status = match self.execute(package, task, &mut report.warnings) {
                Ok(()) => TaskStatus::Succeeded,
                Err(e) => {
                    let err = DeployError::io(&package.name, &e);
                    warn!("{}", err);
                    TaskStatus::Failed(err)
                }
            };
        }

        report
    }

    /// Remove everything deployed for `package`, then request regeneration.
    /// Paths that are already absent count as success.
    pub fn undeploy(&self, package: &str) -> Result<(), DeployError> {
        let root = &self.config.target_root;
        for dir in [module_dir(root, package), legacy_library_dir(root, package)] {
            if remove_path(self.runtime, &dir).map_err(|e| DeployError::io(package, &e))? {
                info!("Removed {:?}", dir);
            }
        }
        PostDeployFinalizer::new(self.runtime).request_regeneration(root);
        Ok(())
    }

    fn execute(
        &self,
        package: &Package,
        task: &mut DeploymentTask,
        warnings: &mut Vec<Warning>,
    ) -> Result<()> {
        let entries = package.extra.map.as_deref().unwrap_or_default();
        let resolved = entries
            .iter()
            .map(|entry| self.resolve_entry(package, &task.target, entry))
            .collect::<Result<Vec<_>>>()?;

        if task.strategy == Strategy::Symlink && !self.symlinks_supported() {
            let fallback = DeployError::StrategyUnsupported {
                package: package.name.clone(),
                root: self.config.target_root.clone(),
            };
            warn!("{}", fallback);
            warnings.push(fallback);
            task.strategy = Strategy::Copy;
        }

        remove_path(self.runtime, &task.target)?;

        match task.strategy {
            Strategy::Copy | Strategy::LinkOrCopyFallback => {
                let mode = if task.strategy == Strategy::Copy {
                    FileMode::Copy
                } else {
                    FileMode::HardLinkOrCopy
                };
                let mirror = TreeMirror::new(self.runtime, mode, &package.install_path)
                    .with_ignore(&self.config.ignore_patterns(&package.name));
                self.runtime.create_dir_all(&task.target)?;
                for (source, dest) in &resolved {
                    let placed = mirror.mirror(source, dest)?;
                    debug!("Placed {} file(s) from {:?} at {:?}", placed, source, dest);
                }
            }
            Strategy::Symlink => {
                for (source, dest) in &resolved {
                    self.link_entry(&task.target, source, dest)?;
                }
            }
            Strategy::None => {}
        }
        Ok(())
    }

    /// Absolute `(source, destination)` of a map entry. Entries escaping the
    /// install path or the target directory are rejected.
    fn resolve_entry(
        &self,
        package: &Package,
        target: &Path,
        entry: &MapEntry,
    ) -> Result<(PathBuf, PathBuf)> {
        let source = relative_entry_path(&entry.source);
        let dest = relative_entry_path(&entry.target);
        if has_parent_traversal(&source) || has_parent_traversal(&dest) {
            bail!(
                "Map entry [{:?}, {:?}] leaves the package or target directory",
                entry.source,
                entry.target
            );
        }
        Ok((
            normalize_path(&package.install_path.join(source)),
            normalize_path(&target.join(dest)),
        ))
    }

    fn link_entry(&self, target: &Path, source: &Path, dest: &Path) -> Result<()> {
        if !self.runtime.exists(source) {
            bail!("Source {:?} does not exist", source);
        }
        if self.runtime.exists(dest) || self.runtime.is_symlink(dest) {
            bail!("{:?} is already deployed by another map entry", dest);
        }
        // Never create directories through a link placed by an earlier entry
        for ancestor in dest.ancestors().skip(1) {
            if !is_path_under(ancestor, target) {
                break;
            }
            if self.runtime.is_symlink(ancestor) {
                bail!("{:?} lies inside the symlinked {:?}", dest, ancestor);
            }
        }

        let parent = dest.parent().unwrap_or(target);
        self.runtime.create_dir_all(parent)?;
        let original =
            relative_path_from_dir(parent, source).unwrap_or_else(|| source.to_path_buf());
        debug!("Linking {:?} -> {:?}", dest, original);
        self.runtime.symlink(&original, dest)
    }

    fn symlinks_supported(&self) -> bool {
        *self.symlink_support.get_or_init(|| self.probe_symlinks())
    }

    /// Try to create and remove a symlink directly under the target root.
    fn probe_symlinks(&self) -> bool {
        let root = &self.config.target_root;
        let probe = root.join(SYMLINK_PROBE);
        let result = (|| -> Result<()> {
            self.runtime.create_dir_all(root)?;
            if self.runtime.is_symlink(&probe) {
                self.runtime.remove_symlink(&probe)?;
            }
            self.runtime.symlink(Path::new("."), &probe)?;
            self.runtime.remove_symlink(&probe)
        })();

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!("Symlink probe under {:?} failed: {:#}", root, e);
                false
            }
        }
    }
}

/// `""`, `"."` and `"/"` all mean the directory itself; a leading slash is
/// not an absolute path here.
fn relative_entry_path(raw: &str) -> PathBuf {
    normalize_path(Path::new(raw.trim().trim_start_matches('/')))
}
