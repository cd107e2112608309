//! Ordering, strategy selection and materialization of package files.
//!
//! # Structure
//!
//! - `naming` - Package name to target directory transform
//! - `sort` - Priority based deployment order
//! - `strategy` - Strategy selection from package and project metadata
//! - `mirror` - Recursive copy / hard-link tree mirroring
//! - `manager` - Task planning, collision detection and execution

mod manager;
pub mod mirror;
pub mod naming;
pub mod sort;
pub mod strategy;

pub use manager::DeployManager;
pub use naming::{legacy_library_dir, module_dir};
pub use sort::{DEFAULT_PRIORITY, SortPriorityResolver};
pub use strategy::{DeployStrategySelector, Strategy};

use std::path::PathBuf;

use crate::error::{DeployError, Warning};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded,
    /// Strategy `None`: nothing was touched
    Skipped,
    Failed(DeployError),
}

impl TaskStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

/// One package's deployment within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTask {
    pub package: String,
    pub strategy: Strategy,
    pub target: PathBuf,
    pub status: TaskStatus,
}

impl DeploymentTask {
    pub fn new(package: impl Into<String>, strategy: Strategy, target: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
            strategy,
            target: target.into(),
            status: TaskStatus::Pending,
        }
    }
}

/// Outcome of a deployment run, tasks in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub tasks: Vec<DeploymentTask>,
    /// Non-fatal diagnostics (strategy fallbacks, library and finalizer issues)
    pub warnings: Vec<Warning>,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        !self.tasks.iter().any(|t| t.status.is_failed())
    }

    /// `(package, reason)` for every failed task.
    pub fn failures(&self) -> Vec<(&str, &DeployError)> {
        self.tasks
            .iter()
            .filter_map(|t| match &t.status {
                TaskStatus::Failed(err) => Some((t.package.as_str(), err)),
                _ => None,
            })
            .collect()
    }

    pub fn task(&self, package: &str) -> Option<&DeploymentTask> {
        self.tasks.iter().find(|t| t.package == package)
    }
}
