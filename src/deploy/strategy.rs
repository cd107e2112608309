//! Per-package deployment strategy selection.

use log::warn;
use std::fmt;

use crate::config::ProjectConfig;
use crate::package::Package;

/// How a package's files are materialized in the target tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Recursive copy
    Copy,
    /// One symlink per mapping entry
    Symlink,
    /// Hard link every file, copying the ones that cannot be linked
    LinkOrCopyFallback,
    /// Not deployed at all
    None,
}

impl Strategy {
    /// Parse a configured strategy name. `None` for names we do not know.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "copy" => Some(Strategy::Copy),
            "symlink" => Some(Strategy::Symlink),
            "link" => Some(Strategy::LinkOrCopyFallback),
            "none" => Some(Strategy::None),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Copy => "copy",
            Strategy::Symlink => "symlink",
            Strategy::LinkOrCopyFallback => "link",
            Strategy::None => "none",
        }
    }

    /// Whether this strategy writes anything to the target tree.
    pub fn materializes(&self) -> bool {
        !matches!(self, Strategy::None)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Maps package metadata to a [`Strategy`].
///
/// Selection is purely declarative: whether a symlink can actually be created
/// is decided when the task runs.
pub struct DeployStrategySelector<'a> {
    config: &'a ProjectConfig,
}

impl<'a> DeployStrategySelector<'a> {
    pub fn new(config: &'a ProjectConfig) -> Self {
        Self { config }
    }

    /// The strategy name requested for `package`, most specific source first.
    fn requested_name<'p>(&'p self, package: &'p Package) -> Option<&'p str> {
        self.config
            .strategy_overrides
            .get(&package.name)
            .map(String::as_str)
            .or(package.extra.deploy_strategy.as_deref())
            .or(self.config.default_strategy.as_deref())
    }

    pub fn select_strategy(&self, package: &Package) -> Strategy {
        if !package.extra.has_mapping() {
            return Strategy::None;
        }

        match self.requested_name(package) {
            None => Strategy::Copy,
            Some(name) => Strategy::from_name(name).unwrap_or_else(|| {
                // Never symlink without an explicit request
                warn!(
                    "Unknown deploy strategy {:?} for {}, using copy",
                    name, package.name
                );
                Strategy::Copy
            }),
        }
    }
}
