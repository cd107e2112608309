use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong for a single package or side effect.
///
/// None of these abort a run on their own: deployment failures are recorded on
/// the task, the rest are surfaced as warnings. `Config` is the exception and
/// stops the run before any task starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error("{package} collides with {} at {}", others.join(", "), path.display())]
    PathCollision {
        package: String,
        others: Vec<String>,
        path: PathBuf,
    },

    #[error("failed to deploy {package}: {message}")]
    Io { package: String, message: String },

    #[error("invalid permission rule in {package} ({path}): {reason}")]
    PermissionRuleInvalid {
        package: String,
        path: String,
        reason: String,
    },

    #[error("{tool} is not available, autoload generation skipped")]
    ExternalToolUnavailable { tool: String },

    #[error("{} exited unsuccessfully: {message}", tool.display())]
    ExternalToolFailed { tool: PathBuf, message: String },

    #[error("symlinks are not supported under {}, deploying {package} by copy", root.display())]
    StrategyUnsupported { package: String, root: PathBuf },

    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

/// A non-fatal diagnostic produced by a side effect.
pub type Warning = DeployError;

impl DeployError {
    /// Wrap a runtime failure for `package`, keeping the whole context chain.
    pub fn io(package: &str, err: &anyhow::Error) -> Self {
        DeployError::Io {
            package: package.to_string(),
            message: format!("{:#}", err),
        }
    }
}
