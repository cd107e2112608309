//! Event entry points called by the orchestrator.
//!
//! The dependency manager's lifecycle events map onto plain function calls:
//! [`on_new_code`] after packages were installed or updated and
//! [`on_package_uninstall`] when one was removed.

mod new_code;
mod uninstall;

pub use new_code::{NewCodeAction, NewCodeReport};
pub use uninstall::UninstallAction;

use anyhow::Result;

use crate::context::RunContext;
use crate::deploy::{DeployManager, DeploymentTask};
use crate::error::DeployError;
use crate::runtime::Runtime;

/// Deploy every package, consolidate libraries and run the finalizer steps.
pub fn on_new_code<R: Runtime>(runtime: &R, ctx: &RunContext) -> Result<NewCodeReport> {
    NewCodeAction::new(runtime, ctx).run()
}

pub fn on_package_uninstall<R: Runtime>(
    runtime: &R,
    ctx: &RunContext,
    package: &str,
) -> Result<(), DeployError> {
    UninstallAction::new(runtime, ctx).run(package)
}

/// The tasks a deployment would run, in order, without executing them.
pub fn plan<R: Runtime>(runtime: &R, ctx: &RunContext) -> Vec<DeploymentTask> {
    DeployManager::new(runtime, &ctx.config).plan(&ctx.ordered_packages())
}
