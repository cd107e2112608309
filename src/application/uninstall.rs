//! Package uninstall: remove what was deployed for it.

use log::info;

use crate::context::RunContext;
use crate::deploy::DeployManager;
use crate::error::DeployError;
use crate::runtime::Runtime;

pub struct UninstallAction<'a, R: Runtime> {
    runtime: &'a R,
    ctx: &'a RunContext,
}

impl<'a, R: Runtime> UninstallAction<'a, R> {
    pub fn new(runtime: &'a R, ctx: &'a RunContext) -> Self {
        Self { runtime, ctx }
    }

    /// Undeploy `package`. The package does not have to be in the catalog
    /// any more, nor ever have been deployed.
    pub fn run(&self, package: &str) -> Result<(), DeployError> {
        info!("Undeploying {}", package);
        DeployManager::new(self.runtime, &self.ctx.config).undeploy(package)
    }
}
