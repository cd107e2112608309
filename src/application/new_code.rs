//! Post install/update run: deploy, consolidate libraries, finalize.

use anyhow::Result;
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::context::RunContext;
use crate::deploy::{DeployManager, DeployReport};
use crate::error::{DeployError, Warning};
use crate::finalize::PostDeployFinalizer;
use crate::library::{ConsolidationReport, LibraryConsolidator};
use crate::runtime::Runtime;

const VENDOR_PATH_LABEL: &str = "app/etc/vendor_path.php";

/// Everything a post install/update run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCodeReport {
    pub deploy: DeployReport,
    /// `None` when no library path is configured
    pub libraries: Option<ConsolidationReport>,
    /// `None` when the vendor path file could not be written
    pub vendor_path_file: Option<PathBuf>,
    pub vendor_path_warning: Option<Warning>,
    pub regeneration_requested: bool,
    pub permission_warnings: Vec<Warning>,
}

impl NewCodeReport {
    /// The run failed when any deployment task failed.
    pub fn is_success(&self) -> bool {
        self.deploy.is_success()
    }

    /// Every non-fatal diagnostic, in the order the steps ran.
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.deploy
            .warnings
            .iter()
            .chain(self.libraries.iter().flat_map(|l| l.diagnostics.iter()))
            .chain(self.vendor_path_warning.iter())
            .chain(self.permission_warnings.iter())
    }
}

pub struct NewCodeAction<'a, R: Runtime> {
    runtime: &'a R,
    ctx: &'a RunContext,
}

impl<'a, R: Runtime> NewCodeAction<'a, R> {
    pub fn new(runtime: &'a R, ctx: &'a RunContext) -> Self {
        Self { runtime, ctx }
    }

    pub fn run(&self) -> Result<NewCodeReport> {
        let config = &self.ctx.config;
        let ordered = self.ctx.ordered_packages();

        info!("Deploying {} package(s)", ordered.len());
        let deploy = DeployManager::new(self.runtime, config).deploy(&ordered);

        let packages = self.ctx.packages();
        let libraries = match &config.library_path {
            Some(library_root) => Some(
                LibraryConsolidator::new(self.runtime, config).consolidate(&packages, library_root),
            ),
            None => {
                debug!("No library path configured, skipping library consolidation");
                None
            }
        };

        let finalizer = PostDeployFinalizer::new(self.runtime);
        let (vendor_path_file, vendor_path_warning) =
            match finalizer.save_vendor_path(&config.target_root, &config.vendor_dir) {
                Ok(file) => (Some(file), None),
                Err(e) => {
                    let warning = DeployError::io(VENDOR_PATH_LABEL, &e);
                    warn!("{}", warning);
                    (None, Some(warning))
                }
            };
        let regeneration_requested = finalizer.request_regeneration(&config.target_root);
        let permission_warnings = finalizer.apply_permissions(&packages, &config.target_root);

        Ok(NewCodeReport {
            deploy,
            libraries,
            vendor_path_file,
            vendor_path_warning,
            regeneration_requested,
            permission_warnings,
        })
    }
}
