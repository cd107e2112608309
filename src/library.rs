//! Consolidation of library packages into one shared directory plus a
//! generated autoload map.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::deploy::mirror::{FileMode, TreeMirror, remove_path};
use crate::error::{DeployError, Warning};
use crate::package::Package;
use crate::runtime::{Runtime, has_parent_traversal, normalize_path};

/// Name of the autoload generator executable.
pub const GENERATOR: &str = "phpab";
const AUTOLOAD_FILE: &str = "autoload.php";

/// A library package and the subpaths it contributes to the autoload map.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry<'p> {
    pub package: &'p Package,
    pub autoload: Vec<String>,
}

/// Libraries taking part in this run, in catalog order.
pub type LibraryManifest<'p> = Vec<LibraryEntry<'p>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Package names that were copied
    pub libraries: Vec<String>,
    /// Directories passed to the generator
    pub autoload_dirs: Vec<PathBuf>,
    /// Set when the generator ran successfully
    pub autoload_file: Option<PathBuf>,
    pub diagnostics: Vec<Warning>,
}

pub struct LibraryConsolidator<'a, R: Runtime> {
    runtime: &'a R,
    config: &'a ProjectConfig,
}

impl<'a, R: Runtime> LibraryConsolidator<'a, R> {
    pub fn new(runtime: &'a R, config: &'a ProjectConfig) -> Self {
        Self { runtime, config }
    }

    /// Packages declared under `magento-library`, with their autoload paths.
    pub fn manifest<'p>(&self, packages: &[&'p Package]) -> LibraryManifest<'p> {
        packages
            .iter()
            .copied()
            .filter_map(|package| {
                let library = self.config.library_config(&package.name)?;
                Some(LibraryEntry {
                    package,
                    autoload: library.autoload_paths(),
                })
            })
            .collect()
    }

    /// Rebuild `library_root` from scratch and generate its autoload map.
    ///
    /// Nothing here fails the run: problems are returned as diagnostics.
    pub fn consolidate(&self, packages: &[&Package], library_root: &Path) -> ConsolidationReport {
        let mut report = ConsolidationReport::default();

        let reset = remove_path(self.runtime, library_root)
            .and_then(|_| self.runtime.create_dir_all(library_root));
        if let Err(e) = reset {
            let err = DeployError::Io {
                package: library_root.display().to_string(),
                message: format!("{:#}", e),
            };
            warn!("{}", err);
            report.diagnostics.push(err);
            return report;
        }

        for entry in self.manifest(packages) {
            let package = entry.package;
            let package_root = library_root.join(&package.name);
            match self.copy_library(&entry, &package_root) {
                Ok(dirs) => {
                    debug!("Consolidated library {}", package.name);
                    report.libraries.push(package.name.clone());
                    report.autoload_dirs.extend(dirs);
                }
                Err(e) => {
                    let err = DeployError::io(&package.name, &e);
                    warn!("{}", err);
                    report.diagnostics.push(err);
                }
            }
        }

        match self.find_generator() {
            Some(generator) => {
                let output = library_root.join(AUTOLOAD_FILE);
                match self.generate_autoload(&generator, &output, &report.autoload_dirs) {
                    Ok(()) => {
                        info!("Generated {:?}", output);
                        report.autoload_file = Some(output);
                    }
                    Err(err) => {
                        warn!("{}", err);
                        report.diagnostics.push(err);
                    }
                }
            }
            None => {
                let err = DeployError::ExternalToolUnavailable {
                    tool: GENERATOR.to_string(),
                };
                warn!("{}", err);
                report.diagnostics.push(err);
            }
        }

        report
    }

    /// Copy each autoload subpath of a library; returns the copied directories.
    fn copy_library(&self, entry: &LibraryEntry<'_>, package_root: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let install = &entry.package.install_path;
        let mirror = TreeMirror::new(self.runtime, FileMode::Copy, install);
        self.runtime.create_dir_all(package_root)?;

        let mut dirs = Vec::with_capacity(entry.autoload.len());
        for raw in &entry.autoload {
            let relative = normalize_path(Path::new(raw.trim_start_matches('/')));
            if has_parent_traversal(&relative) {
                anyhow::bail!("Autoload path {:?} leaves the package", raw);
            }
            let dest = normalize_path(&package_root.join(&relative));
            mirror.mirror(&install.join(&relative), &dest)?;
            dirs.push(dest);
        }
        Ok(dirs)
    }

    /// `<bin-dir>/phpab`, then the copy shipped with `theseer/autoload`, then
    /// `PATH`.
    pub fn find_generator(&self) -> Option<PathBuf> {
        let candidates = [
            self.config.bin_dir.join(GENERATOR),
            self.config
                .vendor_dir
                .join("theseer/autoload/composer/bin")
                .join(GENERATOR),
        ];
        candidates
            .into_iter()
            .find(|candidate| self.runtime.exists(candidate))
            .or_else(|| self.runtime.find_executable(GENERATOR))
    }

    fn generate_autoload(&self, generator: &Path, output: &Path, dirs: &[PathBuf]) -> Result<(), DeployError> {
        let mut args = vec!["-o".to_string(), output.display().to_string()];
        args.extend(dirs.iter().map(|d| d.display().to_string()));
        debug!("Running {:?} {:?}", generator, args);

        let failed = |message: String| DeployError::ExternalToolFailed {
            tool: generator.to_path_buf(),
            message,
        };
        let result = self
            .runtime
            .run_command(generator, &args)
            .map_err(|e| failed(format!("{:#}", e)))?;
        if result.success {
            return Ok(());
        }
        let stderr = result.stderr.trim();
        Err(failed(match result.code {
            Some(code) if stderr.is_empty() => format!("exit status {}", code),
            Some(code) => format!("exit status {}: {}", code, stderr),
            None => format!("terminated by signal: {}", stderr),
        }))
    }
}
