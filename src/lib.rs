pub mod application;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod finalize;
pub mod library;
pub mod package;
pub mod runtime;

/// Test utilities for building throwaway projects on disk.
#[cfg(test)]
pub mod test_utils {
    use crate::context::RunContext;
    use crate::runtime::{RealRuntime, Runtime};
    use serde_json::{Value, json};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Write `content` to `path`, creating parent directories.
    pub fn write_file(path: &Path, content: &str) {
        RealRuntime.create_dir_all(path.parent().unwrap()).unwrap();
        RealRuntime.write(path, content.as_bytes()).unwrap();
    }

    /// A project directory with a `composer.json` and installed packages.
    pub struct ProjectFixture {
        dir: TempDir,
        installed: Vec<Value>,
    }

    impl ProjectFixture {
        pub fn new(composer_json: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            write_file(&dir.path().join("composer.json"), composer_json);
            Self {
                dir,
                installed: Vec::new(),
            }
        }

        pub fn root(&self) -> PathBuf {
            self.dir.path().to_path_buf()
        }

        pub fn mkdir(&self, relative: &str) {
            RealRuntime.create_dir_all(&self.dir.path().join(relative)).unwrap();
        }

        /// Install `name` under `vendor/` with a `registration.php` and an
        /// `etc/module.xml`. `extra` is the package's raw extra JSON.
        pub fn install(&mut self, name: &str, extra: &str) -> PathBuf {
            let install = self.dir.path().join("vendor").join(name);
            write_file(&install.join("registration.php"), name);
            write_file(&install.join("etc/module.xml"), "<config/>");
            self.installed.push(json!({
                "name": name,
                "version": "1.0.0",
                "type": "magento2-module",
                "extra": serde_json::from_str::<Value>(extra).unwrap(),
                "install-path": format!("../{}", name),
            }));
            install
        }

        pub fn write_installed_json(&self) {
            let document = json!({ "packages": self.installed });
            write_file(
                &self.dir.path().join("vendor/composer/installed.json"),
                &serde_json::to_string_pretty(&document).unwrap(),
            );
        }

        pub fn context(&self) -> RunContext {
            RunContext::load(&RealRuntime, self.dir.path()).unwrap()
        }
    }
}
