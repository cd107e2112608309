//! Executable lookup and access checks.

use std::path::{Path, PathBuf};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn find_executable_impl(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_writable_impl(&self, path: &Path) -> bool {
        #[cfg(unix)]
        {
            use nix::unistd::{AccessFlags, access};
            access(path, AccessFlags::W_OK).is_ok()
        }
        #[cfg(not(unix))]
        {
            std::fs::metadata(path)
                .map(|m| !m.permissions().readonly())
                .unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use tempfile::tempdir;

    #[test]
    fn test_find_executable_missing() {
        let runtime = RealRuntime;
        assert!(
            runtime
                .find_executable("modeploy-no-such-binary-on-path")
                .is_none()
        );
    }

    #[test]
    fn test_is_writable() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        assert!(runtime.is_writable(dir.path()));
        assert!(!runtime.is_writable(&dir.path().join("missing")));
    }
}
