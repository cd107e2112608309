//! Recursive directory mirroring used by copy-style deployments and library
//! consolidation.

use anyhow::{Result, bail};
use glob::Pattern;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// How individual files are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Copy,
    /// Hard link, copying whenever the link cannot be made (e.g. across devices)
    HardLinkOrCopy,
}

/// Mirrors a source tree into a destination, skipping dot-entries and
/// ignored paths.
pub struct TreeMirror<'a, R: Runtime> {
    runtime: &'a R,
    mode: FileMode,
    /// Ignore patterns are matched relative to this directory
    base: PathBuf,
    ignore: Vec<Pattern>,
}

impl<'a, R: Runtime> TreeMirror<'a, R> {
    pub fn new(runtime: &'a R, mode: FileMode, base: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            mode,
            base: base.into(),
            ignore: Vec::new(),
        }
    }

    /// Add glob patterns; invalid ones are reported and dropped.
    pub fn with_ignore(mut self, patterns: &[String]) -> Self {
        for raw in patterns {
            match Pattern::new(raw.trim_start_matches('/')) {
                Ok(pattern) => self.ignore.push(pattern),
                Err(e) => warn!("Ignoring invalid deploy-ignore pattern {:?}: {}", raw, e),
            }
        }
        self
    }

    fn is_ignored(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.base) {
            Ok(relative) if !relative.as_os_str().is_empty() => {
                self.ignore.iter().any(|p| p.matches_path(relative))
            }
            _ => false,
        }
    }

    fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
    }

    /// Mirror `source` (file or directory) onto `dest`. Returns the number of
    /// files placed.
    pub fn mirror(&self, source: &Path, dest: &Path) -> Result<usize> {
        if self.is_ignored(source) {
            debug!("Skipping ignored path {:?}", source);
            return Ok(0);
        }

        if self.runtime.is_dir(source) {
            self.runtime.create_dir_all(dest)?;
            let mut placed = 0;
            for child in self.runtime.read_dir(source)? {
                if Self::is_hidden(&child) {
                    continue;
                }
                let Some(name) = child.file_name() else {
                    continue;
                };
                placed += self.mirror_child(&child, &dest.join(name))?;
            }
            Ok(placed)
        } else if self.runtime.exists(source) {
            self.place_file(source, dest, self.mode)?;
            Ok(1)
        } else {
            bail!("Source {:?} does not exist", source);
        }
    }

    /// Symlinks found inside a tree are never followed: a linked directory
    /// becomes an empty directory, a linked file is copied and a dangling
    /// link is skipped.
    fn mirror_child(&self, child: &Path, dest: &Path) -> Result<usize> {
        if !self.runtime.is_symlink(child) || self.is_ignored(child) {
            return self.mirror(child, dest);
        }

        if self.runtime.is_dir(child) {
            debug!("Not descending into symlinked directory {:?}", child);
            self.runtime.create_dir_all(dest)?;
            Ok(0)
        } else if self.runtime.exists(child) {
            // A hard link would share the link itself, not its target
            self.place_file(child, dest, FileMode::Copy)?;
            Ok(1)
        } else {
            warn!("Skipping dangling symlink {:?}", child);
            Ok(0)
        }
    }

    fn place_file(&self, source: &Path, dest: &Path, mode: FileMode) -> Result<()> {
        if let Some(parent) = dest.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        // Copying or linking onto an existing file writes through its inode,
        // which may be shared with a vendor file
        if self.runtime.is_symlink(dest) || (self.runtime.exists(dest) && !self.runtime.is_dir(dest)) {
            remove_path(self.runtime, dest)?;
        }

        match mode {
            FileMode::Copy => {
                self.runtime.copy(source, dest)?;
            }
            FileMode::HardLinkOrCopy => {
                if let Err(e) = self.runtime.hard_link(source, dest) {
                    debug!("Hard link of {:?} failed ({:#}), copying instead", source, e);
                    self.runtime.copy(source, dest)?;
                }
            }
        }
        Ok(())
    }
}

/// Remove a file, directory or symlink at `path`; a symlink is removed
/// itself, never its target. Returns whether anything was there.
pub fn remove_path<R: Runtime>(runtime: &R, path: &Path) -> Result<bool> {
    if runtime.is_symlink(path) {
        runtime.remove_symlink(path)?;
    } else if runtime.is_dir(path) {
        runtime.remove_dir_all(path)?;
    } else if runtime.exists(path) {
        runtime.remove_file(path)?;
    } else {
        return Ok(false);
    }
    Ok(true)
}
