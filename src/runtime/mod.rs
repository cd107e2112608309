//! Runtime abstraction for system operations.
//!
//! Every filesystem, environment and subprocess call the deployment engine
//! makes goes through the [`Runtime`] trait, so components can be exercised
//! against a real temporary tree or a `MockRuntime`.
//!
//! # Structure
//!
//! - `path` - Lexical path helpers (normalize, traversal checks, relative paths)
//! - `env` - Executable lookup and writability checks
//! - `fs` - File system operations (read, write, copy, directory, permissions)
//! - `symlink` - Symlink and hard link operations
//! - `process` - Blocking subprocess execution

mod env;
mod fs;
pub mod path;
mod process;
mod symlink;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use path::{
    has_parent_traversal, is_path_under, normalize_path, relative_path_from_dir,
    shortest_path_from_dir,
};

/// Outcome of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Create `path` if missing and bump its modification time otherwise.
    fn touch(&self, path: &Path) -> Result<()>;

    /// Set file permissions (mode) on Unix systems. No-op on Windows.
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;

    /// Whether the current process may create entries inside `path`.
    fn is_writable(&self, path: &Path) -> bool;

    // Links
    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;
    fn hard_link(&self, original: &Path, link: &Path) -> Result<()>;
    fn read_link(&self, path: &Path) -> Result<PathBuf>;
    fn is_symlink(&self, path: &Path) -> bool;
    fn remove_symlink(&self, path: &Path) -> Result<()>;

    // Processes
    /// Look up `name` on `PATH`.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    /// Run `program` to completion with the given arguments.
    fn run_command(&self, program: &Path, args: &[String]) -> Result<CommandOutput>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.canonicalize_impl(path)
    }

    fn touch(&self, path: &Path) -> Result<()> {
        self.touch_impl(path)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        self.set_permissions_impl(path, mode)
    }

    fn is_writable(&self, path: &Path) -> bool {
        self.is_writable_impl(path)
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        self.symlink_impl(original, link)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> Result<()> {
        self.hard_link_impl(original, link)
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        self.read_link_impl(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.is_symlink_impl(path)
    }

    fn remove_symlink(&self, path: &Path) -> Result<()> {
        self.remove_symlink_impl(path)
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.find_executable_impl(name)
    }

    fn run_command(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        self.run_command_impl(program, args)
    }
}
