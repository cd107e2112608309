//! Path utility functions for normalization and comparison.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep the `..` when there is nothing left to pop
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
/// Returns true if `path` is under `dir` (i.e., `dir` is a prefix of `path`).
///
/// `/app/code/Vendor/../../../etc` is NOT under `/app/code`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// True when a relative path could escape its base: it contains a `..`
/// segment or is not relative at all.
pub fn has_parent_traversal(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Calculate the relative path from a directory to a target path.
///
/// For example, from `/srv/shop/pub` to `/srv/shop/vendor` this returns
/// `../vendor`.
///
/// Returns `None` if a relative path cannot be computed (e.g., different drive letters on Windows).
pub fn relative_path_from_dir(from_dir: &Path, to_path: &Path) -> Option<PathBuf> {
    let result = pathdiff::diff_paths(to_path, from_dir)?;

    if result.is_absolute() {
        return None;
    }

    Some(result)
}

/// The shortest way to write `to` as seen from the directory `from_dir`.
///
/// A direct child of `from_dir` is written `./name` and `from_dir` itself is
/// `./`; anything else climbs with `..`. When the two paths share nothing but
/// the filesystem root, `to` is returned unchanged.
pub fn shortest_path_from_dir(from_dir: &Path, to: &Path) -> PathBuf {
    let from = normalize_path(from_dir);
    let to = normalize_path(to);

    match (to.parent(), to.file_name()) {
        (Some(parent), Some(name)) if parent == from => return Path::new(".").join(name),
        _ => {}
    }

    let from_components: Vec<_> = from.components().collect();
    let to_components: Vec<_> = to.components().collect();
    let common = from_components
        .iter()
        .zip(&to_components)
        .take_while(|(a, b)| a == b)
        .count();
    let shares_a_directory = from_components[..common]
        .iter()
        .any(|c| matches!(c, Component::Normal(_)));
    if !shares_a_directory && (from.has_root() || to.has_root()) {
        return to;
    }

    let mut result = PathBuf::new();
    for _ in common..from_components.len() {
        result.push("..");
    }
    for component in &to_components[common..] {
        result.push(component);
    }
    if result.as_os_str().is_empty() {
        PathBuf::from("./")
    } else {
        result
    }
}
