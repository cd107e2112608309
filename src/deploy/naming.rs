//! Package name -> deployment directory naming.
//!
//! Downstream code locates modules by these directory names, so the transform
//! must stay byte-for-byte stable: `magento/module-catalog-search` always
//! becomes `Magento/CatalogSearch`.

use std::path::{Path, PathBuf};

const MODULE_PREFIX: &str = "module-";

/// Characters stripped from both ends of the package segment.
fn is_trimmed(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B')
}

/// Characters after which a new word starts.
fn is_word_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0C' | '\x0B')
}

/// Uppercase the first ASCII character, leave the rest untouched.
pub fn vendor_dir_name(vendor: &str) -> String {
    let mut chars = vendor.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `module-catalog-search` -> `CatalogSearch`.
///
/// Every `module-` occurrence is removed, the rest trimmed, hyphens become
/// word breaks, each word gets an uppercase first letter and the spaces are
/// dropped. Other whitespace inside the name survives.
pub fn package_dir_name(name: &str) -> String {
    let stripped = name.replace(MODULE_PREFIX, "");
    let spaced = stripped.trim_matches(is_trimmed).replace('-', " ");

    let mut studly = String::with_capacity(spaced.len());
    let mut word_start = true;
    for c in spaced.chars() {
        if word_start {
            studly.push(c.to_ascii_uppercase());
        } else {
            studly.push(c);
        }
        word_start = is_word_delimiter(c);
    }
    studly.replace(' ', "")
}

/// `acme/module-foo-bar` -> `Acme/FooBar`.
///
/// Only the first two `/`-separated segments take part; a name without a
/// vendor yields an empty package segment.
pub fn package_path(package_name: &str) -> PathBuf {
    let mut segments = package_name.split('/');
    let vendor = segments.next().unwrap_or_default();
    let name = segments.next().unwrap_or_default();
    PathBuf::from(vendor_dir_name(vendor)).join(package_dir_name(name))
}

/// Primary deployment directory: `<root>/app/code/<Vendor>/<Package>`.
pub fn module_dir(target_root: &Path, package_name: &str) -> PathBuf {
    target_root
        .join("app")
        .join("code")
        .join(package_path(package_name))
}

/// Legacy library location: `<root>/lib/internal/<Vendor>/<Package>`.
pub fn legacy_library_dir(target_root: &Path, package_name: &str) -> PathBuf {
    target_root
        .join("lib")
        .join("internal")
        .join(package_path(package_name))
}
