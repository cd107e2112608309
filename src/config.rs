//! Project configuration read from the root `composer.json`.
//!
//! Layout keys come from the `config` section, engine settings from `extra`:
//!
//! ```json
//! {
//!   "config": { "vendor-dir": "vendor", "bin-dir": "vendor/bin" },
//!   "extra": {
//!     "magento-root-dir": ".",
//!     "magento-deploystrategy": "copy",
//!     "magento-deploystrategy-overwrite": { "acme/module-foo": "symlink" },
//!     "magento-deploy-sort-priority": { "acme/module-foo": 10 },
//!     "magento-deploy-ignore": { "*": ["*.md"], "acme/module-foo": ["Test/*"] },
//!     "magento-library-path": "lib/vendor",
//!     "magento-library": { "acme/lib-bar": { "autoload": ["src"] } }
//!   }
//! }
//! ```

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::DeployError;
use crate::runtime::Runtime;

/// Package name -> priority; lower deploys first.
pub type SortPriority = HashMap<String, i64>;

const COMPOSER_JSON: &str = "composer.json";
const DEFAULT_VENDOR_DIR: &str = "vendor";

#[derive(Deserialize, Debug, Default)]
struct ComposerJson {
    #[serde(default)]
    config: LayoutSection,
    #[serde(default)]
    extra: ExtraSection,
}

#[derive(Deserialize, Debug, Default)]
struct LayoutSection {
    #[serde(default, rename = "vendor-dir")]
    vendor_dir: Option<String>,
    #[serde(default, rename = "bin-dir")]
    bin_dir: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ExtraSection {
    #[serde(default, rename = "magento-root-dir")]
    root_dir: Option<String>,
    #[serde(default, rename = "magento-deploystrategy")]
    deploy_strategy: Option<String>,
    #[serde(default, rename = "magento-deploystrategy-overwrite")]
    deploy_strategy_overwrite: BTreeMap<String, String>,
    #[serde(
        default,
        rename = "magento-deploy-sort-priority",
        deserialize_with = "deserialize_priorities"
    )]
    sort_priority: SortPriority,
    #[serde(default, rename = "magento-deploy-ignore")]
    deploy_ignore: BTreeMap<String, Vec<String>>,
    #[serde(default, rename = "magento-library-path")]
    library_path: Option<String>,
    #[serde(default, rename = "magento-library")]
    libraries: BTreeMap<String, LibraryConfig>,
}

/// Library settings of one package.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LibraryConfig {
    #[serde(default)]
    pub autoload: Option<Vec<String>>,
}

impl LibraryConfig {
    /// Declared autoload subpaths; the whole package when none are declared.
    pub fn autoload_paths(&self) -> Vec<String> {
        match &self.autoload {
            Some(paths) if !paths.is_empty() => paths.clone(),
            _ => vec!["/".to_string()],
        }
    }
}

/// Priorities may be written as numbers or numeric strings.
fn deserialize_priorities<'de, D>(deserializer: D) -> Result<SortPriority, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Priority {
        Number(i64),
        Text(String),
    }

    let raw: BTreeMap<String, Priority> = BTreeMap::deserialize(deserializer)?;
    let mut priorities = SortPriority::new();
    for (name, priority) in raw {
        let value = match priority {
            Priority::Number(n) => n,
            Priority::Text(s) => s.trim().parse().map_err(|_| {
                serde::de::Error::custom(format!("priority of {} is not an integer: {:?}", name, s))
            })?,
        };
        priorities.insert(name, value);
    }
    Ok(priorities)
}

/// Resolved, immutable project settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    /// Directory holding `composer.json`
    pub project_dir: PathBuf,
    /// Application root receiving deployed files
    pub target_root: PathBuf,
    pub vendor_dir: PathBuf,
    pub bin_dir: PathBuf,
    /// Project-wide strategy name
    pub default_strategy: Option<String>,
    /// Per-package strategy names, winning over everything else
    pub strategy_overrides: BTreeMap<String, String>,
    pub sort_priority: SortPriority,
    /// Package name (or `*`) -> glob patterns excluded from deployment
    pub deploy_ignore: BTreeMap<String, Vec<String>>,
    /// Shared library directory; consolidation is skipped when unset
    pub library_path: Option<PathBuf>,
    pub libraries: BTreeMap<String, LibraryConfig>,
}

impl ProjectConfig {
    /// Defaults for a project rooted at `project_dir`.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let vendor_dir = project_dir.join(DEFAULT_VENDOR_DIR);
        Self {
            target_root: project_dir.clone(),
            bin_dir: vendor_dir.join("bin"),
            vendor_dir,
            project_dir,
            default_strategy: None,
            strategy_overrides: BTreeMap::new(),
            sort_priority: SortPriority::new(),
            deploy_ignore: BTreeMap::new(),
            library_path: None,
            libraries: BTreeMap::new(),
        }
    }

    /// Load `<project_dir>/composer.json`; a missing file yields the defaults.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(COMPOSER_JSON);
        if !runtime.exists(&path) {
            debug!("No {} in {:?}, using defaults", COMPOSER_JSON, project_dir);
            return Ok(Self::new(project_dir));
        }
        let content = runtime.read_to_string(&path)?;
        Ok(Self::parse(project_dir, &path, &content)?)
    }

    /// Parse the content of a `composer.json` found at `source`.
    pub fn parse(project_dir: &Path, source: &Path, content: &str) -> Result<Self, DeployError> {
        let document: ComposerJson =
            serde_json::from_str(content).map_err(|e| DeployError::Config {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        let vendor_name = document
            .config
            .vendor_dir
            .unwrap_or_else(|| DEFAULT_VENDOR_DIR.to_string());
        let vendor_dir = project_dir.join(vendor_name.trim_end_matches('/'));
        let bin_dir = match document.config.bin_dir {
            Some(bin) => {
                let bin = bin.replace("{$vendor-dir}", &vendor_name);
                project_dir.join(bin)
            }
            None => vendor_dir.join("bin"),
        };

        let extra = document.extra;
        let target_root = match extra.root_dir.as_deref() {
            Some(root) if !root.is_empty() && root != "." => project_dir.join(root),
            _ => project_dir.to_path_buf(),
        };

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            target_root,
            vendor_dir,
            bin_dir,
            default_strategy: extra.deploy_strategy,
            strategy_overrides: extra.deploy_strategy_overwrite,
            sort_priority: extra.sort_priority,
            deploy_ignore: extra.deploy_ignore,
            library_path: extra.library_path.map(|p| project_dir.join(p)),
            libraries: extra.libraries,
        })
    }

    /// Library settings for `package`, if it is declared as a library.
    pub fn library_config(&self, package: &str) -> Option<&LibraryConfig> {
        self.libraries.get(package)
    }

    /// Ignore patterns applying to `package`: the global `*` entry first.
    pub fn ignore_patterns(&self, package: &str) -> Vec<String> {
        let global = self.deploy_ignore.get("*").into_iter().flatten();
        let own = self.deploy_ignore.get(package).into_iter().flatten();
        global.chain(own).cloned().collect()
    }
}
