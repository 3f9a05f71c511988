//! Configuration for scanning and diagnostics
//!
//! Settings come from one of three places, checked in order:
//! - `initializationOptions` sent by the editor (camelCase keys accepted)
//! - a `viewtree.toml` file at the workspace root
//! - built-in defaults

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// File name looked up at the workspace root
pub const WORKSPACE_CONFIG_FILE: &str = "viewtree.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace scanning settings
    pub scan: ScanConfig,
    /// Diagnostic settings
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate editor initialization options
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the workspace configuration file if one exists under `root`
    pub fn workspace_file(root: &Path) -> Option<PathBuf> {
        let path = root.join(WORKSPACE_CONFIG_FILE);
        path.is_file().then_some(path)
    }

    /// Load `viewtree.toml` from `root`, falling back to defaults when absent
    pub fn discover(root: &Path) -> Result<Self> {
        match Self::workspace_file(root) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let scan = &self.scan;
        if scan.primary_suffix.is_empty() {
            return Err(Error::Config("primary_suffix must not be empty".to_string()));
        }
        if scan.secondary_suffix.is_empty() {
            return Err(Error::Config("secondary_suffix must not be empty".to_string()));
        }
        if scan.primary_suffix == scan.secondary_suffix {
            return Err(Error::Config(format!(
                "primary and secondary suffix are both {:?}",
                scan.primary_suffix
            )));
        }
        Ok(())
    }
}

/// Which files the workspace scanner reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Suffix of primary (view.tree) sources
    #[serde(alias = "primarySuffix")]
    pub primary_suffix: String,
    /// Suffix of secondary (script) sources
    #[serde(alias = "secondarySuffix")]
    pub secondary_suffix: String,
    /// Secondary files ending in one of these are skipped
    #[serde(alias = "secondaryExcludeSuffixes")]
    pub secondary_exclude_suffixes: Vec<String>,
    /// Upper bound on secondary files read per full scan
    #[serde(alias = "maxSecondaryFiles")]
    pub max_secondary_files: usize,
    /// Directory names never descended into (hidden directories are always skipped)
    #[serde(alias = "ignoredDirs")]
    pub ignored_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            primary_suffix: ".view.tree".to_string(),
            secondary_suffix: ".ts".to_string(),
            secondary_exclude_suffixes: vec![".d.ts".to_string()],
            max_secondary_files: 100,
            ignored_dirs: vec!["node_modules".to_string()],
        }
    }
}

/// Kind of source file recognized by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Secondary,
    Primary,
}

impl ScanConfig {
    /// Classify a path by its file name, or `None` if the scanner ignores it
    pub fn source_kind(&self, path: &Path) -> Option<SourceKind> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(&self.primary_suffix) {
            return Some(SourceKind::Primary);
        }
        let excluded = self
            .secondary_exclude_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()));
        if name.ends_with(&self.secondary_suffix) && !excluded {
            return Some(SourceKind::Secondary);
        }
        None
    }

    pub fn is_primary(&self, path: &Path) -> bool {
        self.source_kind(path) == Some(SourceKind::Primary)
    }

    /// Whether a directory entry should be skipped during a walk
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignored_dirs.iter().any(|dir| dir == name)
    }

    /// Whether `path` lies inside a directory the walk under `root` skips.
    /// Paths outside `root` are never considered ignored.
    pub fn is_ignored_path(&self, root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        relative
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .any(|component| match component {
                Component::Normal(name) => name.to_str().is_some_and(|n| self.is_ignored_dir(n)),
                _ => false,
            })
    }

    /// Swap the primary suffix of `path` for `suffix` (`a.view.tree` -> `a.css.ts`)
    pub fn sibling(&self, path: &Path, suffix: &str) -> Option<PathBuf> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(&self.primary_suffix)?;
        Some(path.with_file_name(format!("{stem}{suffix}")))
    }
}

/// Which diagnostic checks run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Component names with these prefixes are never reported as unknown
    #[serde(alias = "builtinPrefixes")]
    pub builtin_prefixes: Vec<String>,
    /// Report components that are missing from the workspace index
    #[serde(alias = "unknownComponents")]
    pub unknown_components: bool,
    /// Largest allowed indentation increase between consecutive lines
    #[serde(alias = "maxIndentJump")]
    pub max_indent_jump: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            builtin_prefixes: vec!["$mol_".to_string()],
            unknown_components: true,
            max_indent_jump: 1,
        }
    }
}

impl DiagnosticsConfig {
    pub fn is_builtin(&self, component: &str) -> bool {
        self.builtin_prefixes
            .iter()
            .any(|prefix| component.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan.primary_suffix, ".view.tree");
        assert_eq!(config.scan.max_secondary_files, 100);
        assert!(config.diagnostics.unknown_components);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [scan]
            max_secondary_files = 5
            ignored_dirs = ["node_modules", "dist"]

            [diagnostics]
            builtin_prefixes = ["$mol_", "$hyoo_"]
            "#,
        )
        .unwrap();
        assert_eq!(config.scan.max_secondary_files, 5);
        assert_eq!(config.scan.primary_suffix, ".view.tree");
        assert!(config.diagnostics.is_builtin("$hyoo_page"));
        assert!(!config.diagnostics.is_builtin("$my_page"));
    }

    #[test]
    fn test_json_camel_case_options() {
        let config = Config::from_json(json!({
            "scan": { "maxSecondaryFiles": 3 },
            "diagnostics": { "unknownComponents": false }
        }))
        .unwrap();
        assert_eq!(config.scan.max_secondary_files, 3);
        assert!(!config.diagnostics.unknown_components);
    }

    #[test]
    fn test_rejects_identical_suffixes() {
        let result = Config::from_toml_str(
            r#"
            [scan]
            primary_suffix = ".ts"
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_source_kind() {
        let scan = ScanConfig::default();
        assert_eq!(
            scan.source_kind(Path::new("/w/app/app.view.tree")),
            Some(SourceKind::Primary)
        );
        assert_eq!(
            scan.source_kind(Path::new("/w/app/app.view.ts")),
            Some(SourceKind::Secondary)
        );
        assert_eq!(scan.source_kind(Path::new("/w/app/types.d.ts")), None);
        assert_eq!(scan.source_kind(Path::new("/w/app/readme.md")), None);
    }

    #[test]
    fn test_sibling_paths() {
        let scan = ScanConfig::default();
        let path = Path::new("/w/app/app.view.tree");
        assert_eq!(
            scan.sibling(path, ".css.ts"),
            Some(PathBuf::from("/w/app/app.css.ts"))
        );
        assert_eq!(scan.sibling(Path::new("/w/app/app.ts"), ".css.ts"), None);
    }

    #[test]
    fn test_hidden_and_ignored_dirs() {
        let scan = ScanConfig::default();
        assert!(scan.is_ignored_dir(".git"));
        assert!(scan.is_ignored_dir("node_modules"));
        assert!(!scan.is_ignored_dir("src"));
    }

    #[test]
    fn test_ignored_paths_relative_to_root() {
        let scan = ScanConfig::default();
        let root = Path::new("/w");
        assert!(scan.is_ignored_path(root, Path::new("/w/node_modules/x/x.view.tree")));
        assert!(scan.is_ignored_path(root, Path::new("/w/app/.cache/a.view.tree")));
        assert!(!scan.is_ignored_path(root, Path::new("/w/app/app.view.tree")));
        // hidden names above the root or in the file name itself do not count
        assert!(!scan.is_ignored_path(Path::new("/tmp/.ws"), Path::new("/tmp/.ws/a/a.view.tree")));
        assert!(!scan.is_ignored_path(root, Path::new("/w/.a.view.tree")));
        assert!(!scan.is_ignored_path(root, Path::new("/other/node_modules/a.view.tree")));
    }
}
