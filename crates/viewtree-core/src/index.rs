//! Name -> file -> property index derived from scanned sources.
//!
//! Each file's contribution is stored separately so it can be retracted as a
//! whole. Public queries see the union of all contributions.

use crate::config::SourceKind;
use crate::parser::{parse, ParsedComponent};
use crate::position::SIGIL;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static SECONDARY_COMPONENT: OnceLock<Regex> = OnceLock::new();

const NOT_PROPERTIES: [&str; 3] = ["null", "true", "false"];

/// What one file contributes to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContribution {
    pub kind: SourceKind,
    /// Components the file declares or references
    pub components: BTreeSet<String>,
    /// Properties per declared component
    pub properties: BTreeMap<String, BTreeSet<String>>,
}

impl FileContribution {
    /// Extract root components and their properties from a primary source.
    pub fn from_primary(text: &str) -> Self {
        let parsed = parse(text);
        let mut contribution = Self {
            kind: SourceKind::Primary,
            components: BTreeSet::new(),
            properties: BTreeMap::new(),
        };
        for component in &parsed.components {
            contribution.components.insert(component.name.clone());
            let properties = contribution
                .properties
                .entry(component.name.clone())
                .or_default();
            collect_properties(component, properties);
        }
        contribution
    }

    /// Extract sigil-prefixed identifiers from a secondary source.
    pub fn from_secondary(text: &str) -> Self {
        let components = crate::parser::regex(&SECONDARY_COMPONENT, r"\$\w+")
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        Self {
            kind: SourceKind::Secondary,
            components,
            properties: BTreeMap::new(),
        }
    }
}

fn collect_properties(component: &ParsedComponent, into: &mut BTreeSet<String>) {
    for property in &component.properties {
        let name = if property.is_binding {
            property.value.as_deref()
        } else {
            Some(property.name.as_str())
        };
        if let Some(name) = name.filter(|n| is_property_name(n)) {
            into.insert(name.to_string());
        }
    }
    for nested in &component.nested {
        collect_properties(nested, into);
    }
}

fn is_property_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with(SIGIL) && !NOT_PROPERTIES.contains(&name)
}

/// Accumulated view over every file contribution
#[derive(Debug, Default)]
pub struct WorkspaceIndex {
    files: HashMap<PathBuf, FileContribution>,
    owners: HashMap<String, BTreeSet<PathBuf>>,
    properties: HashMap<String, BTreeSet<String>>,
    defining_files: HashMap<String, PathBuf>,
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything `path` contributed with `contribution`.
    pub fn replace_file(&mut self, path: &Path, contribution: FileContribution) {
        let keep: BTreeSet<String> = contribution.components.clone();
        self.retract(path, &keep);

        for component in &contribution.components {
            self.owners
                .entry(component.clone())
                .or_default()
                .insert(path.to_path_buf());
        }
        let kind = contribution.kind;
        let components = contribution.components.clone();
        self.files.insert(path.to_path_buf(), contribution);

        for component in &components {
            self.claim(component, path, kind);
            self.refresh_properties(component);
        }
    }

    /// Drop everything `path` contributed.
    pub fn remove_file(&mut self, path: &Path) {
        self.retract(path, &BTreeSet::new());
    }

    /// Remove `path` from the owner sets. Components in `keep` are about to be
    /// re-inserted by the same file, so their defining file is left alone.
    fn retract(&mut self, path: &Path, keep: &BTreeSet<String>) {
        let Some(old) = self.files.remove(path) else {
            return;
        };
        for component in &old.components {
            let now_empty = match self.owners.get_mut(component) {
                Some(owners) => {
                    owners.remove(path);
                    owners.is_empty()
                }
                None => true,
            };
            if now_empty && !keep.contains(component) {
                self.owners.remove(component);
                self.properties.remove(component);
                self.defining_files.remove(component);
                continue;
            }
            if !keep.contains(component)
                && self.defining_files.get(component).map(PathBuf::as_path) == Some(path)
            {
                self.elect(component);
            }
            self.refresh_properties(component);
        }
    }

    /// First primary source wins; a secondary source only defines a component
    /// nobody else has claimed.
    fn claim(&mut self, component: &str, path: &Path, kind: SourceKind) {
        let current_kind = self
            .defining_files
            .get(component)
            .and_then(|file| self.files.get(file))
            .map(|c| c.kind);
        let take = match current_kind {
            None => true,
            Some(existing) => existing < kind,
        };
        if take {
            self.defining_files
                .insert(component.to_string(), path.to_path_buf());
        }
    }

    /// Pick a new defining file among the remaining owners.
    fn elect(&mut self, component: &str) {
        let best = self.owners.get(component).and_then(|owners| {
            owners
                .iter()
                .filter_map(|file| self.files.get(file).map(|c| (c.kind, file)))
                .min_by(|(a_kind, a_file), (b_kind, b_file)| {
                    b_kind.cmp(a_kind).then_with(|| a_file.cmp(b_file))
                })
                .map(|(_, file)| file.clone())
        });
        match best {
            Some(file) => {
                self.defining_files.insert(component.to_string(), file);
            }
            None => {
                self.defining_files.remove(component);
            }
        }
    }

    fn refresh_properties(&mut self, component: &str) {
        let mut merged = BTreeSet::new();
        if let Some(owners) = self.owners.get(component) {
            for file in owners {
                if let Some(props) = self.files.get(file).and_then(|c| c.properties.get(component)) {
                    merged.extend(props.iter().cloned());
                }
            }
        }
        self.properties.insert(component.to_string(), merged);
    }

    pub fn has(&self, component: &str) -> bool {
        self.owners.contains_key(component)
    }

    pub fn defining_file(&self, component: &str) -> Option<&Path> {
        self.defining_files.get(component).map(PathBuf::as_path)
    }

    /// Sorted properties of `component`
    pub fn properties_of(&self, component: &str) -> Vec<String> {
        self.properties
            .get(component)
            .map(|props| props.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted union of every component's properties
    pub fn all_properties(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self.properties.values().flatten().collect();
        all.into_iter().cloned().collect()
    }

    /// Sorted component names
    pub fn components(&self) -> Vec<String> {
        let mut names: Vec<String> = self.owners.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn components_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .owners
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn component_count(&self) -> usize {
        self.owners.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Components contributed by `path`
    pub fn file_components(&self, path: &Path) -> Vec<String> {
        self.files
            .get(path)
            .map(|c| c.components.iter().cloned().collect())
            .unwrap_or_default()
    }
}
