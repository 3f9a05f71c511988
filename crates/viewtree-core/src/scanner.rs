//! Workspace scanner: walks the workspace and keeps the shared index current.

use crate::config::{ScanConfig, SourceKind};
use crate::index::{FileContribution, WorkspaceIndex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use walkdir::{DirEntry, WalkDir};

/// Files found by a directory walk, sorted by path
#[derive(Debug, Default)]
pub struct SourceFiles {
    pub primary: Vec<PathBuf>,
    pub secondary: Vec<PathBuf>,
}

/// Outcome of a full scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub primary_files: usize,
    pub secondary_files: usize,
    pub components: usize,
    /// False when a newer scan started before this one finished
    pub completed: bool,
}

/// Recursively collect source files under `root`.
///
/// Hidden and ignored directories are skipped, symbolic links to directories
/// are not followed. Unreadable entries are logged and skipped.
pub fn collect_sources(root: &Path, config: &ScanConfig) -> SourceFiles {
    let mut files = SourceFiles::default();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry, config));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        match config.source_kind(entry.path()) {
            Some(SourceKind::Primary) => files.primary.push(entry.into_path()),
            Some(SourceKind::Secondary) => files.secondary.push(entry.into_path()),
            None => {}
        }
    }
    files.primary.sort();
    files.secondary.sort();
    files
}

fn is_ignored_dir(entry: &DirEntry, config: &ScanConfig) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(true, |name| config.is_ignored_dir(name))
}

/// Read and extract one file, or `None` if it cannot be read.
pub fn read_contribution(path: &Path, kind: SourceKind) -> Option<FileContribution> {
    match fs::read_to_string(path) {
        Ok(text) => Some(contribution_for(kind, &text)),
        Err(e) => {
            log::warn!("Skipping unreadable file {}: {}", path.display(), e);
            None
        }
    }
}

fn contribution_for(kind: SourceKind, text: &str) -> FileContribution {
    match kind {
        SourceKind::Primary => FileContribution::from_primary(text),
        SourceKind::Secondary => FileContribution::from_secondary(text),
    }
}

/// Build a standalone index of everything under `root`.
pub fn scan_workspace(root: &Path, config: &ScanConfig) -> WorkspaceIndex {
    let sources = collect_sources(root, config);
    let mut index = WorkspaceIndex::new();
    for path in &sources.primary {
        if let Some(contribution) = read_contribution(path, SourceKind::Primary) {
            index.replace_file(path, contribution);
        }
    }
    for path in sources.secondary.iter().take(config.max_secondary_files) {
        if let Some(contribution) = read_contribution(path, SourceKind::Secondary) {
            index.replace_file(path, contribution);
        }
    }
    index
}

/// Shared, concurrently readable workspace index.
///
/// Every file fold-in takes the write lock once; the directory walk and
/// file parsing happen outside the lock.
#[derive(Debug)]
pub struct WorkspaceScanner {
    root: RwLock<PathBuf>,
    config: RwLock<ScanConfig>,
    index: RwLock<WorkspaceIndex>,
    generation: AtomicU64,
}

impl WorkspaceScanner {
    pub fn new(root: impl Into<PathBuf>, config: ScanConfig) -> Self {
        Self {
            root: RwLock::new(root.into()),
            config: RwLock::new(config),
            index: RwLock::new(WorkspaceIndex::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.root.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_root(&self, root: impl Into<PathBuf>) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = root.into();
    }

    pub fn config(&self) -> ScanConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_config(&self, config: ScanConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Read access for several queries against one consistent snapshot
    pub fn index(&self) -> RwLockReadGuard<'_, WorkspaceIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_mut(&self) -> RwLockWriteGuard<'_, WorkspaceIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the index from disk.
    ///
    /// Starting a new scan makes any scan still in progress stop folding in
    /// its results.
    pub fn full_scan(&self) -> ScanSummary {
        let generation = self.begin_scan();
        let root = self.root();
        let config = self.config();

        log::info!("Scanning workspace {}", root.display());

        let sources = collect_sources(&root, &config);
        let secondary: Vec<&PathBuf> = sources
            .secondary
            .iter()
            .take(config.max_secondary_files)
            .collect();
        if sources.secondary.len() > secondary.len() {
            log::debug!(
                "Reading {} of {} secondary files",
                secondary.len(),
                sources.secondary.len()
            );
        }

        let mut summary = ScanSummary::default();
        let work = sources
            .primary
            .iter()
            .map(|path| (path, SourceKind::Primary))
            .chain(secondary.into_iter().map(|path| (path, SourceKind::Secondary)));

        for (path, kind) in work {
            let Some(contribution) = read_contribution(path, kind) else {
                continue;
            };
            if !self.fold_file(generation, path, contribution) {
                log::debug!("Scan of {} superseded", root.display());
                return summary;
            }
            match kind {
                SourceKind::Primary => summary.primary_files += 1,
                SourceKind::Secondary => summary.secondary_files += 1,
            }
        }

        summary.components = self.index().component_count();
        summary.completed = true;
        log::info!(
            "Scan complete: {} components from {} view files and {} script files",
            summary.components,
            summary.primary_files,
            summary.secondary_files
        );
        summary
    }

    /// Start a new scan generation with an empty index.
    fn begin_scan(&self) -> u64 {
        let mut index = self.index_mut();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *index = WorkspaceIndex::new();
        generation
    }

    /// Fold a scanned file into the index unless `generation` was superseded.
    /// The check and the write happen under the same lock.
    fn fold_file(&self, generation: u64, path: &Path, contribution: FileContribution) -> bool {
        let mut index = self.index_mut();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        index.replace_file(path, contribution);
        true
    }

    /// Fold in the current text of one file. Returns false when the path is
    /// neither a primary nor a secondary source, or lies in a directory the
    /// workspace walk skips.
    pub fn update_file(&self, path: &Path, text: &str) -> bool {
        let config = self.config();
        let Some(kind) = config.source_kind(path) else {
            return false;
        };
        if config.is_ignored_path(&self.root(), path) {
            log::debug!("Not indexing {} inside an ignored directory", path.display());
            return false;
        }
        let contribution = contribution_for(kind, text);
        log::trace!(
            "Indexed {} ({} components)",
            path.display(),
            contribution.components.len()
        );
        self.index_mut().replace_file(path, contribution);
        true
    }

    /// Retract a deleted file.
    pub fn remove_file(&self, path: &Path) {
        self.index_mut().remove_file(path);
    }

    pub fn has(&self, component: &str) -> bool {
        self.index().has(component)
    }

    pub fn defining_file(&self, component: &str) -> Option<PathBuf> {
        self.index().defining_file(component).map(Path::to_path_buf)
    }

    pub fn properties_of(&self, component: &str) -> Vec<String> {
        self.index().properties_of(component)
    }

    pub fn all_properties(&self) -> Vec<String> {
        self.index().all_properties()
    }

    pub fn components(&self) -> Vec<String> {
        self.index().components()
    }

    pub fn components_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.index().components_with_prefix(prefix)
    }
}
