//! What the providers know about the document they are asked about.

use std::fs;
use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::{Location, Position, Range, Url};
use viewtree_core::position::{text_in_range, word_range_at, LineIndex};
use viewtree_core::{classify, is_compound_declaration, NodeKind, ScanConfig, WorkspaceIndex};

/// A document snapshot together with the workspace it belongs to.
pub struct DocumentContext<'a> {
    pub text: &'a str,
    /// Local path of the document, if it has one
    pub path: Option<&'a Path>,
    pub root: &'a Path,
    pub scan: &'a ScanConfig,
    pub index: &'a WorkspaceIndex,
}

/// The classified word under the cursor
#[derive(Debug, Clone, PartialEq)]
pub struct CursorTarget {
    pub name: String,
    pub range: Range,
    pub kind: NodeKind,
}

impl<'a> DocumentContext<'a> {
    /// Classify the word at `position`. Sub-component names such as `Button`
    /// in `<= Button $mol_button` are reported as compound references.
    pub fn target_at(&self, position: Position) -> Option<CursorTarget> {
        let range = word_range_at(self.text, position)?;
        let name = text_in_range(self.text, range)?.to_string();
        let kind = match classify(self.text, position, range) {
            NodeKind::Property | NodeKind::NestedProperty
                if is_compound_declaration(self.text, range) =>
            {
                NodeKind::CompoundRef
            }
            kind => kind,
        };
        Some(CursorTarget { name, range, kind })
    }

    /// Existing sibling of the document with its primary suffix replaced
    pub fn sibling(&self, suffix: &str) -> Option<PathBuf> {
        let sibling = self.scan.sibling(self.path?, suffix)?;
        sibling.is_file().then_some(sibling)
    }

    /// `path` relative to the workspace root when it lies inside it
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Location of the first match of `pattern` in the file at `path`, starting
/// at its first capture group when it has one. The range spans `len` UTF-16
/// units.
pub fn find_in_file(path: &Path, pattern: &str, len: u32) -> Option<Location> {
    let content = fs::read_to_string(path).ok()?;
    let re = regex::Regex::new(pattern).ok()?;
    let captures = re.captures(&content)?;
    let found = captures.get(1).or_else(|| captures.get(0))?;
    location_at(path, &content, found.start(), len)
}

/// Location covering `len` UTF-16 units from byte `offset` of `content`.
pub fn location_at(path: &Path, content: &str, offset: usize, len: u32) -> Option<Location> {
    let start = LineIndex::new(content).position(content, offset);
    let end = Position::new(start.line, start.character + len);
    Some(Location::new(file_url(path)?, Range::new(start, end)))
}

/// Location of the start of a file
pub fn file_start(path: &Path) -> Option<Location> {
    Some(Location::new(file_url(path)?, Range::default()))
}

pub fn file_url(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "$my_app $mol_view\n\tsub /\n\t\t<= Button $mol_button\n\ttitle \\x";

    fn context<'a>(index: &'a WorkspaceIndex, scan: &'a ScanConfig) -> DocumentContext<'a> {
        DocumentContext {
            text: TEXT,
            path: Some(Path::new("/w/app/app.view.tree")),
            root: Path::new("/w"),
            scan,
            index,
        }
    }

    #[test]
    fn test_targets() {
        let index = WorkspaceIndex::new();
        let scan = ScanConfig::default();
        let ctx = context(&index, &scan);

        let root = ctx.target_at(Position::new(0, 2)).unwrap();
        assert_eq!(root.name, "$my_app");
        assert_eq!(root.kind, NodeKind::RootClass);

        let button = ctx.target_at(Position::new(2, 6)).unwrap();
        assert_eq!(button.name, "Button");
        assert_eq!(button.kind, NodeKind::CompoundRef);

        let title = ctx.target_at(Position::new(3, 2)).unwrap();
        assert_eq!(title.kind, NodeKind::Property);

        assert!(ctx.target_at(Position::new(1, 5)).is_none());
    }

    #[test]
    fn test_relative_path() {
        let index = WorkspaceIndex::new();
        let scan = ScanConfig::default();
        let ctx = context(&index, &scan);
        assert_eq!(ctx.relative(Path::new("/w/app/app.view.tree")), "app/app.view.tree");
        assert_eq!(ctx.relative(Path::new("/elsewhere/x.ts")), "/elsewhere/x.ts");
    }
}
