//! Document management for the LSP server.
//!
//! Open documents are kept as ropes and edited in place with the
//! incremental changes the client sends.

use dashmap::DashMap;
use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};

/// A document being edited.
#[derive(Debug, Clone)]
pub struct Document {
    /// The document content as a rope for efficient editing.
    pub content: Rope,
    /// The document version.
    pub version: i32,
}

impl Document {
    pub fn new(content: &str, version: i32) -> Self {
        Self {
            content: Rope::from_str(content),
            version,
        }
    }

    /// Get the full text of the document.
    pub fn text(&self) -> String {
        self.content.to_string()
    }

    /// Apply one content change. A change without a range replaces the
    /// whole document.
    pub fn apply_change(&mut self, change: &TextDocumentContentChangeEvent) {
        let Some(range) = change.range else {
            self.content = Rope::from_str(&change.text);
            return;
        };
        let start = self.char_index(range.start);
        let end = self.char_index(range.end);
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.content.remove(start..end);
        self.content.insert(start, &change.text);
    }

    /// Char index of an LSP position. Columns past the line end clamp to it,
    /// lines past the end map to the end of the document.
    fn char_index(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.content.len_lines() {
            return self.content.len_chars();
        }
        let line_start = self.content.line_to_char(line);
        let line_slice = self.content.line(line);

        let mut units = 0u32;
        let mut offset = 0usize;
        for c in line_slice.chars() {
            if units >= position.character || c == '\n' || c == '\r' {
                break;
            }
            units += c.len_utf16() as u32;
            offset += 1;
        }
        line_start + offset
    }
}

/// Document store for managing all open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open a document.
    pub fn open(&self, uri: Url, content: &str, version: i32) {
        self.documents.insert(uri, Document::new(content, version));
    }

    /// Apply changes in order and return the new text, or `None` if the
    /// document is not open.
    pub fn apply_changes(
        &self,
        uri: &Url,
        changes: &[TextDocumentContentChangeEvent],
        version: i32,
    ) -> Option<String> {
        let mut doc = self.documents.get_mut(uri)?;
        for change in changes {
            doc.apply_change(change);
        }
        doc.version = version;
        Some(doc.text())
    }

    /// Close a document.
    pub fn close(&self, uri: &Url) {
        self.documents.remove(uri);
    }

    /// Get a document.
    pub fn get(&self, uri: &Url) -> Option<Document> {
        self.documents.get(uri).map(|doc| doc.clone())
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Range;

    fn change(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(sl, sc), Position::new(el, ec))),
            range_length: None,
            text: text.to_string(),
        }
    }

    fn uri() -> Url {
        Url::parse("file:///w/app.view.tree").unwrap()
    }

    #[test]
    fn test_incremental_replace() {
        let store = DocumentStore::new();
        store.open(uri(), "$component\n\tproperty value\n\tsub /", 1);
        let text = store
            .apply_changes(&uri(), &[change(1, 1, 1, 9, "new_prop")], 2)
            .unwrap();
        assert_eq!(text, "$component\n\tnew_prop value\n\tsub /");
        assert_eq!(store.get(&uri()).unwrap().version, 2);
    }

    #[test]
    fn test_sequential_changes() {
        let store = DocumentStore::new();
        store.open(uri(), "$a $mol_view\n", 1);
        let text = store
            .apply_changes(
                &uri(),
                &[change(1, 0, 1, 0, "\ttitle"), change(1, 6, 1, 6, " \\Hi")],
                2,
            )
            .unwrap();
        assert_eq!(text, "$a $mol_view\n\ttitle \\Hi");
    }

    #[test]
    fn test_full_replacement() {
        let store = DocumentStore::new();
        store.open(uri(), "old", 1);
        let full = TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "new".to_string(),
        };
        assert_eq!(store.apply_changes(&uri(), &[full], 2).as_deref(), Some("new"));
    }

    #[test]
    fn test_utf16_columns() {
        let store = DocumentStore::new();
        store.open(uri(), "\ttitle \\😀x", 1);
        // the emoji occupies columns 8 and 9
        let text = store.apply_changes(&uri(), &[change(0, 10, 0, 11, "y")], 2).unwrap();
        assert_eq!(text, "\ttitle \\😀y");
    }

    #[test]
    fn test_column_past_line_end_clamps() {
        let store = DocumentStore::new();
        store.open(uri(), "ab\ncd", 1);
        let text = store.apply_changes(&uri(), &[change(0, 99, 0, 99, "!")], 2).unwrap();
        assert_eq!(text, "ab!\ncd");
    }

    #[test]
    fn test_unknown_document() {
        let store = DocumentStore::new();
        assert!(store.apply_changes(&uri(), &[], 1).is_none());
        assert!(!store.is_open(&uri()));
    }
}
