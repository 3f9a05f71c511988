//! # viewtree-core
//!
//! Parsing and indexing for `.view.tree` component descriptions.
//!
//! - [`parser`]: line-oriented structural parser producing components,
//!   properties, bindings and positioned nodes
//! - [`position`]: UTF-16 aware position, offset and range helpers
//! - [`classifier`]: what the word under the cursor denotes
//! - [`scanner`] / [`index`]: workspace walk and the shared component index
//!
//! ## Example
//!
//! ```
//! use viewtree_core::parser::parse;
//!
//! let result = parse("$my_app $mol_view\n\ttitle @ \\Hello");
//! assert_eq!(result.components[0].name, "$my_app");
//! assert_eq!(result.components[0].properties[0].name, "title");
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod index;
pub mod parser;
pub mod position;
pub mod scanner;

pub use classifier::{
    classify, completion_context, current_component, is_compound_declaration, CompletionContext,
};
pub use config::{Config, DiagnosticsConfig, ScanConfig, SourceKind};
pub use error::{Error, Result};
pub use index::{FileContribution, WorkspaceIndex};
pub use parser::{
    parse, BindingKind, NodeKind, ParseResult, ParsedComponent, ParsedNode, ParsedProperty,
    Severity, StructuralError,
};
pub use scanner::{scan_workspace, ScanSummary, WorkspaceScanner};
