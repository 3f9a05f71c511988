//! Structural parser for view.tree documents.
//!
//! A document is a list of root component declarations (`$name $base` at
//! column 0) followed by indented property lines. Parsing never fails: lines
//! that do not fit the grammar are skipped or reported as [`StructuralError`]s.

use crate::position::{utf16_len, SIGIL};
use lsp_types::{Position, Range};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const PROPERTY_NAME_PATTERN: &str = r"^(?:(?:<=>|<=|\^)\s*)?([a-zA-Z_$][a-zA-Z0-9_?*]*)";
const COMPOUND_REF_PATTERN: &str = r"(?:<=>|<=|=>)\s+\w+\s+(\$\w+)";
const BINDING_TARGET_PATTERN: &str =
    r"<=>\s*([a-zA-Z_][a-zA-Z0-9_?*]*)|<=\s*([a-zA-Z_][a-zA-Z0-9_?*]*)";
const LITERAL_VALUE_PATTERN: &str = r"^[a-zA-Z_$][a-zA-Z0-9_?*]*\s+(.+)$";

static PROPERTY_NAME: OnceLock<Regex> = OnceLock::new();
static COMPOUND_REF: OnceLock<Regex> = OnceLock::new();
static BINDING_TARGET: OnceLock<Regex> = OnceLock::new();
static LITERAL_VALUE: OnceLock<Regex> = OnceLock::new();

/// Compile a constant pattern on first use.
pub(crate) fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("invalid built-in pattern"))
}

/// Classification of a named token in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The component declared on the first line
    RootClass,
    /// A component name used as a base class or child
    Class,
    /// A component reference introduced by a binding
    CompoundRef,
    /// A property directly under a root declaration
    Property,
    /// A property at a deeper indentation level
    NestedProperty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingKind {
    OneWay,
    TwoWay,
    Override,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedProperty {
    pub name: String,
    pub range: Range,
    pub line: u32,
    pub indent_level: u32,
    /// True only for one-way and two-way bindings
    pub is_binding: bool,
    pub binding_kind: BindingKind,
    /// Binding target for bindings, literal text otherwise
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedComponent {
    pub name: String,
    /// Range of the name token
    pub range: Range,
    /// Properties in source order
    pub properties: Vec<ParsedProperty>,
    /// Components opened by `<= Name $component` lines inside this one
    pub nested: Vec<ParsedComponent>,
    pub start_line: u32,
    pub end_line: u32,
}

impl ParsedComponent {
    fn open(name: &str, range: Range, line: u32) -> Self {
        Self {
            name: name.to_string(),
            range,
            properties: Vec::new(),
            nested: Vec::new(),
            start_line: line,
            end_line: line,
        }
    }

    /// Whether `line` falls between this component's first and last line
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedNode {
    pub kind: NodeKind,
    pub name: String,
    pub range: Range,
    pub line: u32,
    pub indent_level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralError {
    pub message: String,
    pub range: Range,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseResult {
    /// Root components in source order
    pub components: Vec<ParsedComponent>,
    /// Every named token, in source order
    pub nodes: Vec<ParsedNode>,
    pub errors: Vec<StructuralError>,
}

impl ParseResult {
    /// Node whose name range covers `position`
    pub fn node_at(&self, position: Position) -> Option<&ParsedNode> {
        self.nodes
            .iter()
            .find(|node| crate::position::position_in_range(position, node.range))
    }

    /// Innermost component whose line span contains `line`
    pub fn component_at_line(&self, line: u32) -> Option<&ParsedComponent> {
        let mut current = self.components.iter().find(|c| c.contains_line(line))?;
        while let Some(inner) = current.nested.iter().find(|c| c.contains_line(line)) {
            current = inner;
        }
        Some(current)
    }

    /// Root component whose line span contains `line`
    pub fn root_at_line(&self, line: u32) -> Option<&ParsedComponent> {
        self.components.iter().find(|c| c.contains_line(line))
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Error)
    }
}

/// Count of leading tab and space characters
pub fn indent_level(line: &str) -> usize {
    line.chars().take_while(|c| *c == '\t' || *c == ' ').count()
}

/// Range of `token` starting at byte `start` of `line`
fn token_range(line: &str, line_index: u32, start: usize, token: &str) -> Range {
    let column = utf16_len(&line[..start]);
    Range::new(
        Position::new(line_index, column),
        Position::new(line_index, column + utf16_len(token)),
    )
}

/// Open scopes, ordered by increasing indentation
struct ScopeStack {
    scopes: Vec<(usize, ParsedComponent)>,
}

impl ScopeStack {
    /// Close every scope at `level` or deeper. Returns the root component when
    /// it was among the closed scopes.
    fn close_from(&mut self, level: usize, end_line: u32) -> Option<ParsedComponent> {
        while self.scopes.last().is_some_and(|(l, _)| *l >= level) {
            let Some((_, mut component)) = self.scopes.pop() else {
                break;
            };
            component.end_line = end_line.max(component.start_line);
            match self.scopes.last_mut() {
                Some((_, parent)) => parent.nested.push(component),
                None => return Some(component),
            }
        }
        None
    }

    fn owner(&mut self) -> Option<&mut ParsedComponent> {
        self.scopes.last_mut().map(|(_, component)| component)
    }
}

/// Parse a complete document.
pub fn parse(text: &str) -> ParseResult {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut result = ParseResult::default();
    let mut stack = ScopeStack { scopes: Vec::new() };

    for (index, line) in lines.iter().enumerate() {
        let line_index = index as u32;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        let indent = indent_level(line);
        if indent == 0 {
            if trimmed.starts_with(SIGIL) {
                parse_root_line(line, line_index, trimmed, &mut stack, &mut result);
            }
            continue;
        }

        stack.close_from(indent, line_index.saturating_sub(1));
        if stack.scopes.is_empty() {
            result.errors.push(StructuralError {
                message: "property declared outside any component".to_string(),
                range: Range::new(
                    Position::new(line_index, 0),
                    Position::new(line_index, utf16_len(line)),
                ),
                severity: Severity::Error,
            });
            continue;
        }
        parse_property_line(line, line_index, indent, &mut stack, &mut result);
    }

    let last_line = lines.len().saturating_sub(1) as u32;
    if let Some(root) = stack.close_from(0, last_line) {
        result.components.push(root);
    }
    result
}

fn parse_root_line(
    line: &str,
    line_index: u32,
    trimmed: &str,
    stack: &mut ScopeStack,
    result: &mut ParseResult,
) {
    if let Some(previous) = stack.close_from(0, line_index.saturating_sub(1)) {
        result.components.push(previous);
    }

    let Some(name) = trimmed.split_whitespace().next() else {
        return;
    };
    let start = line.find(name).unwrap_or(0);
    let range = token_range(line, line_index, start, name);

    // Only the very first declaration of the file is its own class
    let name_column = range.start.character + SIGIL.len_utf16() as u32;
    let kind = if line_index == 0 && name_column == 1 {
        NodeKind::RootClass
    } else {
        NodeKind::Class
    };
    result.nodes.push(ParsedNode {
        kind,
        name: name.to_string(),
        range,
        line: line_index,
        indent_level: 0,
    });
    stack
        .scopes
        .push((0, ParsedComponent::open(name, range, line_index)));
}

fn parse_property_line(
    line: &str,
    line_index: u32,
    indent: usize,
    stack: &mut ScopeStack,
    result: &mut ParseResult,
) {
    let trimmed = line.trim();
    let leading = line.len() - line.trim_start().len();

    let Some(captures) = regex(&PROPERTY_NAME, PROPERTY_NAME_PATTERN).captures(trimmed) else {
        // String continuations, list markers and similar carry no name
        return;
    };
    let Some(name_match) = captures.get(1) else {
        return;
    };
    let name = name_match.as_str();
    let range = token_range(line, line_index, leading + name_match.start(), name);

    let (binding_kind, value) = if trimmed.contains("<=>") {
        (BindingKind::TwoWay, binding_target(trimmed))
    } else if trimmed.contains("<=") {
        (BindingKind::OneWay, binding_target(trimmed))
    } else if trimmed.contains('^') {
        (BindingKind::Override, None)
    } else {
        let literal = regex(&LITERAL_VALUE, LITERAL_VALUE_PATTERN)
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
        (BindingKind::None, literal)
    };

    let kind = if name.starts_with(SIGIL) {
        NodeKind::CompoundRef
    } else if indent == 1 {
        NodeKind::Property
    } else {
        NodeKind::NestedProperty
    };
    result.nodes.push(ParsedNode {
        kind,
        name: name.to_string(),
        range,
        line: line_index,
        indent_level: indent as u32,
    });

    let property = ParsedProperty {
        name: name.to_string(),
        range,
        line: line_index,
        indent_level: indent as u32,
        is_binding: matches!(binding_kind, BindingKind::OneWay | BindingKind::TwoWay),
        binding_kind,
        value,
    };
    if let Some(owner) = stack.owner() {
        owner.properties.push(property);
    }

    // `<= Name $component` opens a nested scope for the lines below it
    let compound = regex(&COMPOUND_REF, COMPOUND_REF_PATTERN)
        .captures(trimmed)
        .and_then(|c| c.get(1));
    if let Some(component) = compound {
        let range = token_range(line, line_index, leading + component.start(), component.as_str());
        stack
            .scopes
            .push((indent, ParsedComponent::open(component.as_str(), range, line_index)));
    }
}

fn binding_target(trimmed: &str) -> Option<String> {
    let captures = regex(&BINDING_TARGET, BINDING_TARGET_PATTERN).captures(trimmed)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}
