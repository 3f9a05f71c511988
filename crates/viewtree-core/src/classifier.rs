//! Cursor-level classification: what a word under the cursor denotes, which
//! component encloses a line, and what kind of completion fits.

use crate::parser::{indent_level, regex, NodeKind};
use crate::position::{utf16_to_byte, SIGIL};
use lsp_types::{Position, Range};
use regex::Regex;
use std::sync::OnceLock;

const LINE_COMPONENT_PATTERN: &str = r"(?:<=>|<=|=>)\s+\w+\s+(\$\w+)|^\s*(\$\w+)";
const COMPOUND_DECLARATION_PATTERN: &str = r"(?:<=>|<=|=>)\s+(\w+)\s+\$\w+";

static LINE_COMPONENT: OnceLock<Regex> = OnceLock::new();
static COMPOUND_DECLARATION: OnceLock<Regex> = OnceLock::new();

/// Classify the word covering `word_range`.
///
/// Only the line text is consulted, so the result is available even while a
/// document is half typed.
pub fn classify(text: &str, position: Position, word_range: Range) -> NodeKind {
    let line = text.split('\n').nth(position.line as usize);

    // Measure from the first character after the sigil
    let word_start = word_range.start.character;
    let starts_with_sigil = line
        .map(|l| l[utf16_to_byte(l, word_start)..].starts_with(SIGIL))
        .unwrap_or(false);
    let name_start = if starts_with_sigil { word_start + 1 } else { word_start };

    if word_range.start.line == 0 && name_start == 1 {
        return NodeKind::RootClass;
    }

    let Some(line) = line else {
        return NodeKind::NestedProperty;
    };

    let before_name = &line[..utf16_to_byte(line, name_start)];
    if before_name.ends_with(SIGIL) {
        return NodeKind::Class;
    }

    let before_word = &line[..utf16_to_byte(line, word_start)];
    let indent = indent_level(line);
    if indent > 0 && indent == indent_unit(text) && before_word.len() == indent {
        return NodeKind::Property;
    }

    if before_word.trim_end().ends_with(&['>', '=', '^'][..]) {
        return NodeKind::Property;
    }

    NodeKind::NestedProperty
}

/// Width of one indentation step: the indentation of the first indented
/// line, or a single character when nothing is indented yet.
pub fn indent_unit(text: &str) -> usize {
    text.split('\n')
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with("//")
        })
        .map(indent_level)
        .find(|level| *level > 0)
        .unwrap_or(1)
}

/// Component named on `line`, either a root declaration or the target of a
/// compound binding.
pub fn component_on_line(line: &str) -> Option<&str> {
    let captures = regex(&LINE_COMPONENT, LINE_COMPONENT_PATTERN).captures(line)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str())
}

/// Whether the word at `word_range` names a sub-component, as `Button` does
/// in `<= Button $mol_button`.
pub fn is_compound_declaration(text: &str, word_range: Range) -> bool {
    let Some(line) = text.split('\n').nth(word_range.start.line as usize) else {
        return false;
    };
    let re = regex(&COMPOUND_DECLARATION, COMPOUND_DECLARATION_PATTERN);
    let start = utf16_to_byte(line, word_range.start.character);
    re.captures_iter(line)
        .filter_map(|c| c.get(1))
        .any(|m| m.start() == start)
}

/// Name of the component in effect at `position`, found by walking upward
/// through lines of smaller indentation.
pub fn current_component(text: &str, position: Position) -> Option<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let current = *lines.get(position.line as usize)?;

    if let Some(name) = component_on_line(current) {
        return Some(name.to_string());
    }

    let indent = indent_level(current);
    for line in lines[..position.line as usize].iter().rev() {
        if line.trim().is_empty() {
            continue;
        }
        let level = indent_level(line);
        if level < indent {
            if let Some(name) = component_on_line(line) {
                return Some(name.to_string());
            }
        }
        if level == 0 && line.starts_with(SIGIL) {
            return line.split_whitespace().next().map(str::to_string);
        }
    }
    None
}

/// What the user is typing at the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionContext {
    /// A component name at the start of a root line
    ComponentName,
    /// The base class after a root component name
    ComponentExtends,
    /// The target of a `<=` or `<=>` binding
    PropertyBinding,
    /// A property name inside `component`
    PropertyName { component: Option<String> },
    /// A value after a property name
    Value,
}

/// Determine the completion context from the text before the cursor.
pub fn completion_context(text: &str, position: Position) -> Option<CompletionContext> {
    let line = text.split('\n').nth(position.line as usize)?;
    let before = &line[..utf16_to_byte(line, position.character)];
    let indent = before.len() - before.trim_start().len();
    let typed = before.trim();

    let context = if typed.starts_with(SIGIL) && !typed.contains(char::is_whitespace) {
        CompletionContext::ComponentName
    } else if indent == 0 && !typed.contains(' ') {
        CompletionContext::ComponentName
    } else if indent == 0 {
        CompletionContext::ComponentExtends
    } else if typed.contains("<=") {
        CompletionContext::PropertyBinding
    } else if before.trim_start().contains(char::is_whitespace) {
        CompletionContext::Value
    } else {
        CompletionContext::PropertyName {
            component: current_component(text, position),
        }
    };
    Some(context)
}
