//! Hover documentation for view.tree documents.
//!
//! Components show their file, properties and script documentation;
//! properties show their owner plus type information for well-known names.

use std::fs;
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};
use viewtree_core::{current_component, NodeKind};

use crate::context::DocumentContext;

const MAX_LISTED_PROPERTIES: usize = 10;

/// Type and description of a well-known name.
#[derive(Debug, Clone, Copy)]
pub struct NameInfo {
    pub type_name: &'static str,
    pub description: &'static str,
}

/// Get hover information for the word at `position`.
pub fn get_hover(ctx: &DocumentContext<'_>, position: Position) -> Option<Hover> {
    let target = ctx.target_at(position)?;

    let value = match target.kind {
        NodeKind::RootClass => component_hover(ctx, &target.name, true)?,
        NodeKind::Class => component_hover(ctx, &target.name, false)?,
        NodeKind::CompoundRef => css_class_hover(ctx, &target.name),
        NodeKind::Property | NodeKind::NestedProperty => {
            let line = ctx.text.split('\n').nth(position.line as usize).unwrap_or_default();
            let is_value = line.len() - line.trim_start().len() < target.range.start.character as usize;
            match special_value_info(&target.name) {
                Some(info) if is_value => generic_hover(&target.name, info),
                _ => property_hover(ctx, &target.name, position),
            }
        }
    };

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(target.range),
    })
}

fn component_hover(ctx: &DocumentContext<'_>, name: &str, with_docs: bool) -> Option<String> {
    if !ctx.index.has(name) {
        return None;
    }

    let mut lines = vec![format!("**Component**: `{name}`"), String::new()];

    if let Some(file) = ctx.index.defining_file(name) {
        lines.push(format!("**File**: `{}`", ctx.relative(file)));
        lines.push(String::new());
    }

    let properties = ctx.index.properties_of(name);
    if !properties.is_empty() {
        lines.push("**Properties**:".to_string());
        for prop in properties.iter().take(MAX_LISTED_PROPERTIES) {
            lines.push(format!("- `{prop}`"));
        }
        if properties.len() > MAX_LISTED_PROPERTIES {
            lines.push(format!(
                "- ... and {} more",
                properties.len() - MAX_LISTED_PROPERTIES
            ));
        }
        lines.push(String::new());
    }

    if with_docs {
        if let Some(doc) = script_documentation(ctx, name) {
            lines.push("**Documentation**:".to_string());
            lines.push(doc);
            lines.push(String::new());
        }
    }

    lines.push("**Usage**:".to_string());
    lines.push("```tree".to_string());
    lines.push(name.to_string());
    if !properties.is_empty() {
        lines.push("\tproperty <= value".to_string());
    }
    lines.push("```".to_string());

    Some(lines.join("\n"))
}

/// JSDoc block directly above `export class <name>` in the sibling script.
fn script_documentation(ctx: &DocumentContext<'_>, name: &str) -> Option<String> {
    let script = ctx.sibling(&ctx.scan.secondary_suffix)?;
    let content = fs::read_to_string(script).ok()?;
    let pattern = format!(
        r"/\*\*([\s\S]*?)\*/\s*export\s+class\s+{}\b",
        regex::escape(name)
    );
    let re = regex::Regex::new(&pattern).ok()?;
    let comment = re.captures(&content)?.get(1)?.as_str();

    let doc: Vec<&str> = comment
        .lines()
        .map(|line| {
            let line = line.trim_start();
            line.strip_prefix('*').unwrap_or(line).trim()
        })
        .filter(|line| !line.is_empty())
        .collect();
    (!doc.is_empty()).then(|| doc.join("\n"))
}

fn css_class_hover(ctx: &DocumentContext<'_>, name: &str) -> String {
    let mut lines = vec![format!("**CSS Class**: `{name}`"), String::new()];

    match ctx.sibling(".css.ts") {
        Some(css) => {
            lines.push(format!("**Defined in**: `{}`", ctx.relative(&css)));
            lines.push(String::new());
            let rule = fs::read_to_string(&css)
                .ok()
                .and_then(|content| css_rule(&content, name));
            if let Some(rule) = rule {
                lines.push("**CSS Rules**:".to_string());
                lines.push("```css".to_string());
                lines.push(rule);
                lines.push("```".to_string());
            }
        }
        None => lines.push("*CSS file not found*".to_string()),
    }

    lines.join("\n")
}

/// Body of `name: { ... }` with blank lines dropped and each line trimmed.
fn css_rule(content: &str, name: &str) -> Option<String> {
    let pattern = format!(r"{}\s*:\s*\{{([^}}]+)\}}", regex::escape(name));
    let re = regex::Regex::new(&pattern).ok()?;
    let body = re.captures(content)?.get(1)?.as_str();
    let rule: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    (!rule.is_empty()).then(|| rule.join("\n"))
}

fn property_hover(ctx: &DocumentContext<'_>, name: &str, position: Position) -> String {
    let mut lines = vec![format!("**Property**: `{name}`"), String::new()];

    if let Some(component) = current_component(ctx.text, position) {
        lines.push(format!("**Component**: `{component}`"));
        lines.push(String::new());
    }

    if let Some(info) = property_info(name) {
        lines.push(format!("**Type**: {}", info.type_name));
        lines.push(String::new());
        lines.push(format!("**Description**: {}", info.description));
        lines.push(String::new());
    }

    let examples = property_examples(name);
    if !examples.is_empty() {
        lines.push("**Usage**:".to_string());
        lines.push("```tree".to_string());
        lines.extend(examples.iter().map(|e| e.to_string()));
        lines.push("```".to_string());
    }

    lines.join("\n")
}

fn generic_hover(name: &str, info: NameInfo) -> String {
    [
        format!("**Element**: `{name}`"),
        String::new(),
        format!("**Type**: {}", info.type_name),
        String::new(),
        format!("**Description**: {}", info.description),
    ]
    .join("\n")
}

/// Type information for properties every view component understands.
pub fn property_info(name: &str) -> Option<NameInfo> {
    let (type_name, description) = match name {
        "dom_name" => ("string", "HTML tag name for the DOM element"),
        "dom_name_space" => ("string", "XML namespace for the DOM element"),
        "attr" => ("Dictionary<string>", "HTML attributes for the DOM element"),
        "field" => ("any", "Form field value binding"),
        "value" => ("any", "Element value or content"),
        "enabled" => ("boolean", "Whether the element is enabled"),
        "visible" => ("boolean", "Whether the element is visible"),
        "title" => ("string", "Element title or tooltip text"),
        "hint" => ("string", "Hint text for the element"),
        "sub" => ("Array<$mol_view>", "Child elements or components"),
        "event" => ("Dictionary<Function>", "Event handlers"),
        "plugins" => ("Array<$mol_plugin>", "Plugins to apply to the element"),
        _ => return None,
    };
    Some(NameInfo {
        type_name,
        description,
    })
}

fn property_examples(name: &str) -> &'static [&'static str] {
    match name {
        "dom_name" => &["\tdom_name \\div", "\tdom_name \\span"],
        "attr" => &["\tattr *", "\t\tclass \\my-class", "\t\tid \\my-id"],
        "field" => &["\tfield <= value", "\tfield <=> current_value"],
        "value" => &["\tvalue \\Hello World", "\tvalue <= text"],
        "enabled" => &["\tenabled <= is_active", "\tenabled true"],
        "visible" => &["\tvisible <= show_element", "\tvisible false"],
        "sub" => &["\tsub /", "\t\t<= items", "\t\t$my_component"],
        "event" => &["\tevent *", "\t\tclick <= handle_click"],
        _ => &[],
    }
}

/// Meaning of the literal values and markers of the format.
pub fn special_value_info(value: &str) -> Option<NameInfo> {
    let (type_name, description) = match value {
        "null" => ("null", "Represents an empty or undefined value"),
        "true" => ("boolean", "Boolean true value"),
        "false" => ("boolean", "Boolean false value"),
        "/" => ("list", "Empty list marker"),
        "*" => ("dictionary", "Dictionary marker for key-value pairs"),
        "\\" => ("string", "String literal marker"),
        "@\\" => ("localized string", "Localized string literal marker"),
        _ => return None,
    };
    Some(NameInfo {
        type_name,
        description,
    })
}
