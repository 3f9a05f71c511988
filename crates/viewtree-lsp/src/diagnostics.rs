//! Diagnostic generation for view.tree documents.
//!
//! Generates LSP diagnostics for:
//! - Structural errors reported by the parser
//! - Malformed names, indentation and binding operators
//! - Components missing from the workspace index
//! - Duplicate components and properties

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};
use viewtree_core::parser::indent_level;
use viewtree_core::position::{utf16_len, SIGIL};
use viewtree_core::{parse, DiagnosticsConfig, ParsedComponent, Severity, WorkspaceIndex};

const SOURCE: &str = "view.tree";
const RESERVED_PROPERTIES: [&str; 3] = ["constructor", "prototype", "__proto__"];

fn diagnostic(range: Range, severity: DiagnosticSeverity, code: &str, message: String) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(severity),
        code: Some(NumberOrString::String(code.to_string())),
        code_description: None,
        source: Some(SOURCE.to_string()),
        message,
        related_information: None,
        tags: None,
        data: None,
    }
}

fn line_range(line: u32, start: u32, end: u32) -> Range {
    Range::new(Position::new(line, start), Position::new(line, end))
}

fn is_component_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some(SIGIL)
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_property_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == SIGIL)
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '?' | '*'))
}

/// All diagnostics for a document.
pub fn get_diagnostics(
    text: &str,
    index: &WorkspaceIndex,
    config: &DiagnosticsConfig,
) -> Vec<Diagnostic> {
    let parsed = parse(text);
    let lines: Vec<&str> = text.split('\n').collect();

    let mut diagnostics: Vec<Diagnostic> = parsed
        .errors
        .iter()
        .map(|error| {
            let severity = match error.severity {
                Severity::Error => DiagnosticSeverity::ERROR,
                Severity::Warning => DiagnosticSeverity::WARNING,
                Severity::Info => DiagnosticSeverity::INFORMATION,
            };
            diagnostic(error.range, severity, "structure", error.message.clone())
        })
        .collect();

    diagnostics.extend(syntax_diagnostics(&lines));
    diagnostics.extend(component_diagnostics(&parsed.components, &lines, index, config));
    diagnostics.extend(property_diagnostics(&parsed.components));
    diagnostics.extend(indentation_diagnostics(&lines, config));
    diagnostics.extend(binding_diagnostics(&lines));
    diagnostics
}

/// Every occurrence of a key after its first one, in input order.
pub fn later_duplicates<'a, T, K, F>(items: &'a [T], key: F) -> Vec<&'a T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&'a T) -> K,
{
    let mut seen = std::collections::HashSet::new();
    items.iter().filter(|item| !seen.insert(key(*item))).collect()
}

fn syntax_diagnostics(lines: &[&str]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let line_index = index as u32;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        if trimmed.starts_with(SIGIL) {
            if let Some(name) = trimmed.split_whitespace().next() {
                if !is_component_name(name) {
                    let start = line.find(name).map(|i| utf16_len(&line[..i])).unwrap_or(0);
                    diagnostics.push(diagnostic(
                        line_range(line_index, start, start + utf16_len(name)),
                        DiagnosticSeverity::ERROR,
                        "invalid-component-name",
                        format!(
                            "Invalid component name: {name}. Component names must start with $ followed by letters, numbers, or underscores."
                        ),
                    ));
                }
            }
        }

        let leading = &line[..line.len() - line.trim_start().len()];
        if leading.contains('\t') && leading.contains(' ') {
            diagnostics.push(diagnostic(
                line_range(line_index, 0, utf16_len(leading)),
                DiagnosticSeverity::WARNING,
                "mixed-indentation",
                "Mixed tabs and spaces in indentation. Use either tabs or spaces consistently."
                    .to_string(),
            ));
        }
    }
    diagnostics
}

/// Base class named on a root declaration line
fn base_class<'a>(lines: &[&'a str], component: &ParsedComponent) -> Option<(&'a str, Range)> {
    let line: &'a str = lines.get(component.start_line as usize).copied()?;
    let mut tokens = line.split_whitespace();
    tokens.next()?;
    let base = tokens.next().filter(|t| t.starts_with(SIGIL))?;
    let name_end = line.find(component.name.as_str())? + component.name.len();
    let start = name_end + line[name_end..].find(base)?;
    let column = utf16_len(&line[..start]);
    Some((base, line_range(component.start_line, column, column + utf16_len(base))))
}

fn component_diagnostics(
    components: &[ParsedComponent],
    lines: &[&str],
    index: &WorkspaceIndex,
    config: &DiagnosticsConfig,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.unknown_components {
        let mut referenced: Vec<(&str, Range)> = Vec::new();
        for component in components {
            referenced.push((component.name.as_str(), component.range));
            referenced.extend(base_class(lines, component));
            referenced.extend(component.nested.iter().map(|c| (c.name.as_str(), c.range)));
        }
        for (name, range) in referenced {
            if !index.has(name) && !config.is_builtin(name) {
                diagnostics.push(diagnostic(
                    range,
                    DiagnosticSeverity::WARNING,
                    "unknown-component",
                    format!(
                        "Component '{name}' not found in project. Consider defining it or check the spelling."
                    ),
                ));
            }
        }
    }

    for duplicate in later_duplicates(components, |c| c.name.as_str()) {
        diagnostics.push(diagnostic(
            duplicate.range,
            DiagnosticSeverity::ERROR,
            "duplicate-component",
            format!("Duplicate component definition: {}", duplicate.name),
        ));
    }
    diagnostics
}

fn property_diagnostics(components: &[ParsedComponent]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for component in components {
        for property in &component.properties {
            if !is_property_name(&property.name) {
                diagnostics.push(diagnostic(
                    property.range,
                    DiagnosticSeverity::ERROR,
                    "invalid-property-name",
                    format!(
                        "Invalid property name: {}. Property names must start with a letter, $, or underscore.",
                        property.name
                    ),
                ));
            } else if RESERVED_PROPERTIES.contains(&property.name.as_str()) {
                diagnostics.push(diagnostic(
                    property.range,
                    DiagnosticSeverity::ERROR,
                    "reserved-property-name",
                    format!("Reserved property name: {}. Choose a different name.", property.name),
                ));
            }

            if let Some(target) = property.value.as_deref().filter(|_| property.is_binding) {
                if !is_property_name(target) {
                    diagnostics.push(diagnostic(
                        property.range,
                        DiagnosticSeverity::ERROR,
                        "invalid-binding-target",
                        format!("Invalid binding target: {target}"),
                    ));
                }
            }
        }

        // Only direct members: deeper lines repeat keys of different dictionaries
        let direct: Vec<_> = component
            .properties
            .iter()
            .filter(|p| p.indent_level == 1)
            .collect();
        for duplicate in later_duplicates(&direct, |p| p.name.clone()) {
            diagnostics.push(diagnostic(
                duplicate.range,
                DiagnosticSeverity::WARNING,
                "duplicate-property",
                format!("Duplicate property: {}", duplicate.name),
            ));
        }
    }
    diagnostics
}

fn indentation_diagnostics(lines: &[&str], config: &DiagnosticsConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut last_indent = 0usize;

    for (index, line) in lines.iter().enumerate() {
        let line_index = index as u32;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let indent = indent_level(line);

        if trimmed.starts_with(SIGIL) && indent == 1 {
            diagnostics.push(diagnostic(
                line_range(line_index, 0, indent as u32),
                DiagnosticSeverity::ERROR,
                "indented-component",
                "Component definitions should not be indented.".to_string(),
            ));
        }

        if !trimmed.starts_with(SIGIL) && indent == 0 {
            diagnostics.push(diagnostic(
                line_range(line_index, 0, 1),
                DiagnosticSeverity::ERROR,
                "unindented-property",
                "Properties must be indented under their component.".to_string(),
            ));
        }

        if indent > last_indent + config.max_indent_jump {
            diagnostics.push(diagnostic(
                line_range(line_index, 0, indent as u32),
                DiagnosticSeverity::WARNING,
                "indentation-jump",
                "Indentation increased by more than one level. This might indicate a structural issue."
                    .to_string(),
            ));
        }
        last_indent = indent;
    }
    diagnostics
}

/// Maximal runs of `<`, `=` and `>` with their byte offsets
fn operator_runs(code: &str) -> Vec<(usize, &str)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, c) in code.char_indices() {
        let is_op = matches!(c, '<' | '=' | '>');
        match (is_op, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, &code[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, &code[s..]));
    }
    runs
}

fn binding_diagnostics(lines: &[&str]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let line_index = index as u32;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        // String literal content after `\` is free text
        let code = match line.find('\\') {
            Some(literal) => &line[..literal],
            None => line,
        };

        let runs = operator_runs(code);
        for &(offset, run) in &runs {
            let column = utf16_len(&line[..offset]);
            let range = line_range(line_index, column, column + utf16_len(run));
            let problem = match run {
                "<=" | "<=>" => {
                    let rest = &code[offset + run.len()..];
                    rest.trim().is_empty().then(|| {
                        (
                            "missing-binding-target",
                            format!("Binding operator {run} must be followed by a property name"),
                        )
                    })
                }
                "=>" => None,
                "=" => Some((
                    "malformed-operator",
                    "Use <= or <=> for bindings, not =".to_string(),
                )),
                _ if run.starts_with('<') => Some((
                    "malformed-operator",
                    "Incomplete binding operator. Use <= or <=>".to_string(),
                )),
                _ => Some((
                    "malformed-operator",
                    "Invalid operator. Use <= or <=>".to_string(),
                )),
            };
            if let Some((kind, message)) = problem {
                diagnostics.push(diagnostic(range, DiagnosticSeverity::ERROR, kind, message));
            }
        }

        let has_one_way = runs.iter().any(|(_, run)| *run == "<=");
        let has_two_way = runs.iter().any(|(_, run)| *run == "<=>");
        if has_one_way && has_two_way {
            diagnostics.push(diagnostic(
                line_range(line_index, 0, utf16_len(line)),
                DiagnosticSeverity::ERROR,
                "conflicting-bindings",
                "Cannot use both <= and <=> operators in the same line.".to_string(),
            ));
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use viewtree_core::FileContribution;

    fn codes(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics
            .iter()
            .filter_map(|d| match &d.code {
                Some(NumberOrString::String(code)) => Some(code.clone()),
                _ => None,
            })
            .collect()
    }

    fn check(text: &str) -> Vec<Diagnostic> {
        let mut index = WorkspaceIndex::new();
        index.replace_file(Path::new("/w/doc.view.tree"), FileContribution::from_primary(text));
        get_diagnostics(text, &index, &DiagnosticsConfig::default())
    }

    #[test]
    fn test_clean_document() {
        let text = "$my_app $mol_view\n\tsub /\n\t\t<= Button $mol_button\n\t\t\tclick? <=> go? null\n\t\t\ttitle @ \\Go = now\n\tenabled true\n";
        assert!(check(text).is_empty(), "{:?}", check(text));
    }

    #[test]
    fn test_parser_errors_are_reported() {
        let diagnostics = check("\torphan 1");
        assert!(codes(&diagnostics).contains(&"structure".to_string()));
        assert_eq!(diagnostics[0].source.as_deref(), Some("view.tree"));
    }

    #[test]
    fn test_unknown_base_class() {
        let diagnostics = check("$my_app $my_missing\n");
        assert_eq!(codes(&diagnostics), ["unknown-component"]);
        assert_eq!(
            diagnostics[0].range,
            Range::new(Position::new(0, 8), Position::new(0, 19))
        );
    }

    #[test]
    fn test_unknown_components_can_be_disabled() {
        let config = DiagnosticsConfig {
            unknown_components: false,
            ..DiagnosticsConfig::default()
        };
        let diagnostics = get_diagnostics("$my_app $my_missing\n", &WorkspaceIndex::new(), &config);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_duplicates() {
        let text = "$a $mol_view\n\tx 1\n\tx 2\n$a $mol_view\n";
        let diagnostics = check(text);
        let found = codes(&diagnostics);
        assert!(found.contains(&"duplicate-component".to_string()));
        assert!(found.contains(&"duplicate-property".to_string()));

        let duplicate = diagnostics
            .iter()
            .find(|d| d.message == "Duplicate component definition: $a")
            .unwrap();
        assert_eq!(duplicate.range.start.line, 3);
        let property = diagnostics
            .iter()
            .find(|d| d.message == "Duplicate property: x")
            .unwrap();
        assert_eq!(property.range.start.line, 2);
    }

    #[test]
    fn test_later_duplicates() {
        let items = ["a", "b", "a", "c", "b", "a"];
        let found: Vec<usize> = later_duplicates(&items, |s| *s)
            .into_iter()
            .map(|s| items.iter().position(|i| std::ptr::eq(i, s)).unwrap())
            .collect();
        assert_eq!(found, [2, 4, 5]);
    }

    #[test]
    fn test_nested_dictionary_keys_are_not_duplicates() {
        let text = "$a $mol_view\n\tattr *\n\t\tid \\x\n\tstyle *\n\t\tid \\y\n";
        assert!(!codes(&check(text)).contains(&"duplicate-property".to_string()));
    }

    #[test]
    fn test_reserved_property() {
        let diagnostics = check("$a $mol_view\n\tconstructor 1\n");
        assert_eq!(codes(&diagnostics), ["reserved-property-name"]);
    }

    #[test]
    fn test_invalid_component_name() {
        let diagnostics = check("$my-app $mol_view\n");
        assert!(codes(&diagnostics).contains(&"invalid-component-name".to_string()));
    }

    #[test]
    fn test_indentation_checks() {
        let text = "$a $mol_view\n\t\t\tdeep 1\n\t$b\nloose\n \tmixed 1\n";
        let found = codes(&check(text));
        assert!(found.contains(&"indentation-jump".to_string()));
        assert!(found.contains(&"indented-component".to_string()));
        assert!(found.contains(&"unindented-property".to_string()));
        assert!(found.contains(&"mixed-indentation".to_string()));
    }

    #[test]
    fn test_binding_operator_checks() {
        let found = codes(&check("$a $mol_view\n\tvalue <=\n"));
        assert_eq!(found, ["missing-binding-target"]);

        let found = codes(&check("$a $mol_view\n\tvalue = x\n"));
        assert_eq!(found, ["malformed-operator"]);

        let found = codes(&check("$a $mol_view\n\tvalue < x\n"));
        assert_eq!(found, ["malformed-operator"]);

        let diagnostics = check("$a $mol_view\n\tvalue <= x <=> y\n");
        assert!(codes(&diagnostics).contains(&"conflicting-bindings".to_string()));
    }

    #[test]
    fn test_operator_inside_string_literal_ignored() {
        assert!(check("$a $mol_view\n\ttitle \\a = b < c\n").is_empty());
    }
}
