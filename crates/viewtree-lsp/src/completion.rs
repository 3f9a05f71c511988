//! Completion provider for view.tree documents.
//!
//! Offers, depending on the cursor context:
//! - Component names from the workspace index
//! - Properties of the enclosing component
//! - Binding operators
//! - Special values and string literal snippets

use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Documentation, InsertTextFormat};
use viewtree_core::{CompletionContext, WorkspaceIndex};

/// Get completions for a given context.
pub fn get_completions(context: &CompletionContext, index: &WorkspaceIndex) -> Vec<CompletionItem> {
    match context {
        CompletionContext::ComponentName | CompletionContext::ComponentExtends => {
            component_completions(index)
        }
        CompletionContext::PropertyName { component } => {
            property_completions(component.as_deref(), index)
        }
        CompletionContext::PropertyBinding => binding_completions(),
        CompletionContext::Value => {
            let mut items = value_completions();
            items.extend(component_completions(index));
            items
        }
    }
}

fn item(
    label: &str,
    kind: CompletionItemKind,
    sort_prefix: &str,
    detail: String,
    documentation: String,
) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind: Some(kind),
        detail: Some(detail),
        documentation: Some(Documentation::String(documentation)),
        insert_text: Some(label.to_string()),
        sort_text: Some(format!("{sort_prefix}{label}")),
        ..Default::default()
    }
}

fn component_completions(index: &WorkspaceIndex) -> Vec<CompletionItem> {
    index
        .components()
        .into_iter()
        .map(|name| {
            item(
                &name,
                CompletionItemKind::CLASS,
                "1",
                "Component".to_string(),
                format!("Component: {name}"),
            )
        })
        .collect()
}

fn property_completions(component: Option<&str>, index: &WorkspaceIndex) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = match component {
        Some(component) => index
            .properties_of(component)
            .into_iter()
            .map(|prop| {
                item(
                    &prop,
                    CompletionItemKind::PROPERTY,
                    "1",
                    format!("Property of {component}"),
                    format!("Property from component {component}"),
                )
            })
            .collect(),
        None => index
            .all_properties()
            .into_iter()
            .map(|prop| {
                item(
                    &prop,
                    CompletionItemKind::PROPERTY,
                    "2",
                    "Property".to_string(),
                    "Property from project".to_string(),
                )
            })
            .collect(),
    };

    items.push(item(
        "/",
        CompletionItemKind::OPERATOR,
        "0",
        "Empty list".to_string(),
        "Creates an empty list".to_string(),
    ));
    items
}

fn binding_completions() -> Vec<CompletionItem> {
    [
        ("<=", "One-way binding", "Binds property value from parent to child (one direction)"),
        ("<=>", "Two-way binding", "Binds property value between parent and child (both directions)"),
        ("^", "Override", "Overrides property in parent class"),
        ("*", "Multi-property marker", "Marks property as accepting multiple values"),
    ]
    .into_iter()
    .map(|(op, detail, doc)| {
        item(op, CompletionItemKind::OPERATOR, "0", detail.to_string(), doc.to_string())
    })
    .collect()
}

fn value_completions() -> Vec<CompletionItem> {
    [
        ("null", "Null value", None, "Represents empty/null value"),
        ("true", "Boolean true", None, "Boolean true value"),
        ("false", "Boolean false", None, "Boolean false value"),
        ("\\", "String literal", Some("\\\\\n\t\\\\$0"), "Multi-line string literal"),
        ("@\\", "Localized string", Some("@\\\\\n\t\\\\$0"), "Localized multi-line string"),
        ("*", "Dictionary marker", None, "Marks property as dictionary"),
    ]
    .into_iter()
    .map(|(value, detail, snippet, doc)| {
        let mut completion = item(
            value,
            CompletionItemKind::VALUE,
            "0",
            detail.to_string(),
            doc.to_string(),
        );
        if let Some(snippet) = snippet {
            completion.insert_text = Some(snippet.to_string());
            completion.insert_text_format = Some(InsertTextFormat::SNIPPET);
        }
        completion
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use viewtree_core::FileContribution;

    fn index() -> WorkspaceIndex {
        let mut index = WorkspaceIndex::new();
        index.replace_file(
            Path::new("/w/a.view.tree"),
            FileContribution::from_primary("$my_app $mol_view\n\ttitle \\A\n$my_page $mol_page\n\tbody /"),
        );
        index
    }

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn test_component_completions() {
        let items = get_completions(&CompletionContext::ComponentName, &index());
        assert_eq!(labels(&items), ["$my_app", "$my_page"]);
        assert_eq!(items[0].kind, Some(CompletionItemKind::CLASS));
        assert_eq!(items[0].sort_text.as_deref(), Some("1$my_app"));
    }

    #[test]
    fn test_property_completions_for_known_component() {
        let context = CompletionContext::PropertyName {
            component: Some("$my_app".to_string()),
        };
        let items = get_completions(&context, &index());
        assert_eq!(labels(&items), ["title", "/"]);
        assert_eq!(items[0].detail.as_deref(), Some("Property of $my_app"));
        assert_eq!(items[1].sort_text.as_deref(), Some("0/"));
    }

    #[test]
    fn test_property_completions_without_component() {
        let items = get_completions(&CompletionContext::PropertyName { component: None }, &index());
        assert_eq!(labels(&items), ["body", "title", "/"]);
        assert_eq!(items[0].sort_text.as_deref(), Some("2body"));
    }

    #[test]
    fn test_binding_completions() {
        let items = get_completions(&CompletionContext::PropertyBinding, &index());
        assert_eq!(labels(&items), ["<=", "<=>", "^", "*"]);
    }

    #[test]
    fn test_value_completions_include_components() {
        let items = get_completions(&CompletionContext::Value, &index());
        let names = labels(&items);
        assert_eq!(&names[..6], ["null", "true", "false", "\\", "@\\", "*"]);
        assert!(names.contains(&"$my_page"));
        let literal = &items[3];
        assert_eq!(literal.insert_text_format, Some(InsertTextFormat::SNIPPET));
    }
}
