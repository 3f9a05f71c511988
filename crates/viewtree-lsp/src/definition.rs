//! Go-to-definition for view.tree documents.

use std::fs;
use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::{GotoDefinitionResponse, Location, Position};
use viewtree_core::position::{utf16_len, SIGIL};
use viewtree_core::{parse, NodeKind};

use crate::context::{file_start, find_in_file, location_at, CursorTarget, DocumentContext};

/// Find where the word at `position` is defined.
pub fn get_definition(ctx: &DocumentContext<'_>, position: Position) -> Option<GotoDefinitionResponse> {
    let target = ctx.target_at(position)?;
    let location = match target.kind {
        NodeKind::RootClass => root_class_definition(ctx, &target.name),
        NodeKind::Class => class_definition(ctx, &target.name),
        NodeKind::CompoundRef => stylesheet_definition(ctx, &target.name),
        NodeKind::Property | NodeKind::NestedProperty => property_definition(ctx, &target, position),
    }?;
    Some(GotoDefinitionResponse::Scalar(location))
}

/// `class $name` in the sibling script, or the top of that script.
fn root_class_definition(ctx: &DocumentContext<'_>, name: &str) -> Option<Location> {
    let script = ctx.sibling(&ctx.scan.secondary_suffix)?;
    let pattern = format!(r"class\s+({})\b", regex::escape(name));
    find_in_file(&script, &pattern, utf16_len(name)).or_else(|| file_start(&script))
}

/// Conventional locations `<root>/a/b/b.view.tree` and `<root>/a/b/b/b.view.tree`
/// for `$a_b`, then whatever file the index says defines the component.
fn class_definition(ctx: &DocumentContext<'_>, name: &str) -> Option<Location> {
    let found = conventional_paths(ctx, name)
        .into_iter()
        .find(|path| path.is_file())
        .or_else(|| ctx.index.defining_file(name).map(Path::to_path_buf))?;
    component_location(&found, name).or_else(|| file_start(&found))
}

fn conventional_paths(ctx: &DocumentContext<'_>, name: &str) -> Vec<PathBuf> {
    let bare = name.strip_prefix(SIGIL).unwrap_or(name);
    let parts: Vec<&str> = bare.split('_').filter(|p| !p.is_empty()).collect();
    let Some(last) = parts.last() else {
        return Vec::new();
    };
    let file_name = format!("{last}{}", ctx.scan.primary_suffix);
    let dir: PathBuf = parts.iter().fold(ctx.root.to_path_buf(), |dir, part| dir.join(part));
    vec![dir.join(&file_name), dir.join(last).join(&file_name)]
}

/// Declaration of a root component inside a primary file
fn component_location(path: &Path, name: &str) -> Option<Location> {
    let content = fs::read_to_string(path).ok()?;
    let component = parse(&content)
        .components
        .into_iter()
        .find(|c| c.name == name)?;
    Some(Location::new(crate::context::file_url(path)?, component.range))
}

/// `Name: {` in the sibling stylesheet, or the top of the stylesheet.
fn stylesheet_definition(ctx: &DocumentContext<'_>, name: &str) -> Option<Location> {
    let stylesheet = ctx.sibling(".css.ts")?;
    let pattern = format!(r"({})\s*:\s*\{{", regex::escape(name));
    find_in_file(&stylesheet, &pattern, utf16_len(name)).or_else(|| file_start(&stylesheet))
}

/// Member of the root class in the sibling script, else the stylesheet rule.
fn property_definition(
    ctx: &DocumentContext<'_>,
    target: &CursorTarget,
    position: Position,
) -> Option<Location> {
    let parsed = parse(ctx.text);
    let member = parsed.root_at_line(position.line).and_then(|root| {
        let script = ctx.sibling(&ctx.scan.secondary_suffix)?;
        member_location(&script, &root.name, &target.name)
    });
    member.or_else(|| stylesheet_definition(ctx, &target.name))
}

/// `click?` and `items*` are declared as plain `click(next?)` and `items(id)`.
fn member_location(script: &Path, class: &str, member: &str) -> Option<Location> {
    let member = member.trim_end_matches(&['?', '*'][..]);
    if member.is_empty() {
        return None;
    }
    let content = fs::read_to_string(script).ok()?;
    let (body_start, body) = class_body(&content, class)?;
    let member_re = regex::Regex::new(&format!(r"\b{}\s*[(:=]", regex::escape(member))).ok()?;
    let found = member_re.find(body)?;
    location_at(script, &content, body_start + found.start(), utf16_len(member))
}

/// Text between the braces of `class <name> ... { }` and its byte offset.
fn class_body<'a>(content: &'a str, class: &str) -> Option<(usize, &'a str)> {
    let header = regex::Regex::new(&format!(r"class\s+{}\b[^{{]*\{{", regex::escape(class))).ok()?;
    let start = header.find(content)?.end();
    let mut depth = 1usize;
    for (offset, c) in content[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, &content[start..start + offset]));
                }
            }
            _ => {}
        }
    }
    Some((start, &content[start..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tower_lsp::lsp_types::Range;
    use viewtree_core::{FileContribution, ScanConfig, WorkspaceIndex};

    const APP: &str = "$my_app $mol_view\n\ttitle @ \\App\n\tsub /\n\t\t<= Title $mol_paragraph\n\t\t\tcontent <= text";

    fn location(response: GotoDefinitionResponse) -> Location {
        match response {
            GotoDefinitionResponse::Scalar(location) => location,
            other => panic!("unexpected response {other:?}"),
        }
    }

    fn write(dir: &TempDir, relative: &str, content: &str) -> PathBuf {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn define(dir: &TempDir, index: &WorkspaceIndex, text: &str, position: Position) -> Option<Location> {
        let scan = ScanConfig::default();
        let path = dir.path().join("my/app/app.view.tree");
        let ctx = DocumentContext {
            text,
            path: Some(path.as_path()),
            root: dir.path(),
            scan: &scan,
            index,
        };
        get_definition(&ctx, position).map(location)
    }

    fn range(line: u32, start: u32, end: u32) -> Range {
        Range::new(Position::new(line, start), Position::new(line, end))
    }

    const SCRIPT: &str = "namespace $.$$ {\n\texport class $my_app extends $.$my_app {\n\t\ttitle() {\n\t\t\treturn 'x'\n\t\t}\n\t\ttext() { return '' }\n\t}\n}\n";

    #[test]
    fn test_root_class_in_script() {
        let dir = TempDir::new().unwrap();
        let script = write(&dir, "my/app/app.ts", SCRIPT);
        let found = define(&dir, &WorkspaceIndex::new(), APP, Position::new(0, 2)).unwrap();
        assert_eq!(found.uri.to_file_path().unwrap(), script);
        assert_eq!(found.range, range(1, 14, 21));
    }

    #[test]
    fn test_root_class_without_script() {
        let dir = TempDir::new().unwrap();
        assert!(define(&dir, &WorkspaceIndex::new(), APP, Position::new(0, 2)).is_none());
    }

    #[test]
    fn test_class_by_convention() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "mol/view/view.view.tree", "$mol_view $mol_object\n");
        let found = define(&dir, &WorkspaceIndex::new(), APP, Position::new(0, 12)).unwrap();
        assert_eq!(found.uri.to_file_path().unwrap(), target);
        assert_eq!(found.range, range(0, 0, 9));
    }

    #[test]
    fn test_class_nested_convention() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "mol/paragraph/paragraph/paragraph.view.tree", "$mol_paragraph $mol_view\n");
        let found = define(&dir, &WorkspaceIndex::new(), APP, Position::new(3, 14)).unwrap();
        assert_eq!(found.uri.to_file_path().unwrap(), target);
    }

    #[test]
    fn test_class_from_index() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "lib/widgets.view.tree", "$other $mol_view\n$mol_view $mol_object\n");
        let mut index = WorkspaceIndex::new();
        index.replace_file(&target, FileContribution::from_primary("$other $mol_view\n$mol_view $mol_object\n"));
        let found = define(&dir, &index, APP, Position::new(0, 12)).unwrap();
        assert_eq!(found.uri.to_file_path().unwrap(), target);
        assert_eq!(found.range, range(1, 0, 9));
    }

    #[test]
    fn test_unknown_class() {
        let dir = TempDir::new().unwrap();
        assert!(define(&dir, &WorkspaceIndex::new(), APP, Position::new(0, 12)).is_none());
    }

    #[test]
    fn test_property_in_script() {
        let dir = TempDir::new().unwrap();
        write(&dir, "my/app/app.ts", SCRIPT);
        let found = define(&dir, &WorkspaceIndex::new(), APP, Position::new(1, 3)).unwrap();
        assert_eq!(found.range, range(2, 2, 7));

        // binding target deep inside a nested scope
        let found = define(&dir, &WorkspaceIndex::new(), APP, Position::new(4, 15)).unwrap();
        assert_eq!(found.range, range(5, 2, 6));
    }

    #[test]
    fn test_marked_property_in_script() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "my/app/app.ts",
            "namespace $.$$ {\n\texport class $my_app extends $.$my_app {\n\t\tclick(next?: Event) {\n\t\t\treturn null\n\t\t}\n\t\tsubmit(next?: Event) { return null }\n\t}\n}\n",
        );
        let text = "$my_app $mol_view\n\tclick? <=> submit? null";
        let found = define(&dir, &WorkspaceIndex::new(), text, Position::new(1, 3)).unwrap();
        assert_eq!(found.range, range(2, 2, 7));

        let found = define(&dir, &WorkspaceIndex::new(), text, Position::new(1, 14)).unwrap();
        assert_eq!(found.range, range(5, 2, 8));
    }

    #[test]
    fn test_compound_in_stylesheet() {
        let dir = TempDir::new().unwrap();
        let css = write(
            &dir,
            "my/app/app.css.ts",
            "namespace $.$$ {\n\t$mol_style_define($my_app, {\n\t\tTitle: {\n\t\t\tcolor: 'red',\n\t\t},\n\t})\n}\n",
        );
        let found = define(&dir, &WorkspaceIndex::new(), APP, Position::new(3, 6)).unwrap();
        assert_eq!(found.uri.to_file_path().unwrap(), css);
        assert_eq!(found.range, range(2, 2, 7));
    }

    #[test]
    fn test_property_falls_back_to_stylesheet() {
        let dir = TempDir::new().unwrap();
        write(&dir, "my/app/app.css.ts", "$mol_style_define($my_app, {\n\ttitle: {\n\t},\n})\n");
        let found = define(&dir, &WorkspaceIndex::new(), APP, Position::new(1, 3)).unwrap();
        assert_eq!(found.range, range(1, 1, 6));
    }
}
