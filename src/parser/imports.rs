//! Extraction of raw import references from a parsed Python syntax tree.
//!
//! Unlike a stateless query match, guard context (is this import inside an `if False:`
//! or `if TYPE_CHECKING:` body?) depends on the ancestor chain, so extraction is a
//! single recursive descent over the tree rather than a flat `Query` match — the
//! descent carries the current guard flags down into every nested block, function,
//! class, `try`/`except`, `with`, and `match` body it passes through.

use tree_sitter::{Node, Tree};

/// A single raw import reference pulled out of source text, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImportRef {
    /// Dotted payload. For relative imports this is the part after the leading dots
    /// (possibly empty, e.g. `from . import x` has payload `"x"` once joined with the
    /// name being imported — see [`extract_from_import`]).
    pub payload: String,
    /// Number of leading package levels to pop before resolving `payload`. Zero for
    /// absolute references.
    pub level: usize,
    /// `from pkg import *` — resolver must expand to one edge per submodule.
    pub wildcard: bool,
    /// Nested under a literal-always-false branch (`if False:`), per hinting mode.
    pub hint_guard: bool,
    /// Nested under a `TYPE_CHECKING` branch.
    pub typecheck_only: bool,
}

fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub fn extract_imports(tree: &Tree, source: &[u8]) -> Vec<RawImportRef> {
    let mut out = Vec::new();
    walk(tree.root_node(), source, false, false, &mut out);
    out
}

fn walk(node: Node, source: &[u8], hint_guard: bool, typecheck_only: bool, out: &mut Vec<RawImportRef>) {
    match node.kind() {
        "import_statement" => extract_plain_import(node, source, hint_guard, typecheck_only, out),
        "import_from_statement" => extract_from_import(node, source, hint_guard, typecheck_only, out),
        "call" => extract_reflective_call(node, source, hint_guard, typecheck_only, out),
        "if_statement" => walk_if_statement(node, source, hint_guard, typecheck_only, out),
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, source, hint_guard, typecheck_only, out);
            }
        }
    }
}

/// Handles only the literal `if False:`/`if TYPE_CHECKING:` form directly on the `if`
/// clause's own condition and consequence; `elif`/`else` branches recurse with the
/// flags unchanged, since the guard only hints at the direct `if` body.
fn walk_if_statement(node: Node, source: &[u8], hint_guard: bool, typecheck_only: bool, out: &mut Vec<RawImportRef>) {
    let condition_text = node.child_by_field_name("condition").map(|c| node_text(c, source));
    let is_false_literal = matches!(condition_text, Some("False") | Some("0"));
    let is_type_checking = condition_text.is_some_and(is_type_checking_condition);

    if let Some(consequence) = node.child_by_field_name("consequence") {
        walk(
            consequence,
            source,
            hint_guard || is_false_literal,
            typecheck_only || is_type_checking,
            out,
        );
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "elif_clause" || child.kind() == "else_clause" {
            walk(child, source, hint_guard, typecheck_only, out);
        }
    }
}

fn is_type_checking_condition(text: &str) -> bool {
    text == "TYPE_CHECKING" || text.ends_with(".TYPE_CHECKING")
}

/// `import a.b.c`, `import a.b as x`, `import a, b as c` (multi-name form).
fn extract_plain_import(node: Node, source: &[u8], hint_guard: bool, typecheck_only: bool, out: &mut Vec<RawImportRef>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => out.push(RawImportRef {
                payload: node_text(child, source).to_string(),
                level: 0,
                wildcard: false,
                hint_guard,
                typecheck_only,
            }),
            "aliased_import" => {
                if let Some(name) = child.child_by_field_name("name") {
                    out.push(RawImportRef {
                        payload: node_text(name, source).to_string(),
                        level: 0,
                        wildcard: false,
                        hint_guard,
                        typecheck_only,
                    });
                }
            }
            _ => {}
        }
    }
}

/// `from . import x`, `from ..pkg import y`, `from pkg.sub import *`,
/// `from pkg import (a, b as c)`. Each imported name becomes its own reference, its
/// payload the module prefix joined with the imported name — the "submodule shorthand"
/// case where the resolver later decides whether the joined name is a real submodule
/// or just a symbol, not the extractor.
fn extract_from_import(node: Node, source: &[u8], hint_guard: bool, typecheck_only: bool, out: &mut Vec<RawImportRef>) {
    let Some(module_name_node) = node.child_by_field_name("module_name") else {
        return;
    };

    let (level, prefix) = match module_name_node.kind() {
        "relative_import" => {
            let mut inner_cursor = module_name_node.walk();
            let mut level = 0usize;
            let mut prefix = String::new();
            for child in module_name_node.children(&mut inner_cursor) {
                match child.kind() {
                    "import_prefix" => level = node_text(child, source).chars().filter(|&c| c == '.').count(),
                    "dotted_name" => prefix = node_text(child, source).to_string(),
                    _ => {}
                }
            }
            (level, prefix)
        }
        "dotted_name" => (0, node_text(module_name_node, source).to_string()),
        _ => (0, String::new()),
    };

    let mut cursor = node.walk();
    let mut wildcard = false;
    let mut names: Vec<Node> = Vec::new();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "wildcard_import" => wildcard = true,
            "dotted_name" if child != module_name_node => names.push(child),
            "aliased_import" => names.push(child),
            _ => {}
        }
    }

    if wildcard {
        out.push(RawImportRef {
            payload: prefix,
            level,
            wildcard: true,
            hint_guard,
            typecheck_only,
        });
        return;
    }

    for name_node in names {
        let leaf = match name_node.kind() {
            "aliased_import" => name_node.child_by_field_name("name").map(|n| node_text(n, source)),
            _ => Some(node_text(name_node, source)),
        };
        let Some(leaf) = leaf else { continue };
        let payload = if prefix.is_empty() {
            leaf.to_string()
        } else {
            format!("{prefix}.{leaf}")
        };
        out.push(RawImportRef {
            payload,
            level,
            wildcard: false,
            hint_guard,
            typecheck_only,
        });
    }
}

/// `importlib.import_module("a.b")` / `__import__("a.b")` with a literal string
/// argument only — dynamic targets (f-strings, concatenation, variables) are not
/// inferred.
fn extract_reflective_call(node: Node, source: &[u8], hint_guard: bool, typecheck_only: bool, out: &mut Vec<RawImportRef>) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let name = node_text(function, source);
    let recognized = name == "__import__" || name == "import_module" || name.ends_with(".import_module");
    if !recognized {
        return;
    }

    let Some(arguments) = node.child_by_field_name("arguments") else {
        return;
    };
    let mut cursor = arguments.walk();
    let Some(first_arg) = arguments.named_children(&mut cursor).next() else {
        return;
    };
    if let Some(literal) = string_literal_value(first_arg, source) {
        out.push(RawImportRef {
            payload: literal,
            level: 0,
            wildcard: false,
            hint_guard,
            typecheck_only,
        });
    }
}

/// The literal value of a Python `string` node, or `None` if it contains any
/// interpolation (f-string expression) making its value unknowable statically.
fn string_literal_value(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut value = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "interpolation" => return None,
            "string_content" => value.push_str(node_text(child, source)),
            _ => {}
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::python_language;

    fn parse(source: &str) -> Tree {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&python_language()).unwrap();
        parser.parse(source.as_bytes(), None).unwrap()
    }

    #[test]
    fn test_absolute_import() {
        let src = "import pkg.b\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].payload, "pkg.b");
        assert_eq!(refs[0].level, 0);
        assert!(!refs[0].wildcard);
    }

    #[test]
    fn test_multi_name_import() {
        let src = "import a, b as c\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        let payloads: Vec<_> = refs.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["a", "b"]);
    }

    #[test]
    fn test_relative_from_import() {
        let src = "from . import a\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].payload, "a");
        assert_eq!(refs[0].level, 1);
    }

    #[test]
    fn test_relative_from_import_with_module() {
        let src = "from ..pkg import y\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].payload, "pkg.y");
        assert_eq!(refs[0].level, 2);
    }

    #[test]
    fn test_wildcard_from_import() {
        let src = "from pkg.sub import *\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert!(refs[0].wildcard);
        assert_eq!(refs[0].payload, "pkg.sub");
    }

    #[test]
    fn test_parenthesized_multiline_from_import() {
        let src = "from pkg import (\n    a,\n    b,\n)\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        let payloads: Vec<_> = refs.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["pkg.a", "pkg.b"]);
    }

    #[test]
    fn test_hint_guard() {
        let src = "if False:\n    import secret\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert!(refs[0].hint_guard);
        assert!(!refs[0].typecheck_only);
    }

    #[test]
    fn test_typecheck_only_guard() {
        let src = "from typing import TYPE_CHECKING\nif TYPE_CHECKING:\n    import foo\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        let foo = refs.iter().find(|r| r.payload == "foo").unwrap();
        assert!(foo.typecheck_only);
        assert!(!foo.hint_guard);
    }

    #[test]
    fn test_type_checking_attribute_guard() {
        let src = "import typing\nif typing.TYPE_CHECKING:\n    import foo\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        let foo = refs.iter().find(|r| r.payload == "foo").unwrap();
        assert!(foo.typecheck_only);
    }

    #[test]
    fn test_else_branch_not_guarded() {
        let src = "if False:\n    import secret\nelse:\n    import public\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        let public = refs.iter().find(|r| r.payload == "public").unwrap();
        assert!(!public.hint_guard);
    }

    #[test]
    fn test_nested_in_function_and_try() {
        let src = "def f():\n    try:\n        import pkg.a\n    except ImportError:\n        pass\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].payload, "pkg.a");
    }

    #[test]
    fn test_reflective_import_module_literal() {
        let src = "importlib.import_module(\"pkg.mod\")\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].payload, "pkg.mod");
    }

    #[test]
    fn test_dunder_import_literal() {
        let src = "__import__(\"pkg.mod\")\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].payload, "pkg.mod");
    }

    #[test]
    fn test_reflective_import_dynamic_target_ignored() {
        let src = "name = 'pkg.mod'\nimportlib.import_module(name)\n";
        let tree = parse(src);
        let refs = extract_imports(&tree, src.as_bytes());
        assert!(refs.is_empty());
    }
}
