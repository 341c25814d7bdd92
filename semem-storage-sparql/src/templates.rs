//! SPARQL template registry.
//!
//! Query and update text lives in external `.rq` artifacts under
//! `templates/`, embedded at compile time and addressed by logical name.
//! Rust code never holds SPARQL text inline; it binds placeholder values,
//! which are escaped before substitution.

use semem_core::error::{Error, Result};

/// Logical template names and their embedded text.
const TEMPLATES: &[(&str, &str)] = &[
    ("load_all", include_str!("../templates/load_all.rq")),
    ("append", include_str!("../templates/append.rq")),
    ("update", include_str!("../templates/update.rq")),
    ("delete_all", include_str!("../templates/delete_all.rq")),
    ("ping", include_str!("../templates/ping.rq")),
];

/// Separator used by `GROUP_CONCAT` in the load template (U+001F).
pub(crate) const CONCEPT_SEPARATOR: char = '\u{1F}';

/// Escape a string for inclusion in a SPARQL string literal.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Look up a template by logical name.
///
/// # Errors
///
/// `InvalidArgument` for an unknown name.
pub fn template(name: &str) -> Result<&'static str> {
    TEMPLATES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, text)| *text)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown template '{name}'")))
}

/// Render a template, replacing every `{name}` placeholder with its binding.
///
/// Bindings are substituted verbatim; callers escape literal values with
/// [`escape_literal`] first. Unbound placeholders are an error so template
/// drift is caught immediately.
///
/// # Errors
///
/// `InvalidArgument` for an unknown template or a placeholder with no
/// binding.
pub fn render(name: &str, bindings: &[(&str, &str)]) -> Result<String> {
    let mut text = template(name)?.to_string();
    for (key, value) in bindings {
        text = text.replace(&format!("{{{key}}}"), value);
    }
    if let Some(placeholder) = find_placeholder(&text) {
        return Err(Error::InvalidArgument(format!(
            "template '{name}' has unbound placeholder '{{{placeholder}}}'"
        )));
    }
    Ok(text)
}

/// First `{word}` placeholder in the text, ignoring SPARQL's own block
/// braces (which never wrap a bare identifier).
fn find_placeholder(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(open) = text[search_from..].find('{').map(|p| p + search_from) {
        let rest = &text[open + 1..];
        if let Some(close) = rest.find('}') {
            let candidate = &rest[..close];
            if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Some(candidate);
            }
        }
        search_from = open + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_present() {
        for name in ["load_all", "append", "update", "delete_all", "ping"] {
            assert!(template(name).is_ok());
        }
        assert!(template("nope").is_err());
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_literal("a\\b"), "a\\\\b");
        assert_eq!(escape_literal("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_literal("plain"), "plain");
    }

    #[test]
    fn test_render_substitutes_all() {
        let rendered = render(
            "delete_all",
            &[("graph", "http://example.org/g")],
        )
        .unwrap();
        assert!(rendered.contains("<http://example.org/g>"));
        assert!(find_placeholder(&rendered).is_none());
        // SPARQL's own block braces survive rendering.
        assert!(rendered.contains('{'));
    }

    #[test]
    fn test_find_placeholder_ignores_block_braces() {
        assert_eq!(find_placeholder("WHERE {\n ?s ?p ?o\n}"), None);
        assert_eq!(find_placeholder("GRAPH <{graph}> { }"), Some("graph"));
    }

    #[test]
    fn test_render_rejects_unbound_placeholder() {
        let result = render("delete_all", &[]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_ping_is_static() {
        assert_eq!(render("ping", &[]).unwrap().trim(), "ASK { }");
    }
}
