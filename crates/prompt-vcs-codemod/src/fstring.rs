//! String literal inspection and f-string decomposition.
//!
//! Literal text is always copied byte-for-byte from the source between
//! interpolations, so escape sequences, doubled braces and newlines in the
//! template are exactly what the user wrote.

use crate::classify::{sanitize, AccessChain};
use crate::node_utils::{child_by_kind, node_text, Span};
use std::collections::HashMap;
use tracing::debug;
use tree_sitter::Node;

/// One lifted interpolation of an f-string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FStringPart {
    /// Sanitized identifier used in the template and as keyword name
    pub placeholder: String,
    /// Original source expression, passed as the keyword value
    pub expression: String,
    /// Format specifier without the leading colon, e.g. `.2f`
    pub format_spec: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    pub template: String,
    pub parts: Vec<FStringPart>,
    pub has_complex: bool,
}

/// The pieces of a `string` node relevant to migration
#[derive(Debug, Clone)]
pub struct StringLiteral<'t> {
    pub node: Node<'t>,
    /// Lower-cased prefix letters, e.g. `f`, `rf`, `b`
    pub prefix: String,
    /// Opening delimiter without prefix: `"`, `'`, `"""` or `'''`
    pub quote: String,
    /// Bytes between the delimiters
    pub content: Span,
}

impl<'t> StringLiteral<'t> {
    pub fn from_node(node: Node<'t>, source: &str) -> Option<Self> {
        if node.kind() != "string" {
            return None;
        }
        let start = child_by_kind(&node, "string_start")?;
        let end = child_by_kind(&node, "string_end")?;
        let opening = node_text(&start, source);
        let prefix_len = opening
            .find(|c: char| c == '"' || c == '\'')
            .unwrap_or(opening.len());
        Some(Self {
            node,
            prefix: opening[..prefix_len].to_ascii_lowercase(),
            quote: opening[prefix_len..].to_string(),
            content: Span {
                start_byte: start.end_byte(),
                end_byte: end.start_byte(),
            },
        })
    }

    pub fn is_fstring(&self) -> bool {
        self.prefix.contains('f')
    }

    pub fn is_raw(&self) -> bool {
        self.prefix.contains('r')
    }

    pub fn is_bytes(&self) -> bool {
        self.prefix.contains('b')
    }

    /// Template-string prefixes (`t"..."`) produce objects, not text.
    pub fn is_template_string(&self) -> bool {
        self.prefix.contains('t')
    }

    pub fn content<'s>(&self, source: &'s str) -> &'s str {
        &source[self.content.start_byte..self.content.end_byte]
    }

    /// Re-quote `text` with this literal's delimiters, dropping the `f` prefix.
    pub fn requote(&self, text: &str) -> String {
        let prefix: String = self.prefix.chars().filter(|c| *c != 'f').collect();
        format!("{}{}{}{}", prefix, self.quote, text, self.quote)
    }
}

/// Split an f-string into template text and lifted interpolations.
///
/// Complex interpolations are kept verbatim in the template and set
/// `has_complex`; two different expressions that sanitize to the same
/// placeholder are treated the same way. A repeated expression reuses its
/// placeholder without adding a second part.
pub fn decompose(literal: &StringLiteral, source: &str) -> Decomposition {
    let mut template = String::new();
    let mut parts: Vec<FStringPart> = Vec::new();
    let mut bound: HashMap<String, AccessChain> = HashMap::new();
    let mut has_complex = false;
    let mut cursor_byte = literal.content.start_byte;

    let mut tree_cursor = literal.node.walk();
    let interpolations: Vec<Node> = literal
        .node
        .children(&mut tree_cursor)
        .filter(|c| c.kind() == "interpolation")
        .collect();

    for interp in interpolations {
        template.push_str(&source[cursor_byte..interp.start_byte()]);
        cursor_byte = interp.end_byte();

        match lift_interpolation(&interp, source) {
            Some(part) => {
                let chain = AccessChain::parse(&part.expression);
                let collides = match (bound.get(&part.placeholder), &chain) {
                    (Some(existing), Some(chain)) => existing != chain,
                    _ => false,
                };
                if collides {
                    debug!(
                        "Placeholder '{}' collides with a different expression",
                        part.placeholder
                    );
                    has_complex = true;
                    template.push_str(node_text(&interp, source));
                    continue;
                }
                if let Some(chain) = chain {
                    if !bound.contains_key(&part.placeholder) {
                        bound.insert(part.placeholder.clone(), chain);
                        parts.push(part.clone());
                    }
                }
                template.push('{');
                template.push_str(&part.placeholder);
                if let Some(spec) = &part.format_spec {
                    template.push(':');
                    template.push_str(spec);
                }
                template.push('}');
            }
            None => {
                has_complex = true;
                template.push_str(node_text(&interp, source));
            }
        }
    }
    template.push_str(&source[cursor_byte..literal.content.end_byte]);

    Decomposition {
        template,
        parts,
        has_complex,
    }
}

/// A simple interpolation as a part, or `None` when it cannot be lifted.
fn lift_interpolation(interp: &Node, source: &str) -> Option<FStringPart> {
    let expression_node = interp.child_by_field_name("expression")?;
    let expression = node_text(&expression_node, source).trim().to_string();

    let mut format_spec = None;
    let mut cursor = interp.walk();
    for child in interp.children(&mut cursor) {
        match child.kind() {
            // `{x=}` and `{x!r}` have no equivalent once the value is a keyword
            "=" | "type_conversion" => return None,
            "format_specifier" => {
                let mut spec_cursor = child.walk();
                // `{x:{width}}` parses as format_expression in current grammars
                let nested = child
                    .named_children(&mut spec_cursor)
                    .any(|n| matches!(n.kind(), "format_expression" | "interpolation"));
                if nested {
                    return None;
                }
                let text = node_text(&child, source);
                format_spec = Some(text.strip_prefix(':').unwrap_or(text).to_string());
            }
            _ => {}
        }
    }

    let placeholder = sanitize(&expression)?;
    Some(FStringPart {
        placeholder,
        expression,
        format_spec,
    })
}

/// Evaluate the backslash escapes of a non-raw `str` literal body:
/// single-character escapes, octal `\ooo`, `\xhh`, `\uXXXX`, `\UXXXXXXXX`
/// and `\N{NAME}`. Unknown or malformed escapes are kept verbatim.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                match char::from_u32(value) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push_str(&format!("{:o}", value));
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let len = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let mut digits = String::with_capacity(len);
                while digits.len() < len {
                    match chars.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                let decoded = if digits.len() == len {
                    u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
                } else {
                    None
                };
                match decoded {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            'N' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == '}' {
                        closed = true;
                        break;
                    }
                    name.push(d);
                }
                match unicode_names2::character(&name).filter(|_| closed) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\N{");
                        out.push_str(&name);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parse_python;
    use tree_sitter::Tree;

    fn first_string(tree: &Tree) -> Node<'_> {
        let mut found = None;
        crate::node_utils::walk_tree(tree.root_node(), &mut |node| {
            if found.is_none() && node.kind() == "string" {
                found = Some(node);
            }
        });
        found.unwrap()
    }

    /// Decompose the first string literal found in `code`.
    fn decompose_expr(code: &str) -> Decomposition {
        let tree = parse_python(code).unwrap();
        let literal = StringLiteral::from_node(first_string(&tree), code).unwrap();
        decompose(&literal, code)
    }

    #[test]
    fn simple_fstring() {
        let d = decompose_expr("f\"Hello {name}\"\n");
        assert_eq!(d.template, "Hello {name}");
        assert_eq!(d.parts.len(), 1);
        assert_eq!(d.parts[0].placeholder, "name");
        assert_eq!(d.parts[0].expression, "name");
        assert!(!d.has_complex);
    }

    #[test]
    fn fstring_with_format_spec() {
        let d = decompose_expr("f\"Price: {price:.2f}\"\n");
        assert_eq!(d.template, "Price: {price:.2f}");
        assert_eq!(d.parts.len(), 1);
        assert_eq!(d.parts[0].placeholder, "price");
        assert_eq!(d.parts[0].format_spec.as_deref(), Some(".2f"));
    }

    #[test]
    fn fstring_with_attribute() {
        let d = decompose_expr("f\"Hello {user.name}\"\n");
        assert_eq!(d.template, "Hello {user_name}");
        assert_eq!(d.parts[0].placeholder, "user_name");
        assert_eq!(d.parts[0].expression, "user.name");
    }

    #[test]
    fn fstring_with_subscripts() {
        let d = decompose_expr("f\"Score: {data['score']} / {items[0]}\"\n");
        assert_eq!(d.template, "Score: {data_score} / {items_0}");
        assert_eq!(d.parts[0].expression, "data['score']");
        assert_eq!(d.parts[1].expression, "items[0]");
        assert!(!d.has_complex);
    }

    #[test]
    fn complex_expressions_are_flagged() {
        let d = decompose_expr("f\"Result: {x + 1}\"\n");
        assert!(d.has_complex);
        assert_eq!(d.template, "Result: {x + 1}");

        assert!(decompose_expr("f\"Result: {func()}\"\n").has_complex);
        assert!(decompose_expr("f\"{a if b else c} tail\"\n").has_complex);
    }

    #[test]
    fn conversions_and_debug_specifiers_are_flagged() {
        assert!(decompose_expr("f\"Value: {value!r}\"\n").has_complex);
        assert!(decompose_expr("f\"Value: {value=}\"\n").has_complex);
        assert!(decompose_expr("f\"Value: {value:{width}}\"\n").has_complex);
    }

    #[test]
    fn placeholder_collision_is_flagged() {
        let d = decompose_expr("f\"{user.name} and {user_name}\"\n");
        assert!(d.has_complex);
    }

    #[test]
    fn repeated_expression_reuses_placeholder() {
        let d = decompose_expr("f\"{name}, yes {name}\"\n");
        assert!(!d.has_complex);
        assert_eq!(d.parts.len(), 1);
        assert_eq!(d.template, "{name}, yes {name}");
    }

    #[test]
    fn literal_text_is_byte_identical() {
        let code = "f\"\"\"\n  Line one {a}\\n\n\tTabbed {{braces}} {b:>10}  \n\"\"\"\n";
        let d = decompose_expr(code);
        assert_eq!(
            d.template,
            "\n  Line one {a}\\n\n\tTabbed {{braces}} {b:>10}  \n"
        );
        assert!(!d.has_complex);
    }

    #[test]
    fn round_trip_reproduces_literal_content() {
        let code = "f'Hi {user.name}, your {data[\"plan\"]} costs {price:.2f} ({items[0]})'\n";
        let tree = parse_python(code).unwrap();
        let literal = StringLiteral::from_node(first_string(&tree), code).unwrap();
        let d = decompose(&literal, code);

        let mut rebuilt = d.template.clone();
        for part in &d.parts {
            rebuilt = rebuilt.replace(
                &format!("{{{}", part.placeholder),
                &format!("{{{}", part.expression),
            );
        }
        assert_eq!(rebuilt, literal.content(code));
    }

    #[test]
    fn string_literal_prefix_and_quotes() {
        let code = "Rf'''raw {x}'''\n";
        let tree = parse_python(code).unwrap();
        let literal = StringLiteral::from_node(first_string(&tree), code).unwrap();
        assert_eq!(literal.prefix, "rf");
        assert_eq!(literal.quote, "'''");
        assert!(literal.is_fstring());
        assert!(literal.is_raw());
        assert_eq!(literal.requote("abc"), "r'''abc'''");
    }

    #[test]
    fn unescape_common_sequences() {
        assert_eq!(unescape("a\\nb\\tc"), "a\nb\tc");
        assert_eq!(unescape("quote \\\" and \\'"), "quote \" and '");
        assert_eq!(unescape("keep \\d"), "keep \\d");
        assert_eq!(unescape("line\\\ncontinued"), "linecontinued");
    }

    #[test]
    fn unescape_control_characters() {
        assert_eq!(unescape("\\a\\b\\f\\v"), "\u{07}\u{08}\u{0C}\u{0B}");
        assert_eq!(unescape("back\\\\slash"), "back\\slash");
    }

    #[test]
    fn unescape_octal_escapes() {
        assert_eq!(unescape("line\\012break"), "line\nbreak");
        assert_eq!(unescape("nul\\0end"), "nul\0end");
        assert_eq!(unescape("\\101\\102"), "AB");
        assert_eq!(unescape("\\1418"), "a8");
        assert_eq!(unescape("\\777"), "\u{1FF}");
    }

    #[test]
    fn unescape_hex_and_unicode_escapes() {
        assert_eq!(unescape("Tab\\x09separated"), "Tab\tseparated");
        assert_eq!(unescape("Caf\\u00e9 menu"), "Café menu");
        assert_eq!(unescape("\\U0001F600!"), "\u{1F600}!");
        assert_eq!(unescape("short \\x4"), "short \\x4");
    }

    #[test]
    fn unescape_named_escapes() {
        assert_eq!(unescape("\\N{EM DASH}"), "\u{2014}");
        assert_eq!(unescape("caf\\N{LATIN SMALL LETTER E WITH ACUTE}"), "café");
        assert_eq!(unescape("\\N{NOT A REAL NAME}"), "\\N{NOT A REAL NAME}");
    }

    #[test]
    fn nested_format_spec_is_flagged() {
        let d = decompose_expr("f\"Value padded: {value:{width}} here\"\n");
        assert!(d.has_complex);
        assert!(decompose_expr("f\"{value:>{width}.{precision}f}\"\n").has_complex);
    }
}
