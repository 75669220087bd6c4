// ABOUTME: Shared tree-sitter helpers for the codemod passes
// ABOUTME: Text extraction, field lookups and span bookkeeping over Python trees

use tree_sitter::Node;

/// Byte range of a node in the original source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
}

#[inline]
pub fn span_for(node: &Node) -> Span {
    Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    }
}

/// Extract text from a tree-sitter Node
#[inline]
pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// 1-based line of the node start
#[inline]
pub fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

/// Find first child of a specific kind
pub fn child_by_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Named children, skipping comments
pub fn statements<'a>(node: &Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// Depth-first search for the first ERROR or MISSING node
pub fn first_error_node(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error_node)
}

/// Visit every node in document order.
pub fn walk_tree<'a>(root: Node<'a>, visit: &mut impl FnMut(Node<'a>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}
