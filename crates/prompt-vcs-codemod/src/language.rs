// ABOUTME: Builds the tree-sitter Python parser used by every codemod pass.
// ABOUTME: Rejects sources that tree-sitter could only recover with error nodes.
use crate::node_utils::first_error_node;
use prompt_vcs_core::{PromptVcsError, Result};
use tree_sitter::{Parser, Tree};

pub const PYTHON_EXTENSIONS: &[&str] = &["py", "pyi"];

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| PromptVcsError::Parse(format!("Failed to load Python grammar: {}", e)))?;
        Ok(Self { parser })
    }

    /// Parse `source`, failing on any syntax error.
    ///
    /// tree-sitter always produces a tree; a tree containing ERROR or
    /// MISSING nodes is treated as unparsable rather than partially used.
    pub fn parse(&mut self, source: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| PromptVcsError::Parse("Failed to parse file".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, column) = first_error_node(root)
                .map(|n| (n.start_position().row + 1, n.start_position().column + 1))
                .unwrap_or((1, 1));
            return Err(PromptVcsError::Parse(format!(
                "invalid Python syntax at line {}, column {}",
                line, column
            )));
        }

        Ok(tree)
    }
}

/// One-shot parse with a fresh parser.
pub fn parse_python(source: &str) -> Result<Tree> {
    PythonParser::new()?.parse(source)
}

pub fn is_python_path(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| PYTHON_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};

    #[test]
    fn python_grammar_uses_supported_version() {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        #[allow(deprecated)]
        let version = language.version();
        assert!(
            (MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version),
            "Python grammar uses incompatible Tree-sitter version {} (supported {}..={})",
            version,
            MIN_COMPATIBLE_LANGUAGE_VERSION,
            LANGUAGE_VERSION
        );
    }

    #[test]
    fn parses_valid_source() {
        let tree = parse_python("x = 1\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn rejects_syntax_errors() {
        let err = parse_python("def broken(:\n    pass\n").unwrap_err();
        assert!(matches!(err, PromptVcsError::Parse(_)));
    }

    #[test]
    fn detects_python_paths() {
        assert!(is_python_path(std::path::Path::new("app/module.py")));
        assert!(is_python_path(std::path::Path::new("stubs.pyi")));
        assert!(!is_python_path(std::path::Path::new("notes.txt")));
    }
}
