// ABOUTME: Applies accepted migration candidates to Python source by splicing byte ranges.
// ABOUTME: Adds the accessor import once and optionally extracts templates into a store.
use crate::language::PythonParser;
use crate::node_utils::{node_text, statements, walk_tree};
use crate::scanner::{MigrationCandidate, ScanConfig, Scanner};
use prompt_vcs_core::{PromptVcsError, Result, TemplateStore};
use tracing::{debug, info};
use tree_sitter::Node;

/// Result of rewriting one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub source: String,
    pub applied: usize,
    /// Template entries written to the store
    pub extracted: usize,
    /// Template entries left alone because they already existed
    pub skipped_existing: usize,
}

/// Replace each candidate's statement with its generated call and make sure
/// the accessor is imported. Text outside the replaced statements is kept
/// byte for byte; with no candidates the source is returned unchanged.
pub fn apply_candidates(
    source: &str,
    candidates: &[MigrationCandidate],
    config: &ScanConfig,
) -> Result<String> {
    if candidates.is_empty() {
        return Ok(source.to_string());
    }

    let mut ordered: Vec<&MigrationCandidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| std::cmp::Reverse(c.span.start_byte));

    let mut output = source.to_string();
    let mut floor = usize::MAX;
    for candidate in ordered {
        let span = candidate.span;
        if span.end_byte > floor {
            return Err(PromptVcsError::InvalidOperation(format!(
                "overlapping candidates at line {}",
                candidate.line_number
            )));
        }
        match source.get(span.start_byte..span.end_byte) {
            Some(text) if text == candidate.original_code => {}
            _ => {
                return Err(PromptVcsError::InvalidOperation(format!(
                    "candidate at line {} no longer matches the source",
                    candidate.line_number
                )))
            }
        }
        debug!(
            "Rewriting line {}: {}",
            candidate.line_number, candidate.new_code
        );
        output.replace_range(span.start_byte..span.end_byte, &candidate.new_code);
        floor = span.start_byte;
    }

    ensure_import(&output, &config.accessor_module, &config.accessor_name)
}

/// Insert `from <module> import <name>` unless the file already imports it,
/// at any nesting depth (a `try:` guarded import counts).
///
/// The import goes after a module docstring and any `from __future__`
/// imports, otherwise in front of the first statement. Comments above the
/// first statement (shebang, encoding line) stay above it.
pub fn ensure_import(source: &str, module: &str, name: &str) -> Result<String> {
    let mut parser = PythonParser::new()?;
    let tree = parser.parse(source)?;
    let root = tree.root_node();
    let top_level = statements(&root);

    let mut present = false;
    walk_tree(root, &mut |node| {
        if !present && imports_name(&node, source, module, name) {
            present = true;
        }
    });
    if present {
        return Ok(source.to_string());
    }

    let import_line = format!("from {} import {}", module, name);
    let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
    let mut skipped = 0;
    if top_level.first().map(|s| is_docstring(s)).unwrap_or(false) {
        skipped = 1;
    }
    while top_level
        .get(skipped)
        .map(|s| s.kind() == "future_import_statement")
        .unwrap_or(false)
    {
        skipped += 1;
    }

    let mut output = String::with_capacity(source.len() + import_line.len() + 1);
    if skipped > 0 {
        let after = top_level[skipped - 1].end_byte();
        match source[after..].find('\n') {
            Some(offset) => {
                let at = after + offset + 1;
                output.push_str(&source[..at]);
                output.push_str(&import_line);
                output.push_str(newline);
                output.push_str(&source[at..]);
            }
            None => {
                output.push_str(source);
                output.push_str(newline);
                output.push_str(&import_line);
                output.push_str(newline);
            }
        }
    } else if let Some(first) = top_level.first() {
        let at = first.start_byte();
        output.push_str(&source[..at]);
        output.push_str(&import_line);
        output.push_str(newline);
        output.push_str(&source[at..]);
    } else {
        output.push_str(source);
        if !source.is_empty() && !source.ends_with('\n') {
            output.push_str(newline);
        }
        output.push_str(&import_line);
        output.push_str(newline);
    }

    debug!("Inserted '{}'", import_line);
    Ok(output)
}

fn is_docstring(stmt: &Node) -> bool {
    stmt.kind() == "expression_statement"
        && stmt.named_child_count() == 1
        && stmt
            .named_child(0)
            .map(|c| c.kind() == "string" || c.kind() == "concatenated_string")
            .unwrap_or(false)
}

/// `from module import name` (unaliased) or `from module import *`
fn imports_name(stmt: &Node, source: &str, module: &str, name: &str) -> bool {
    if stmt.kind() != "import_from_statement" {
        return false;
    }
    let module_matches = stmt
        .child_by_field_name("module_name")
        .map(|m| node_text(&m, source) == module)
        .unwrap_or(false);
    if !module_matches {
        return false;
    }

    let mut cursor = stmt.walk();
    let wildcard = stmt
        .named_children(&mut cursor)
        .any(|c| c.kind() == "wildcard_import");
    if wildcard {
        return true;
    }

    let mut cursor = stmt.walk();
    let imported = stmt
        .children_by_field_name("name", &mut cursor)
        .any(|n| n.kind() == "dotted_name" && node_text(&n, source) == name);
    imported
}

/// Apply candidates, then write each template to `store` when
/// `config.clean_mode` is set. Existing entries are never overwritten.
/// Nothing is saved if the rewrite fails.
pub fn apply_with_extraction(
    source: &str,
    candidates: &[MigrationCandidate],
    config: &ScanConfig,
    store: &mut dyn TemplateStore,
    source_file: &str,
    version: &str,
) -> Result<RewriteOutcome> {
    let rewritten = apply_candidates(source, candidates, config)?;

    let mut extracted = 0;
    let mut skipped_existing = 0;
    if config.clean_mode {
        for candidate in candidates {
            if store.exists(&candidate.prompt_id) {
                info!(
                    "Template for '{}' already exists, keeping it",
                    candidate.prompt_id
                );
                skipped_existing += 1;
                continue;
            }
            store.save(
                &candidate.prompt_id,
                version,
                &candidate.extracted_content,
                &format!("Auto-migrated from {}:{}", source_file, candidate.line_number),
            )?;
            extracted += 1;
        }
    }

    Ok(RewriteOutcome {
        source: rewritten,
        applied: candidates.len(),
        extracted,
        skipped_existing,
    })
}

/// Scan and apply every candidate in one step.
pub fn migrate_source(source: &str, config: &ScanConfig) -> Result<RewriteOutcome> {
    let candidates = Scanner::new(config.clone())?.scan(source)?;
    let rewritten = apply_candidates(source, &candidates, config)?;
    Ok(RewriteOutcome {
        source: rewritten,
        applied: candidates.len(),
        extracted: 0,
        skipped_existing: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_import(source: &str) -> String {
        ensure_import(source, "prompt_vcs", "p").unwrap()
    }

    #[test]
    fn import_goes_before_first_statement() {
        assert_eq!(with_import("x = 1\n"), "from prompt_vcs import p\nx = 1\n");
    }

    #[test]
    fn import_keeps_leading_comments_above() {
        let source = "#!/usr/bin/env python\n# -*- coding: utf-8 -*-\nimport os\n";
        assert_eq!(
            with_import(source),
            "#!/usr/bin/env python\n# -*- coding: utf-8 -*-\nfrom prompt_vcs import p\nimport os\n"
        );
    }

    #[test]
    fn import_follows_future_imports() {
        let source = "from __future__ import annotations\nfrom __future__ import division\nimport os\n";
        assert_eq!(
            with_import(source),
            "from __future__ import annotations\nfrom __future__ import division\nfrom prompt_vcs import p\nimport os\n"
        );
    }

    #[test]
    fn import_follows_module_docstring() {
        let source = "\"\"\"Module docs.\"\"\"\nfrom __future__ import annotations\nx = 1\n";
        assert_eq!(
            with_import(source),
            "\"\"\"Module docs.\"\"\"\nfrom __future__ import annotations\nfrom prompt_vcs import p\nx = 1\n"
        );
    }

    #[test]
    fn import_at_end_of_file_without_newline() {
        assert_eq!(
            with_import("from __future__ import annotations"),
            "from __future__ import annotations\nfrom prompt_vcs import p\n"
        );
        assert_eq!(with_import(""), "from prompt_vcs import p\n");
    }

    #[test]
    fn existing_import_is_detected() {
        let source = "from prompt_vcs import p\nx = 1\n";
        assert_eq!(with_import(source), source);
        let source = "from prompt_vcs import get_manager, p\n";
        assert_eq!(with_import(source), source);
        let source = "from prompt_vcs import *\n";
        assert_eq!(with_import(source), source);
    }

    #[test]
    fn guarded_import_is_detected() {
        let source = "try:\n    from prompt_vcs import p\nexcept ImportError:\n    p = None\n";
        assert_eq!(with_import(source), source);

        let source = "import os\n\ndef load():\n    from prompt_vcs import p\n    return p\n";
        assert_eq!(with_import(source), source);
    }

    #[test]
    fn guarded_import_file_migrates_without_duplicate() {
        let source = "try:\n    from prompt_vcs import p\nexcept ImportError:\n    raise\n\nprompt = \"Hello world, this is a test prompt\"\n";
        let outcome = migrate_source(source, &ScanConfig::default()).unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.source.matches("from prompt_vcs import p").count(), 1);
        assert!(outcome.source.starts_with("try:\n"));
        assert!(outcome
            .source
            .contains("prompt = p(\"prompt\", \"Hello world, this is a test prompt\")"));
    }

    #[test]
    fn aliased_import_does_not_count() {
        let source = "from prompt_vcs import p as render\n";
        assert_eq!(
            with_import(source),
            "from prompt_vcs import p\nfrom prompt_vcs import p as render\n"
        );
    }

    #[test]
    fn no_candidates_leaves_source_untouched() {
        let source = "prompt = \"Short\"\n";
        let out = apply_candidates(source, &[], &ScanConfig::default()).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn stale_candidate_is_rejected() {
        let config = ScanConfig::default();
        let source = "prompt = \"Hello world, this is a test prompt\"\n";
        let candidates = Scanner::new(config.clone()).unwrap().scan(source).unwrap();
        let edited = "prompt = \"Hello world, this was edited meanwhile\"\n";
        let err = apply_candidates(edited, &candidates, &config).unwrap_err();
        assert!(matches!(err, PromptVcsError::InvalidOperation(_)));
    }

    #[test]
    fn failed_rewrite_saves_no_templates() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = prompt_vcs_core::YamlTemplateStore::for_project(dir.path());
        let config = ScanConfig::default().with_clean_mode(true);
        let source = "prompt = \"Hello world, this is a test prompt\"\n";
        let candidates = Scanner::new(config.clone()).unwrap().scan(source).unwrap();

        let edited = "prompt = \"Hello world, this was edited meanwhile\"\n";
        let result = apply_with_extraction(edited, &candidates, &config, &mut store, "a.py", "v1");
        assert!(result.is_err());
        assert!(!store.exists("prompt"));
    }

    #[test]
    fn migrate_source_rewrites_and_imports() {
        let source = "prompt = \"Hello world, this is a test prompt\"\n";
        let outcome = migrate_source(source, &ScanConfig::default()).unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(
            outcome.source,
            "from prompt_vcs import p\nprompt = p(\"prompt\", \"Hello world, this is a test prompt\")\n"
        );
    }
}
