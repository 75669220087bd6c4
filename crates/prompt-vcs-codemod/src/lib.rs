//! Python source migration for prompt-vcs.
//!
//! The scanner finds hardcoded prompt assignments, the rewriter turns them
//! into accessor calls, and the extractor collects prompts that already use
//! the runtime API so they can be scaffolded into the template store.

pub mod classify;
pub mod extractor;
pub mod file_collect;
pub mod fstring;
pub mod language;
pub mod node_utils;
pub mod rewriter;
pub mod scanner;

pub use classify::{is_complex, sanitize, AccessChain};
pub use extractor::{
    check_id_conflicts, dedupe_by_id, extract_prompts_from_directory, ExtractedPrompt,
    ExtractorNames, PromptExtractor,
};
pub use file_collect::collect_python_files;
pub use fstring::{decompose, Decomposition, FStringPart, StringLiteral};
pub use language::{is_python_path, parse_python, PythonParser};
pub use node_utils::Span;
pub use rewriter::{apply_candidates, apply_with_extraction, ensure_import, migrate_source, RewriteOutcome};
pub use scanner::{scan, CandidateKind, MigrationCandidate, ScanConfig, Scanner};
