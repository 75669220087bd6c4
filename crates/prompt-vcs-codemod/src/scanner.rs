// ABOUTME: Finds hardcoded prompt assignments in Python source.
// ABOUTME: Produces migration candidates with their generated replacement code.
use crate::fstring::{decompose, unescape, StringLiteral};
use crate::language::PythonParser;
use crate::node_utils::{line_of, node_text, span_for, walk_tree, Span};
use prompt_vcs_core::{MigrationConfig, Result};
use std::collections::HashSet;
use tracing::{debug, trace};
use tree_sitter::Node;

/// Settings threaded into the scanner and rewriter
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub prompt_names: Vec<String>,
    pub min_length: usize,
    pub accessor_module: String,
    pub accessor_name: String,
    /// Generated calls omit the inline default; content goes to the template store
    pub clean_mode: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::from(&MigrationConfig::default())
    }
}

impl From<&MigrationConfig> for ScanConfig {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            prompt_names: config.prompt_names.clone(),
            min_length: config.min_length,
            accessor_module: config.accessor_module.clone(),
            accessor_name: config.accessor_name.clone(),
            clean_mode: false,
        }
    }
}

impl ScanConfig {
    pub fn with_clean_mode(mut self, clean_mode: bool) -> Self {
        self.clean_mode = clean_mode;
        self
    }

    /// Exact match, or a `<qualifier>_<name>` variable such as `price_msg`.
    pub fn is_prompt_name(&self, variable: &str) -> bool {
        self.prompt_names.iter().any(|name| {
            variable == name
                || variable
                    .strip_suffix(name.as_str())
                    .map(|head| head.len() > 1 && head.ends_with('_'))
                    .unwrap_or(false)
        })
    }

    /// `from prompt_vcs import p`
    pub fn import_line(&self) -> String {
        format!(
            "from {} import {}",
            self.accessor_module, self.accessor_name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    PlainString,
    FString,
}

/// A detected prompt assignment that can be rewritten to an accessor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCandidate {
    pub line_number: usize,
    pub variable_name: String,
    pub prompt_id: String,
    /// Assignment statement as written
    pub original_code: String,
    /// Replacement statement
    pub new_code: String,
    /// Literal text with `{placeholder}` markers
    pub template: String,
    /// Placeholder -> source expression, in order of first appearance
    pub bound_params: Vec<(String, String)>,
    pub kind: CandidateKind,
    /// Bytes of `original_code` in the scanned source
    pub span: Span,
    /// Text written to the template store in clean mode
    pub extracted_content: String,
}

pub struct Scanner {
    config: ScanConfig,
    parser: PythonParser,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self> {
        Ok(Self {
            config,
            parser: PythonParser::new()?,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Candidates in source order. Syntax errors are returned, never skipped.
    pub fn scan(&mut self, source: &str) -> Result<Vec<MigrationCandidate>> {
        let tree = self.parser.parse(source)?;
        let mut assignments = Vec::new();
        walk_tree(tree.root_node(), &mut |node| {
            if node.kind() == "assignment"
                && node.parent().map(|p| p.kind()) == Some("expression_statement")
            {
                assignments.push(node);
            }
        });

        let mut used_ids = HashSet::new();
        let mut candidates = Vec::new();
        for node in assignments {
            if let Some(candidate) = self.candidate_for(node, source, &mut used_ids) {
                debug!(
                    "Candidate at line {}: {} -> {}",
                    candidate.line_number, candidate.variable_name, candidate.prompt_id
                );
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    fn candidate_for(
        &self,
        node: Node,
        source: &str,
        used_ids: &mut HashSet<String>,
    ) -> Option<MigrationCandidate> {
        if node.child_by_field_name("type").is_some() {
            return None;
        }
        let left = node.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        let variable_name = node_text(&left, source);
        if !self.config.is_prompt_name(variable_name) {
            return None;
        }

        let right = node.child_by_field_name("right")?;
        let literal = StringLiteral::from_node(right, source)?;
        if literal.is_bytes() || literal.is_template_string() {
            return None;
        }

        let line_number = line_of(&node);
        let (kind, template, bound_params, literal_code, extracted_content) =
            if literal.is_fstring() {
                let decomposition = decompose(&literal, source);
                if decomposition.has_complex {
                    debug!(
                        "Skipping {} at line {}: complex interpolation",
                        variable_name, line_number
                    );
                    return None;
                }
                let bound: Vec<(String, String)> = decomposition
                    .parts
                    .iter()
                    .map(|p| (p.placeholder.clone(), p.expression.clone()))
                    .collect();
                let code = literal.requote(&decomposition.template);
                let content = if literal.is_raw() {
                    decomposition.template.clone()
                } else {
                    unescape(&decomposition.template)
                };
                (
                    CandidateKind::FString,
                    decomposition.template,
                    bound,
                    code,
                    content,
                )
            } else {
                let content = literal.content(source).to_string();
                let extracted = if literal.is_raw() {
                    content.clone()
                } else {
                    unescape(&content)
                };
                (
                    CandidateKind::PlainString,
                    content,
                    Vec::new(),
                    node_text(&right, source).to_string(),
                    extracted,
                )
            };

        if template.chars().count() < self.config.min_length {
            trace!(
                "Skipping {} at line {}: shorter than {} characters",
                variable_name,
                line_number,
                self.config.min_length
            );
            return None;
        }

        let prompt_id = unique_prompt_id(variable_name, used_ids);
        let call = self.build_call(&prompt_id, &literal_code, &bound_params);

        Some(MigrationCandidate {
            line_number,
            variable_name: variable_name.to_string(),
            prompt_id,
            original_code: node_text(&node, source).to_string(),
            new_code: format!("{} = {}", variable_name, call),
            template,
            bound_params,
            kind,
            span: span_for(&node),
            extracted_content,
        })
    }

    fn build_call(&self, prompt_id: &str, literal_code: &str, params: &[(String, String)]) -> String {
        let mut args = vec![format!("\"{}\"", prompt_id)];
        if !self.config.clean_mode {
            args.push(literal_code.to_string());
        }
        args.extend(
            params
                .iter()
                .map(|(name, expr)| format!("{}={}", name, expr)),
        );
        format!("{}({})", self.config.accessor_name, args.join(", "))
    }
}

/// Lower-cased variable name, suffixed `_2`, `_3`, ... when already taken.
fn unique_prompt_id(variable: &str, used: &mut HashSet<String>) -> String {
    let base = variable.to_lowercase();
    let mut id = base.clone();
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{}_{}", base, n);
        n += 1;
    }
    used.insert(id.clone());
    id
}

/// Scan `source` with a throwaway scanner.
pub fn scan(source: &str, config: &ScanConfig) -> Result<Vec<MigrationCandidate>> {
    Scanner::new(config.clone())?.scan(source)
}
