// ABOUTME: Discovers prompts already written against the runtime API for scaffolding.
// ABOUTME: Finds p("id", "content") calls and @prompt(id=...) functions with docstrings.
use crate::file_collect::collect_python_files;
use crate::fstring::{unescape, StringLiteral};
use crate::language::PythonParser;
use crate::node_utils::{line_of, node_text, statements, walk_tree};
use prompt_vcs_core::manager::dedent;
use prompt_vcs_core::{PromptVcsError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};
use tree_sitter::Node;

/// A prompt found in source code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPrompt {
    pub id: String,
    pub default_content: String,
    pub source_file: String,
    pub line_number: usize,
    /// Registered through `@prompt(...)` rather than an inline `p(...)` call
    pub is_decorator: bool,
}

/// Names the extractor looks for: the inline accessor and the registration decorator
#[derive(Debug, Clone)]
pub struct ExtractorNames {
    pub accessor: String,
    pub decorator: String,
}

impl Default for ExtractorNames {
    fn default() -> Self {
        Self {
            accessor: "p".to_string(),
            decorator: "prompt".to_string(),
        }
    }
}

pub struct PromptExtractor {
    names: ExtractorNames,
    parser: PythonParser,
}

impl PromptExtractor {
    pub fn new(names: ExtractorNames) -> Result<Self> {
        Ok(Self {
            names,
            parser: PythonParser::new()?,
        })
    }

    pub fn extract_from_source(
        &mut self,
        source: &str,
        source_file: &str,
    ) -> Result<Vec<ExtractedPrompt>> {
        let tree = self.parser.parse(source)?;
        let mut found = Vec::new();
        walk_tree(tree.root_node(), &mut |node| match node.kind() {
            "call" => {
                if let Some(prompt) = self.inline_prompt(node, source, source_file) {
                    found.push(prompt);
                }
            }
            "decorated_definition" => {
                if let Some(prompt) = self.decorated_prompt(node, source, source_file) {
                    found.push(prompt);
                }
            }
            _ => {}
        });
        debug!("{}: {} prompts", source_file, found.len());
        Ok(found)
    }

    pub fn extract_from_file(&mut self, path: &Path) -> Result<Vec<ExtractedPrompt>> {
        let source = std::fs::read_to_string(path)?;
        self.extract_from_source(&source, &path.display().to_string())
    }

    /// `p("id", "content", ...)` with both leading arguments plain string literals
    fn inline_prompt(&self, call: Node, source: &str, source_file: &str) -> Option<ExtractedPrompt> {
        let function = call.child_by_field_name("function")?;
        if function.kind() != "identifier" || node_text(&function, source) != self.names.accessor {
            return None;
        }
        let args = call.child_by_field_name("arguments")?;
        let positional = positional_args(&args);
        let id = string_value(*positional.first()?, source)?;
        let content = string_value(*positional.get(1)?, source)?;
        Some(ExtractedPrompt {
            id,
            default_content: content,
            source_file: source_file.to_string(),
            line_number: line_of(&call),
            is_decorator: false,
        })
    }

    /// `@prompt(id="...")` on a function whose docstring is the template
    fn decorated_prompt(
        &self,
        decorated: Node,
        source: &str,
        source_file: &str,
    ) -> Option<ExtractedPrompt> {
        let definition = decorated.child_by_field_name("definition")?;
        if definition.kind() != "function_definition" {
            return None;
        }

        let mut cursor = decorated.walk();
        let decorators: Vec<Node> = decorated
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .collect();
        let id = decorators
            .iter()
            .find_map(|d| self.decorator_id(d, source))?;

        let body = definition.child_by_field_name("body")?;
        let first = *statements(&body).first()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let docstring = string_value(first.named_child(0)?, source)?;

        Some(ExtractedPrompt {
            id,
            default_content: dedent(&docstring),
            source_file: source_file.to_string(),
            line_number: line_of(&decorated),
            is_decorator: true,
        })
    }

    fn decorator_id(&self, decorator: &Node, source: &str) -> Option<String> {
        let call = decorator.named_child(0)?;
        if call.kind() != "call" {
            return None;
        }
        let function = call.child_by_field_name("function")?;
        let name = match function.kind() {
            "identifier" => node_text(&function, source),
            "attribute" => node_text(&function.child_by_field_name("attribute")?, source),
            _ => return None,
        };
        if name != self.names.decorator {
            return None;
        }

        let args = call.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        let keyword = args
            .named_children(&mut cursor)
            .filter(|a| a.kind() == "keyword_argument")
            .find(|a| {
                a.child_by_field_name("name")
                    .map(|n| node_text(&n, source) == "id")
                    .unwrap_or(false)
            })
            .and_then(|a| a.child_by_field_name("value"));
        match keyword {
            Some(value) => string_value(value, source),
            None => string_value(*positional_args(&args).first()?, source),
        }
    }
}

fn positional_args<'t>(args: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|a| {
            !matches!(
                a.kind(),
                "keyword_argument" | "comment" | "list_splat" | "dictionary_splat"
            )
        })
        .collect()
}

/// Value of a non-interpolated text literal
fn string_value(node: Node, source: &str) -> Option<String> {
    let literal = StringLiteral::from_node(node, source)?;
    if literal.is_fstring() || literal.is_bytes() || literal.is_template_string() {
        return None;
    }
    let content = literal.content(source);
    Some(if literal.is_raw() {
        content.to_string()
    } else {
        unescape(content)
    })
}

/// Extract prompts from every Python file under `path`. Files that fail to
/// parse are logged and skipped.
pub fn extract_prompts_from_directory(path: &Path) -> Result<Vec<ExtractedPrompt>> {
    let mut extractor = PromptExtractor::new(ExtractorNames::default())?;
    let mut prompts = Vec::new();
    for file in collect_python_files(path)? {
        match extractor.extract_from_file(&file) {
            Ok(found) => prompts.extend(found),
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }
    info!("Found {} prompts under {}", prompts.len(), path.display());
    Ok(prompts)
}

/// Fail when one id is used with two different contents.
pub fn check_id_conflicts(prompts: &[ExtractedPrompt]) -> Result<()> {
    let mut seen: HashMap<&str, &ExtractedPrompt> = HashMap::new();
    for prompt in prompts {
        match seen.get(prompt.id.as_str()) {
            Some(first) if first.default_content != prompt.default_content => {
                return Err(PromptVcsError::IdConflict(format!(
                    "'{}' is defined with different content at {}:{} and {}:{}",
                    prompt.id,
                    first.source_file,
                    first.line_number,
                    prompt.source_file,
                    prompt.line_number
                )));
            }
            Some(_) => {}
            None => {
                seen.insert(&prompt.id, prompt);
            }
        }
    }
    Ok(())
}

/// Keep the first occurrence of each id.
pub fn dedupe_by_id(prompts: Vec<ExtractedPrompt>) -> Vec<ExtractedPrompt> {
    let mut seen = std::collections::HashSet::new();
    prompts
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}
