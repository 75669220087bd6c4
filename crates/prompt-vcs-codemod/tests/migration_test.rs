use prompt_vcs_codemod::{
    apply_candidates, apply_with_extraction, ensure_import, migrate_source, scan, ScanConfig,
};
use prompt_vcs_core::{PromptTemplate, PromptVcsError, Result, TemplateStore, YamlTemplateStore};
use std::collections::BTreeMap;
use tempfile::TempDir;

#[derive(Default)]
struct MemoryStore {
    entries: BTreeMap<(String, String), PromptTemplate>,
}

impl TemplateStore for MemoryStore {
    fn load(&self, prompt_id: &str, version: &str) -> Result<PromptTemplate> {
        self.entries
            .get(&(prompt_id.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| PromptVcsError::VersionNotFound {
                id: prompt_id.to_string(),
                version: version.to_string(),
            })
    }

    fn exists(&self, prompt_id: &str) -> bool {
        self.entries
            .contains_key(&(prompt_id.to_string(), "v1".to_string()))
    }

    fn save(&mut self, prompt_id: &str, version: &str, content: &str, description: &str) -> Result<()> {
        self.entries.insert(
            (prompt_id.to_string(), version.to_string()),
            PromptTemplate {
                version: version.to_string(),
                description: description.to_string(),
                template: content.to_string(),
            },
        );
        Ok(())
    }

    fn list_versions(&self, prompt_id: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .keys()
            .filter(|(id, _)| id == prompt_id)
            .map(|(_, v)| v.clone())
            .collect())
    }
}

fn migrate(source: &str) -> String {
    migrate_source(source, &ScanConfig::default()).unwrap().source
}

#[test]
fn plain_string_is_migrated() {
    let source = "prompt = \"Hello world, this is a test prompt\"\n";
    let output = migrate(source);
    assert!(output.contains("from prompt_vcs import p"));
    assert!(output.contains("prompt = p(\"prompt\", \"Hello world, this is a test prompt\")"));
    assert!(!output.contains("prompt = \"Hello"));
}

#[test]
fn fstring_is_migrated_with_keywords() {
    let source = "user = \"Alice\"\nprompt = f\"Hello {user}, welcome to the system\"\n";
    assert_eq!(
        migrate(source),
        "from prompt_vcs import p\nuser = \"Alice\"\nprompt = p(\"prompt\", \"Hello {user}, welcome to the system\", user=user)\n"
    );
}

#[test]
fn short_prompt_leaves_file_unchanged() {
    let source = "prompt = \"Short\"\n";
    let outcome = migrate_source(source, &ScanConfig::default()).unwrap();
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.source, source);
}

#[test]
fn complex_fstring_leaves_file_unchanged() {
    let source = "complex_prompt = f\"Result: {func()}\"\n";
    assert_eq!(migrate(source), source);
}

#[test]
fn rescanning_migrated_output_finds_nothing() {
    let source = r#"
from __future__ import annotations

import os

SYSTEM_PROMPT = "not matched because of case"
system_prompt = "You are a helpful assistant for {user}"

def build(user, price, data):
    price_msg = f"Price: {price:.2f} USD"
    greeting_template = f"Hello {user.name}, your score is {data['score']}"
    return system_prompt, price_msg, greeting_template
"#;
    let config = ScanConfig::default();
    let first = migrate_source(source, &config).unwrap();
    assert_eq!(first.applied, 3);
    assert!(scan(&first.source, &config).unwrap().is_empty());

    let second = migrate_source(&first.source, &config).unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.source, first.source);
    assert_eq!(first.source.matches("from prompt_vcs import p").count(), 1);
}

#[test]
fn future_import_stays_first() {
    let source = "from __future__ import annotations\nimport os\n\nprompt = \"Hello world, this is a test prompt\"\n";
    let output = migrate(source);
    assert!(output.starts_with(
        "from __future__ import annotations\nfrom prompt_vcs import p\nimport os\n"
    ));
}

#[test]
fn import_insertion_is_idempotent() {
    let once = ensure_import("import os\n", "prompt_vcs", "p").unwrap();
    let twice = ensure_import(&once, "prompt_vcs", "p").unwrap();
    assert_eq!(once, twice);
}

#[test]
fn untouched_text_is_byte_identical() {
    let source = "# header comment\r\nimport os  # trailing\r\n\r\ndef f():\r\n\tprompt = 'Tabs and CRLF are preserved here'\r\n\treturn prompt\r\n";
    let output = migrate(source);
    assert_eq!(
        output,
        "# header comment\r\nfrom prompt_vcs import p\r\nimport os  # trailing\r\n\r\ndef f():\r\n\tprompt = p(\"prompt\", 'Tabs and CRLF are preserved here')\r\n\treturn prompt\r\n"
    );
}

#[test]
fn selected_subset_is_applied() {
    let source = "prompt = \"First prompt in the file\"\nmsg = \"Second prompt in the file\"\n";
    let config = ScanConfig::default();
    let candidates = scan(source, &config).unwrap();
    assert_eq!(candidates.len(), 2);

    let output = apply_candidates(source, &candidates[1..], &config).unwrap();
    assert_eq!(
        output,
        "from prompt_vcs import p\nprompt = \"First prompt in the file\"\nmsg = p(\"msg\", \"Second prompt in the file\")\n"
    );
}

#[test]
fn syntax_error_is_reported() {
    let err = migrate_source("def broken(:\n", &ScanConfig::default()).unwrap_err();
    assert!(matches!(err, PromptVcsError::Parse(_)));
}

#[test]
fn clean_mode_extracts_templates() {
    let source = "name = 'Bob'\nprompt = f\"Hi {name},\\nwelcome aboard\"\n";
    let config = ScanConfig::default().with_clean_mode(true);
    let candidates = scan(source, &config).unwrap();

    let mut store = MemoryStore::default();
    let outcome =
        apply_with_extraction(source, &candidates, &config, &mut store, "app.py", "v1").unwrap();

    assert_eq!(outcome.extracted, 1);
    assert_eq!(outcome.skipped_existing, 0);
    assert_eq!(
        outcome.source,
        "from prompt_vcs import p\nname = 'Bob'\nprompt = p(\"prompt\", name=name)\n"
    );
    let saved = store.load("prompt", "v1").unwrap();
    assert_eq!(saved.template, "Hi {name},\nwelcome aboard");
    assert_eq!(saved.description, "Auto-migrated from app.py:2");
}

#[test]
fn clean_mode_never_overwrites_existing_templates() {
    let dir = TempDir::new().unwrap();
    let mut store = YamlTemplateStore::for_project(dir.path());
    store
        .save("prompt", "v1", "Hand-edited template", "kept")
        .unwrap();

    let source = "prompt = \"Generated content that must not win\"\ninstruction = \"Follow every instruction\"\n";
    let config = ScanConfig::default().with_clean_mode(true);
    let candidates = scan(source, &config).unwrap();
    let outcome =
        apply_with_extraction(source, &candidates, &config, &mut store, "agent.py", "v1").unwrap();

    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.extracted, 1);
    assert_eq!(outcome.skipped_existing, 1);
    assert_eq!(store.load("prompt", "v1").unwrap().template, "Hand-edited template");
    assert_eq!(
        store.load("instruction", "v1").unwrap().template,
        "Follow every instruction"
    );
    assert!(outcome.source.contains("prompt = p(\"prompt\")\n"));
    assert!(outcome.source.contains("instruction = p(\"instruction\")\n"));
}

#[test]
fn duplicate_variables_get_unique_ids() {
    let source = r#"
class A:
    prompt = "Prompt for the first class"

class B:
    prompt = "Prompt for the second class"
"#;
    let output = migrate(source);
    assert!(output.contains("    prompt = p(\"prompt\", \"Prompt for the first class\")"));
    assert!(output.contains("    prompt = p(\"prompt_2\", \"Prompt for the second class\")"));
}
