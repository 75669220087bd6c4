use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use prompt_vcs_codemod::{
    apply_candidates, apply_with_extraction, check_id_conflicts, collect_python_files, dedupe_by_id,
    extract_prompts_from_directory, ExtractedPrompt, MigrationCandidate, RewriteOutcome, ScanConfig, Scanner,
};
use prompt_vcs_core::{
    find_lockfile_root, find_project_root, load_lockfile, save_lockfile, ConfigManager,
    LoggingConfig, MigrationConfig, TemplateStore, YamlTemplateStore, LOCKFILE_NAME, PROMPTS_DIR,
};
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pvcs")]
#[command(about = "Git-native prompt management: versioned YAML prompts and source migration", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file to use instead of .pvcs.toml lookup
    #[arg(long, global = true, env = "PVCS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a project: lockfile and prompts/ directory
    Init {
        /// Project root (defaults to the current directory)
        path: Option<PathBuf>,
    },

    /// Generate YAML files for prompts already written against the runtime API
    Scaffold {
        /// Source directory to scan
        src: PathBuf,

        /// Output directory for YAML files (defaults to the project's prompts/)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show what would be created without writing files
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Pin a prompt to a version in the lockfile
    Switch {
        /// Prompt ID
        prompt_id: String,

        /// Version to switch to, e.g. v2
        version: String,

        /// Project root directory
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Show locked prompts and whether their files exist
    Status {
        /// Project root directory
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Rewrite hardcoded prompt strings into accessor calls
    Migrate {
        /// File or directory to migrate
        path: PathBuf,

        /// Show changes without applying them
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Apply every change without asking
        #[arg(short, long)]
        yes: bool,

        /// Move prompt text into prompts/<id>/<version>.yaml and leave only the id in code
        #[arg(short, long)]
        clean: bool,
    },
}

#[derive(Tabled)]
struct ScaffoldRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Prompt ID")]
    prompt_id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "File Status")]
    file_status: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct InitReport {
    lockfile_created: bool,
    prompts_dir_created: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ScaffoldSummary {
    created: usize,
    skipped: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct MigrationSummary {
    files_scanned: usize,
    files_changed: usize,
    files_failed: usize,
    candidates: usize,
    applied: usize,
    skipped: usize,
    yaml_written: usize,
    yaml_skipped: usize,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let project_root = find_project_root(&cwd);
    let config = ConfigManager::load(project_root.as_deref(), cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config.config().logging, cli.verbose);
    let migration = &config.config().migration;

    match cli.command {
        Commands::Init { path } => cmd_init(path.as_deref().unwrap_or(&cwd)),
        Commands::Scaffold {
            src,
            output,
            dry_run,
        } => cmd_scaffold(&src, output.as_deref(), dry_run, migration, &cwd),
        Commands::Switch {
            prompt_id,
            version,
            project,
        } => cmd_switch(&prompt_id, &version, project.as_deref(), &cwd),
        Commands::Status { project } => cmd_status(project.as_deref(), &cwd),
        Commands::Migrate {
            path,
            dry_run,
            yes,
            clean,
        } => cmd_migrate(&path, dry_run, yes, clean, migration, &cwd),
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = if verbose {
        EnvFilter::new(crate_directives(level))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(crate_directives(level)))
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry.with(layer.json()).init(),
        "compact" => registry.with(layer.compact()).init(),
        _ => registry.with(layer).init(),
    }
}

/// Our crates at `level`, everything else at warn.
fn crate_directives(level: &str) -> String {
    format!(
        "warn,pvcs={0},prompt_vcs_core={0},prompt_vcs_codemod={0}",
        level
    )
}

fn cmd_init(path: &Path) -> Result<()> {
    let report = init_project(path)?;

    if report.lockfile_created {
        println!("{} Created {}", "✓".green(), LOCKFILE_NAME);
    } else {
        println!("{} {} already exists", "!".yellow(), LOCKFILE_NAME);
    }
    if report.prompts_dir_created {
        println!("{} Created {}/ directory", "✓".green(), PROMPTS_DIR);
    } else {
        println!("{} {}/ already exists", "!".yellow(), PROMPTS_DIR);
    }

    println!("\n{}", "Project initialized successfully!".green().bold());
    Ok(())
}

fn init_project(root: &Path) -> Result<InitReport> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create {}", root.display()))?;
    let mut report = InitReport::default();

    if !root.join(LOCKFILE_NAME).exists() {
        save_lockfile(root, &Default::default()).context("Failed to write lockfile")?;
        report.lockfile_created = true;
    }

    let prompts_dir = root.join(PROMPTS_DIR);
    if !prompts_dir.exists() {
        std::fs::create_dir_all(&prompts_dir)
            .with_context(|| format!("Failed to create {}", prompts_dir.display()))?;
        report.prompts_dir_created = true;
    }

    info!("Initialized project at {}", root.display());
    Ok(report)
}

fn cmd_scaffold(
    src: &Path,
    output: Option<&Path>,
    dry_run: bool,
    migration: &MigrationConfig,
    cwd: &Path,
) -> Result<()> {
    if !src.exists() {
        bail!("Source directory not found: {}", src.display());
    }
    let src = &src
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", src.display()))?;

    let prompts_dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => find_project_root(src)
            .unwrap_or_else(|| cwd.to_path_buf())
            .join(PROMPTS_DIR),
    };

    println!("{} {}", "Scanning:".blue(), src.display());
    println!("{} {}\n", "Output:".blue(), prompts_dir.display());

    let prompts = extract_prompts_from_directory(src).context("Failed to scan sources")?;
    if prompts.is_empty() {
        println!("{}", "No prompts found in source code.".yellow());
        return Ok(());
    }
    check_id_conflicts(&prompts)?;

    let mut store = YamlTemplateStore::new(&prompts_dir)
        .with_default_version(migration.default_version.clone());
    let version = migration.default_version.clone();
    let (rows, summary) = scaffold_prompts(dedupe_by_id(prompts), &mut store, &version, dry_run)?;

    println!("{}", Table::new(rows).with(Style::rounded()));

    if dry_run {
        println!(
            "\n{} Would create {} files, skip {}",
            "Dry run:".yellow(),
            summary.created,
            summary.skipped
        );
    } else {
        println!(
            "\n{} {} files, {} {}",
            "Created:".green(),
            summary.created,
            "Skipped:".yellow(),
            summary.skipped
        );
    }
    Ok(())
}

/// Write a template for every prompt that has none yet.
fn scaffold_prompts(
    prompts: Vec<ExtractedPrompt>,
    store: &mut dyn TemplateStore,
    version: &str,
    dry_run: bool,
) -> Result<(Vec<ScaffoldRow>, ScaffoldSummary)> {
    let mut rows = Vec::with_capacity(prompts.len());
    let mut summary = ScaffoldSummary::default();

    for prompt in prompts {
        let file_name = Path::new(&prompt.source_file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| prompt.source_file.clone());
        let source = format!("{}:{}", file_name, prompt.line_number);

        let status = if store.exists(&prompt.id) {
            summary.skipped += 1;
            "exists"
        } else {
            summary.created += 1;
            if !dry_run {
                store
                    .save(
                        &prompt.id,
                        version,
                        &prompt.default_content,
                        &format!("Auto-generated from {}", source),
                    )
                    .with_context(|| format!("Failed to write template for '{}'", prompt.id))?;
            }
            "new"
        };

        rows.push(ScaffoldRow {
            id: prompt.id,
            source,
            kind: if prompt.is_decorator { "decorator" } else { "inline" }.to_string(),
            status: status.to_string(),
        });
    }

    Ok((rows, summary))
}

/// Explicit `--project`, else the nearest directory holding a lockfile.
fn lockfile_project(project: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    match project {
        Some(dir) => Ok(dir.to_path_buf()),
        None => find_lockfile_root(cwd)
            .with_context(|| format!("No {} found. Run 'pvcs init' first.", LOCKFILE_NAME)),
    }
}

fn cmd_switch(prompt_id: &str, version: &str, project: Option<&Path>, cwd: &Path) -> Result<()> {
    let root = lockfile_project(project, cwd)?;
    let store = YamlTemplateStore::for_project(&root);

    if !store.version_exists(prompt_id, version) {
        let available = store.list_versions(prompt_id)?;
        eprintln!(
            "{}",
            format!("Available versions in {}/{}/:", PROMPTS_DIR, prompt_id).dimmed()
        );
        if available.is_empty() {
            eprintln!("  (none)");
        }
        for v in &available {
            eprintln!("  - {}", v);
        }
        bail!(
            "Version file not found: {}",
            store.template_path(prompt_id, version).display()
        );
    }

    match switch_version(&root, prompt_id, version)? {
        Some(old) => println!(
            "{} Switched '{}': {} → {}",
            "✓".green(),
            prompt_id,
            old,
            version
        ),
        None => println!("{} Locked '{}' to version {}", "✓".green(), prompt_id, version),
    }
    Ok(())
}

/// Update the lockfile entry, returning the previous version.
fn switch_version(root: &Path, prompt_id: &str, version: &str) -> Result<Option<String>> {
    let mut lock = load_lockfile(root).context("Failed to read lockfile")?;
    let old = lock.insert(prompt_id.to_string(), version.to_string());
    save_lockfile(root, &lock).context("Failed to write lockfile")?;
    info!("Locked {} to {}", prompt_id, version);
    Ok(old)
}

fn cmd_status(project: Option<&Path>, cwd: &Path) -> Result<()> {
    let root = lockfile_project(project, cwd)?;
    let rows = status_rows(&root)?;
    if rows.is_empty() {
        println!(
            "{} No prompts are version-locked.",
            "Lockfile is empty.".yellow()
        );
        return Ok(());
    }
    println!("{}", "Locked Prompts".bold());
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn status_rows(root: &Path) -> Result<Vec<StatusRow>> {
    let lock = load_lockfile(root).context("Failed to read lockfile")?;
    let store = YamlTemplateStore::for_project(root);
    Ok(lock
        .into_iter()
        .map(|(prompt_id, version)| {
            let file_status = if store.version_exists(&prompt_id, &version) {
                "✓"
            } else {
                "✗ missing"
            };
            StatusRow {
                file_status: file_status.to_string(),
                prompt_id,
                version,
            }
        })
        .collect())
}

fn cmd_migrate(
    path: &Path,
    dry_run: bool,
    yes: bool,
    clean: bool,
    migration: &MigrationConfig,
    cwd: &Path,
) -> Result<()> {
    if !path.exists() {
        bail!("Path not found: {}", path.display());
    }
    let path = &path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let mut store = None;
    if clean {
        let start: &Path = if path.is_dir() {
            path
        } else {
            path.parent().unwrap_or(path)
        };
        let root = match find_project_root(start) {
            Some(root) => {
                println!("{} {}", "Project root:".blue(), root.display());
                root
            }
            None => {
                warn!("No project root found, using current directory");
                println!(
                    "{} No project root found, using current directory: {}",
                    "Warning:".yellow(),
                    cwd.display()
                );
                cwd.to_path_buf()
            }
        };
        let yaml = YamlTemplateStore::for_project(&root)
            .with_default_version(migration.default_version.clone());
        println!(
            "{} Prompts will be written to {}/\n",
            "Clean mode:".blue(),
            yaml.prompts_dir().display()
        );
        store = Some(yaml);
    }

    let files = collect_python_files(path)?;
    if files.is_empty() {
        println!("{}", "No Python files found.".yellow());
        return Ok(());
    }
    println!("{} {} Python file(s)\n", "Scanning:".blue(), files.len());

    let config = ScanConfig::from(migration).with_clean_mode(clean);
    let mut scanner = Scanner::new(config.clone())?;
    let mut summary = MigrationSummary::default();
    let theme = ColorfulTheme::default();

    for file in &files {
        summary.files_scanned += 1;
        let source = match std::fs::read_to_string(file) {
            Ok(s) => s,
            Err(e) => {
                println!("{} Could not read {}: {}", "Warning:".yellow(), file.display(), e);
                summary.files_failed += 1;
                continue;
            }
        };
        let candidates = match scanner.scan(&source) {
            Ok(c) => c,
            Err(e) => {
                println!("{} Skipping {}: {}", "Warning:".yellow(), file.display(), e);
                summary.files_failed += 1;
                continue;
            }
        };
        if candidates.is_empty() {
            debug!("No candidates in {}", file.display());
            continue;
        }

        println!("\n{} {}", "File:".cyan().bold(), file.display());
        println!(
            "{}\n",
            format!("Found {} migration candidate(s)", candidates.len()).dimmed()
        );

        let mut approved: Vec<MigrationCandidate> = Vec::new();
        for candidate in candidates {
            summary.candidates += 1;
            print_candidate(&candidate, store.as_ref());

            if dry_run {
                println!("{}\n", "Dry run - no changes applied".yellow());
                summary.skipped += 1;
                continue;
            }

            let accept = yes
                || Confirm::with_theme(&theme)
                    .with_prompt("Apply this change?")
                    .default(true)
                    .interact()
                    .context("Failed to read confirmation")?;
            if accept {
                approved.push(candidate);
            } else {
                println!("{}\n", "Skipped".dimmed());
                summary.skipped += 1;
            }
        }

        if approved.is_empty() {
            continue;
        }

        let source_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let outcome = match store.as_mut() {
            Some(yaml) => apply_with_extraction(
                &source,
                &approved,
                &config,
                yaml,
                &source_name,
                &migration.default_version,
            )?,
            None => RewriteOutcome {
                source: apply_candidates(&source, &approved, &config)?,
                applied: approved.len(),
                extracted: 0,
                skipped_existing: 0,
            },
        };

        std::fs::write(file, &outcome.source)
            .with_context(|| format!("Failed to write {}", file.display()))?;
        println!("{} Applied changes to {}", "✓".green(), source_name);

        summary.files_changed += 1;
        summary.applied += outcome.applied;
        summary.yaml_written += outcome.extracted;
        summary.yaml_skipped += outcome.skipped_existing;
    }

    print_migration_summary(&summary, clean, dry_run);
    Ok(())
}

fn print_candidate(candidate: &MigrationCandidate, store: Option<&YamlTemplateStore>) {
    println!(
        "{} {} → {}",
        format!("Line {}:", candidate.line_number).bold(),
        candidate.variable_name.cyan(),
        candidate.prompt_id.green()
    );

    if let Some(store) = store {
        let yaml_path = store.template_path(&candidate.prompt_id, store.default_version());
        if store.exists(&candidate.prompt_id) {
            println!(
                "{} {}",
                "  ⚠ YAML file exists, will skip:".yellow(),
                yaml_path.display()
            );
        } else {
            println!("{} {}", "  → Will create:".green(), yaml_path.display());
        }
    }

    print!(
        "{}",
        render_diff(candidate.original_code.trim(), candidate.new_code.trim())
    );
}

/// Line diff of a statement before and after rewriting.
fn render_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        let text = change.to_string();
        let text = text.trim_end_matches('\n');
        let line = match change.tag() {
            ChangeTag::Delete => format!("- {}", text).red().to_string(),
            ChangeTag::Insert => format!("+ {}", text).green().to_string(),
            ChangeTag::Equal => format!("  {}", text),
        };
        output.push_str(&line);
        output.push('\n');
    }
    output
}

fn print_migration_summary(summary: &MigrationSummary, clean: bool, dry_run: bool) {
    println!("\n{}", "=".repeat(50));
    println!("{}", "Migration Summary".bold());
    println!("  Files scanned:      {}", summary.files_scanned);
    println!("  Files changed:      {}", summary.files_changed);
    if summary.files_failed > 0 {
        println!(
            "  Files failed:       {}",
            summary.files_failed.to_string().red()
        );
    }
    println!("  Candidates found:   {}", summary.candidates);
    println!("  Applied:            {}", summary.applied.to_string().green());
    println!("  Skipped:            {}", summary.skipped.to_string().yellow());
    if clean {
        println!("  YAML files created: {}", summary.yaml_written);
        println!("  YAML files skipped: {}", summary.yaml_skipped);
    }
    if dry_run {
        println!("\n{}", "Dry run - no files were modified".yellow());
    }
}
