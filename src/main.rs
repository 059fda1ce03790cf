use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use autotag::autotagger::TagNormalizer;
use autotag::service::{Notifier, ReviewDecision, TagReviewer};
use autotag::utils::{ensure_parent_directory, get_config_path, get_log_path};
use autotag::vault::{TagScope, collect_known_tags};
use autotag::{
    AutoTagError, CaseStyle, ConfigError, CostEstimate, DebugLog, InsertLocation,
    ModelDescriptor, Selection, Settings, Tag, TagService, TaggingRequest, TaggingStatus, Vault,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// autotag - suggest tags for Markdown notes with a language model
#[derive(Parser)]
#[command(name = "autotag")]
#[command(about = "Suggest topical tags for Markdown notes and insert them into frontmatter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Suggest tags for a note (or some of its lines) and insert them
    Tag(TagCommand),
    /// List tags already used in the vault or in one note
    KnownTags(KnownTagsCommand),
    /// List models with their context window and pricing
    Models,
    /// Estimate the cost of tagging a note without calling the model
    Estimate(EstimateCommand),
    /// Show the settings file location and resolved values
    Config(ConfigCommand),
}

#[derive(Parser)]
struct TagCommand {
    /// The note to tag
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Vault directory used for known tags (defaults to the note's directory)
    #[arg(long, value_name = "DIR")]
    vault: Option<PathBuf>,

    /// Only analyze these body lines, e.g. 3:10
    #[arg(short, long, value_name = "A:B")]
    lines: Option<Selection>,

    /// Where to write tags: frontmatter, before-selection, after-selection
    #[arg(short, long, value_name = "LOCATION", default_value_t = InsertLocation::Frontmatter)]
    insert: InsertLocation,

    /// Insert without review or cost confirmation
    #[arg(short, long)]
    yes: bool,

    /// Tag case style: kebab, snake, pascal, camel, constant, pascal-snake, train
    #[arg(short, long, value_name = "STYLE")]
    format: Option<CaseStyle>,

    /// Put tags under the autotag/ namespace
    #[arg(long, conflicts_with = "no_prefix")]
    prefix: bool,

    /// Do not put tags under the autotag/ namespace
    #[arg(long)]
    no_prefix: bool,

    /// Use sample tags instead of calling a model
    #[arg(long)]
    demo: bool,

    /// Print the recorded API requests and responses afterwards
    #[arg(long)]
    debug: bool,
}

#[derive(Parser)]
struct KnownTagsCommand {
    /// Vault directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    vault: Option<PathBuf>,

    /// Only list tags of this note
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Sort and remove duplicates
    #[arg(long)]
    unique: bool,
}

#[derive(Parser)]
struct EstimateCommand {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[arg(long, value_name = "DIR")]
    vault: Option<PathBuf>,

    #[arg(short, long, value_name = "A:B")]
    lines: Option<Selection>,
}

#[derive(Parser)]
struct ConfigCommand {
    /// Write a settings file with default values if none exists
    #[arg(long)]
    init: bool,
}

/// An error already shown to the user through the notifier.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct Reported(AutoTagError);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        if e.downcast_ref::<Reported>().is_none() {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are missing settings, bad input and missing or malformed
/// notes. Everything else (network, model replies, I/O) is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    if let Some(Reported(e)) = error.downcast_ref::<Reported>() {
        return e.is_user_error();
    }
    if let Some(e) = error.downcast_ref::<AutoTagError>() {
        return e.is_user_error();
    }
    error.downcast_ref::<ConfigError>().is_some()
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings()?;
    let debug = matches!(&cli.command, Commands::Tag(cmd) if cmd.debug);
    init_tracing(&settings, debug)?;

    match cli.command {
        Commands::Tag(cmd) => handle_tag(cmd, settings).await,
        Commands::KnownTags(cmd) => handle_known_tags(&cmd),
        Commands::Models => {
            handle_models(&settings);
            Ok(())
        }
        Commands::Estimate(cmd) => handle_estimate(&cmd, settings),
        Commands::Config(cmd) => handle_config(&cmd, &settings),
    }
}

fn load_settings() -> Result<Settings> {
    let path = get_config_path()?;
    let mut settings = Settings::load(&path)?;
    settings.apply_env_overrides()?;
    Ok(settings)
}

/// Logs to stderr (warnings by default, `RUST_LOG` overrides) and, with
/// `write_to_log_file`, to the log file at info level.
fn init_tracing(settings: &Settings, debug: bool) -> Result<()> {
    let default_filter = if debug { "autotag=debug" } else { "autotag=warn" };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let file_layer = if settings.write_to_log_file {
        let path = get_log_path()?;
        ensure_parent_directory(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(EnvFilter::new("autotag=info")),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Resolves the note path and the vault directory it belongs to.
fn resolve_paths(file: &Path, vault: Option<&Path>) -> Result<(PathBuf, Vault)> {
    let file = std::path::absolute(file)
        .with_context(|| format!("Failed to resolve path: {}", file.display()))?;
    let root = match vault {
        Some(dir) => dir.to_path_buf(),
        None => file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    Ok((file, Vault::new(root)))
}

/// Handles the tag command: suggest, review, insert.
async fn handle_tag(cmd: TagCommand, mut settings: Settings) -> Result<()> {
    if let Some(style) = cmd.format {
        settings.tags_format = style;
    }
    if cmd.prefix {
        settings.use_autotag_prefix = true;
    }
    if cmd.no_prefix {
        settings.use_autotag_prefix = false;
    }
    if cmd.demo {
        settings.demo_mode = true;
    }

    let (file, vault) = resolve_paths(&cmd.file, cmd.vault.as_deref())?;
    let vault = Arc::new(vault);
    let debug_log = DebugLog::new();

    let reviewer = ConsoleReviewer {
        style: settings.tags_format,
        add_prefix: settings.use_autotag_prefix,
    };
    let mut service =
        TagService::from_settings(vault.clone(), vault, settings, debug_log.clone())?
            .with_notifier(Arc::new(ConsoleNotifier));
    if !cmd.yes {
        service = service.with_reviewer(Arc::new(reviewer));
    }

    let mut request = TaggingRequest::new(file).with_location(cmd.insert);
    if let Some(selection) = cmd.lines {
        request = request.with_selection(selection);
    }

    let result = service.run(&request).await;

    if cmd.debug {
        print_debug_log(&debug_log);
    }

    let report = result.map_err(Reported)?;
    if report.status == TaggingStatus::Inserted {
        tracing::debug!(count = report.inserted.len(), "Tagging finished");
    }
    Ok(())
}

fn print_debug_log(log: &DebugLog) {
    let entries = log.entries();
    if entries.is_empty() {
        println!("No API requests recorded.");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        println!("--- Request {} of {} ---", i + 1, entries.len());
        println!("{entry}");
    }
}

/// Handles the known-tags command.
fn handle_known_tags(cmd: &KnownTagsCommand) -> Result<()> {
    let root = match &cmd.vault {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let vault = Vault::new(root);

    let mut tags = match &cmd.file {
        Some(file) => {
            let file = std::path::absolute(file)?;
            collect_known_tags(&vault, TagScope::Document, Some(&file))
        }
        None => collect_known_tags(&vault, TagScope::Vault, None),
    }
    .map_err(AutoTagError::from)?;

    if cmd.unique {
        tags.sort();
        tags.dedup();
    }
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}

fn handle_models(settings: &Settings) {
    for model in settings.available_models() {
        let marker = if model.id == settings.model { "*" } else { " " };
        println!(
            "{marker} {:<20} {:<20} {:>7} tokens  in ${}/1k  out ${}/1k",
            model.id, model.name, model.context, model.input_cost_1k_tokens, model.output_cost_1k_tokens
        );
    }
    if settings.selected_model().is_none() {
        println!("  (selected model '{}' has no known pricing)", settings.model);
    }
}

fn handle_estimate(cmd: &EstimateCommand, settings: Settings) -> Result<()> {
    let (file, vault) = resolve_paths(&cmd.file, cmd.vault.as_deref())?;
    let vault = Arc::new(vault);
    let model = settings.model.clone();
    let service = TagService::from_settings(vault.clone(), vault, settings, DebugLog::new())?;

    let mut request = TaggingRequest::new(file);
    if let Some(selection) = cmd.lines {
        request = request.with_selection(selection);
    }

    match service.estimate(&request)? {
        Some(estimate) => println!("{model}: {estimate}"),
        None => println!("No cost estimate available for '{model}' with the current settings"),
    }
    Ok(())
}

fn handle_config(cmd: &ConfigCommand, settings: &Settings) -> Result<()> {
    let path = get_config_path()?;
    if cmd.init {
        if path.exists() {
            println!("Settings file already exists: {}", path.display());
        } else {
            Settings::default().save(&path)?;
            println!("Wrote default settings to {}", path.display());
        }
        return Ok(());
    }

    println!("Settings file: {}", path.display());
    println!("  provider:              {}", settings.provider);
    println!("  model:                 {}", settings.model);
    println!("  api key:               {}", settings.masked_api_key());
    println!(
        "  custom base url:       {}",
        settings.custom_base_url().unwrap_or("(disabled)")
    );
    println!("  tags format:           {}", settings.tags_format);
    println!("  autotag/ prefix:       {}", settings.use_autotag_prefix);
    println!("  frontmatter key:       {}", settings.frontmatter_key());
    println!("  dedupe against tags:   {}", settings.dedupe_against_existing);
    println!("  demo mode:             {}", settings.demo_mode);
    println!("  log file:              {}", settings.write_to_log_file);
    Ok(())
}

/// Prints notifications to the terminal.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("Error: {message}");
    }
}

/// Asks on stdin before a request is paid for and before tags are written.
struct ConsoleReviewer {
    style: CaseStyle,
    add_prefix: bool,
}

fn prompt(question: &str) -> Option<String> {
    print!("{question} ");
    let _ = io::stdout().flush();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return None;
    }
    Some(input.trim().to_string())
}

impl TagReviewer for ConsoleReviewer {
    fn review(&self, document: &Path, suggestions: Vec<Tag>) -> ReviewDecision {
        println!("\nSuggested tags for {}:", document.display());
        for tag in &suggestions {
            println!("  {}", tag.hashtag());
        }

        let Some(answer) = prompt("\nInsert these tags? [Y/n/e(dit)]") else {
            return ReviewDecision::Reject;
        };
        match answer.to_lowercase().as_str() {
            "" | "y" | "yes" => ReviewDecision::Accept(suggestions),
            "e" | "edit" => {
                let Some(edited) = prompt("Tags to insert (comma-separated):") else {
                    return ReviewDecision::Reject;
                };
                let raw: Vec<&str> = edited.split(',').collect();
                match TagNormalizer::normalize(&raw, self.style, self.add_prefix) {
                    Ok(tags) => ReviewDecision::Accept(tags),
                    Err(e) => {
                        eprintln!("Error: {e}");
                        ReviewDecision::Reject
                    }
                }
            }
            _ => ReviewDecision::Reject,
        }
    }

    fn confirm_cost(&self, model: &ModelDescriptor, estimate: &CostEstimate) -> bool {
        println!("{} ({}): {estimate}", model.name, model.id);
        prompt("Send request? [Y/n]")
            .is_some_and(|answer| matches!(answer.to_lowercase().as_str(), "" | "y" | "yes"))
    }
}
