//! Command-line host for drafts core.
//!
//! # Responsibility
//! - Act as a minimal editing surface and navigation context over core.
//! - Map core outcomes to stable exit codes.
//!
//! Exit codes: `0` success, `1` store/config failure, `2` unknown document.

use clap::{Parser, Subcommand};
use drafts_core::db::open_db;
use drafts_core::{
    core_version, export_filename, init_logging, AutosaveSession, CoreConfig, DocumentLifecycle,
    DocumentRecord, LogLevel, Resolution, SqliteRecordStore,
};
use log::info;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "drafts", version, about = "Local rich-text drafts")]
struct Cli {
    /// SQLite database file (overrides DRAFTS_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log level (overrides DRAFTS_LOG_LEVEL).
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Absolute directory for rolling log files (overrides DRAFTS_LOG_DIR).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new document and print its id.
    New,
    /// List documents, most recently updated first.
    List,
    /// Print one document's title and content.
    Show { id: String },
    /// Rename a document.
    Title { id: String, title: String },
    /// Replace a document's content (reads stdin when omitted).
    Write { id: String, content: Option<String> },
    /// Print the PDF file name an export would use.
    ExportName { id: String },
    /// Print the core version.
    Version,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::List => "list",
            Self::Show { .. } => "show",
            Self::Title { .. } => "title",
            Self::Write { .. } => "write",
            Self::ExportName { .. } => "export-name",
            Self::Version => "version",
        }
    }
}

enum Failure {
    NotFound(String),
    Other(String),
}

impl From<String> for Failure {
    fn from(value: String) -> Self {
        Self::Other(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = CoreConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(log_dir) = cli.log_dir {
        config.log_dir = Some(log_dir);
    }
    for warning in &config.warnings {
        eprintln!("warning: {warning}");
    }

    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(config.log_level.as_str(), &log_dir.to_string_lossy()) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    match run(&config, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::NotFound(id)) => {
            eprintln!("document `{id}` not found; returning to the document list");
            ExitCode::from(2)
        }
        Err(Failure::Other(message)) => {
            eprintln!("error: {message}");
            ExitCode::from(1)
        }
    }
}

fn run(config: &CoreConfig, command: Command) -> Result<(), Failure> {
    if let Command::Version = command {
        println!("drafts_core version={}", core_version());
        return Ok(());
    }

    let conn = open_db(&config.db_path)
        .map_err(|err| format!("failed to open `{}`: {err}", config.db_path.display()))?;
    let store = SqliteRecordStore::try_new(&conn, config.slot_key.as_str())
        .map_err(|err| format!("store init failed: {err}"))?;
    let lifecycle = DocumentLifecycle::new(&store);
    info!(
        "event=cli_command module=cli status=start command={}",
        command.name()
    );

    match command {
        Command::New => {
            let record = lifecycle
                .create_document()
                .map_err(|err| format!("failed to create document: {err}"))?;
            println!("{}", record.id);
        }
        Command::List => {
            let documents = lifecycle
                .list_documents()
                .map_err(|err| format!("failed to list documents: {err}"))?;
            if documents.is_empty() {
                println!("No documents yet. Run `drafts new` to create one.");
            }
            for doc in documents {
                println!(
                    "{}\t{}\t{}\t{}",
                    doc.id,
                    doc.updated_at.format("%Y-%m-%d"),
                    doc.title,
                    doc.preview_text.as_deref().unwrap_or("No content")
                );
            }
        }
        Command::Show { id } => {
            let record = resolve_existing(&lifecycle, &id)?;
            println!("# {}", record.title);
            println!("{}", record.content);
        }
        Command::Title { id, title } => {
            let record = resolve_existing(&lifecycle, &id)?;
            let mut session = AutosaveSession::open(&store, &record);
            session
                .title_changed(title)
                .map_err(|err| format!("failed to save title: {err}"))?;
        }
        Command::Write { id, content } => {
            let record = resolve_existing(&lifecycle, &id)?;
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let mut session = AutosaveSession::open(&store, &record);
            session
                .content_changed(content)
                .map_err(|err| format!("failed to save content: {err}"))?;
        }
        Command::ExportName { id } => {
            let record = resolve_existing(&lifecycle, &id)?;
            println!("{}", export_filename(&record.title));
        }
        Command::Version => {}
    }
    Ok(())
}

fn resolve_existing(
    lifecycle: &DocumentLifecycle<&SqliteRecordStore<'_>>,
    id: &str,
) -> Result<DocumentRecord, Failure> {
    // Blank ids mean "new document" to core; here they only ever name nothing.
    if id.trim().is_empty() {
        return Err(Failure::NotFound(id.to_string()));
    }
    match lifecycle
        .resolve(Some(id))
        .map_err(|err| format!("failed to load document: {err}"))?
    {
        Resolution::Ready(resolved) => Ok(resolved.record),
        Resolution::NavigateAway { requested_id } => Err(Failure::NotFound(requested_id)),
    }
}

fn read_stdin() -> Result<String, Failure> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(|err| format!("failed to read content from stdin: {err}"))?;
    Ok(content)
}
