use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use session_chords::catalog::{CatalogRecord, RecordDraft};
use session_chords::cli_prompt::PromptCredentialProvider;
use session_chords::cli_style::{
    get_prompt, get_styles, print_banner, print_chart_list, print_chord_section, print_error,
    print_goodbye, print_info, print_key_value, print_section_footer, print_section_header,
    print_success, print_warning,
};
use session_chords::config::{AppConfig, CliConfig, FileConfig};
use session_chords::sync::{
    CatalogError, CatalogEvent, CatalogSyncService, CredentialProvider, ErrorKind,
    StaticCredentialProvider, SyncOutcome,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rustyline::{
    completion::Completer, error::ReadlineError, highlight::Highlighter,
    history::DefaultHistory, validate::Validator, CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

fn parse_section(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, progression)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), progression.trim().to_string()))
        }
        _ => Err(format!("expected NAME=PROGRESSION, got '{}'", s)),
    }
}

#[derive(Parser, Debug)]
#[command(name = "session-chords", version, styles = get_styles())]
#[command(about = "Browse and edit a chord-chart catalog, online or from the local cache")]
struct CliArgs {
    /// Path to a TOML config file. Its values override flags and environment.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Application id of the hosted index.
    #[clap(long, env = "ALGOLIA_APP_ID")]
    pub app_id: Option<String>,

    /// Read-only API key.
    #[clap(long, env = "ALGOLIA_SEARCH_API_KEY", hide_env_values = true)]
    pub search_api_key: Option<String>,

    /// Index holding the catalog [default: irish_music_songs].
    #[clap(long, env = "ALGOLIA_INDEX_NAME")]
    pub index_name: Option<String>,

    /// Base URL of the index API, for self-hosted or test endpoints.
    #[clap(long)]
    pub base_url: Option<String>,

    /// Timeout in seconds for remote requests [default: 10].
    #[clap(long)]
    pub request_timeout_sec: Option<u64>,

    /// Path to the SQLite cache file [default: session-chords.db].
    #[clap(long, value_parser = parse_path)]
    pub cache_db: Option<PathBuf>,

    /// Admin API key used for writes instead of prompting.
    #[clap(long = "admin-key", env = "ALGOLIA_ADMIN_API_KEY", hide_env_values = true)]
    pub admin_api_key: Option<String>,

    /// Run a single command. Without one an interactive session starts.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser)]
#[command(styles = get_styles(), name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists the catalog.
    List {
        /// Include hidden charts.
        #[arg(long)]
        all: bool,
    },

    /// Searches visible charts by title, key, style or chords.
    Search { query: Vec<String> },

    /// Shows a chart, looked up by id or by title.
    Show { chart: String },

    /// Creates a chart, or updates the chart given with --edit.
    /// A changed title on an edited chart renames it.
    Save {
        title: String,

        #[arg(long)]
        key: Option<String>,

        #[arg(long)]
        time: Option<String>,

        #[arg(long = "type")]
        style_type: Option<String>,

        /// A section as NAME=PROGRESSION. Repeatable, order is kept.
        #[arg(long = "section", value_parser = parse_section, required = true)]
        sections: Vec<(String, String)>,

        #[arg(long)]
        hidden: bool,

        /// Id of the chart being edited.
        #[arg(long)]
        edit: Option<String>,
    },

    /// Gives a chart a new title. The chart moves to the id derived from it.
    Rename { id: String, title: String },

    /// Deletes a chart.
    Delete { id: String },

    /// Hides a chart from listings and search.
    Hide { id: String },

    /// Makes a hidden chart visible again.
    Unhide { id: String },

    /// Re-pulls the whole remote index into the local cache.
    Refresh,

    /// Writes the catalog, hidden charts included, as JSON.
    Export {
        /// Output file. Prints to stdout when omitted.
        path: Option<PathBuf>,
    },

    /// Imports a JSON export or a legacy title-keyed catalog.
    Import { path: PathBuf },

    /// Shows whether reads come from the remote index or the local cache.
    Status,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

fn describe_error(e: &CatalogError) -> String {
    match e.kind() {
        ErrorKind::Connectivity => format!("{} (try again later)", e),
        ErrorKind::Access => format!("{} (elevated access is required)", e),
        _ => e.to_string(),
    }
}

fn report_outcome<T>(outcome: &SyncOutcome<T>, message: &str) {
    print_success(&format!("{} [{}]", message, outcome.applied_to.as_str()));
    for warning in &outcome.warnings {
        print_warning(&warning.to_string());
    }
}

fn print_record(record: &CatalogRecord) {
    print_section_header(&record.title);
    print_key_value("Id", &record.id);
    print_key_value("Key", &record.key);
    print_key_value("Time", &record.time_signature);
    print_key_value("Type", &record.style_type);
    if record.hidden {
        print_key_value("Hidden", "yes");
    }
    println!();
    for (name, progression) in record.sections.iter() {
        print_chord_section(name, progression);
    }
    print_section_footer();
}

/// Look a chart up by id, then by title.
async fn resolve_chart(
    service: &CatalogSyncService,
    chart: &str,
) -> Result<CatalogRecord, CatalogError> {
    match service.get(chart).await {
        Err(CatalogError::NotFound(_)) => service.find_by_title(chart).await,
        other => other,
    }
}

async fn run_command(command: Command, service: &CatalogSyncService) -> Result<(), CommandError> {
    match command {
        Command::List { all } => print_chart_list(&service.list(all).await),
        Command::Search { query } => print_chart_list(&service.search(&query.join(" ")).await),
        Command::Show { chart } => print_record(&resolve_chart(service, &chart).await?),
        Command::Save {
            title,
            key,
            time,
            style_type,
            sections,
            hidden,
            edit,
        } => {
            let draft = RecordDraft {
                title,
                key,
                time_signature: time,
                style_type,
                sections: sections.into_iter().collect(),
                hidden,
            };
            let outcome = service.save(draft, edit.as_deref()).await?;
            report_outcome(&outcome, &format!("Saved '{}'", outcome.value.id));
        }
        Command::Rename { id, title } => {
            let record = resolve_chart(service, &id).await?;
            let mut draft = RecordDraft::from(&record);
            draft.title = title;
            let outcome = service.rename(&record.id, draft).await?;
            report_outcome(
                &outcome,
                &format!("Renamed '{}' to '{}'", record.id, outcome.value.id),
            );
        }
        Command::Delete { id } => {
            let outcome = service.delete(&id).await?;
            report_outcome(&outcome, &format!("Deleted '{}'", id));
        }
        Command::Hide { id } => {
            let outcome = service.set_hidden(&id, true).await?;
            report_outcome(&outcome, &format!("Hid '{}'", id));
        }
        Command::Unhide { id } => {
            let outcome = service.set_hidden(&id, false).await?;
            report_outcome(&outcome, &format!("'{}' is visible again", id));
        }
        Command::Refresh => {
            let outcome = service.refresh().await?;
            report_outcome(
                &outcome,
                &format!("Refreshed {} charts", outcome.value.len()),
            );
        }
        Command::Export { path } => {
            let text = service.export_catalog().await?;
            match path {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    print_success(&format!("Exported catalog to {:?}", path));
                }
                None => println!("{}", text),
            }
        }
        Command::Import { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let outcome = service.import_catalog(&text).await?;
            report_outcome(
                &outcome,
                &format!("Imported {} charts", outcome.value.len()),
            );
        }
        Command::Status => {
            let status = service.connection_status();
            print_key_value(
                "Reads from",
                if status.connected {
                    "remote index"
                } else {
                    "local cache"
                },
            );
            print_key_value("Cached charts", &status.cache_size.to_string());
        }
        Command::Exit => return Err(CommandError::Exit),
    }
    Ok(())
}

async fn execute_command(command: Command, service: &CatalogSyncService) -> CommandExecutionResult {
    match run_command(command, service).await {
        Ok(()) => CommandExecutionResult::Ok,
        Err(CommandError::Exit) => CommandExecutionResult::Exit,
        Err(CommandError::Catalog(e)) => CommandExecutionResult::Error(describe_error(&e)),
        Err(CommandError::Other(e)) => CommandExecutionResult::Error(format!("{:#}", e)),
    }
}

enum CommandError {
    Exit,
    Catalog(CatalogError),
    Other(anyhow::Error),
}

impl From<CatalogError> for CommandError {
    fn from(e: CatalogError) -> Self {
        CommandError::Catalog(e)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        CommandError::Other(e)
    }
}

#[derive(rustyline_derive::Hinter)]
struct CommandHelper {
    commands_names: Vec<String>,
}

impl CommandHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        CommandHelper { commands_names }
    }
}

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for CommandHelper {}
impl Validator for CommandHelper {}
impl Helper for CommandHelper {}

/// Keep a running chart count for the prompt.
fn track_catalog_size(service: &CatalogSyncService, initial: usize) -> Arc<AtomicUsize> {
    let size = Arc::new(AtomicUsize::new(initial));
    let mut events = service.subscribe();
    let tracked = size.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CatalogEvent::CatalogChanged { records, reason }) => {
                    debug!(?reason, count = records.len(), "Catalog changed");
                    tracked.store(records.len(), Ordering::SeqCst);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed catalog change events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    size
}

async fn run_interactive(service: Arc<CatalogSyncService>, config: &AppConfig) -> Result<()> {
    print_banner();
    print_key_value("Index", &config.index_name);
    print_key_value("Cache", &config.cache_db_path.display().to_string());
    if !service.is_remote_available() {
        print_warning("Remote index unavailable, reading from the local cache");
    }
    print_info("Type 'help' for available commands");

    let catalog_size = track_catalog_size(&service, service.list(true).await.len());

    let rl_config = Config::builder()
        .completion_type(CompletionType::List)
        .build();
    let mut rl = Editor::<CommandHelper, DefaultHistory>::with_config(rl_config)?;
    rl.set_helper(Some(CommandHelper::new()));

    loop {
        let prompt = get_prompt(
            service.is_remote_available(),
            catalog_size.load(Ordering::SeqCst),
        );
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let args = shlex::split(line)
                    .unwrap_or_else(|| line.split_whitespace().map(String::from).collect());
                let cli = InnerCli::try_parse_from(
                    std::iter::once(" ").chain(args.iter().map(String::as_str)),
                );
                let cli = match cli {
                    Ok(cli) => cli,
                    Err(e) => {
                        if e.print().is_err() {
                            println!("{}", e);
                        }
                        continue;
                    }
                };

                match execute_command(cli.command, &service).await {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => print_error(&err),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                print_error(&format!("{}", e));
                break;
            }
        }
    }
    print_goodbye();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        app_id: cli_args.app_id.clone(),
        search_api_key: cli_args.search_api_key.clone(),
        index_name: cli_args.index_name.clone(),
        base_url: cli_args.base_url.clone(),
        request_timeout_sec: cli_args.request_timeout_sec,
        cache_db_path: cli_args.cache_db.clone(),
    }
    .with_env_fallbacks();
    let config = AppConfig::resolve(&cli_config, file_config)?;
    if !config.remote_configured() {
        warn!("Remote index is not configured, working from the local cache only");
    }

    let credentials: Arc<dyn CredentialProvider> = match cli_args.admin_api_key.take() {
        Some(key) if !key.trim().is_empty() => {
            info!("Using the configured admin API key for writes");
            Arc::new(StaticCredentialProvider::granting(key))
        }
        _ => Arc::new(PromptCredentialProvider),
    };

    let service = Arc::new(config.build_service(credentials)?);
    service.initialize().await;

    match cli_args.command {
        Some(command) => match execute_command(command, &service).await {
            CommandExecutionResult::Error(err) => {
                print_error(&err);
                std::process::exit(1);
            }
            CommandExecutionResult::Ok | CommandExecutionResult::Exit => Ok(()),
        },
        None => run_interactive(service, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_section() {
        assert_eq!(
            parse_section("A Part=G | C | D"),
            Ok(("A Part".to_string(), "G | C | D".to_string()))
        );
        assert!(parse_section("G | C").is_err());
        assert!(parse_section("=G").is_err());
    }

    #[test]
    fn test_inner_cli_parses_quoted_titles() {
        let args = shlex::split(r#"save "The Kesh Jig" --key G --section "A Part=G | D""#).unwrap();
        let cli =
            InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)))
                .unwrap();
        match cli.command {
            Command::Save {
                title, sections, ..
            } => {
                assert_eq!(title, "The Kesh Jig");
                assert_eq!(sections, vec![("A Part".to_string(), "G | D".to_string())]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_args_are_consistent() {
        CliArgs::command().debug_assert();
    }
}
