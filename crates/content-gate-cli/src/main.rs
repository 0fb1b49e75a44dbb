// content-gate-cli/src/main.rs
// ============================================================================
// Module: Content Gate CLI Entry Point
// Description: Command dispatcher for serving, purchases, content, and the publish queue.
// Purpose: Operate a content gate deployment from the shell or cron.
// Dependencies: clap, content-gate-config, content-gate-core, content-gate-server, tokio
// ============================================================================

//! ## Overview
//! `content-gate serve` runs the HTTP server. The remaining commands act on
//! the configured store directly, so `queue process` can be scheduled from
//! cron instead of `POST /publish/queue/process`. Commands other than
//! `serve` and `config` require a sqlite store; an in-memory store would
//! discard their effect on exit.
//!
//! Operational logs go to stderr through `tracing-subscriber` (`RUST_LOG`
//! overrides the default filter). Command results are JSON on stdout.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use content_gate_config::ContentGateConfig;
use content_gate_config::MAX_BATCH_LIMIT;
use content_gate_config::MAX_DOWNLOAD_LIMIT;
use content_gate_config::StoreType;
use content_gate_config::config_toml_example;
use content_gate_core::ContentId;
use content_gate_core::ContentState;
use content_gate_core::ContentType;
use content_gate_core::PublishableContent;
use content_gate_core::PurchaseId;
use content_gate_core::PurchaseLedger;
use content_gate_core::PurchaseRequest;
use content_gate_core::ResourceId;
use content_gate_core::SystemClock;
use content_gate_core::TaskFilter;
use content_gate_core::TaskStatus;
use content_gate_server::ContentGateServer;
use content_gate_server::Services;
use content_gate_server::Stores;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn,content_gate=info";

/// Default number of tasks listed by `queue list`.
const DEFAULT_LIST_LIMIT: usize = 50;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "content-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to `CONTENT_GATE_CONFIG`, then content-gate.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Purchase lifecycle administration.
    Purchase {
        /// Selected purchase subcommand.
        #[command(subcommand)]
        command: PurchaseCommand,
    },
    /// Publishable content administration.
    Content {
        /// Selected content subcommand.
        #[command(subcommand)]
        command: ContentCommand,
    },
    /// Publish queue administration.
    Queue {
        /// Selected queue subcommand.
        #[command(subcommand)]
        command: QueueCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the config file and exit.
    Validate,
    /// Print a complete example config.
    Example,
}

/// Purchase subcommands.
#[derive(Subcommand, Debug)]
enum PurchaseCommand {
    /// Record a pending purchase.
    Create(PurchaseCreateArgs),
    /// Confirm payment and mint the download token.
    Confirm(PurchaseIdArgs),
    /// Move a purchase to a terminal status.
    Status(PurchaseStatusArgs),
    /// Print a purchase record.
    Show(PurchaseIdArgs),
}

/// Arguments for `purchase create`.
#[derive(Args, Debug)]
struct PurchaseCreateArgs {
    /// Unique purchase identifier.
    #[arg(long)]
    purchase_id: String,
    /// Declared resource purchased.
    #[arg(long)]
    resource_id: String,
    /// Purchaser email.
    #[arg(long)]
    email: String,
    /// Purchaser display name.
    #[arg(long)]
    name: String,
    /// Download limit (defaults to `entitlements.default_max_downloads`).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DOWNLOAD_LIMIT)))]
    max_downloads: Option<u32>,
}

/// Arguments naming one purchase.
#[derive(Args, Debug)]
struct PurchaseIdArgs {
    /// Purchase identifier.
    purchase_id: String,
}

/// Arguments for `purchase status`.
#[derive(Args, Debug)]
struct PurchaseStatusArgs {
    /// Purchase identifier.
    purchase_id: String,
    /// Target status.
    #[arg(value_enum)]
    status: TerminalStatusArg,
}

/// Terminal payment statuses reachable from the CLI.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum TerminalStatusArg {
    /// Abandon a pending purchase.
    Cancelled,
    /// Revoke a paid purchase.
    Refunded,
}

/// Content subcommands.
#[derive(Subcommand, Debug)]
enum ContentCommand {
    /// Insert or replace a content item.
    Upsert(ContentUpsertArgs),
}

/// Arguments for `content upsert`.
#[derive(Args, Debug)]
struct ContentUpsertArgs {
    /// Content kind.
    #[arg(long = "type", value_enum)]
    content_type: ContentTypeArg,
    /// Content identifier.
    #[arg(long)]
    id: String,
    /// Headline.
    #[arg(long)]
    title: String,
    /// Public URL.
    #[arg(long)]
    url: String,
    /// Teaser text.
    #[arg(long)]
    summary: Option<String>,
    /// Image or thumbnail URL.
    #[arg(long)]
    media_url: Option<String>,
    /// Editorial state.
    #[arg(long, value_enum, default_value = "published")]
    state: ContentStateArg,
}

/// Queue subcommands.
#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// Enqueue a publish task.
    Enqueue(QueueEnqueueArgs),
    /// List tasks, newest first.
    List(QueueListArgs),
    /// Process one batch of due tasks.
    Process(QueueProcessArgs),
}

/// Arguments for `queue enqueue`.
#[derive(Args, Debug)]
struct QueueEnqueueArgs {
    /// Content kind.
    #[arg(long = "type", value_enum)]
    content_type: ContentTypeArg,
    /// Content identifier.
    #[arg(long)]
    id: String,
}

/// Arguments for `queue list`.
#[derive(Args, Debug)]
struct QueueListArgs {
    /// Only tasks in this status.
    #[arg(long, value_enum)]
    status: Option<TaskStatusArg>,
    /// Maximum tasks listed.
    #[arg(long, default_value_t = DEFAULT_LIST_LIMIT, value_parser = batch_limit)]
    limit: usize,
}

/// Arguments for `queue process`.
#[derive(Args, Debug)]
struct QueueProcessArgs {
    /// Batch size (defaults to `publish.batch_limit`).
    #[arg(long, value_parser = batch_limit)]
    limit: Option<usize>,
}

/// Content kinds accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum ContentTypeArg {
    /// Blog article.
    Article,
    /// Video post.
    Video,
    /// Resource announcement.
    Resource,
}

impl From<ContentTypeArg> for ContentType {
    fn from(value: ContentTypeArg) -> Self {
        match value {
            ContentTypeArg::Article => Self::Article,
            ContentTypeArg::Video => Self::Video,
            ContentTypeArg::Resource => Self::Resource,
        }
    }
}

/// Editorial states accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum ContentStateArg {
    /// Not yet visible.
    Draft,
    /// Live.
    Published,
    /// Withdrawn.
    Archived,
}

impl From<ContentStateArg> for ContentState {
    fn from(value: ContentStateArg) -> Self {
        match value {
            ContentStateArg::Draft => Self::Draft,
            ContentStateArg::Published => Self::Published,
            ContentStateArg::Archived => Self::Archived,
        }
    }
}

/// Task statuses accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum TaskStatusArg {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Delivered.
    Completed,
    /// Out of retries.
    Failed,
}

impl From<TaskStatusArg> for TaskStatus {
    fn from(value: TaskStatusArg) -> Self {
        match value {
            TaskStatusArg::Pending => Self::Pending,
            TaskStatusArg::Processing => Self::Processing,
            TaskStatusArg::Completed => Self::Completed,
            TaskStatusArg::Failed => Self::Failed,
        }
    }
}

/// Parses a batch or listing limit.
fn batch_limit(value: &str) -> Result<usize, String> {
    let limit: usize = value.parse().map_err(|_| format!("not a number: {value}"))?;
    if (1..=MAX_BATCH_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(format!("limit must be between 1 and {MAX_BATCH_LIMIT}"))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments and dispatches the selected command.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_logging()?;
    match cli.command {
        Commands::Serve => command_serve(&load_config(cli.config)?).await,
        Commands::Config {
            command,
        } => command_config(&command, cli.config),
        Commands::Purchase {
            command,
        } => command_purchase(command, &load_store_config(cli.config)?),
        Commands::Content {
            command,
        } => command_content(command, &load_store_config(cli.config)?),
        Commands::Queue {
            command,
        } => command_queue(command, &load_store_config(cli.config)?).await,
    }
}

/// Installs the stderr log subscriber.
fn init_logging() -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER));
    let filter = filter.map_err(|err| CliError::new(format!("invalid log filter: {err}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| CliError::new(format!("log subscriber init failed: {err}")))
}

/// Loads and validates configuration.
fn load_config(path: Option<PathBuf>) -> CliResult<ContentGateConfig> {
    ContentGateConfig::load(path.as_deref()).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Loads configuration for commands that must persist their effect.
fn load_store_config(path: Option<PathBuf>) -> CliResult<ContentGateConfig> {
    let config = load_config(path)?;
    require_persistent_store(&config)?;
    Ok(config)
}

/// Rejects in-memory stores for offline commands.
fn require_persistent_store(config: &ContentGateConfig) -> CliResult<()> {
    if config.store.store_type == StoreType::Memory {
        return Err(CliError::new("this command requires [store] type = \"sqlite\""));
    }
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(config: &ContentGateConfig) -> CliResult<ExitCode> {
    let server = ContentGateServer::from_config(config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes config subcommands.
fn command_config(command: &ConfigCommand, path: Option<PathBuf>) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            load_config(path)?;
            write_stdout_line("Config valid")?;
        }
        ConfigCommand::Example => write_stdout_line(config_toml_example().trim_end())?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Purchase Commands
// ============================================================================

/// Executes purchase subcommands.
fn command_purchase(command: PurchaseCommand, config: &ContentGateConfig) -> CliResult<ExitCode> {
    let stores = Stores::from_config(&config.store).map_err(|err| CliError::new(err.to_string()))?;
    let policy = config.entitlements.policy().map_err(|err| CliError::new(err.to_string()))?;
    let ledger = PurchaseLedger::new(stores.entitlements, Arc::new(SystemClock), policy);
    let record = match command {
        PurchaseCommand::Create(args) => {
            if !config.delivery.resources.iter().any(|resource| resource.id == args.resource_id) {
                return Err(CliError::new(format!(
                    "resource is not declared in [[delivery.resources]]: {}",
                    args.resource_id
                )));
            }
            ledger.create_purchase(PurchaseRequest {
                purchase_id: PurchaseId::new(args.purchase_id),
                resource_id: ResourceId::new(args.resource_id),
                purchaser_email: args.email,
                purchaser_name: args.name,
                max_downloads: args.max_downloads,
            })
        }
        PurchaseCommand::Confirm(args) => ledger.confirm_payment(&PurchaseId::new(args.purchase_id)),
        PurchaseCommand::Status(args) => {
            let purchase_id = PurchaseId::new(args.purchase_id);
            match args.status {
                TerminalStatusArg::Cancelled => ledger.cancel(&purchase_id),
                TerminalStatusArg::Refunded => ledger.refund(&purchase_id),
            }
        }
        PurchaseCommand::Show(args) => {
            let purchase_id = PurchaseId::new(args.purchase_id);
            let found = ledger.find(&purchase_id).map_err(|err| CliError::new(err.to_string()))?;
            let record = found.ok_or_else(|| CliError::new(format!("purchase not found: {purchase_id}")))?;
            Ok(record)
        }
    }
    .map_err(|err| CliError::new(err.to_string()))?;
    write_json(&record)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Content Commands
// ============================================================================

/// Executes content subcommands.
fn command_content(command: ContentCommand, config: &ContentGateConfig) -> CliResult<ExitCode> {
    let ContentCommand::Upsert(args) = command;
    let content = publishable_content(args)?;
    let stores = Stores::from_config(&config.store).map_err(|err| CliError::new(err.to_string()))?;
    stores.catalog.upsert(&content).map_err(|err| CliError::new(err.to_string()))?;
    write_json(&content)?;
    Ok(ExitCode::SUCCESS)
}

/// Validates upsert arguments into a content item.
fn publishable_content(args: ContentUpsertArgs) -> CliResult<PublishableContent> {
    if args.id.trim().is_empty() {
        return Err(CliError::new("--id must be non-empty"));
    }
    if args.title.trim().is_empty() {
        return Err(CliError::new("--title must be non-empty"));
    }
    if !(args.url.starts_with("https://") || args.url.starts_with("http://")) {
        return Err(CliError::new("--url must be an http(s) URL"));
    }
    Ok(PublishableContent {
        content_type: args.content_type.into(),
        content_id: ContentId::new(args.id),
        title: args.title,
        summary: args.summary,
        url: args.url,
        media_url: args.media_url,
        state: args.state.into(),
    })
}

// ============================================================================
// SECTION: Queue Commands
// ============================================================================

/// Executes queue subcommands.
async fn command_queue(command: QueueCommand, config: &ContentGateConfig) -> CliResult<ExitCode> {
    let services = Services::from_config(config).map_err(|err| CliError::new(err.to_string()))?;
    match command {
        QueueCommand::Enqueue(args) => {
            let task = services
                .queue
                .enqueue(args.content_type.into(), ContentId::new(args.id))
                .map_err(|err| CliError::new(err.to_string()))?;
            write_json(&task)?;
        }
        QueueCommand::List(args) => {
            let tasks = services
                .queue
                .list(&TaskFilter {
                    status: args.status.map(TaskStatus::from),
                    limit: args.limit,
                })
                .map_err(|err| CliError::new(err.to_string()))?;
            write_json(&tasks)?;
        }
        QueueCommand::Process(args) => {
            let limit = args.limit.unwrap_or(services.batch_limit);
            let summary =
                services.queue.process_batch(limit).await.map_err(|err| CliError::new(err.to_string()))?;
            write_json(&summary)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::new(format!("json rendering failed: {err}")))?;
    write_stdout_line(&rendered)
}

/// Writes an error to stderr and returns a failing exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "error: {message}");
    ExitCode::FAILURE
}
