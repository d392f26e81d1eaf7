// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::Write;
use std::path::{Path, PathBuf};

use doctrans::app_config::{Config, LogLevel};
use doctrans::app_controller::Controller;
use doctrans::errors::AppError;
use doctrans::formats::OutputMode;
use doctrans::task::ProviderKind;

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    OpenAI,
    Baidu,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::OpenAI => ProviderKind::OpenAI,
            CliProvider::Baidu => ProviderKind::Baidu,
        }
    }
}

/// CLI Wrapper for OutputMode to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputMode {
    /// Replace the original text
    Only,
    /// Keep the original and add the translation after it
    Both,
    /// Bilingual, inheriting the original formatting
    Inherit,
}

impl From<CliOutputMode> for OutputMode {
    fn from(mode: CliOutputMode) -> Self {
        match mode {
            CliOutputMode::Only => OutputMode::Only,
            CliOutputMode::Both => OutputMode::Bilingual,
            CliOutputMode::Inherit => OutputMode::InheritBilingual,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// Options shared by every command that touches the configuration
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Model tried when the primary one keeps failing
    #[arg(long)]
    backup_model: Option<String>,

    /// API key of the chat provider
    #[arg(long, env = "DOCTRANS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Target language (e.g. 'English', '日本語')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Number of concurrent requests (1-10)
    #[arg(long)]
    threads: Option<i64>,

    /// How translations are written back
    #[arg(short, long, value_enum)]
    output_mode: Option<CliOutputMode>,

    /// Task database path
    #[arg(long)]
    database: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input document or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Directory for translated documents (defaults to next to the input)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Store a translation task without running it
    Create {
        /// Document to translate
        input: PathBuf,
        /// Output file (defaults to `<stem>.<language>.<ext>` next to the input)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Glossary CSV file (`source,target` per line)
        #[arg(long)]
        glossary: Option<PathBuf>,
    },
    /// Run a stored task
    Run {
        /// Task id
        id: i64,
    },
    /// Show a stored task
    Show {
        /// Task id
        id: i64,
    },
    /// List recent tasks
    List {
        /// Maximum number of tasks shown
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a document or every document in a directory
    Translate(TranslateArgs),

    /// Manage stored translation tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Check that the configured provider answers
    Check {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for doctrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// doctrans - office document translation with AI and machine translation providers
#[derive(Parser, Debug)]
#[command(name = "doctrans")]
#[command(version)]
#[command(about = "Translate Word, Excel, PowerPoint, CSV, Markdown and text documents")]
#[command(long_about = "doctrans extracts the text of office documents, translates it with an
OpenAI-compatible chat model or the Baidu translation API, and writes a document
with the same structure back.

EXAMPLES:
    doctrans translate report.docx                    # Translate using default config
    doctrans translate -t English -o both deck.pptx   # Bilingual output in English
    doctrans translate -p baidu -t en sheet.xlsx      # Use Baidu machine translation
    doctrans translate -f /docs/                      # Process a directory, overwriting outputs
    doctrans task create report.docx --glossary terms.csv
    doctrans task run 3
    doctrans check                                    # Test the provider connection
    doctrans completions bash > doctrans.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and marker for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌"),
            Level::Warn => ("\x1B[1;33m", "🚧"),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍"),
            Level::Trace => ("\x1B[1;35m", "📋"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, marker) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                color,
                now,
                marker,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Level is adjusted once the config is loaded
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();
    if let Err(e) = run(cli).await {
        let error = AppError::from(e);
        error!("{}", error);
        std::process::exit(error.exit_code());
    }
}

async fn run(cli: CommandLineOptions) -> Result<()> {

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "doctrans", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Task { command, common } => run_task_command(command, common).await,
        Commands::Check { common } => {
            let config = load_config(&common)?;
            config.validate().context("Configuration validation failed")?;
            let controller = Controller::with_config(config)?;
            controller.check_connection().await
        }
    }
}

/// Load the configuration file and apply command line overrides
fn load_config(options: &CommonArgs) -> Result<Config> {
    if let Some(level) = options.log_level {
        log::set_max_level(LogLevel::from(level).to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config_path)?;

    if let Some(provider) = options.provider {
        config.translation.provider = provider.into();
    }
    {
        let provider_config = config.translation.active_provider_config_mut();
        if let Some(model) = &options.model {
            provider_config.model = model.clone();
        }
        if let Some(backup_model) = &options.backup_model {
            provider_config.backup_model = Some(backup_model.clone());
        }
        if let Some(api_key) = &options.api_key {
            provider_config.api_key = api_key.clone();
        }
    }
    if let Some(target_language) = &options.target_language {
        config.target_language = target_language.clone();
    }
    if let Some(threads) = options.threads {
        config.translation.common.threads = threads;
    }
    if let Some(mode) = options.output_mode {
        config.output_mode = mode.into();
    }
    if let Some(database) = &options.database {
        config.database_path = Some(database.clone());
    }
    if let Some(level) = options.log_level {
        config.log_level = level.into();
    }

    if options.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }
    Ok(config)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let config = load_config(&options.common)?;
    config.validate().context("Configuration validation failed")?;
    let controller = Controller::with_config(config)?;

    if options.input_path.is_file() {
        let output_dir = match &options.output_dir {
            Some(dir) => dir.clone(),
            None => options
                .input_path
                .parent()
                .unwrap_or(Path::new("."))
                .to_path_buf(),
        };
        controller
            .run(options.input_path.clone(), output_dir, options.force_overwrite)
            .await?;
    } else if options.input_path.is_dir() {
        let summary = controller
            .run_folder(
                options.input_path.clone(),
                options.output_dir.clone(),
                options.force_overwrite,
            )
            .await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} document(s) failed to translate", summary.failed));
        }
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    Ok(())
}

async fn run_task_command(command: TaskCommand, common: CommonArgs) -> Result<()> {
    let config = load_config(&common)?;
    let controller = Controller::with_config(config.clone())?;

    match command {
        TaskCommand::Create { input, output, glossary } => {
            config.validate().context("Configuration validation failed")?;
            let output = output.unwrap_or_else(|| {
                let dir = input.parent().unwrap_or(Path::new("."));
                doctrans::file_utils::FileManager::generate_output_path(&input, dir, &config.target_language)
            });
            let glossary = match glossary {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read glossary: {:?}", path))?,
                ),
                None => None,
            };
            let id = controller.create_task(&input, &output, glossary).await?;
            println!("{}", id);
        }
        TaskCommand::Run { id } => {
            controller.run_task(id).await?;
        }
        TaskCommand::Show { id } => {
            let mut record = controller.show_task(id).await?;
            for secret in [&mut record.config.api_key, &mut record.config.app_key] {
                if !secret.is_empty() {
                    *secret = "********".to_string();
                }
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        TaskCommand::List { limit } => {
            let records = controller.store().list_tasks(limit).await?;
            if records.is_empty() {
                info!("No tasks stored in {:?}", controller.store().path());
            }
            for record in records {
                println!(
                    "{:>5}  {:<8} {:>6.1}%  {}",
                    record.config.id,
                    record.status.to_string(),
                    record.process,
                    record.config.origin_filepath.display()
                );
            }
        }
    }
    Ok(())
}
