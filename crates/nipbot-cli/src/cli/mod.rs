//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nipbot_core::{config, interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "nipbot")]
#[command(version)]
#[command(about = "예방접종 오피셜 봇: 질병관리청 공식 데이터 기반 예방접종 상담")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the model from config
    #[arg(long, global = true, env = "NIPBOT_MODEL")]
    model: Option<String>,

    /// Disable Google Search grounding
    #[arg(long = "no-search", global = true)]
    no_search: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Ask a single question and stream the answer to stdout
    Ask {
        /// The question to send
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Save the answer's tables as NIP-Table-*.png images
        #[arg(long)]
        export_tables: bool,

        /// Write the transcript as an HTML page
        #[arg(long, value_name = "PATH")]
        html: Option<PathBuf>,
    },
    /// Render markdown (file or stdin) to HTML on stdout
    Render {
        /// Markdown file (reads stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Export the tables of a markdown answer as PNG images
    Export {
        /// Markdown file (reads stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Output directory (overrides export.output_dir)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

/// Settings shared by the commands that talk to the model.
struct Session {
    config: config::Config,
    _log_guard: Option<logging::WorkerGuard>,
}

fn load_session(model: Option<&str>, no_search: bool, verbose: u8) -> Result<Session> {
    let mut config = config::Config::load().context("load config")?;
    if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
        config.model = model.to_string();
    }
    if no_search {
        config.web_search = false;
    }

    let log_guard = match logging::init(&config.logging, verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };
    tracing::debug!(model = %config.model, web_search = config.web_search, "config loaded");

    Ok(Session {
        config,
        _log_guard: log_guard,
    })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        model,
        no_search,
        verbose,
    } = cli;
    let model = model.as_deref();

    // default to chat mode
    let Some(command) = command else {
        let session = load_session(model, no_search, verbose)?;
        return commands::chat::run(&session.config).await;
    };

    match command {
        Commands::Chat => {
            let session = load_session(model, no_search, verbose)?;
            commands::chat::run(&session.config).await
        }
        Commands::Ask {
            prompt,
            export_tables,
            html,
        } => {
            let session = load_session(model, no_search, verbose)?;
            commands::ask::run(commands::ask::AskOptions {
                prompt: &prompt,
                config: &session.config,
                export_tables,
                html: html.as_deref(),
            })
            .await
        }
        Commands::Render { file } => commands::render::run(file.as_deref()),
        Commands::Export { file, out_dir } => {
            let session = load_session(model, no_search, verbose)?;
            commands::export::run(file.as_deref(), out_dir.as_deref(), &session.config).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
