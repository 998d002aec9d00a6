//! Main entry point for the application.
//!
//! Loads environment variables and the engine configuration, wires the SQLite
//! stores, the workflow catalog, the action registry and the function-calling
//! agent into a task manager, then runs an interactive chat loop where every
//! line is one orchestrated turn.

mod cli;

use clap::Parser;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use stepwise::actions::ActionRegistry;
use stepwise::agents::FunctionCallingAgent;
use stepwise::config::{load_engine_config, EngineConfig};
use stepwise::core::WorkflowCatalog;
use stepwise::db::{Database, SqliteHistory, SqliteTaskStore};
use stepwise::event::Event;
use stepwise::llm::LlmClient;
use stepwise::utils;
use stepwise::{
    EngineContext, EngineSettings, Error, Result, TaskManager, TurnOptions, TurnRequest,
    TurnResponse,
};
use tracing::{error, info, warn};

const QUIT_COMMAND: &str = "/quit";

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    let log_guard = utils::init_logging(&cli.logging_level, cli.log_file);

    if let Err(e) = dotenvy::dotenv() {
        warn!("Failed to load .env file: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("{} {}", "error:".red().bold(), e);
        drop(log_guard);
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> Result<()> {
    let config = load_engine_config(&cli.config)?;
    let manager = build_manager(&config)?;
    let ext_id = cli
        .thread
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("{}", format!("\n🤖 {}", config.name).bold().cyan());
    if let Some(description) = &config.description {
        println!("{}", description.yellow());
    }
    println!(
        "{}",
        format!("Thread {} - type {} to leave", ext_id, QUIT_COMMAND).dimmed()
    );

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();

    loop {
        let input: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("You")
            .interact_text()
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;
        if input.trim() == QUIT_COMMAND {
            break;
        }

        let request = TurnRequest {
            instructions: config.instructions.clone().unwrap_or_default(),
            input: Some(input),
            user: json!({ "name": std::env::var("USER").unwrap_or_default() }),
            ext_id: ext_id.clone(),
            options: TurnOptions {
                job: cli.job.clone(),
                ..Default::default()
            },
            stream: Some(events_tx.clone()),
            ..Default::default()
        };

        let spinner = new_spinner();
        spinner.set_message("Thinking...");
        let outcome = manager.handle_turn(request).await;
        spinner.finish_and_clear();

        while let Ok(event) = events_rx.try_recv() {
            print_event(&event);
        }
        match outcome {
            Ok(turn) => print_turn(&turn),
            Err(e) => {
                error!("Turn failed: {}", e);
                println!("{} {}", "⚠️".red(), e.to_string().red());
            }
        }
    }

    info!("Leaving thread {}", ext_id);
    Ok(())
}

fn build_manager(config: &EngineConfig) -> Result<TaskManager> {
    let catalog = WorkflowCatalog::from_config(config)?;
    let registry = ActionRegistry::from_config(config)?;
    info!("Loaded {} workflows", catalog.len());

    let db = Database::new(&database_path(config)?)?;

    let parameters = &config.parameters;
    let provider = parameters
        .llm_provider
        .as_deref()
        .ok_or_else(|| Error::Config("parameters.llm_provider is required".to_string()))?;
    let model = parameters
        .llm_model
        .as_deref()
        .ok_or_else(|| Error::Config("parameters.llm_model is required".to_string()))?;
    let llm_client = LlmClient::new(provider, model, parameters.api_base.as_deref())?;
    let agent = FunctionCallingAgent::new(llm_client, parameters.max_tool_rounds)
        .with_agent_models(parameters.agent_models.clone());

    let ctx = EngineContext::new(
        Arc::new(SqliteTaskStore::new(db.clone())),
        Arc::new(catalog),
        Arc::new(SqliteHistory::new(db)),
        Arc::new(agent),
    )
    .with_registry(Arc::new(registry))
    .with_settings(EngineSettings::from_config(config));

    Ok(TaskManager::new(ctx))
}

/// `STEPWISE_DATABASE`, then the configured path, then the user data directory
fn database_path(config: &EngineConfig) -> Result<String> {
    if let Ok(path) = std::env::var("STEPWISE_DATABASE") {
        return Ok(path);
    }
    if let Some(path) = &config.database_path {
        return Ok(path.clone());
    }
    let dir = dirs::data_dir()
        .map(|d| d.join("stepwise"))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("stepwise.db").to_string_lossy().into_owned())
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    match ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner} [{elapsed_precise}] {msg}")
    {
        Ok(style) => spinner.set_style(style),
        Err(e) => warn!("Invalid spinner template: {}", e),
    }
    spinner
}

fn print_event(event: &Event) {
    match event {
        Event::TaskCreated(_, task) => {
            println!("{}", format!("📋 Task started ({})", task.workflow).green())
        }
        Event::StepChanged(_, _, step) => println!("{}", format!("➡️  Now at {}", step).blue()),
        Event::TaskCompleted(_, _) => println!("{}", "✅ Task completed".green().bold()),
        Event::TaskFailed(_, _, _) => println!("{}", "❌ Task failed".red().bold()),
        Event::FunctionInvoked(_, name, status, _) => {
            println!("{}", format!("   · {} ({})", name, status).dimmed())
        }
        Event::Message(_, _) => {}
    }
}

fn print_turn(turn: &TurnResponse) {
    println!("{} {}", "Assistant:".bold().magenta(), turn.message());
    if let Some(code) = turn.error_code() {
        println!("{}", format!("   (response flagged {})", code).yellow());
    }
}
