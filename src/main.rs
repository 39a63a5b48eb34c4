use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use loz::agent::{LocalToolExecutor, ToolResult};
use loz::config::Config;
use loz::history::{ChatHistoryManager, PromptAndAnswer};
use loz::llm::create_client;
use loz::runner::{AgentConfig, AgentEvent, AgentLoop, AgentRunSummary};

mod cli;

use cli::Cli;
use cli::commands::{AgentOptions, Commands};

fn setup_logging(default_filter: &str) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Agent { goal, options } => handle_agent_command(goal, options, config, cli.is_verbose()).await,
        Commands::Ask { prompt } => handle_ask_command(prompt, config).await,
    }
}

async fn handle_agent_command(goal: &str, options: &AgentOptions, config: &Config, verbose: bool) -> Result<bool> {
    let workdir = match &options.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let workdir = fs::canonicalize(&workdir).context(format!("Invalid working directory {}", workdir.display()))?;

    let agent_config = AgentConfig {
        max_steps: options.max_steps.unwrap_or(config.agent.max_steps),
        max_repeated_attempts: config.agent.max_repeated_attempts,
        llm_retries: config.agent.llm_retries,
        retry_backoff: config.agent.retry_backoff(),
        safety: options.apply_safety(config.safety.clone()),
    };
    info!("Agent config: {:?}, workdir: {}", agent_config, workdir.display());

    let llm: Arc<dyn loz::llm::LlmClient> = Arc::from(create_client(&config.llm).context("Failed to create LLM client")?);
    let executor = Arc::new(LocalToolExecutor::new(&workdir));

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c_flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_flag.store(true, Ordering::SeqCst);
        }
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event, verbose);
        }
    });

    println!("{} {}", "Goal:".green().bold(), goal);
    println!("{} {}\n", "Working directory:".green(), workdir.display());

    let mut agent = AgentLoop::with_config(llm, executor, agent_config)
        .with_stop_signal(stop)
        .with_events(tx);
    let summary = agent.run(goal).await;
    let transcript = agent.take_transcript();
    drop(agent);
    let _ = printer.await;

    save_history(config, transcript);
    Ok(summary.completed)
}

async fn handle_ask_command(prompt: &str, config: &Config) -> Result<bool> {
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let answer = llm.complete(prompt).await.context("LLM request failed")?;
    println!("{}", answer);

    save_history(config, vec![PromptAndAnswer::new("ask", llm.model(), prompt, answer.as_str())]);
    Ok(true)
}

fn save_history(config: &Config, dialogue: Vec<PromptAndAnswer>) {
    if !config.history.enabled {
        return;
    }
    let mut history = ChatHistoryManager::new(&config.history.dir);
    history.extend(dialogue);
    if let Err(e) = history.save() {
        log::warn!("Failed to save chat history: {}", e);
        eprintln!("{} {}", "Warning:".yellow(), e);
    }
}

fn print_event(event: &AgentEvent, verbose: bool) {
    match event {
        AgentEvent::StepStarted { step, max_steps } => {
            println!("{}", format!("Step {}/{}", step, max_steps).cyan().bold());
        }
        AgentEvent::ActionChosen { action, .. } => {
            println!("  {} {}", "Action:".blue(), action.canonical());
            if let Some(reasoning) = action.reasoning() {
                println!("  {} {}", "Reasoning:".blue(), reasoning.dimmed());
            }
        }
        AgentEvent::ToolFinished { result, .. } => print_result(result, verbose),
        AgentEvent::StepError { message, .. } => {
            println!("  {} {}", "Error:".red(), message);
        }
        AgentEvent::Finished(summary) => print_summary(summary),
    }
}

fn print_result(result: &ToolResult, verbose: bool) {
    if result.success {
        println!("  {} exit code {}", "Success:".green(), result.exit_code.unwrap_or(0));
    } else {
        println!(
            "  {} {}",
            "Failed:".red(),
            result.error.as_deref().unwrap_or("Unknown error")
        );
    }
    if verbose && !result.output.is_empty() {
        println!("{}", result.output.dimmed());
    }
}

fn print_summary(summary: &AgentRunSummary) {
    println!();
    if summary.completed {
        println!("{}", "Goal completed".green().bold());
    } else {
        println!("{}", "Goal not completed".red().bold());
    }
    println!("{}", summary);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_filter()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    let completed = run_application(&cli, &config).await.context("Application failed")?;
    if !completed {
        std::process::exit(1);
    }

    Ok(())
}
