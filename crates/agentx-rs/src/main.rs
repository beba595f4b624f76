//! Interactive command-line loop for the AgentX conversation engine.

use agentx_rs::config::AgentxConfig;
use agentx_rs::core::ConversationEngine;
use anyhow::{Context, bail};
use autoagents_llm::LLMProvider;
use autoagents_llm::backends::openai::OpenAI;
use autoagents_llm::builder::LLMBuilder;
use clap::Parser;
use log::{debug, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "sair"];

/// Command-line options for the interactive loop.
#[derive(Parser)]
#[command(name = "agentx", version)]
struct Cli {
    /// Optional path to an agentx.json5 config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// OpenAI chat model; overrides `model.chat_model`
    #[arg(long)]
    model: Option<String>,
    /// OpenAI embedding model; overrides `model.embedding_model`
    #[arg(long)]
    embedding_model: Option<String>,
    /// Session key for this conversation
    #[arg(long, default_value = "cli")]
    session: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agentx_rs::init_logging();

    let cli = Cli::parse();
    info!(
        "starting agentx (config_set={}, session={})",
        cli.config.is_some(),
        cli.session
    );
    let mut config = load_config(&cli)?;
    if let Some(model) = cli.model.clone() {
        config.model.chat_model = model;
    }
    if let Some(model) = cli.embedding_model.clone() {
        config.model.embedding_model = model;
    }
    if config.model.provider != "openai" {
        bail!("unsupported model provider: {}", config.model.provider);
    }

    let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
        bail!("OPENAI_API_KEY is required to run agentx");
    };
    info!(
        "building LLM providers (chat_model={}, embedding_model={})",
        config.model.chat_model, config.model.embedding_model
    );
    let chat: Arc<dyn LLMProvider> = LLMBuilder::<OpenAI>::new()
        .api_key(api_key.clone())
        .model(config.model.chat_model.clone())
        .temperature(config.model.temperature)
        .build()
        .context("failed to build chat provider")?;
    let embeddings: Arc<dyn LLMProvider> = LLMBuilder::<OpenAI>::new()
        .api_key(api_key)
        .model(config.model.embedding_model.clone())
        .build()
        .context("failed to build embedding provider")?;

    let engine = ConversationEngine::builder(config)
        .chat_provider(chat)
        .embedding_provider(embeddings)
        .build()
        .await
        .context("failed to open memory store")?;

    run_loop(&engine, &cli.session).await
}

fn load_config(cli: &Cli) -> anyhow::Result<AgentxConfig> {
    if let Some(path) = cli.config.as_ref() {
        info!("loading config from path: {}", path.display());
        return AgentxConfig::load_from_path(path).context("failed to load config");
    }
    let cwd = std::env::current_dir().context("cwd")?;
    info!("loading layered config from cwd: {}", cwd.display());
    let layered = AgentxConfig::load_layered(&cwd).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

/// Read questions from stdin until EOF or an exit command.
async fn run_loop(engine: &ConversationEngine, session: &str) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("AgentX ready. Type 'exit' to quit.");
    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if is_exit_command(query) {
            break;
        }

        tokio::select! {
            result = engine.run_turn(session, query) => match result {
                Ok(outcome) => println!("{}", outcome.answer),
                Err(err) if err.is_recoverable() => eprintln!("error: {err}"),
                Err(err) => return Err(err).context("turn failed"),
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("turn cancelled by user (session_id={})", session);
                eprintln!("(cancelled)");
            }
        }
    }
    info!("leaving interactive loop (session_id={})", session);
    Ok(())
}

fn prompt() -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ").context("failed to write prompt")?;
    stdout.flush().context("failed to flush stdout")
}

fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS
        .iter()
        .any(|command| input.eq_ignore_ascii_case(command))
}

#[cfg(test)]
mod tests {
    use super::{Cli, is_exit_command};
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_commands_ignore_case() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("Sair"));
        assert!(!is_exit_command("exit now"));
    }

    #[test]
    fn cli_defaults_to_cli_session() {
        let cli = Cli::parse_from(["agentx", "--model", "gpt-4o"]);
        assert_eq!(cli.session, "cli");
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
        assert!(cli.embedding_model.is_none());
    }
}
