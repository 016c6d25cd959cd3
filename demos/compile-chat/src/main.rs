//! Compile a JSON conversation into a model prompt and split a raw completion.
//!
//! # Examples
//!
//! ```sh
//! # Render a conversation with the Llama 3 grammar
//! compile-chat --template llama3 --system "You are terse." conversation.json
//!
//! # Use stored settings and split a completion
//! compile-chat --settings settings.json conversation.json \
//!   --completion "<think>2+2=4</think>It is 4."
//!
//! # Read the conversation from stdin
//! cat conversation.json | compile-chat -
//! ```

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chat_compiler::ChatPipeline;
use chat_compiler::config::ChatSettings;
use chat_compiler::primitives::Conversation;
use chat_compiler::telemetry::{TelemetryConfig, init};
use chat_compiler::templates::TemplateId;
use chat_compiler::window::HeuristicCounter;
use clap::Parser;
use serde_json::json;
use tracing::info;

/// Compile a chat conversation into a single prompt string.
#[derive(Parser)]
#[command(name = "compile-chat")]
struct Cli {
    /// Conversation JSON (`[{"role": "user", "content": "..."}]`), or `-` for stdin
    conversation: Option<PathBuf>,

    /// Settings JSON file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Template label, overriding settings (unknown labels fall back to CHATML)
    #[arg(long)]
    template: Option<String>,

    /// System prompt, overriding settings
    #[arg(long)]
    system: Option<String>,

    /// Model context length in tokens
    #[arg(long)]
    context_length: Option<usize>,

    /// Do not wrap assistant history in reasoning tags
    #[arg(long)]
    no_reasoning_tags: bool,

    /// Raw completion to split into reasoning and answer
    #[arg(long)]
    completion: Option<String>,

    /// Treat the model as reasoning-capable when splitting
    #[arg(long)]
    reasoning: bool,

    /// List built-in templates and exit
    #[arg(long)]
    list_templates: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init(&TelemetryConfig::default().with_directive(cli.log.clone()))?;

    if cli.list_templates {
        for id in TemplateId::ALL {
            println!("{:<14} {:?}", id.label(), id.generation_prefix());
        }
        return Ok(());
    }

    let settings = settings(&cli)?;
    let pipeline = ChatPipeline::new(&settings);
    info!(
        template = ?pipeline.template(),
        budget = pipeline.budget(),
        "pipeline ready"
    );

    if let Some(source) = &cli.conversation {
        let conversation = read_conversation(source)?;
        let outcome = pipeline
            .prepare_async(conversation.as_slice(), &HeuristicCounter::default())
            .await?;

        println!("{}", outcome.prompt);
        eprintln!(
            "messages: {} kept, {} dropped | tokens: ~{} of {}{}",
            outcome.conversation.len(),
            outcome.dropped,
            outcome.token_count,
            outcome.budget,
            if outcome.is_over_budget() { " (over budget)" } else { "" }
        );
    }

    if let Some(raw) = &cli.completion {
        let (result, rule) = pipeline.finish_detailed(raw);
        let report = json!({
            "rule": rule.label(),
            "reasoning": result.reasoning,
            "answer": result.answer,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn settings(cli: &Cli) -> Result<ChatSettings> {
    let mut settings = match &cli.settings {
        Some(path) => ChatSettings::load(path)?,
        None => ChatSettings::default(),
    };
    if let Some(template) = &cli.template {
        settings.template.clone_from(template);
        settings.custom_template = None;
        settings.jinja_template = None;
    }
    if let Some(system) = &cli.system {
        settings.system_prompt.clone_from(system);
    }
    if let Some(context_length) = cli.context_length {
        settings.context_length = context_length;
    }
    if cli.no_reasoning_tags {
        settings.include_reasoning_tags = false;
    }
    if cli.reasoning {
        settings.reasoning_capable = true;
    }
    settings.validate()?;
    Ok(settings)
}

fn read_conversation(source: &Path) -> Result<Conversation> {
    let raw = if source.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read conversation from stdin")?;
        buffer
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("failed to read {}", source.display()))?
    };
    serde_json::from_str(&raw).context("conversation must be a JSON array of messages")
}
