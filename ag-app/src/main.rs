//! `ag` command-line front end over the `ag-llm` adapters.

mod config;

use ag_llm::{Grammar, Message, Model, Tool, ToolSpec, json_schema};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{AgConfig, Backend};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(name = "ag", version, about = "Run one completion or tool call against a model backend")]
struct Cli {
    /// Config file (default: ~/.ag/config.toml).
    #[arg(long, env = "AG_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, global = true)]
    backend: Option<Backend>,
    #[arg(long, global = true)]
    model: Option<String>,
    #[arg(long, global = true)]
    api_base: Option<String>,
    #[arg(long, global = true)]
    max_tokens: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a reply and print it.
    Complete {
        #[command(flatten)]
        conversation: ConversationArgs,
        #[arg(long, value_enum)]
        grammar: Option<GrammarArg>,
    },
    /// Ask the model to call one of the tools described in a JSON file.
    ToolCall {
        #[command(flatten)]
        conversation: ConversationArgs,
        /// JSON array of `{name, description, inputs}` tool specs.
        #[arg(long)]
        tools: PathBuf,
    },
    /// Print the function descriptors sent to backends for a tools file.
    Schema { tools: PathBuf },
}

#[derive(Debug, Args)]
struct ConversationArgs {
    prompt: String,
    #[arg(long)]
    system: Option<String>,
    /// JSON array of `{role, content}` messages placed before the prompt.
    #[arg(long)]
    history: Option<PathBuf>,
    #[arg(long = "stop")]
    stop: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GrammarArg {
    JsonAgent,
    CodeAgent,
}

impl From<GrammarArg> for Grammar {
    fn from(g: GrammarArg) -> Self {
        match g {
            GrammarArg::JsonAgent => Grammar::json_agent(),
            GrammarArg::CodeAgent => Grammar::code_agent(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();

    if let Command::Schema { tools } = &cli.command {
        let specs = read_tools(tools).await?;
        let descriptors: Vec<_> = specs.iter().map(|s| json_schema(s)).collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let mut cfg = AgConfig::load(cli.config.clone()).await?;
    cli.apply_overrides(&mut cfg);
    cfg.validate()?;

    let mut model = cfg.build_model();
    tracing::info!(backend = ?cfg.model.backend, model = %model.model_id(), "model ready");

    match cli.command {
        Command::Complete {
            conversation,
            grammar,
        } => {
            let messages = conversation.messages().await?;
            let grammar = grammar.map(Grammar::from);
            let text = model
                .call(
                    &messages,
                    &conversation.stop,
                    grammar.as_ref(),
                    cfg.completion_max_tokens(),
                )
                .await?;
            println!("{text}");
        }
        Command::ToolCall {
            conversation,
            tools,
        } => {
            let messages = conversation.messages().await?;
            let specs = read_tools(&tools).await?;
            let tools: Vec<&dyn Tool> = specs.iter().map(|s| s as &dyn Tool).collect();
            let call = model
                .get_tool_call(
                    &messages,
                    &tools,
                    &conversation.stop,
                    cfg.model.max_tokens,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&call)?);
        }
        Command::Schema { .. } => {}
    }

    report_usage(model.as_ref());
    Ok(())
}

impl Cli {
    /// Flags win over the config file and `AG_*` variables.
    fn apply_overrides(&self, cfg: &mut AgConfig) {
        if let Some(backend) = self.backend {
            cfg.model.backend = backend;
        }
        if let Some(model) = &self.model {
            cfg.model.model_id = Some(model.clone());
        }
        if let Some(api_base) = &self.api_base {
            cfg.model.api_base = Some(api_base.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            cfg.model.max_tokens = Some(max_tokens);
        }
    }
}

impl ConversationArgs {
    async fn messages(&self) -> anyhow::Result<Vec<Message>> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(Message::system(system.clone()));
        }
        if let Some(path) = &self.history {
            let raw = read_file(path).await?;
            let history: Vec<Message> = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("parse history {}: {e}", path.display()))?;
            messages.extend(history);
        }
        messages.push(Message::user(self.prompt.clone()));
        Ok(messages)
    }
}

async fn read_tools(path: &Path) -> anyhow::Result<Vec<ToolSpec>> {
    let raw = read_file(path).await?;
    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("parse tools {}: {e}", path.display()))
}

async fn read_file(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))
}

fn report_usage(model: &dyn Model) {
    let usage = model.token_counts();
    tracing::info!(
        input_tokens = ?usage.input_token_count,
        output_tokens = ?usage.output_token_count,
        "token usage"
    );
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("info,ag=debug,ag_app=debug,ag_llm=debug"),
    };
    let log_format = std::env::var("AG_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_writer(std::io::stderr);

    match log_format.as_str() {
        "json" => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .init(),
        "pretty" => builder.with_file(true).with_line_number(true).pretty().init(),
        "compact" => builder.compact().init(),
        other => {
            return Err(anyhow::anyhow!(
                "unsupported AG_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::debug!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
