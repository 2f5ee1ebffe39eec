use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use claimsdb_cli::{connect_store, init_tracing, load_embedder, load_settings};
use claimsdb_core::types::{Query, ResponseFragment};
use claimsdb_llm::OllamaGenerator;
use claimsdb_rag::ClaimsAssistant;

/// Ask a question about the claims database and stream the answer.
#[derive(Debug, Parser)]
#[command(name = "claimsdb-ask", version)]
struct Cli {
    /// The question; words are joined with spaces.
    message: Vec<String>,
    /// Accepted for parity with the chat boundary; no history is kept.
    #[arg(long)]
    conversation_id: Option<String>,
    /// Print server-sent-event frames instead of plain text.
    #[arg(long)]
    sse: bool,
    /// Print the assembled context to stderr before answering.
    #[arg(long)]
    show_context: bool,
    /// Directory holding config.toml and config.<env>.toml.
    #[arg(long, env = "APP_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(&cli.config_dir)?;

    let store = connect_store(&settings).await?;
    let embedder = load_embedder(&settings).await?;
    let generator = Arc::new(OllamaGenerator::new(&settings.generation)?);
    let assistant = ClaimsAssistant::new(store, embedder, generator, &settings)?;

    let mut query = Query::new(cli.message.join(" "));
    if let Some(id) = cli.conversation_id { query = query.with_conversation(id); }
    let (intent, context, mut stream) = assistant.answer_with_context(query).await?;
    if cli.show_context { eprintln!("🧭 Intent: {}\n📄 Context:\n{}\n", intent.label(), context); }
    let mut stdout = std::io::stdout();
    loop {
        let fragment = tokio::select! {
            fragment = stream.next() => fragment,
            _ = tokio::signal::ctrl_c() => {
                stream.cancel();
                eprintln!("\n⏹️  Cancelled");
                break;
            }
        };
        let Some(fragment) = fragment else { break };
        if cli.sse {
            write!(stdout, "{}", fragment.sse_frame())?;
        } else {
            match &fragment {
                ResponseFragment::Text(text) | ResponseFragment::Error(text) => write!(stdout, "{}", text)?,
                ResponseFragment::Done => writeln!(stdout)?,
            }
        }
        stdout.flush()?;
        if fragment.is_done() { break; }
    }
    Ok(())
}
