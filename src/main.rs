//! # docchat CLI
//!
//! Interactive document chat for the terminal. Three session modes mirror
//! the three ways of talking to the model, plus two one-shot commands:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat chat` | Plain conversational session |
//! | `docchat rag` | Document Q&A session with citations |
//! | `docchat agent` | Tool-using session with web search |
//! | `docchat ask "<question>" --file <path>` | One-shot grounded question |
//! | `docchat inspect <path>...` | Extract + chunk report, no network |
//!
//! ## Examples
//!
//! ```bash
//! # Chat with defaults (needs GEMINI_API_KEY)
//! docchat chat
//!
//! # Ask questions about a set of documents, tuning retrieval
//! docchat rag --file docs/ --chunk-size 1500 --top-k 6
//!
//! # One-shot question for scripting
//! docchat ask "what does the report conclude?" --file report.pdf
//!
//! # Check extraction and chunking without any API key
//! docchat inspect notes/
//! ```
//!
//! All commands accept `--config` pointing at a TOML configuration file;
//! without it, built-in defaults apply. API keys come only from the
//! environment (`GEMINI_API_KEY`/`GOOGLE_API_KEY`, `OPENAI_API_KEY`) and are
//! never written to disk.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use docchat::config::{self, Config};
use docchat::{ask, inspect, repl};

/// Interactive document chat over hosted LLMs.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Interactive document chat: plain, retrieval-augmented, and tool-using sessions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply if the file does
    /// not exist.
    #[arg(long, global = true, default_value = "./docchat.toml")]
    config: PathBuf,

    /// Treat a missing config file as an error instead of using defaults.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    require_config: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Retrieval flags shared by the document-aware commands. Ranges match the
/// supported tuning window; overlap must stay below chunk size.
#[derive(clap::Args)]
struct RagArgs {
    /// Chunk window size in characters.
    #[arg(long, value_parser = clap::value_parser!(u64).range(500..=2000))]
    chunk_size: Option<u64>,

    /// Overlap between consecutive chunks in characters.
    #[arg(long, value_parser = clap::value_parser!(u64).range(50..=300))]
    chunk_overlap: Option<u64>,

    /// Number of chunks retrieved per question.
    #[arg(long, value_parser = clap::value_parser!(u64).range(2..=10))]
    top_k: Option<u64>,
}

impl RagArgs {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(v) = self.chunk_size {
            config.rag.chunk_size = v as usize;
        }
        if let Some(v) = self.chunk_overlap {
            config.rag.chunk_overlap = v as usize;
        }
        if let Some(v) = self.top_k {
            config.rag.top_k = v as usize;
        }
        config::validate_rag(&config.rag)
    }
}

/// Generation flags shared by every model-calling command.
#[derive(clap::Args)]
struct ModelArgs {
    /// Model identifier override.
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    temperature: Option<f64>,

    /// Maximum output tokens per reply.
    #[arg(long)]
    max_tokens: Option<u32>,
}

impl ModelArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(m) = &self.model {
            config.llm.model = m.clone();
        }
        if let Some(t) = self.temperature {
            config.llm.temperature = t;
        }
        if let Some(m) = self.max_tokens {
            config.llm.max_output_tokens = m;
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start a plain conversational session.
    ///
    /// The whole conversation is replayed to the model on every turn.
    /// `/clear` resets it; `/quit` exits.
    Chat {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Start a document Q&A session.
    ///
    /// Load PDF, DOCX, or TXT files with `/load` (or `--file` up front),
    /// then ask questions about their content. Answers cite their sources.
    /// `/clear` discards the knowledge base and the conversation together.
    Rag {
        /// Files or directories to load before the first prompt.
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        #[command(flatten)]
        rag: RagArgs,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Start a tool-using session with web search.
    ///
    /// The model may call the `web_search` tool up to three times per turn
    /// before answering.
    Agent {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Ask one grounded question about a set of files and exit.
    Ask {
        /// The question to answer from the documents.
        question: String,

        /// Files or directories to ground the answer on.
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        rag: RagArgs,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Extract and chunk files, print a batch report, and exit.
    ///
    /// Touches no network provider; useful for checking what a `/load`
    /// would ingest.
    Inspect {
        /// Files or directories to inspect.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        rag: RagArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_or_default(&cli.config, cli.require_config)?;

    match cli.command {
        Commands::Chat { model } => {
            model.apply(&mut cfg);
            repl::run_chat(&cfg).await?;
        }
        Commands::Rag { files, rag, model } => {
            rag.apply(&mut cfg)?;
            model.apply(&mut cfg);
            repl::run_rag(&cfg, &files).await?;
        }
        Commands::Agent { model } => {
            model.apply(&mut cfg);
            repl::run_agent(&cfg).await?;
        }
        Commands::Ask {
            question,
            files,
            rag,
            model,
        } => {
            rag.apply(&mut cfg)?;
            model.apply(&mut cfg);
            ask::run_ask(&cfg, &question, &files).await?;
        }
        Commands::Inspect { paths, rag } => {
            rag.apply(&mut cfg)?;
            inspect::run_inspect(&cfg, &paths)?;
        }
    }

    Ok(())
}
