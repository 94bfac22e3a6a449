//! Interactive terminal sessions: plain chat, document Q&A, and the
//! tool-using agent.
//!
//! Each mode runs a rustyline read loop over one [`Session`]. Every failure
//! is caught at the turn boundary and rendered as feedback; the loop itself
//! only ends on `/quit`, Ctrl-C, or end of input. While a request is in
//! flight a progress line is shown; there is no cancellation path.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::agent;
use crate::answer;
use crate::chunk;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::files;
use crate::index::{credential_fingerprint, fingerprint_documents, IndexCache, VectorIndex};
use crate::ingest;
use crate::llm::{self, ChatMessage, ChatOptions};
use crate::models::{Citation, EmbeddedChunk, Role, Turn};
use crate::session::Session;
use crate::websearch::DuckDuckGo;

fn interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn print_banner(title: &str, hints: &[&str]) {
    if !interactive() {
        return;
    }
    println!("{}", title);
    for hint in hints {
        println!("  {}", hint);
    }
    println!();
}

fn turn_to_message(turn: &Turn) -> ChatMessage {
    match turn.role {
        Role::User => ChatMessage::user(&turn.content),
        Role::Assistant => ChatMessage::assistant(&turn.content),
    }
}

fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!("Sources:");
    for c in citations {
        println!("  - {} (relevance: {:.2})", c.source_name, c.score);
        println!("    \"{}\"", c.excerpt.replace('\n', " ").trim());
    }
    println!();
}

/// Read the next line, handling Ctrl-C/Ctrl-D as end of session.
fn read_line(rl: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    match rl.readline(prompt) {
        Ok(line) => {
            let trimmed = line.trim().to_string();
            if !trimmed.is_empty() {
                rl.add_history_entry(&trimmed).ok();
            }
            Ok(Some(trimmed))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ============ Plain chat ============

/// Conversational session: the full history is replayed to the model on
/// every turn.
pub async fn run_chat(config: &Config) -> Result<()> {
    let model = llm::create_model(&config.llm)?;
    let opts = ChatOptions::from(&config.llm);
    let mut session = Session::new();

    print_banner(
        &format!("docchat chat ({})", model.model_name()),
        &["/clear resets the conversation, /quit exits"],
    );

    let mut rl = DefaultEditor::new()?;
    loop {
        let input = match read_line(&mut rl, "you> ")? {
            Some(line) if !line.is_empty() => line,
            Some(_) => continue,
            None => break,
        };

        match input.as_str() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
                continue;
            }
            "/help" => {
                println!("Commands: /clear, /quit");
                continue;
            }
            other if other.starts_with('/') => {
                eprintln!("Unknown command: {} (try /help)", other);
                continue;
            }
            _ => {}
        }

        let mut messages: Vec<ChatMessage> = session.turns().iter().map(turn_to_message).collect();
        messages.push(ChatMessage::user(&input));

        println!("thinking...");
        match model.complete(&messages, &opts).await {
            Ok(reply) => {
                println!("\n{}\n", reply);
                session.record_exchange(input, reply);
            }
            Err(e) => {
                eprintln!("Error generating response: {:#}", e);
            }
        }
    }

    Ok(())
}

// ============ Document Q&A ============

/// Document Q&A session: `/load` builds the knowledge base, questions are
/// answered from it with citations. `initial_files` are loaded before the
/// first prompt.
pub async fn run_rag(config: &Config, initial_files: &[PathBuf]) -> Result<()> {
    let model = llm::create_model(&config.llm)?;
    let opts = ChatOptions::from(&config.llm);
    let provider = embedding::create_provider(&config.embedding)?;
    let mut session = Session::new();
    let mut cache = IndexCache::new();

    print_banner(
        &format!("docchat rag ({})", model.model_name()),
        &[
            "/load <path>... adds documents (pdf, docx, txt)",
            "/clear drops the knowledge base and the conversation",
            "/status shows the session state, /quit exits",
        ],
    );

    if !initial_files.is_empty() {
        load_documents(
            config,
            provider.as_ref(),
            &mut session,
            &mut cache,
            initial_files,
        )
        .await;
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        let input = match read_line(&mut rl, "you> ")? {
            Some(line) if !line.is_empty() => line,
            Some(_) => continue,
            None => break,
        };

        if input == "/load" || input.starts_with("/load ") {
            let rest = input.trim_start_matches("/load");
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                eprintln!("Usage: /load <path>...");
                continue;
            }
            load_documents(config, provider.as_ref(), &mut session, &mut cache, &paths).await;
            continue;
        }

        match input.as_str() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("Knowledge base cleared.");
                continue;
            }
            "/status" => {
                println!("state: {}", session.state());
                match session.index() {
                    Some(index) => println!(
                        "index: {} chunks, {} dims",
                        index.len(),
                        index.dims()
                    ),
                    None => println!("index: none"),
                }
                println!("turns: {}", session.turns().len());
                println!(
                    "chunking: size {} overlap {}, retrieving top {}",
                    config.rag.chunk_size, config.rag.chunk_overlap, config.rag.top_k
                );
                continue;
            }
            "/help" => {
                println!("Commands: /load <path>..., /clear, /status, /quit");
                continue;
            }
            other if other.starts_with('/') => {
                eprintln!("Unknown command: {} (try /help)", other);
                continue;
            }
            _ => {}
        }

        // Questions only reach the pipeline from a ready session.
        let index = match session.begin_answer() {
            Ok(index) => index,
            Err(warning) => {
                eprintln!("Warning: {}", warning);
                continue;
            }
        };

        println!("searching the documents...");

        let question_vec =
            match embedding::embed_query(provider.as_ref(), &config.embedding, &input).await {
                Ok(v) => v,
                Err(e) => {
                    session.fail_answer();
                    eprintln!("Error generating response: {:#}", e);
                    continue;
                }
            };

        match answer::generate_answer(
            model.as_ref(),
            &opts,
            &index,
            &question_vec,
            &input,
            config.rag.top_k,
        )
        .await
        {
            Ok(ans) => {
                println!("\n{}\n", ans.text);
                print_citations(&ans.citations);
                session.complete_answer(input, ans.text, Some(ans.citations));
            }
            Err(e) => {
                session.fail_answer();
                eprintln!("Error generating response: {:#}", e);
            }
        }
    }

    Ok(())
}

/// Cache key for the embedding identity: provider, model, and (for hosted
/// providers) the credential. Never the secret itself.
fn embedding_credential(config: &Config) -> String {
    let key = match config.embedding.provider.as_str() {
        "openai" => std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        _ => String::new(),
    };
    credential_fingerprint(&[
        &config.embedding.provider,
        config.embedding.model.as_deref().unwrap_or(""),
        &key,
    ])
}

/// Ingest, chunk, embed, and index one batch of paths, reporting per-file
/// outcomes. Only a fully embedded batch replaces the current index; any
/// failure leaves the previous knowledge base (if any) in place.
async fn load_documents(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    session: &mut Session,
    cache: &mut IndexCache,
    paths: &[PathBuf],
) {
    session.begin_upload();

    let (uploads, gather_failures) = match files::gather_files(paths) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading files: {:#}", e);
            session.abort_upload();
            return;
        }
    };

    let mut report = ingest::ingest_files(&uploads);
    report.failures.extend(gather_failures);

    for failure in &report.failures {
        eprintln!("  error: {}: {}", failure.name, failure.error);
    }

    if report.documents.is_empty() {
        eprintln!("No text could be extracted from the given files.");
        session.abort_upload();
        return;
    }

    let doc_fp = fingerprint_documents(&report.documents);
    let cred_fp = embedding_credential(config);

    if let Some(index) = cache.get(&cred_fp, &doc_fp) {
        println!("load");
        println!("  documents: {}", report.documents.len());
        println!("  chunks: {} (reused from cache)", index.len());
        session.attach_index(index);
        return;
    }

    let chunks = match chunk::chunk_documents(
        &report.documents,
        config.rag.chunk_size,
        config.rag.chunk_overlap,
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error chunking documents: {:#}", e);
            session.abort_upload();
            return;
        }
    };

    println!("processing {} documents...", report.documents.len());

    // All-or-nothing embedding: one failed batch aborts the build and no
    // partial index is kept.
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embedding.batch_size) {
        match embedding::embed_texts(provider, &config.embedding, batch).await {
            Ok(vs) => vectors.extend(vs),
            Err(e) => {
                eprintln!("Error building the knowledge base: {:#}", e);
                session.abort_upload();
                return;
            }
        }
    }

    if vectors.len() != chunks.len() {
        eprintln!(
            "Error building the knowledge base: expected {} vectors, got {}",
            chunks.len(),
            vectors.len()
        );
        session.abort_upload();
        return;
    }

    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
        .collect();

    let index = match VectorIndex::build(embedded, doc_fp.clone()) {
        Ok(i) => Arc::new(i),
        Err(e) => {
            eprintln!("Error building the knowledge base: {:#}", e);
            session.abort_upload();
            return;
        }
    };

    println!("load");
    println!("  documents: {}", report.documents.len());
    println!("  chunks: {}", index.len());
    if !report.failures.is_empty() {
        println!("  failed files: {}", report.failures.len());
    }
    if !report.skipped.is_empty() {
        println!("  skipped files: {}", report.skipped.len());
    }

    cache.insert(cred_fp, doc_fp, index.clone());
    session.attach_index(index);
}

// ============ Tool-using agent ============

/// Agent session: the model may call `web_search` during a turn.
pub async fn run_agent(config: &Config) -> Result<()> {
    let model = llm::create_model(&config.llm)?;
    if !model.supports_tools() {
        bail!(
            "agent mode needs a tool-capable llm provider; '{}' cannot call tools",
            config.llm.provider
        );
    }
    let opts = ChatOptions::from(&config.llm);
    let search = DuckDuckGo::new(&config.search)?;
    let mut session = Session::new();

    print_banner(
        &format!("docchat agent ({})", model.model_name()),
        &[
            "the assistant may search the web for current information",
            "/clear resets the conversation, /quit exits",
        ],
    );

    let mut rl = DefaultEditor::new()?;
    loop {
        let input = match read_line(&mut rl, "you> ")? {
            Some(line) if !line.is_empty() => line,
            Some(_) => continue,
            None => break,
        };

        match input.as_str() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
                continue;
            }
            "/help" => {
                println!("Commands: /clear, /quit");
                continue;
            }
            other if other.starts_with('/') => {
                eprintln!("Unknown command: {} (try /help)", other);
                continue;
            }
            _ => {}
        }

        println!("thinking...");
        match agent::run_agent_turn(model.as_ref(), &search, &opts, session.turns(), &input).await
        {
            Ok(reply) => {
                println!("\n{}\n", reply);
                session.record_exchange(input, reply);
            }
            Err(e) => {
                eprintln!("Error generating response: {:#}", e);
            }
        }
    }

    Ok(())
}
