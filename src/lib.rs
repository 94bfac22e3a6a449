//! # docchat
//!
//! Interactive document chat for the terminal: a plain conversational mode,
//! a retrieval-augmented mode over uploaded documents, and a tool-using
//! agent mode with web search, all backed by hosted LLM APIs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌─────────────┐
//! │ Uploads       │──▶│ Pipeline              │──▶│ VectorIndex │
//! │ pdf/docx/txt  │   │ extract+chunk+embed  │   │ (in-memory) │
//! └──────────────┘   └──────────────────────┘   └──────┬──────┘
//!                                                      │ top-k
//!                        ┌─────────────┐        ┌──────▼──────┐
//!                        │ web_search  │◀──────▶│ Chat model  │
//!                        │ (agent mode)│        │ gemini/oai  │
//!                        └─────────────┘        └─────────────┘
//! ```
//!
//! All state is session-scoped and in-memory: documents, chunks, vectors,
//! and the conversation log live only as long as the session, and `/clear`
//! discards the knowledge base and conversation together. There is no
//! persistence layer.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`files`] | Path expansion into uploadable files |
//! | [`extract`] | PDF/DOCX/TXT text extraction |
//! | [`ingest`] | Batch ingestion with per-file reports |
//! | [`chunk`] | Fixed-size overlapping chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index and cache |
//! | [`llm`] | Chat model providers |
//! | [`answer`] | Grounded answer generation |
//! | [`ask`] | One-shot grounded question |
//! | [`inspect`] | Offline extract+chunk report |
//! | [`websearch`] | Web search tool |
//! | [`agent`] | Tool-using chat turns |
//! | [`session`] | Conversation state machine |
//! | [`repl`] | Interactive terminal sessions |

pub mod agent;
pub mod answer;
pub mod ask;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod files;
pub mod index;
pub mod ingest;
pub mod inspect;
pub mod llm;
pub mod models;
pub mod repl;
pub mod session;
pub mod websearch;
