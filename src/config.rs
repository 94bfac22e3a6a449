use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Base URL override for OpenAI-compatible servers (LM Studio, Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_output_tokens() -> u32 {
    250
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_timeout_secs() -> u64 {
    30
}

/// Retrieval parameters, mirroring the interactive controls: chunk size
/// 500–2000, overlap 50–300 (always below chunk size), and 2–10 retrieved
/// chunks per question.
#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_search_timeout_secs(),
            max_results: default_search_max_results(),
        }
    }
}

fn default_search_timeout_secs() -> u64 {
    15
}
fn default_search_max_results() -> usize {
    5
}

impl Config {
    /// Built-in defaults, used when no config file is present.
    pub fn minimal() -> Config {
        Config::default()
    }
}

/// Validate the retrieval parameters against the supported ranges.
pub fn validate_rag(rag: &RagConfig) -> Result<()> {
    if !(500..=2000).contains(&rag.chunk_size) {
        anyhow::bail!("rag.chunk_size must be in [500, 2000]");
    }
    if !(50..=300).contains(&rag.chunk_overlap) {
        anyhow::bail!("rag.chunk_overlap must be in [50, 300]");
    }
    if rag.chunk_overlap >= rag.chunk_size {
        anyhow::bail!("rag.chunk_overlap must be smaller than rag.chunk_size");
    }
    if !(2..=10).contains(&rag.top_k) {
        anyhow::bail!("rag.top_k must be in [2, 10]");
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate_rag(&config.rag)?;

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_output_tokens == 0 {
        anyhow::bail!("llm.max_output_tokens must be > 0");
    }
    match config.llm.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be gemini or openai.", other),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    Ok(config)
}

/// Load the config file if it exists, otherwise fall back to built-in
/// defaults. With `required` set, a missing file is an error instead.
pub fn load_or_default(path: &Path, required: bool) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else if required {
        anyhow::bail!("Config file not found: {}", path.display())
    } else {
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::minimal();
        validate_rag(&config.rag).unwrap();
        assert_eq!(config.llm.model, "gemini-2.5-flash-lite");
        assert!((config.llm.temperature - 0.3).abs() < 1e-9);
        assert_eq!(config.llm.max_output_tokens, 250);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 100);
        assert_eq!(config.rag.top_k, 4);
    }

    #[test]
    fn out_of_range_rag_values_rejected() {
        let mut rag = RagConfig::default();
        rag.chunk_size = 100;
        assert!(validate_rag(&rag).is_err());

        let mut rag = RagConfig::default();
        rag.chunk_overlap = 10;
        assert!(validate_rag(&rag).is_err());

        let mut rag = RagConfig::default();
        rag.top_k = 50;
        assert!(validate_rag(&rag).is_err());
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let rag = RagConfig {
            chunk_size: 500,
            chunk_overlap: 300,
            top_k: 4,
        };
        validate_rag(&rag).unwrap();

        let rag = RagConfig {
            chunk_size: 500,
            chunk_overlap: 500,
            top_k: 4,
        };
        assert!(validate_rag(&rag).is_err());
    }

    #[test]
    fn parse_partial_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("docchat.toml");
        std::fs::write(
            &path,
            r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"

[rag]
chunk_size = 1500
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.rag.chunk_size, 1500);
        // Untouched sections keep defaults.
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.embedding.provider, "local");
    }

    #[test]
    fn unknown_provider_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("docchat.toml");
        std::fs::write(&path, "[llm]\nprovider = \"bard\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_file_falls_back_unless_explicit() {
        let path = Path::new("/does/not/exist/docchat.toml");
        assert!(load_or_default(path, false).is_ok());
        assert!(load_or_default(path, true).is_err());
    }
}
