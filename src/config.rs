use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where source documents, index data, and sync state are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding provider configuration
    pub llm: LlmConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Chunking parameters
    pub chunking: ChunkingConfig,
    /// Retrieval parameters
    pub retrieval: RetrievalConfig,
    /// Minutes between scheduled background syncs (0 disables)
    pub sync_interval_mins: u64,
}

/// Chunk sizing. Defaults follow the legal-document convention of ~1000
/// character clauses with a 150 character cross-boundary overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk before the sentence-level split applies.
    pub max_chars: usize,
    /// Trailing overlap carried into sentence-split continuation chunks.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Top-K for the semantic signal over chunks.
    pub semantic_top_k: usize,
    /// Top-K for the lexical signal over chunks.
    pub lexical_top_k: usize,
    /// Top-K for the definition signal.
    pub definition_top_k: usize,
    /// Maximum merged candidate-set size handed to the reranker.
    pub max_candidates: usize,
    /// Final context size after reranking.
    pub final_top_k: usize,
    /// Character budget for the assembled context block.
    pub context_budget_chars: usize,
    /// Per-signal timeout. A signal that misses it counts as empty.
    pub signal_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_top_k: 10,
            lexical_top_k: 10,
            definition_top_k: 3,
            max_candidates: 30,
            final_top_k: 5,
            context_budget_chars: 6_000,
            signal_timeout_ms: 5_000,
        }
    }
}

/// Configuration for the cross-encoder reranker sidecar (e.g. llama-server
/// with a reranker model behind `/v1/rerank`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API. If None, queries fall back to the
    /// pre-rerank merge ordering.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the embedding API
    pub base_url: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9100".to_string(),
            llm: LlmConfig::default(),
            reranker: RerankerConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            sync_interval_mins: 30,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(v) = val.parse() {
            *target = v;
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("LEXCITE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("LEXCITE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        env_parse("LLM_EMBEDDING_DIM", &mut config.llm.embedding_dim);

        env_parse("LEXCITE_CHUNK_SIZE", &mut config.chunking.max_chars);
        env_parse("LEXCITE_CHUNK_OVERLAP", &mut config.chunking.overlap_chars);

        env_parse("LEXCITE_SEMANTIC_TOP_K", &mut config.retrieval.semantic_top_k);
        env_parse("LEXCITE_LEXICAL_TOP_K", &mut config.retrieval.lexical_top_k);
        env_parse("LEXCITE_DEFS_TOP_K", &mut config.retrieval.definition_top_k);
        env_parse("LEXCITE_MAX_CANDIDATES", &mut config.retrieval.max_candidates);
        env_parse("LEXCITE_FINAL_TOP_K", &mut config.retrieval.final_top_k);
        env_parse(
            "LEXCITE_CONTEXT_BUDGET_CHARS",
            &mut config.retrieval.context_budget_chars,
        );
        env_parse(
            "LEXCITE_SIGNAL_TIMEOUT_MS",
            &mut config.retrieval.signal_timeout_ms,
        );
        env_parse("LEXCITE_SYNC_INTERVAL_MINS", &mut config.sync_interval_mins);

        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        config
    }

    /// Directory holding the source documents to index.
    pub fn docs_dir(&self) -> PathBuf {
        self.data_dir.join("docs")
    }

    /// Tantivy lexical index directory.
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    /// Vector store directory.
    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    /// Definition index persistence file.
    pub fn definitions_path(&self) -> PathBuf {
        self.data_dir.join("definitions.json")
    }

    /// Persisted per-document sync state.
    pub fn sync_state_path(&self) -> PathBuf {
        self.data_dir.join("sync_state.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chunking_matches_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.chunking.max_chars, 1000);
        assert_eq!(cfg.chunking.overlap_chars, 150);
    }

    #[test]
    fn test_data_layout_paths() {
        let cfg = Config {
            data_dir: PathBuf::from("/tmp/lexcite"),
            ..Config::default()
        };
        assert_eq!(cfg.docs_dir(), PathBuf::from("/tmp/lexcite/docs"));
        assert_eq!(cfg.sync_state_path(), PathBuf::from("/tmp/lexcite/sync_state.json"));
    }
}
