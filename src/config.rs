use std::path::{Path, PathBuf};

use crate::pipeline::storage::embedder::EmbeddingProviderConfig;

/// Application-level constants
pub const APP_NAME: &str = "Curricula";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DATA_DIR_ENV: &str = "CURRICULA_DATA_DIR";
const PROVIDER_ENV: &str = "CURRICULA_EMBEDDINGS_PROVIDER";
const MODEL_DIR_ENV: &str = "CURRICULA_EMBEDDINGS_MODEL_DIR";
const REMOTE_URL_ENV: &str = "CURRICULA_EMBEDDINGS_URL";
const REMOTE_MODEL_ENV: &str = "CURRICULA_EMBEDDINGS_MODEL";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_REMOTE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REMOTE_MODEL: &str = "text-embedding-3-small";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,curricula_lib=info,pdf_extract=warn,lopdf=warn"
}

/// Get the application data directory.
/// ~/Curricula/ unless overridden; falls back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// On-disk layout for every artifact the pipeline produces.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloaded plan PDFs.
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// Normalized plan JSON, one file per program.
    pub fn normalized_dir(&self) -> PathBuf {
        self.root.join("normalized")
    }

    /// Lexical + vector index artifacts.
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    /// Relational mirror of the normalized plans.
    pub fn database_path(&self) -> PathBuf {
        self.root.join("plans.sqlite")
    }
}

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: DataPaths,
    pub embeddings: EmbeddingProviderConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            paths: DataPaths::new(app_data_dir()),
            embeddings: embeddings_from_env(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn embeddings_from_env() -> EmbeddingProviderConfig {
    let provider = env_or(PROVIDER_ENV, "mock");
    match provider.trim().to_lowercase().as_str() {
        "local" => EmbeddingProviderConfig::Local {
            model_dir: std::env::var(MODEL_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| app_data_dir().join("models").join("bge-m3")),
        },
        "remote" | "openai" => EmbeddingProviderConfig::Remote {
            base_url: env_or(REMOTE_URL_ENV, DEFAULT_REMOTE_URL),
            model: env_or(REMOTE_MODEL_ENV, DEFAULT_REMOTE_MODEL),
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
        },
        "mock" => EmbeddingProviderConfig::Mock,
        other => {
            tracing::warn!(provider = other, "Unknown embeddings provider, using mock");
            EmbeddingProviderConfig::Mock
        }
    }
}
