use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::EmbeddingModel;
use super::StorageError;

/// Dimension of the deterministic mock vectors.
pub const MOCK_EMBEDDING_DIM: usize = 384;

/// Which embedding backend the process uses.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingProviderConfig {
    /// ONNX sentence-embedding model on disk (`onnx-embeddings` feature).
    Local { model_dir: PathBuf },
    /// OpenAI-compatible `/embeddings` endpoint.
    Remote {
        base_url: String,
        model: String,
        api_key: String,
    },
    /// Deterministic hashed bag-of-words vectors; no model, no network.
    Mock,
}

impl EmbeddingProviderConfig {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Remote { .. } => "remote",
            Self::Mock => "mock",
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Process-wide provider
// ═══════════════════════════════════════════════════════════

static SHARED_MODEL: OnceLock<Arc<dyn EmbeddingModel>> = OnceLock::new();

/// The process-wide embedding model, initialized on first call.
///
/// The first configuration wins; later calls return the installed model
/// regardless of `config`.
pub fn shared_embedding_model(
    config: &EmbeddingProviderConfig,
) -> Result<Arc<dyn EmbeddingModel>, StorageError> {
    if let Some(model) = SHARED_MODEL.get() {
        return Ok(model.clone());
    }
    let model = build_embedding_model(config)?;
    Ok(SHARED_MODEL.get_or_init(|| model).clone())
}

/// Construct a fresh model for `config` (not shared).
pub fn build_embedding_model(
    config: &EmbeddingProviderConfig,
) -> Result<Arc<dyn EmbeddingModel>, StorageError> {
    tracing::info!(provider = config.label(), "Initializing embedding model");
    match config {
        EmbeddingProviderConfig::Mock => Ok(Arc::new(MockEmbedder::new())),
        EmbeddingProviderConfig::Remote {
            base_url,
            model,
            api_key,
        } => Ok(Arc::new(RemoteEmbedder::new(base_url, model, api_key)?)),
        #[cfg(feature = "onnx-embeddings")]
        EmbeddingProviderConfig::Local { model_dir } => Ok(Arc::new(OnnxEmbedder::load(model_dir)?)),
        #[cfg(not(feature = "onnx-embeddings"))]
        EmbeddingProviderConfig::Local { .. } => Err(StorageError::ModelInit(
            "local embeddings need the `onnx-embeddings` feature".into(),
        )),
    }
}

fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vec.iter_mut() {
            *val /= norm;
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX embedder (`onnx-embeddings` feature)
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{l2_normalize, EmbeddingModel, StorageError};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Sentence embeddings with ONNX Runtime (BGE-family export).
    ///
    /// Requires two files in the model directory:
    /// - `model.onnx` with `input_ids` and `attention_mask` inputs
    /// - `tokenizer.json` with the HuggingFace tokenizer definition
    ///
    /// Mean-pools token states under the attention mask (or takes the
    /// model's pooled output as is) and L2-normalizes the result.
    ///
    /// Uses interior mutability (Mutex) because ort::Session::run requires `&mut self`
    /// but our EmbeddingModel trait exposes `&self` for ergonomic shared usage.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load the ONNX embedding model from a directory.
        pub fn load(model_dir: &Path) -> Result<Self, StorageError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(StorageError::ModelNotFound(model_path));
            }
            if !tokenizer_path.exists() {
                return Err(StorageError::ModelNotFound(tokenizer_path));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| StorageError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| StorageError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| StorageError::ModelInit(format!("ONNX load failed: {e}")))?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| StorageError::ModelInit(format!("Tokenizer load failed: {e}")))?;

            let mut embedder = Self {
                session: Mutex::new(session),
                tokenizer,
                dimension: 0,
            };
            embedder.dimension = embedder.infer("dimension probe")?.len();

            tracing::info!(
                dir = %model_dir.display(),
                dimension = embedder.dimension,
                "ONNX embedder loaded"
            );
            Ok(embedder)
        }

        fn infer(&self, text: &str) -> Result<Vec<f32>, StorageError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| StorageError::Tokenization(e.to_string()))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let seq_len = input_ids.len();
            let token_weights: Vec<f32> = attention_mask.iter().map(|&m| m as f32).collect();

            let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(|e| StorageError::Embedding(e.to_string()))?;
            let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask)
                .map_err(|e| StorageError::Embedding(e.to_string()))?;

            let ids_tensor = TensorRef::from_array_view(&ids_array)
                .map_err(|e| StorageError::Embedding(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask_array)
                .map_err(|e| StorageError::Embedding(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| StorageError::Embedding("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![
                    "input_ids" => ids_tensor,
                    "attention_mask" => mask_tensor,
                ])
                .map_err(|e| StorageError::Embedding(format!("ONNX inference failed: {e}")))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| StorageError::Embedding(format!("Output extraction: {e}")))?;

            // [1, seq_len, dim] token states or [1, dim] pooled output.
            let dim = match shape.len() {
                3 => shape[2] as usize,
                2 => shape[1] as usize,
                _ => {
                    return Err(StorageError::Embedding(format!(
                        "Unexpected output shape: {shape:?}"
                    )))
                }
            };
            if dim == 0 || data.len() < dim {
                return Err(StorageError::Embedding(format!("Empty output, shape {shape:?}")));
            }

            let mut pooled = if shape.len() == 3 {
                mean_pool(data, &token_weights, dim)
            } else {
                data[..dim].to_vec()
            };
            l2_normalize(&mut pooled);
            Ok(pooled)
        }
    }

    /// Attention-masked mean over `[seq_len, dim]` token states.
    fn mean_pool(data: &[f32], token_weights: &[f32], dim: usize) -> Vec<f32> {
        let mut pooled = vec![0.0f32; dim];
        let mut total = 0.0f32;
        for (token, &weight) in data.chunks_exact(dim).zip(token_weights) {
            if weight == 0.0 {
                continue;
            }
            for (acc, &x) in pooled.iter_mut().zip(token) {
                *acc += x * weight;
            }
            total += weight;
        }
        if total > 0.0 {
            for x in &mut pooled {
                *x /= total;
            }
        }
        pooled
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, StorageError> {
            self.infer(text)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StorageError> {
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn provider(&self) -> &'static str {
            "local"
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

// ═══════════════════════════════════════════════════════════
// Remote embedder (OpenAI-compatible endpoint)
// ═══════════════════════════════════════════════════════════

const REMOTE_TIMEOUT: Duration = Duration::from_secs(60);
const REMOTE_MAX_RETRIES: usize = 4;
const REMOTE_BATCH_SIZE: usize = 128;

/// Blocking embeddings client for OpenAI-compatible endpoints.
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: usize,
    batch_size: usize,
    dimension: OnceLock<usize>,
}

impl RemoteEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self, StorageError> {
        if api_key.trim().is_empty() {
            return Err(StorageError::ModelInit("missing API key for remote embeddings".into()));
        }
        if model.trim().is_empty() {
            return Err(StorageError::ModelInit("missing remote embedding model name".into()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| StorageError::ModelInit("invalid API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| StorageError::ModelInit(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            max_retries: REMOTE_MAX_RETRIES,
            batch_size: REMOTE_BATCH_SIZE,
            dimension: OnceLock::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, StorageError> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
            };
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().map_err(|e| {
                            StorageError::Embedding(format!("Malformed embeddings response: {e}"))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(StorageError::Embedding(format!(
                                "Endpoint returned {} embeddings for {} inputs",
                                parsed.data.len(),
                                inputs.len()
                            )));
                        }
                        return Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect());
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(%status, attempt, "Embeddings request throttled, retrying");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(StorageError::Embedding(format!(
                        "Embeddings request failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(error = %err, attempt, "Embeddings request failed, retrying");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(StorageError::Embedding(err.to_string()));
                }
            }
        }
    }

    fn check_dimension(&self, vectors: &[Vec<f32>]) -> Result<(), StorageError> {
        for v in vectors {
            let expected = *self.dimension.get_or_init(|| v.len());
            if v.len() != expected {
                return Err(StorageError::Embedding(format!(
                    "Inconsistent embedding dimension: {} vs {expected}",
                    v.len()
                )));
            }
        }
        Ok(())
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request() || err.is_decode()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

impl EmbeddingModel for RemoteEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StorageError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| StorageError::Embedding("Empty embeddings response".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StorageError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.request_batch(batch)?;
            self.check_dimension(&embedded)?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    /// Known after the first successful request; 0 before that.
    fn dimension(&self) -> usize {
        self.dimension.get().copied().unwrap_or(0)
    }

    fn provider(&self) -> &'static str {
        "remote"
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

// ═══════════════════════════════════════════════════════════
// Mock embedder
// ═══════════════════════════════════════════════════════════

/// Deterministic embeddings without a model: lowercase tokens are hashed
/// into buckets (feature hashing), then L2-normalized. Texts sharing words
/// land close together, which keeps vector search meaningful in tests
/// and offline runs.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: MOCK_EMBEDDING_DIM,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StorageError> {
        Ok(hashed_vector(text, self.dimension))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StorageError> {
        Ok(texts
            .iter()
            .map(|t| hashed_vector(t, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

fn hashed_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dim];
    for token in text.to_lowercase().split_whitespace() {
        let digest = Sha256::digest(token.as_bytes());
        let bucket = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) as usize
            % dim;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign;
    }
    l2_normalize(&mut vec);
    vec
}
