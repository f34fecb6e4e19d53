//! Pre-computed taxonomy prompt embeddings.
//!
//! The prompt bank stores a flat N×D matrix of text embeddings, one row per
//! taxonomy term, so scoring an image is a single pass of dot products. The
//! taxonomy is static, so the bank is also cached on disk and reused across
//! processes as long as the cache key (model + prompts) matches.

use std::path::Path;

use crate::error::PipelineError;

use super::text_encoder::SigLipTextEncoder;

/// Pre-computed prompt embeddings, row-major.
#[derive(Clone)]
pub struct PromptBank {
    matrix: Vec<f32>,
    embedding_dim: usize,
    term_count: usize,
}

impl PromptBank {
    /// Build a bank from a pre-computed matrix.
    pub fn from_raw(
        matrix: Vec<f32>,
        embedding_dim: usize,
        term_count: usize,
    ) -> Result<Self, PipelineError> {
        if matrix.len() != embedding_dim * term_count {
            return Err(PipelineError::Model {
                message: format!(
                    "Matrix size ({}) does not match {} terms × {} dim",
                    matrix.len(),
                    term_count,
                    embedding_dim
                ),
            });
        }
        Ok(Self {
            matrix,
            embedding_dim,
            term_count,
        })
    }

    /// Encode every prompt, batching many prompts per ONNX call.
    pub fn encode_all(
        prompts: &[String],
        text_encoder: &SigLipTextEncoder,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        let mut matrix: Vec<f32> = Vec::new();
        let mut embedding_dim = 0;

        tracing::info!("Encoding {} taxonomy prompts...", prompts.len());
        for chunk in prompts.chunks(batch_size.max(1)) {
            for emb in text_encoder.encode_batch(chunk)? {
                embedding_dim = emb.len();
                matrix.extend_from_slice(&emb);
            }
        }

        Self::from_raw(matrix, embedding_dim, prompts.len())
    }

    /// Cache key for a model and prompt list.
    ///
    /// Any change to the model name, template or taxonomy changes the key and
    /// invalidates the on-disk cache.
    pub fn cache_key(model: &str, prompts: &[String]) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(model.as_bytes());
        hasher.update(b"\0");
        for prompt in prompts {
            hasher.update(prompt.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Save the bank as raw little-endian f32 plus a `.meta` sidecar holding
    /// the cache key.
    pub fn save(&self, path: &Path, cache_key: &str) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::Model {
                message: format!("Failed to create {:?}: {e}", parent),
            })?;
        }

        let bytes: Vec<u8> = self.matrix.iter().flat_map(|f| f.to_le_bytes()).collect();
        std::fs::write(path, &bytes).map_err(|e| PipelineError::Model {
            message: format!("Failed to save prompt bank to {:?}: {e}", path),
        })?;

        let meta_path = path.with_extension("meta");
        let meta = format!(
            "cache_key={}\nterm_count={}\nembedding_dim={}\n",
            cache_key, self.term_count, self.embedding_dim
        );
        std::fs::write(&meta_path, meta).map_err(|e| PipelineError::Model {
            message: format!("Failed to save prompt bank metadata to {:?}: {e}", meta_path),
        })?;

        tracing::debug!("Saved prompt bank to {:?}", path);
        Ok(())
    }

    /// Load a cached bank if its sidecar matches `cache_key` and the payload
    /// has the expected size. Returns `None` on any mismatch.
    pub fn load_cached(path: &Path, cache_key: &str, term_count: usize) -> Option<Self> {
        let meta = std::fs::read_to_string(path.with_extension("meta")).ok()?;
        let field = |name: &str| {
            meta.lines()
                .find_map(|line| line.strip_prefix(name)?.strip_prefix('='))
                .map(str::to_string)
        };

        if field("cache_key")? != cache_key {
            return None;
        }
        if field("term_count")?.parse::<usize>().ok()? != term_count {
            return None;
        }
        let embedding_dim: usize = field("embedding_dim")?.parse().ok()?;

        let bytes = std::fs::read(path).ok()?;
        if bytes.len() != term_count * embedding_dim * 4 {
            tracing::warn!("Prompt bank cache {:?} has unexpected size; rebuilding", path);
            return None;
        }

        let matrix: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        tracing::debug!("Loaded prompt bank: {} terms from {:?}", term_count, path);
        Some(Self {
            matrix,
            embedding_dim,
            term_count,
        })
    }

    /// Dot product of `embedding` with every row.
    pub fn similarities(&self, embedding: &[f32]) -> Vec<f32> {
        if embedding.len() != self.embedding_dim {
            return vec![];
        }
        self.matrix
            .chunks_exact(self.embedding_dim)
            .map(|row| row.iter().zip(embedding).map(|(a, b)| a * b).sum())
            .collect()
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn term_count(&self) -> usize {
        self.term_count
    }
}
