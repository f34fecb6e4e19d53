//! SigLIP text encoder for taxonomy prompts.
//!
//! Embeds prompt strings into the same space as the vision encoder. Only used
//! when the prompt bank has to be (re)built.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;
use tokenizers::Tokenizer;

use crate::embedding::siglip::POOLED_OUTPUT;
use crate::error::PipelineError;
use crate::math::l2_normalize;
use crate::onnx;

/// Fixed sequence length the text model was exported with.
const MAX_LENGTH: usize = 64;

const TEXT_MODEL_FILENAME: &str = "text_model.onnx";
const TOKENIZER_FILENAME: &str = "tokenizer.json";

pub struct SigLipTextEncoder {
    session: Mutex<Session>,
    input_name: String,
    tokenizer: Tokenizer,
}

impl SigLipTextEncoder {
    /// Load `text_model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn new(model_dir: &Path) -> Result<Self, PipelineError> {
        let model_path = model_dir.join(TEXT_MODEL_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);
        for required in [&model_path, &tokenizer_path] {
            if !required.exists() {
                return Err(model_error(format!("Missing text encoder file {:?}", required)));
            }
        }

        let session = onnx::load_session(&model_path)?;
        let input_name = onnx::first_input_name(&session, "input_ids");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| model_error(format!("Failed to load tokenizer: {e}")))?;
        tracing::debug!("Loaded SigLIP text encoder from {:?}", model_dir);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            tokenizer,
        })
    }

    /// L2-normalized embeddings, one per text, in input order.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| model_error(format!("Tokenization failed: {e}")))?;
        let ids: Vec<&[u32]> = encodings.iter().map(|e| e.get_ids()).collect();
        let input_ids = pad_token_ids(&ids, MAX_LENGTH);
        let input_value = Value::from_array((vec![texts.len() as i64, MAX_LENGTH as i64], input_ids))
            .map_err(|e| model_error(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| model_error(format!("Text encoder lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| model_error(format!("Text encoder inference failed: {e}")))?;

        let (_, pooled) = outputs
            .iter()
            .find(|(name, _)| *name == POOLED_OUTPUT)
            .ok_or_else(|| model_error(format!("Text encoder did not produce {POOLED_OUTPUT}")))?;
        let (shape, data) = pooled
            .try_extract_tensor::<f32>()
            .map_err(|e| model_error(format!("Failed to extract {POOLED_OUTPUT}: {e}")))?;

        let rows = onnx::split_rows(&shape[..], data).map_err(model_error)?;
        if rows.len() != texts.len() {
            return Err(model_error(format!(
                "Text encoder returned {} embeddings for {} prompts",
                rows.len(),
                texts.len()
            )));
        }
        Ok(rows.iter().map(|row| l2_normalize(row)).collect())
    }
}

/// Flatten token ids into a `[batch, max_length]` matrix, truncating long
/// sequences and zero-padding short ones. The text model takes no attention
/// mask.
fn pad_token_ids(sequences: &[&[u32]], max_length: usize) -> Vec<i64> {
    let mut flat = vec![0i64; sequences.len() * max_length];
    for (row, ids) in flat.chunks_exact_mut(max_length).zip(sequences) {
        for (slot, &id) in row.iter_mut().zip(ids.iter()) {
            *slot = i64::from(id);
        }
    }
    flat
}

fn model_error(message: String) -> PipelineError {
    PipelineError::Model { message }
}
