//! SigLIP vision encoder session.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;

use crate::error::PipelineError;
use crate::math::l2_normalize_in_place;
use crate::onnx;

/// Output holding the cross-modal projection. `last_hidden_state` is not
/// aligned with the text encoder.
pub(crate) const POOLED_OUTPUT: &str = "pooler_output";

/// Visual encoder session. `Session::run` needs `&mut self`, hence the `Mutex`.
pub struct SigLipSession {
    session: Mutex<Session>,
    input_name: String,
}

impl SigLipSession {
    pub fn load(model_path: &Path) -> Result<Self, PipelineError> {
        let session = onnx::load_session(model_path)?;
        let input_name = onnx::first_input_name(&session, "pixel_values");
        tracing::debug!("Loaded SigLIP vision encoder {:?} (input {:?})", model_path, input_name);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    /// L2-normalized embedding of a `[1, 3, size, size]` NCHW tensor.
    pub fn embed(&self, preprocessed: &Array4<f32>, path: &Path) -> Result<Vec<f32>, PipelineError> {
        let failed = |message: String| PipelineError::Embedding {
            path: path.to_path_buf(),
            message,
        };

        let input_value = onnx::tensor_value(preprocessed, path)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| failed(format!("Session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| failed(format!("ONNX inference failed: {e}")))?;

        let (_, pooled) = outputs
            .iter()
            .find(|(name, _)| *name == POOLED_OUTPUT)
            .ok_or_else(|| failed(format!("Model did not produce {POOLED_OUTPUT}")))?;
        let (shape, data) = pooled
            .try_extract_tensor::<f32>()
            .map_err(|e| failed(format!("Failed to extract {POOLED_OUTPUT}: {e}")))?;

        let mut embedding = onnx::split_rows(&shape[..], data)
            .map_err(failed)?
            .into_iter()
            .next()
            .ok_or_else(|| failed(format!("Empty {POOLED_OUTPUT}")))?;
        l2_normalize_in_place(&mut embedding);
        Ok(embedding)
    }
}
