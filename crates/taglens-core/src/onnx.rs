//! ONNX Runtime helpers shared by the vision encoder, text encoder and the
//! local classifier.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::PipelineError;

/// Build a session from a model file on disk.
pub(crate) fn load_session(model_path: &Path) -> Result<Session, PipelineError> {
    Session::builder()
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to create ONNX session builder: {e}"),
        })?
        .commit_from_file(model_path)
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to load ONNX model {:?}: {e}", model_path),
        })
}

/// Name of the first input, falling back to `default` when the model
/// metadata doesn't list one.
pub(crate) fn first_input_name(session: &Session, default: &str) -> String {
    session
        .inputs()
        .first()
        .map(|i| i.name().to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Convert a 4D tensor into an ort input value.
///
/// Goes through (shape, flat_data) so the conversion doesn't depend on the
/// ndarray version ort was built against.
pub(crate) fn tensor_value(
    tensor: &Array4<f32>,
    path: &Path,
) -> Result<Tensor<f32>, PipelineError> {
    let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
    let flat_data: Vec<f32> = tensor.iter().copied().collect();
    Tensor::from_array((shape, flat_data)).map_err(|e| PipelineError::Inference {
        path: path.to_path_buf(),
        message: format!("Failed to create input tensor: {e}"),
    })
}

/// Split a `[batch, dim]` (or `[dim]`) output into one row per batch item.
pub(crate) fn split_rows(shape: &[i64], data: &[f32]) -> Result<Vec<Vec<f32>>, String> {
    let dim = match shape {
        [dim] | [_, dim] => *dim,
        other => return Err(format!("unexpected output shape {other:?}")),
    };
    let dim = usize::try_from(dim)
        .ok()
        .filter(|&d| d > 0)
        .ok_or_else(|| format!("invalid output dimension {dim}"))?;
    if data.len() % dim != 0 {
        return Err(format!("{} values do not divide into rows of {dim}", data.len()));
    }
    Ok(data.chunks_exact(dim).map(<[f32]>::to_vec).collect())
}
