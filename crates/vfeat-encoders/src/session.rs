//! ONNX Runtime sessions.
//!
//! Execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use vfeat_models::FeatureTensor;

use crate::error::{EncoderError, EncoderResult};

/// A loaded encoder graph with a single `f32` input and a named output.
///
/// Inference serialises on the session mutex, so one model may be shared by
/// concurrent items.
pub struct OnnxModel {
    session: Mutex<Session>,
    output: &'static str,
    path: PathBuf,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("path", &self.path)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// Load the graph at `path`, reading embeddings from `output`.
    pub fn load(path: &Path, output: &'static str) -> EncoderResult<Self> {
        if !path.exists() {
            return Err(EncoderError::ModelNotFound(path.to_path_buf()));
        }

        let session = Mutex::new(create_session(path)?);
        info!(model = %path.display(), output, "Encoder model loaded");

        Ok(Self {
            session,
            output,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one batch. `shape` is the input shape and `data` its row-major
    /// contents; the output is flattened to `(rows, dim)`.
    pub fn run(&self, shape: Vec<usize>, data: Vec<f32>) -> EncoderResult<FeatureTensor> {
        let input: Value = Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| EncoderError::inference(format!("Failed to create tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EncoderError::session("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| EncoderError::inference(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get(self.output)
            .ok_or_else(|| EncoderError::inference(format!("Missing {} tensor", self.output)))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::inference(format!("Failed to extract tensor: {}", e)))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        output_to_rows(&dims, data)
    }
}

/// Flatten an encoder output to `(rows, dim)`.
///
/// Accepted layouts: `[N, D]`, `[1, T, D]` (batch axis squeezed) and
/// `[N, D, 1, 1]` (pooled convolution output).
pub fn output_to_rows(dims: &[i64], data: &[f32]) -> EncoderResult<FeatureTensor> {
    let dims: Vec<usize> = dims
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<Result<_, _>>()
        .map_err(|_| EncoderError::shape(format!("dynamic dimension in output {dims:?}")))?;

    let (rows, dim) = match dims.as_slice() {
        [n, d] => (*n, *d),
        [1, t, d] => (*t, *d),
        [n, d, 1, 1] => (*n, *d),
        other => return Err(EncoderError::shape(format!("unsupported output shape {other:?}"))),
    };

    if rows * dim != data.len() {
        return Err(EncoderError::shape(format!(
            "output {dims:?} does not match {} values",
            data.len()
        )));
    }

    Ok(FeatureTensor::from_shape_vec(rows, dim, data.to_vec())?)
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> EncoderResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| EncoderError::session(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| EncoderError::session(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    debug!(model = %model_path.display(), "Using CPU execution provider");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| EncoderError::session(format!("Failed to load ONNX model: {}", e)))
}
