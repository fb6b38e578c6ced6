//! ONNX Runtime session shared by every backend variant.
//!
//! Wraps one [`ort`] session with its declared input names. `Session::run`
//! needs `&mut`, so calls into one model are serialised by a mutex that is
//! held for the duration of `run` and output extraction only.

use std::{
    borrow::Cow,
    fmt::Display,
    path::{Path, PathBuf},
    sync::Mutex,
};

use ort::{
    session::{Session, SessionInputValue, SessionInputs},
    value::{DynValue, Tensor},
};
use tracing::debug;

use crate::error::{TtsError, TtsResult};

/// One named model input, ready to bind.
pub(crate) type NamedInput = (String, DynValue);

pub(crate) struct OrtModel {
    path: PathBuf,
    session: Mutex<Session>,
    input_names: Vec<String>,
}

impl OrtModel {
    /// Load `path` into a fresh session. Missing files are reported before ORT is touched.
    pub(crate) fn load(path: &Path, intra_threads: Option<usize>) -> TtsResult<Self> {
        if !path.is_file() {
            return Err(TtsError::ModelNotFound(path.to_path_buf()));
        }
        let load_err = |e: &dyn Display| TtsError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut builder = Session::builder().map_err(|e| load_err(&e))?;
        if let Some(n) = intra_threads {
            builder = builder.with_intra_threads(n).map_err(|e| load_err(&e))?;
        }
        let session = builder.commit_from_file(path).map_err(|e| load_err(&e))?;

        let input_names: Vec<String> =
            session.inputs().iter().map(|input| input.name().to_string()).collect();
        debug!(model = %path.display(), inputs = ?input_names, "ONNX session ready");

        Ok(Self { path: path.to_path_buf(), session: Mutex::new(session), input_names })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Input names in graph order.
    pub(crate) fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Fail construction unless the graph declares at least `n` inputs.
    pub(crate) fn expect_inputs(&self, n: usize) -> TtsResult<()> {
        if self.input_names.len() < n {
            return Err(TtsError::ModelLoad {
                path: self.path.clone(),
                reason: format!(
                    "graph declares {} inputs {:?}, expected at least {}",
                    self.input_names.len(),
                    self.input_names,
                    n
                ),
            });
        }
        Ok(())
    }

    /// Run the graph and return output 0 as `(shape, f32 data)`.
    pub(crate) fn run(&self, inputs: Vec<NamedInput>) -> TtsResult<(Vec<usize>, Vec<f32>)> {
        let inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = inputs
            .into_iter()
            .map(|(name, value)| (Cow::Owned(name), SessionInputValue::from(value)))
            .collect();

        let mut session = self
            .session
            .lock()
            .map_err(|_| TtsError::inference("ONNX session mutex poisoned"))?;
        let outputs = session
            .run(SessionInputs::from(inputs))
            .map_err(|e| TtsError::inference(format!("ONNX inference failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| TtsError::inference(format!("Failed to extract output tensor: {e}")))?;
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((shape, data.to_vec()))
    }
}

// ── Tensor builders ───────────────────────────────────────────────────────────

fn tensor_err(what: &str, e: impl Display) -> TtsError {
    TtsError::inference(format!("Failed to build {what} tensor: {e}"))
}

/// `[1, len]` int64 token batch.
pub(crate) fn ids_tensor(ids: &[i64]) -> TtsResult<DynValue> {
    Tensor::<i64>::from_array(([1usize, ids.len()], ids.to_vec()))
        .map(|t| t.into_dyn())
        .map_err(|e| tensor_err("input_ids", e))
}

/// `[1, len]` float32 style batch.
pub(crate) fn style_tensor(style: &[f32]) -> TtsResult<DynValue> {
    Tensor::<f32>::from_array(([1usize, style.len()], style.to_vec()))
        .map(|t| t.into_dyn())
        .map_err(|e| tensor_err("style", e))
}

/// `[1]` float32 speed.
pub(crate) fn speed_tensor(speed: f32) -> TtsResult<DynValue> {
    Tensor::<f32>::from_array(([1usize], vec![speed]))
        .map(|t| t.into_dyn())
        .map_err(|e| tensor_err("speed", e))
}
