// /src/errors.rs
//! Error type shared by the engine, the stub hooks and the optional Python binding
use crate::types::{Identity, TargetId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Identity {identity} bound twice in one cycle (second occurrence under '{parent_id}')")]
    DuplicateIdentity {
        identity: Identity,
        parent_id: TargetId,
    },

    #[error("Stub generation failed for widget '{widget_type}': {details}")]
    StubGeneration { widget_type: String, details: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Type conversion error: expected {expected}, got {actual}")]
    TypeConversionError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[cfg(feature = "python")]
    #[error("Python call failed: {0}")]
    PythonError(String),
}

#[cfg(feature = "python")]
impl From<ReconcilerError> for pyo3::PyErr {
    fn from(err: ReconcilerError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for ReconcilerError {
    fn from(err: pyo3::PyErr) -> Self {
        ReconcilerError::PythonError(err.to_string())
    }
}
