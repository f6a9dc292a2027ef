use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdaError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Value '{value}' is outside the vocabulary of column '{column}'")]
    ValueOutsideVocabulary { column: String, value: String },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "python")]
mod python {
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::PyErr;

    use super::EdaError;

    impl From<EdaError> for PyErr {
        fn from(err: EdaError) -> PyErr {
            match err {
                EdaError::MissingColumn(_) | EdaError::InvalidData(_) => {
                    PyValueError::new_err(err.to_string())
                }
                _ => PyRuntimeError::new_err(err.to_string()),
            }
        }
    }
}
