use thiserror::Error;

/// Failures raised by the pipeline components. None of these are recovered
/// internally; callers surface them as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("malformed date: {value:?}")]
    MalformedDate { value: String },

    #[error("malformed currency value: {value:?}")]
    MalformedCurrency { value: String },

    #[error("cannot compute {what} over an empty series")]
    EmptySeries { what: &'static str },

    #[error("missing column: {column}")]
    MissingColumn { column: String },

    #[error("{what} overflows the decimal range")]
    AmountOverflow { what: &'static str },

    #[error("window size must be >= 1 (got {size})")]
    InvalidWindow { size: usize },
}

impl PipelineError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn overflow(what: &'static str) -> Self {
        Self::AmountOverflow { what }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
