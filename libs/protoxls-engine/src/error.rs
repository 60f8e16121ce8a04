use protoxls_api::{OutputFormat, RenderError, StoreError};

use crate::coerce::CoerceError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("workbook '{path}': {detail}")]
    Workbook { path: String, detail: String },

    #[error("sheet '{sheet}' has insufficient data (need at least header + 1 data row)")]
    InsufficientData { sheet: String },

    #[error("failed to parse row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: CoerceError,
    },

    #[error("failed to build store: {0}")]
    Store(#[from] StoreError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("no renderer registered for format '{0}'")]
    NoRenderer(OutputFormat),

    #[error("export task failed: {0}")]
    Task(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Add context to the error.
    ///
    /// Free-text variants get the context prepended; structured variants
    /// are returned unchanged.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            EngineError::Schema(msg) => EngineError::Schema(format!("{ctx}: {msg}")),
            EngineError::Render(e) => EngineError::Render(e.with_context(ctx)),
            EngineError::Io(e) => EngineError::Io(std::io::Error::new(e.kind(), format!("{ctx}: {e}"))),
            other => other,
        }
    }
}
