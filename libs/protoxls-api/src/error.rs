/// Failure while partitioning records into a [`Store`](crate::store::Store).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key field '{field}' not found in message {message}")]
    UnknownKeyField { field: String, message: String },

    /// `row` is the number the record was tagged with in
    /// [`Store::build_numbered`](crate::store::Store::build_numbered), or
    /// its input index for [`Store::build`](crate::store::Store::build).
    #[error("key field '{field}' is empty at row {row}")]
    MissingKey { field: String, row: usize },

    #[error("key field '{field}' has unsupported type {kind}")]
    UnsupportedKey { field: String, kind: String },
}

/// Failure while rendering a store into one target format.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("non-finite number {0} has no literal form")]
    NonFinite(f64),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("encode: {0}")]
    Encode(String),

    #[error("payload too large for 4-byte length prefix: {0} bytes")]
    FrameTooLarge(usize),

    #[error("truncated frame at offset {offset}: need {need} bytes, have {have}")]
    TruncatedFrame { offset: usize, need: usize, have: usize },
}

impl RenderError {
    /// Prefix the message with context, keeping the variant where it
    /// carries free text.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            RenderError::Unsupported(m) => RenderError::Unsupported(format!("{ctx}: {m}")),
            RenderError::Encode(m) => RenderError::Encode(format!("{ctx}: {m}")),
            other => other,
        }
    }
}
