use crate::error::RenderError;
use crate::store::Store;

/// Target encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    /// Object notation.
    Json,
    /// Embedded-language table literal.
    Lua,
    /// Length-prefixed native wire encoding.
    Bin,
    /// Structured document.
    Yaml,
    /// Array literal.
    Php,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Json,
        OutputFormat::Lua,
        OutputFormat::Bin,
        OutputFormat::Yaml,
        OutputFormat::Php,
    ];

    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Lua => "lua",
            OutputFormat::Bin => "bin",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Php => "php",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "lua" => Ok(OutputFormat::Lua),
            "bin" | "binary" => Ok(OutputFormat::Bin),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "php" => Ok(OutputFormat::Php),
            other => Err(format!("unknown output format {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Single-line output for json, lua and php.
    pub compact: bool,
    /// Render json and lua nested leaves holding several records as arrays
    /// instead of keeping only the first record.
    pub nested_leaf_arrays: bool,
}

/// How a leaf node's record list is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafShape {
    /// A lone record unwrapped to a bare object, otherwise a sequence.
    Unwrapped,
    /// The first record alone; any others are dropped.
    First,
}

impl LeafShape {
    /// Shape of json and lua nested leaves under `opts`.
    pub fn nested(opts: &RenderOptions) -> Self {
        if opts.nested_leaf_arrays {
            LeafShape::Unwrapped
        } else {
            LeafShape::First
        }
    }

    /// Whether a leaf of `records` renders as a single bare record.
    pub fn unwrap_single(self, records: usize) -> bool {
        match self {
            LeafShape::Unwrapped => records == 1,
            LeafShape::First => records >= 1,
        }
    }

    /// Records left out of a leaf of `records`.
    pub fn dropped(self, records: usize) -> usize {
        match self {
            LeafShape::Unwrapped => 0,
            LeafShape::First => records.saturating_sub(1),
        }
    }
}

/// Renders a store into one target format.
///
/// Implementations are pure: no shared state, no I/O. The orchestrator owns
/// file handling.
pub trait Renderer: Send + Sync {
    fn format(&self) -> OutputFormat;
    fn render(&self, store: &Store, opts: &RenderOptions) -> Result<Vec<u8>, RenderError>;
}
