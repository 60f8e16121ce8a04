use std::path::PathBuf;

use serde::Deserialize;

use protoxls_api::{OutputFormat, RenderOptions};

use crate::error::EngineError;
use crate::export::{ExportPlan, OutputTarget};

/// Root configuration, parsed from TOML.
///
/// ```toml
/// descriptors = ["game.pb"]
/// protos = ["proto/game.proto"]
/// include = ["proto", "data"]
/// compact = false
///
/// [output]
/// json = "out/json"
/// lua = "out/lua"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtoxlsConfig {
    /// Compiled descriptor sets.
    #[serde(default)]
    pub descriptors: Vec<PathBuf>,

    /// `.proto` sources, compiled at start-up.
    #[serde(default)]
    pub protos: Vec<PathBuf>,

    /// Import paths for `protos`, also searched for relative workbook
    /// paths.
    #[serde(default)]
    pub include: Vec<PathBuf>,

    #[serde(default)]
    pub compact: bool,

    /// Keep every record of a json/lua nested leaf instead of the first.
    #[serde(default)]
    pub nested_leaf_arrays: bool,

    /// Process messages on a worker pool.
    #[serde(default)]
    pub concurrent: bool,

    #[serde(default)]
    pub output: OutputConfig,
}

/// One output directory per format. `all` applies to every format without
/// a directory of its own.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub all: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub lua: Option<PathBuf>,
    pub bin: Option<PathBuf>,
    pub yaml: Option<PathBuf>,
    pub php: Option<PathBuf>,
}

impl OutputConfig {
    pub fn dir(&self, format: OutputFormat) -> Option<&PathBuf> {
        let own = match format {
            OutputFormat::Json => &self.json,
            OutputFormat::Lua => &self.lua,
            OutputFormat::Bin => &self.bin,
            OutputFormat::Yaml => &self.yaml,
            OutputFormat::Php => &self.php,
        };
        own.as_ref().or(self.all.as_ref())
    }

    /// Configured targets in format order. Empty when nothing is set.
    pub fn targets(&self) -> Vec<OutputTarget> {
        OutputFormat::ALL
            .into_iter()
            .filter_map(|format| {
                self.dir(format).map(|dir| OutputTarget {
                    format,
                    dir: dir.clone(),
                })
            })
            .collect()
    }
}

impl ProtoxlsConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn plan(&self) -> ExportPlan {
        ExportPlan::new(
            self.output.targets(),
            RenderOptions {
                compact: self.compact,
                nested_leaf_arrays: self.nested_leaf_arrays,
            },
        )
    }
}
