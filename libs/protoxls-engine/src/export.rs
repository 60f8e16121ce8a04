use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use protoxls_api::{MessageSchema, OutputFormat, RenderOptions, Renderer, Store};

use crate::error::EngineError;
use crate::record::RecordBuilder;
use crate::workbook::WorkbookReader;

/// Output directory used when no target is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

// ════════════════════════════════════════════════════════════════
//  Plan
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub format: OutputFormat,
    pub dir: PathBuf,
}

/// What to write and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub targets: Vec<OutputTarget>,
    pub options: RenderOptions,
}

impl ExportPlan {
    /// With no targets the plan writes json into [`DEFAULT_OUTPUT_DIR`].
    pub fn new(targets: Vec<OutputTarget>, options: RenderOptions) -> Self {
        let targets = if targets.is_empty() {
            vec![OutputTarget {
                format: OutputFormat::Json,
                dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            }]
        } else {
            targets
        };
        Self { targets, options }
    }
}

impl Default for ExportPlan {
    fn default() -> Self {
        Self::new(Vec::new(), RenderOptions::default())
    }
}

// ════════════════════════════════════════════════════════════════
//  Renderer Registry
// ════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<OutputFormat, Arc<dyn Renderer>>,
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.renderers.keys().collect();
        formats.sort();
        f.debug_struct("RendererRegistry")
            .field("formats", &formats)
            .finish()
    }
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer, replacing any previous one for its format.
    pub fn register(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderers.insert(renderer.format(), renderer);
    }

    pub fn with(mut self, renderer: impl Renderer + 'static) -> Self {
        self.register(Arc::new(renderer));
        self
    }

    pub fn get(&self, format: OutputFormat) -> Option<&Arc<dyn Renderer>> {
        self.renderers.get(&format)
    }
}

// ════════════════════════════════════════════════════════════════
//  Report
// ════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ExportFailure {
    /// Full name of the message being exported.
    pub message: String,
    /// `None` when the failure happened before any format was rendered.
    pub format: Option<OutputFormat>,
    pub error: EngineError,
}

impl std::fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.format {
            Some(format) => write!(f, "{} [{format}]: {}", self.message, self.error),
            None => write!(f, "{}: {}", self.message, self.error),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: ExportReport) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, message: &str, format: Option<OutputFormat>, error: EngineError) {
        match format {
            Some(format) => tracing::error!(schema = message, %format, error = %error, "export failed"),
            None => tracing::error!(schema = message, error = %error, "export failed"),
        }
        self.failures.push(ExportFailure {
            message: message.to_string(),
            format,
            error,
        });
    }
}

// ════════════════════════════════════════════════════════════════
//  Exporter
// ════════════════════════════════════════════════════════════════

/// Drives sheet → records → store → rendered files for every table
/// message.
pub struct Exporter {
    registry: RendererRegistry,
    reader: Arc<dyn WorkbookReader>,
    plan: ExportPlan,
    search_paths: Vec<PathBuf>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("registry", &self.registry)
            .field("plan", &self.plan)
            .field("search_paths", &self.search_paths)
            .finish()
    }
}

impl Exporter {
    pub fn new(registry: RendererRegistry, reader: Arc<dyn WorkbookReader>, plan: ExportPlan) -> Self {
        Self {
            registry,
            reader,
            plan,
            search_paths: Vec::new(),
        }
    }

    /// Directories searched, in order, for relative workbook paths.
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    pub fn plan(&self) -> &ExportPlan {
        &self.plan
    }

    /// First search directory containing `excel`, else `excel` as given.
    pub fn resolve_path(&self, excel: &str) -> PathBuf {
        let path = Path::new(excel);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| path.to_path_buf())
    }

    /// Read the message's sheet and partition its records.
    pub fn load_store(&self, schema: &Arc<MessageSchema>) -> Result<Store, EngineError> {
        let table = schema
            .table
            .as_ref()
            .ok_or_else(|| EngineError::Schema(format!("{} has no excel/sheet options", schema.full_name)))?;

        let path = self.resolve_path(&table.excel);
        let rows = self.reader.read_sheet(&path, &table.sheet)?;
        let records = RecordBuilder::new(schema.clone()).build_sheet(&table.sheet, &rows)?;
        tracing::info!(
            schema = %schema.full_name,
            sheet = %table.sheet,
            rows = records.len(),
            "parsed sheet"
        );

        Ok(Store::build_numbered(schema.clone(), records, &table.keys)?)
    }

    /// Render `store` into every planned format. A failing format does not
    /// stop the others.
    pub fn export_store(&self, schema: &MessageSchema, store: &Store) -> ExportReport {
        let mut report = ExportReport::default();
        for target in &self.plan.targets {
            match self.write_target(schema, store, target) {
                Ok(path) => {
                    tracing::info!(schema = %schema.full_name, path = %path.display(), "wrote file");
                    report.written.push(path);
                }
                Err(e) => report.fail(&schema.full_name, Some(target.format), e),
            }
        }
        report
    }

    fn write_target(
        &self,
        schema: &MessageSchema,
        store: &Store,
        target: &OutputTarget,
    ) -> Result<PathBuf, EngineError> {
        let renderer = self
            .registry
            .get(target.format)
            .ok_or(EngineError::NoRenderer(target.format))?;
        let bytes = renderer.render(store, &self.plan.options)?;

        ensure_dir(&target.dir).map_err(|e| EngineError::from(e).with_context(target.dir.display()))?;
        let path = output_path(&target.dir, schema, target.format);
        write_atomic(&path, &bytes).map_err(|e| EngineError::from(e).with_context(path.display()))?;
        Ok(path)
    }

    /// Full pipeline for one message.
    pub fn export_message(&self, schema: &Arc<MessageSchema>) -> ExportReport {
        match self.load_store(schema) {
            Ok(store) => self.export_store(schema, &store),
            Err(e) => {
                let mut report = ExportReport::default();
                report.fail(&schema.full_name, None, e);
                report
            }
        }
    }

    /// Export every message in order on the current thread.
    pub fn run(&self, schemas: &[Arc<MessageSchema>]) -> ExportReport {
        let mut report = ExportReport::default();
        for schema in schemas {
            report.merge(self.export_message(schema));
        }
        report
    }

    /// Export messages on the blocking pool, one task per message. The
    /// merged report lists messages in input order.
    pub async fn run_concurrent(self: Arc<Self>, schemas: Vec<Arc<MessageSchema>>) -> ExportReport {
        let mut tasks = tokio::task::JoinSet::new();
        for (idx, schema) in schemas.iter().enumerate() {
            let exporter = Arc::clone(&self);
            let schema = schema.clone();
            tasks.spawn_blocking(move || (idx, exporter.export_message(&schema)));
        }

        let mut slots: Vec<Option<ExportReport>> = schemas.iter().map(|_| None).collect();
        let mut join_errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, report)) => slots[idx] = Some(report),
                Err(e) => join_errors.push(e.to_string()),
            }
        }

        let mut report = ExportReport::default();
        for (schema, slot) in schemas.iter().zip(slots) {
            match slot {
                Some(r) => report.merge(r),
                None => {
                    let detail = if join_errors.is_empty() {
                        "task did not complete".to_string()
                    } else {
                        join_errors.join("; ")
                    };
                    report.fail(&schema.full_name, None, EngineError::Task(detail));
                }
            }
        }
        report
    }
}

// ════════════════════════════════════════════════════════════════
//  Files
// ════════════════════════════════════════════════════════════════

/// `<dir>/<export name>.<ext>`
pub fn output_path(dir: &Path, schema: &MessageSchema, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}.{}", schema.export_name(), format.extension()))
}

/// Create `dir` and its parents, mode 0o755 on unix.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}

/// Write through a temp file in the target directory, then rename over
/// `path`. Readers never observe a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
