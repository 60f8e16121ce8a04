pub mod adapter;
pub mod coerce;
pub mod config;
pub mod error;
pub mod export;
pub mod record;
pub mod workbook;

pub use adapter::{SchemaAdapter, compile_protos, load_descriptor_sets, load_schemas, table_schemas};
pub use coerce::{CoerceError, HeaderMap, RowCells, TypeClass, coerce_field, coerce_message};
pub use config::{OutputConfig, ProtoxlsConfig};
pub use error::EngineError;
pub use export::{
    ExportFailure, ExportPlan, ExportReport, Exporter, OutputTarget, RendererRegistry, output_path,
    write_atomic,
};
pub use record::RecordBuilder;
pub use workbook::{CalamineReader, MemoryWorkbook, WorkbookReader};
