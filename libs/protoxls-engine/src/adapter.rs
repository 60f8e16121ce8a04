use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use prost_reflect::{
    DescriptorPool, DynamicMessage, EnumDescriptor, ExtensionDescriptor, FieldDescriptor, Kind,
    MessageDescriptor, ReflectMessage,
};

use protoxls_api::{EnumMember, EnumSchema, FieldKind, FieldSchema, MessageSchema, TableSchema};

use crate::error::EngineError;

/// Separator of the `keys` message option.
pub const KEY_SEPARATOR: char = ';';

const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";
const FIELD_OPTIONS: &str = "google.protobuf.FieldOptions";
const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";

/// Decode and merge compiled descriptor sets
/// (`protoc --include_imports --descriptor_set_out=...`).
pub fn load_descriptor_sets<P: AsRef<Path>>(paths: &[P]) -> Result<DescriptorPool, EngineError> {
    if paths.is_empty() {
        return Err(EngineError::Config("no descriptor set given".into()));
    }
    let mut pool = DescriptorPool::new();
    for path in paths {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            EngineError::Schema(format!("failed to read descriptor set '{}': {e}", path.display()))
        })?;
        pool.decode_file_descriptor_set(bytes.as_slice()).map_err(|e| {
            EngineError::Schema(format!("failed to parse descriptor set '{}': {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded descriptor set");
    }
    Ok(pool)
}

/// Compile `.proto` sources, resolving imports against `includes`, and
/// merge them into one pool. The current directory is searched when
/// `includes` is empty; the well-known `google/protobuf` files are always
/// available.
pub fn compile_protos<P: AsRef<Path>, I: AsRef<Path>>(
    files: &[P],
    includes: &[I],
) -> Result<DescriptorPool, EngineError> {
    let mut pool = DescriptorPool::new();
    add_protos(&mut pool, files, includes)?;
    Ok(pool)
}

/// Descriptor sets and `.proto` sources merged into one pool. At least one
/// of the two lists must be non-empty.
pub fn load_schemas<D, P, I>(descriptors: &[D], protos: &[P], includes: &[I]) -> Result<DescriptorPool, EngineError>
where
    D: AsRef<Path>,
    P: AsRef<Path>,
    I: AsRef<Path>,
{
    if protos.is_empty() {
        return load_descriptor_sets(descriptors);
    }
    let mut pool = if descriptors.is_empty() {
        DescriptorPool::new()
    } else {
        load_descriptor_sets(descriptors)?
    };
    add_protos(&mut pool, protos, includes)?;
    Ok(pool)
}

fn add_protos<P: AsRef<Path>, I: AsRef<Path>>(
    pool: &mut DescriptorPool,
    files: &[P],
    includes: &[I],
) -> Result<(), EngineError> {
    if files.is_empty() {
        return Err(EngineError::Config("no proto file given".into()));
    }
    let includes: Vec<&Path> = if includes.is_empty() {
        vec![Path::new(".")]
    } else {
        includes.iter().map(AsRef::as_ref).collect()
    };

    let mut compiler = protox::Compiler::new(includes)
        .map_err(|e| EngineError::Schema(format!("invalid import path: {e}")))?;
    compiler.include_imports(true);
    compiler
        .open_files(files.iter().map(AsRef::as_ref))
        .map_err(|e| EngineError::Schema(format!("failed to compile proto files: {e}")))?;

    // encoded form: custom option values survive the round trip
    let bytes = compiler.encode_file_descriptor_set();
    pool.decode_file_descriptor_set(bytes.as_slice())
        .map_err(|e| EngineError::Schema(format!("failed to load compiled protos: {e}")))?;
    for file in files {
        tracing::debug!(path = %file.as_ref().display(), "compiled proto file");
    }
    Ok(())
}

/// Every exportable top-level message in pool order.
///
/// Messages with no table annotations are ignored; messages whose
/// annotations are incomplete or whose schema cannot be built are skipped
/// with a warning.
pub fn table_schemas(pool: &DescriptorPool) -> Vec<Arc<MessageSchema>> {
    SchemaAdapter::new(pool.clone()).tables()
}

// ════════════════════════════════════════════════════════════════
//  Schema Adapter
// ════════════════════════════════════════════════════════════════

/// Builds `MessageSchema` trees from a descriptor pool, resolving the
/// custom option annotations once.
pub struct SchemaAdapter {
    pool: DescriptorPool,
    /// options message full name → short extension name → extension
    extensions: HashMap<String, HashMap<String, ExtensionDescriptor>>,
    messages: HashMap<String, Arc<MessageSchema>>,
    enums: HashMap<String, Arc<EnumSchema>>,
    /// Messages currently being built, outermost first.
    visiting: Vec<String>,
}

impl std::fmt::Debug for SchemaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaAdapter")
            .field("messages", &self.messages.len())
            .field("enums", &self.enums.len())
            .finish()
    }
}

impl SchemaAdapter {
    pub fn new(pool: DescriptorPool) -> Self {
        let mut extensions: HashMap<String, HashMap<String, ExtensionDescriptor>> = HashMap::new();
        for ext in pool.all_extensions() {
            let extendee = ext.containing_message().full_name().to_string();
            let by_name = extensions.entry(extendee).or_default();
            if by_name.contains_key(ext.name()) {
                tracing::warn!(
                    extension = %ext.full_name(),
                    "duplicate option name, keeping the first declaration"
                );
                continue;
            }
            by_name.insert(ext.name().to_string(), ext);
        }
        Self {
            pool,
            extensions,
            messages: HashMap::new(),
            enums: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    pub fn tables(&mut self) -> Vec<Arc<MessageSchema>> {
        let candidates: Vec<MessageDescriptor> = self
            .pool
            .all_messages()
            .filter(|md| md.parent_message().is_none())
            .collect();

        let mut tables = Vec::new();
        for md in candidates {
            let options = md.options();
            let excel = self.annotation(&options, "excel");
            let sheet = self.annotation(&options, "sheet");
            match (&excel, &sheet) {
                (None, None) => continue,
                (Some(_), Some(_)) => {}
                _ => {
                    tracing::warn!(
                        schema = %md.full_name(),
                        "message needs both excel and sheet options, skipping"
                    );
                    continue;
                }
            }
            match self.message(&md) {
                Ok(schema) => tables.push(schema),
                Err(e) => tracing::warn!(schema = %md.full_name(), error = %e, "skipping message"),
            }
        }
        tables
    }

    /// Schema for `md`, memoised by full name.
    pub fn message(&mut self, md: &MessageDescriptor) -> Result<Arc<MessageSchema>, EngineError> {
        let full_name = md.full_name();
        if let Some(schema) = self.messages.get(full_name) {
            return Ok(schema.clone());
        }
        if self.visiting.iter().any(|n| n == full_name) {
            let mut chain = self.visiting.join(" -> ");
            chain.push_str(" -> ");
            chain.push_str(full_name);
            return Err(EngineError::Schema(format!("recursive message type: {chain}")));
        }

        self.visiting.push(full_name.to_string());
        let fields: Result<Vec<_>, _> = md.fields().map(|f| self.field(&f)).collect();
        self.visiting.pop();

        let mut schema = MessageSchema::new(full_name, fields?);
        schema.table = self.table(md);
        schema.descriptor = Some(md.clone());

        let schema = Arc::new(schema);
        self.messages.insert(full_name.to_string(), schema.clone());
        Ok(schema)
    }

    fn field(&mut self, fd: &FieldDescriptor) -> Result<FieldSchema, EngineError> {
        let kind = self
            .kind(fd.kind())
            .map_err(|e| e.with_context(format!("field {}", fd.full_name())))?;
        let mut field = FieldSchema::new(fd.name(), fd.number(), kind);
        field.repeated = fd.is_list() || fd.is_map();
        field.map = fd.is_map();
        field.column = self.annotation(&fd.options(), "text");
        Ok(field)
    }

    fn kind(&mut self, kind: Kind) -> Result<FieldKind, EngineError> {
        Ok(match kind {
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => FieldKind::Int32,
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => FieldKind::Int64,
            Kind::Uint32 | Kind::Fixed32 => FieldKind::UInt32,
            Kind::Uint64 | Kind::Fixed64 => FieldKind::UInt64,
            Kind::Float => FieldKind::Float,
            Kind::Double => FieldKind::Double,
            Kind::Bool => FieldKind::Bool,
            Kind::String => FieldKind::String,
            Kind::Bytes => FieldKind::Bytes,
            Kind::Enum(ed) => FieldKind::Enum(self.enumeration(&ed)),
            Kind::Message(md) => FieldKind::Message(self.message(&md)?),
        })
    }

    fn enumeration(&mut self, ed: &EnumDescriptor) -> Arc<EnumSchema> {
        if let Some(schema) = self.enums.get(ed.full_name()) {
            return schema.clone();
        }
        let members = ed
            .values()
            .map(|v| EnumMember {
                name: v.name().to_string(),
                number: v.number(),
                alias: self.annotation(&v.options(), "alias"),
            })
            .collect();
        let schema = Arc::new(EnumSchema {
            name: ed.name().to_string(),
            full_name: ed.full_name().to_string(),
            members,
        });
        self.enums.insert(ed.full_name().to_string(), schema.clone());
        schema
    }

    /// Table annotations, present only when both `excel` and `sheet` are set.
    fn table(&self, md: &MessageDescriptor) -> Option<TableSchema> {
        let options = md.options();
        let excel = self.annotation(&options, "excel")?;
        let sheet = self.annotation(&options, "sheet")?;
        let keys = self
            .annotation(&options, "keys")
            .map(|k| {
                k.split(KEY_SEPARATOR)
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Some(TableSchema {
            excel,
            sheet,
            keys,
            name: self.annotation(&options, "name"),
            prefix: self.annotation(&options, "prefix"),
            suffix: self.annotation(&options, "suffix"),
        })
    }

    /// Non-empty string value of option `name` on an options message.
    fn annotation(&self, options: &DynamicMessage, name: &str) -> Option<String> {
        let extendee = options.descriptor();
        debug_assert!(matches!(
            extendee.full_name(),
            MESSAGE_OPTIONS | FIELD_OPTIONS | ENUM_VALUE_OPTIONS
        ));
        let ext = self.extensions.get(extendee.full_name())?.get(name)?;
        if !options.has_extension(ext) {
            return None;
        }
        options
            .get_extension(ext)
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
