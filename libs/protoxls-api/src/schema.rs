use std::sync::Arc;

use prost_reflect::MessageDescriptor;

// ════════════════════════════════════════════════════════════════
//  Field Kind
// ════════════════════════════════════════════════════════════════

/// Declared kind of a field. Closed set: every coercion and render path
/// matches on it exhaustively.
///
/// Signed variants (`sint32`, `sfixed32`, ...) collapse onto `Int32`/`Int64`,
/// unsigned fixed variants onto `UInt32`/`UInt64`. The wire-level distinction
/// is recovered from the native descriptor when encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    String,
    Bytes,
    Enum(Arc<EnumSchema>),
    Message(Arc<MessageSchema>),
}

impl FieldKind {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldKind::Int32 | FieldKind::Int64 | FieldKind::UInt32 | FieldKind::UInt64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, FieldKind::Float | FieldKind::Double)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Int32 => write!(f, "int32"),
            FieldKind::Int64 => write!(f, "int64"),
            FieldKind::UInt32 => write!(f, "uint32"),
            FieldKind::UInt64 => write!(f, "uint64"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Double => write!(f, "double"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Bytes => write!(f, "bytes"),
            FieldKind::Enum(e) => write!(f, "enum {}", e.full_name),
            FieldKind::Message(m) => write!(f, "message {}", m.full_name),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Enum Schema
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub number: i32,
    /// Alternate cell literal accepted for this member.
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    pub full_name: String,
    /// Declaration order.
    pub members: Vec<EnumMember>,
}

impl EnumSchema {
    /// Resolve a cell literal against member names and aliases.
    ///
    /// Case-sensitive; the first member in declaration order whose name or
    /// alias matches wins.
    pub fn resolve(&self, literal: &str) -> Option<i32> {
        self.members
            .iter()
            .find(|m| m.name == literal || m.alias.as_deref() == Some(literal))
            .map(|m| m.number)
    }
}

// ════════════════════════════════════════════════════════════════
//  Field Schema
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub repeated: bool,
    /// Map fields are recognised but never populated from cells.
    pub map: bool,
    /// Source column override (`text` option).
    pub column: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            repeated: false,
            map: false,
            column: None,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Column this field reads from, before any nesting prefix is applied.
    pub fn column_name(&self) -> &str {
        match self.column.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => &self.name,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Table Schema
// ════════════════════════════════════════════════════════════════

/// Per-message export annotations, resolved once from message options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    /// Source workbook path.
    pub excel: String,
    pub sheet: String,
    /// Partition key field names, outermost first.
    pub keys: Vec<String>,
    /// Display name: output file stem and table variable name.
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

// ════════════════════════════════════════════════════════════════
//  Message Schema
// ════════════════════════════════════════════════════════════════

/// Read-only schema tree node. Built once, shared via `Arc` by every
/// record derived from it.
#[derive(Debug, Clone)]
pub struct MessageSchema {
    pub name: String,
    pub full_name: String,
    /// Declaration order.
    pub fields: Vec<FieldSchema>,
    pub table: Option<TableSchema>,
    /// Native descriptor, present when the schema came from a descriptor
    /// pool. Required only by the binary encoding.
    pub descriptor: Option<MessageDescriptor>,
}

impl PartialEq for MessageSchema {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name && self.fields == other.fields && self.table == other.table
    }
}

impl MessageSchema {
    pub fn new(full_name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        let full_name = full_name.into();
        let name = full_name.rsplit('.').next().unwrap_or(&full_name).to_string();
        Self {
            name,
            full_name,
            fields,
            table: None,
            descriptor: None,
        }
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.table = Some(table);
        self
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldSchema)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    /// Display name if annotated, else the message name.
    pub fn table_name(&self) -> &str {
        self.table
            .as_ref()
            .and_then(|t| t.name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }

    /// Output file stem: display name if annotated, else the lower-cased
    /// message name.
    pub fn export_name(&self) -> String {
        match self.table.as_ref().and_then(|t| t.name.as_deref()) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => self.name.to_lowercase(),
        }
    }
}
