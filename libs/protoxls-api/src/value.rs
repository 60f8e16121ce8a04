use std::sync::Arc;

use crate::schema::{EnumSchema, FieldSchema, MessageSchema};

/// Canonical value representation for one field.
///
/// - Scalars: `Integer`, `Float`, `Bool`, `Text`
/// - `Enum`: ordinal plus its declared type, never rendered by name
/// - `Message`: fields in schema declaration order
/// - `Array`: elements share the field's declared kind
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Enum(EnumValue),
    Message(MessageValue),
    Array(Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub number: i32,
    pub enum_type: Arc<EnumSchema>,
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number && self.enum_type.full_name == other.enum_type.full_name
    }
}

// ════════════════════════════════════════════════════════════════
//  Message Value
// ════════════════════════════════════════════════════════════════

/// Populated fields of one message, keyed by position in the schema.
///
/// Absent fields are simply missing; there is no null placeholder.
/// Iteration order is always schema declaration order, whatever order the
/// fields were inserted in.
#[derive(Debug, Clone)]
pub struct MessageValue {
    schema: Arc<MessageSchema>,
    fields: Vec<(usize, Value)>,
}

/// One row, fully typed. Immutable once built.
pub type Record = MessageValue;

impl PartialEq for MessageValue {
    fn eq(&self, other: &Self) -> bool {
        self.schema.full_name == other.schema.full_name && self.fields == other.fields
    }
}

impl MessageValue {
    pub fn builder(schema: Arc<MessageSchema>) -> MessageBuilder {
        MessageBuilder {
            schema,
            fields: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Populated fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldSchema, &Value)> {
        self.fields
            .iter()
            .map(|(idx, v)| (&self.schema.fields[*idx], v))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let (idx, _) = self.schema.field(name)?;
        self.fields
            .iter()
            .find(|(i, _)| *i == idx)
            .map(|(_, v)| v)
    }
}

/// Collects field values in any order and emits them in schema order.
pub struct MessageBuilder {
    schema: Arc<MessageSchema>,
    fields: Vec<(usize, Value)>,
}

impl MessageBuilder {
    /// Set the field at `index` in the schema's field list. A second set of
    /// the same index replaces the first.
    pub fn set(&mut self, index: usize, value: Value) -> &mut Self {
        debug_assert!(index < self.schema.fields.len());
        match self.fields.iter_mut().find(|(i, _)| *i == index) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((index, value)),
        }
        self
    }

    /// Set by field name. Returns `false` if the schema has no such field.
    pub fn set_by_name(&mut self, name: &str, value: Value) -> bool {
        match self.schema.field(name) {
            Some((idx, _)) => {
                self.set(idx, value);
                true
            }
            None => false,
        }
    }

    pub fn build(mut self) -> MessageValue {
        self.fields.sort_by_key(|(i, _)| *i);
        MessageValue {
            schema: self.schema,
            fields: self.fields,
        }
    }
}
