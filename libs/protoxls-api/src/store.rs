use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::schema::{FieldKind, MessageSchema};
use crate::value::{Record, Value};

// ════════════════════════════════════════════════════════════════
//  Store Key
// ════════════════════════════════════════════════════════════════

/// Partition key at one store level.
///
/// Ordering (used only to make rendering deterministic): integers first,
/// ascending, then text keys lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    Integer(i64),
    Text(String),
}

impl StoreKey {
    /// Key for a text value. A value that parses fully as a base-10 `i64`
    /// becomes an `Integer` key, so `"1"` and `1` land in the same
    /// partition. Out-of-range numerals stay `Text`.
    ///
    /// Note: this also turns zero-padded codes like `"007"` into `7`.
    pub fn from_text(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => StoreKey::Integer(n),
            Err(_) => StoreKey::Text(s.to_string()),
        }
    }

    /// Extract the key for `field` from a record.
    pub fn extract(record: &Record, field: &str) -> Result<Option<Self>, StoreError> {
        let schema = record.schema();
        let (_, fs) = schema.field(field).ok_or_else(|| StoreError::UnknownKeyField {
            field: field.to_string(),
            message: schema.full_name.clone(),
        })?;

        let unsupported = || StoreError::UnsupportedKey {
            field: field.to_string(),
            kind: if fs.repeated {
                format!("repeated {}", fs.kind)
            } else {
                fs.kind.to_string()
            },
        };

        if fs.repeated || fs.map {
            return Err(unsupported());
        }

        let Some(value) = record.get(field) else {
            return Ok(None);
        };

        match (&fs.kind, value) {
            (k, Value::Integer(n)) if k.is_integer() => Ok(Some(StoreKey::Integer(*n))),
            (FieldKind::String, Value::Text(s)) => Ok(Some(StoreKey::from_text(s))),
            (FieldKind::Enum(_), Value::Enum(e)) => Ok(Some(StoreKey::Integer(e.number as i64))),
            _ => Err(unsupported()),
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKey::Integer(n) => write!(f, "{n}"),
            StoreKey::Text(s) => write!(f, "{s}"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Store
// ════════════════════════════════════════════════════════════════

/// Partition tree over records.
///
/// A node is either a leaf (records, no children) or internal (children,
/// no records). Immutable once [`Store::build`] returns.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Arc<MessageSchema>,
    records: Vec<Record>,
    children: HashMap<StoreKey, Store>,
    key_fields: Vec<String>,
}

impl Store {
    /// Partition `records` by `key_fields`, outermost first.
    ///
    /// With no key fields every record stays in the root, which is a leaf.
    /// One pass over the records per level.
    pub fn build(
        schema: Arc<MessageSchema>,
        records: Vec<Record>,
        key_fields: &[String],
    ) -> Result<Self, StoreError> {
        Self::build_numbered(schema, records.into_iter().enumerate().collect(), key_fields)
    }

    /// Like [`Store::build`], with each record tagged by its source row.
    /// Key errors report that row.
    pub fn build_numbered(
        schema: Arc<MessageSchema>,
        records: Vec<(usize, Record)>,
        key_fields: &[String],
    ) -> Result<Self, StoreError> {
        Self::partition(&schema, records, key_fields)
    }

    fn partition(
        schema: &Arc<MessageSchema>,
        records: Vec<(usize, Record)>,
        key_fields: &[String],
    ) -> Result<Self, StoreError> {
        let Some((current, remaining)) = key_fields.split_first() else {
            return Ok(Store {
                schema: schema.clone(),
                records: records.into_iter().map(|(_, record)| record).collect(),
                children: HashMap::new(),
                key_fields: Vec::new(),
            });
        };

        let mut groups: HashMap<StoreKey, Vec<(usize, Record)>> = HashMap::new();
        for (row, record) in records {
            let key = StoreKey::extract(&record, current)?.ok_or_else(|| StoreError::MissingKey {
                field: current.clone(),
                row,
            })?;
            groups.entry(key).or_default().push((row, record));
        }

        let children = groups
            .into_iter()
            .map(|(key, group)| Ok((key, Self::partition(schema, group, remaining)?)))
            .collect::<Result<HashMap<_, _>, StoreError>>()?;

        Ok(Store {
            schema: schema.clone(),
            records: Vec::new(),
            children,
            key_fields: key_fields.to_vec(),
        })
    }

    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Records held directly by this node. Empty for internal nodes.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Key fields consumed from this level down.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn get(&self, key: &StoreKey) -> Option<&Store> {
        self.children.get(key)
    }

    /// Children ordered by key.
    pub fn sorted_children(&self) -> Vec<(&StoreKey, &Store)> {
        let mut children: Vec<_> = self.children.iter().collect();
        children.sort_by(|a, b| a.0.cmp(b.0));
        children
    }

    /// All leaf nodes, depth-first in key order.
    pub fn leaves(&self) -> Vec<&Store> {
        if self.is_leaf() {
            return vec![self];
        }
        self.sorted_children()
            .into_iter()
            .flat_map(|(_, child)| child.leaves())
            .collect()
    }

    /// Number of records reachable from this node.
    pub fn len(&self) -> usize {
        self.records.len() + self.children.values().map(Store::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
