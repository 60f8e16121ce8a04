use protoxls_api::util::{escape_quoted, float_literal};
use protoxls_api::{
    LeafShape, MessageValue, OutputFormat, RenderError, RenderOptions, Renderer, Store, StoreKey, Value,
};

const INDENT: &str = "    ";

/// Every leaf, the root included, unwraps a single record.
const LEAF: LeafShape = LeafShape::Unwrapped;

/// Array-literal renderer: `<?php $name = [ ... ];`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpRenderer;

impl Renderer for PhpRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Php
    }

    fn render(&self, store: &Store, opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let schema = store.schema();
        let table = schema.table.as_ref();
        let tree = node(store)?;

        let mut out = String::from("<?php\n\n");
        if let Some(prefix) = table.and_then(|t| t.prefix.as_deref()) {
            out.push_str(prefix);
        }
        out.push('$');
        out.push_str(&schema.table_name().to_lowercase());
        out.push_str(" = ");
        tree.write(&mut out, 0, opts.compact);
        out.push(';');
        if let Some(suffix) = table.and_then(|t| t.suffix.as_deref()) {
            out.push_str(suffix);
        }
        out.push('\n');
        Ok(out.into_bytes())
    }
}

// ════════════════════════════════════════════════════════════════
//  Php Tree
// ════════════════════════════════════════════════════════════════

/// Intermediate form: scalars are already literals.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpNode {
    Literal(String),
    List(Vec<PhpNode>),
    Assoc(Vec<(String, PhpNode)>),
}

impl PhpNode {
    fn write(&self, out: &mut String, depth: usize, compact: bool) {
        match self {
            PhpNode::Literal(s) => out.push_str(s),
            PhpNode::List(items) if items.is_empty() => out.push_str("[]"),
            PhpNode::Assoc(items) if items.is_empty() => out.push_str("[]"),
            PhpNode::List(items) => {
                write_entries(out, depth, compact, items, |out, item| {
                    item.write(out, depth + 1, compact);
                });
            }
            PhpNode::Assoc(items) => {
                write_entries(out, depth, compact, items, |out, (key, item)| {
                    out.push_str(key);
                    out.push_str(" => ");
                    item.write(out, depth + 1, compact);
                });
            }
        }
    }
}

fn write_entries<T>(
    out: &mut String,
    depth: usize,
    compact: bool,
    items: &[T],
    mut write: impl FnMut(&mut String, &T),
) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
            if compact {
                out.push(' ');
            }
        }
        if !compact {
            out.push('\n');
            out.push_str(&INDENT.repeat(depth + 1));
        }
        write(out, item);
    }
    if !compact {
        out.push('\n');
        out.push_str(&INDENT.repeat(depth));
    }
    out.push(']');
}

fn node(store: &Store) -> Result<PhpNode, RenderError> {
    if store.is_leaf() {
        let recs = store.records();
        return match recs {
            [only] if LEAF.unwrap_single(recs.len()) => message(only),
            _ => Ok(PhpNode::List(recs.iter().map(message).collect::<Result<_, _>>()?)),
        };
    }
    let entries = store
        .sorted_children()
        .into_iter()
        .map(|(key, child)| Ok((key_literal(key), node(child)?)))
        .collect::<Result<Vec<_>, RenderError>>()?;
    Ok(PhpNode::Assoc(entries))
}

fn key_literal(key: &StoreKey) -> String {
    match key {
        StoreKey::Integer(n) => n.to_string(),
        StoreKey::Text(s) => string_literal(s),
    }
}

fn string_literal(s: &str) -> String {
    format!("'{}'", escape_quoted(s, '\'', false))
}

pub fn message(msg: &MessageValue) -> Result<PhpNode, RenderError> {
    let fields = msg
        .iter()
        .map(|(field, v)| Ok((string_literal(&field.name), value(v)?)))
        .collect::<Result<Vec<_>, RenderError>>()?;
    Ok(PhpNode::Assoc(fields))
}

pub fn value(v: &Value) -> Result<PhpNode, RenderError> {
    Ok(match v {
        Value::Integer(n) => PhpNode::Literal(n.to_string()),
        Value::Float(f) => PhpNode::Literal(float_literal(*f)?),
        Value::Bool(b) => PhpNode::Literal(b.to_string()),
        Value::Text(s) => PhpNode::Literal(string_literal(s)),
        Value::Enum(e) => PhpNode::Literal(e.number.to_string()),
        Value::Message(m) => message(m)?,
        Value::Array(items) => PhpNode::List(items.iter().map(value).collect::<Result<_, _>>()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use protoxls_api::{FieldKind, FieldSchema, MessageSchema, TableSchema};

    fn schema(table: TableSchema) -> Arc<MessageSchema> {
        Arc::new(
            MessageSchema::new(
                "game.ItemConfig",
                vec![
                    FieldSchema::new("id", 1, FieldKind::Int32),
                    FieldSchema::new("name", 2, FieldKind::String),
                    FieldSchema::new("tags", 3, FieldKind::String).repeated(),
                ],
            )
            .with_table(table),
        )
    }

    fn item(schema: &Arc<MessageSchema>, id: i64, name: &str) -> MessageValue {
        let mut b = MessageValue::builder(schema.clone());
        b.set(0, Value::Integer(id));
        b.set(1, Value::Text(name.into()));
        b.build()
    }

    fn render(store: &Store, compact: bool) -> String {
        let opts = RenderOptions {
            compact,
            ..Default::default()
        };
        String::from_utf8(PhpRenderer.render(store, &opts).unwrap()).unwrap()
    }

    #[test]
    fn single_root_record_is_an_assoc_array() {
        let schema = schema(TableSchema::default());
        let store = Store::build(schema.clone(), vec![item(&schema, 1, "it's")], &[]).unwrap();
        assert_eq!(
            render(&store, false),
            "<?php\n\n$itemconfig = [\n    'id' => 1,\n    'name' => 'it\\'s'\n];\n"
        );
    }

    #[test]
    fn several_root_records_form_a_list() {
        let schema = schema(TableSchema::default());
        let store = Store::build(
            schema.clone(),
            vec![item(&schema, 1, "a"), item(&schema, 2, "b")],
            &[],
        )
        .unwrap();
        assert_eq!(
            render(&store, true),
            "<?php\n\n$itemconfig = [['id' => 1, 'name' => 'a'], ['id' => 2, 'name' => 'b']];\n"
        );
    }

    #[test]
    fn keyed_store_uses_unquoted_integer_keys() {
        let schema = schema(TableSchema {
            name: Some("Items".into()),
            ..Default::default()
        });
        let mut tagged = MessageValue::builder(schema.clone());
        tagged.set(0, Value::Integer(2));
        tagged.set(2, Value::Array(vec![Value::Text("x".into()), Value::Text("y".into())]));
        let recs = vec![tagged.build(), item(&schema, 1, "a")];
        let store = Store::build(schema, recs, &["id".into()]).unwrap();
        assert_eq!(
            render(&store, false),
            "<?php\n\n$items = [\n    1 => [\n        'id' => 1,\n        'name' => 'a'\n    ],\n    \
             2 => [\n        'id' => 2,\n        'tags' => [\n            'x',\n            'y'\n        ]\n    ]\n];\n"
        );
    }

    #[test]
    fn text_keys_are_quoted() {
        let schema = schema(TableSchema::default());
        let recs = vec![item(&schema, 1, "b'c"), item(&schema, 2, "a")];
        let store = Store::build(schema, recs, &["name".into()]).unwrap();
        assert_eq!(
            render(&store, true),
            "<?php\n\n$itemconfig = ['a' => ['id' => 2, 'name' => 'a'], 'b\\'c' => ['id' => 1, 'name' => 'b\\'c']];\n"
        );
    }

    #[test]
    fn prefix_and_suffix_wrap_the_assignment() {
        let schema = schema(TableSchema {
            prefix: Some("/* generated */\n".into()),
            suffix: Some("\nreturn $itemconfig;".into()),
            ..Default::default()
        });
        let store = Store::build(schema.clone(), vec![item(&schema, 1, "a")], &[]).unwrap();
        assert_eq!(
            render(&store, true),
            "<?php\n\n/* generated */\n$itemconfig = ['id' => 1, 'name' => 'a'];\nreturn $itemconfig;\n"
        );
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(value(&Value::Float(3.0)).unwrap(), PhpNode::Literal("3.0".into()));
        assert_eq!(value(&Value::Bool(false)).unwrap(), PhpNode::Literal("false".into()));
        assert_eq!(value(&Value::Text("a\\b".into())).unwrap(), PhpNode::Literal("'a\\\\b'".into()));
        assert!(value(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn empty_store_is_an_empty_array() {
        let schema = schema(TableSchema::default());
        let store = Store::build(schema, Vec::new(), &[]).unwrap();
        assert_eq!(render(&store, false), "<?php\n\n$itemconfig = [];\n");
    }
}
