use protoxls_api::util::{escape_quoted, float_literal};
use protoxls_api::{
    LeafShape, MessageValue, OutputFormat, RenderError, RenderOptions, Renderer, Store, StoreKey, Value,
};

const INDENT: &str = "    ";

const KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Table-literal renderer: `Name = { ... }`.
///
/// Keyed levels are laid out one entry per line; every record stays on a
/// single line. Compact mode puts the whole table on one line. A nested
/// leaf renders its first record unless `nested_leaf_arrays` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaRenderer;

impl Renderer for LuaRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Lua
    }

    fn render(&self, store: &Store, opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let schema = store.schema();
        let table = schema.table.as_ref();
        let body = if store.is_leaf() {
            let entries = store.records().iter().map(message).collect::<Result<Vec<_>, _>>()?;
            layout(&entries, 0, opts.compact)
        } else {
            node(store, 0, opts.compact, LeafShape::nested(opts))?
        };

        let mut out = String::new();
        if let Some(prefix) = table.and_then(|t| t.prefix.as_deref()) {
            out.push_str(prefix);
        }
        out.push_str(schema.table_name());
        out.push_str(" = ");
        out.push_str(&body);
        if let Some(suffix) = table.and_then(|t| t.suffix.as_deref()) {
            out.push_str(suffix);
        }
        out.push('\n');
        Ok(out.into_bytes())
    }
}

fn node(store: &Store, depth: usize, compact: bool, shape: LeafShape) -> Result<String, RenderError> {
    if store.is_leaf() {
        let recs = store.records();
        let dropped = shape.dropped(recs.len());
        if dropped > 0 {
            tracing::warn!(
                schema = %store.schema().full_name,
                dropped,
                "nested leaf holds several records, rendering only the first"
            );
        }
        return match recs {
            [first, ..] if shape.unwrap_single(recs.len()) => message(first),
            recs => {
                let items = recs.iter().map(message).collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{{{}}}", items.join(", ")))
            }
        };
    }
    let entries = store
        .sorted_children()
        .into_iter()
        .map(|(key, child)| Ok(format!("[{}] = {}", key_literal(key), node(child, depth + 1, compact, shape)?)))
        .collect::<Result<Vec<_>, RenderError>>()?;
    Ok(layout(&entries, depth, compact))
}

/// `{a, b}` when compact or empty, else one entry per line at `depth + 1`.
fn layout(entries: &[String], depth: usize, compact: bool) -> String {
    if compact || entries.is_empty() {
        return format!("{{{}}}", entries.join(", "));
    }
    let inner = INDENT.repeat(depth + 1);
    let mut out = String::from("{\n");
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str(&inner);
        out.push_str(entry);
    }
    out.push('\n');
    out.push_str(&INDENT.repeat(depth));
    out.push('}');
    out
}

fn key_literal(key: &StoreKey) -> String {
    match key {
        StoreKey::Integer(n) => n.to_string(),
        StoreKey::Text(s) => string_literal(s),
    }
}

fn string_literal(s: &str) -> String {
    format!("\"{}\"", escape_quoted(s, '"', true))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.contains(&name)
}

fn field_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        format!("[{}]", string_literal(name))
    }
}

pub fn message(msg: &MessageValue) -> Result<String, RenderError> {
    let fields = msg
        .iter()
        .map(|(field, v)| Ok(format!("{} = {}", field_key(&field.name), value(v)?)))
        .collect::<Result<Vec<_>, RenderError>>()?;
    Ok(format!("{{{}}}", fields.join(", ")))
}

pub fn value(v: &Value) -> Result<String, RenderError> {
    Ok(match v {
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => float_literal(*f)?,
        Value::Bool(b) => b.to_string(),
        Value::Text(s) => string_literal(s),
        Value::Enum(e) => e.number.to_string(),
        Value::Message(m) => message(m)?,
        Value::Array(items) => {
            let items = items.iter().map(value).collect::<Result<Vec<_>, _>>()?;
            format!("{{{}}}", items.join(", "))
        }
    })
}
