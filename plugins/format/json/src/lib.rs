use protoxls_api::{
    LeafShape, MessageValue, OutputFormat, RenderError, RenderOptions, Renderer, Store, Value,
};
use serde_json::{Map, Number};

/// Object-notation renderer.
///
/// - root leaf → array of records
/// - internal node → object keyed by the decimal/text form of each key
/// - nested leaf → object of its first record; with `nested_leaf_arrays`,
///   object for one record and array otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn render(&self, store: &Store, opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let doc = if store.is_leaf() {
            records(store.records())?
        } else {
            node(store, LeafShape::nested(opts))?
        };

        let mut out = if opts.compact {
            serde_json::to_vec(&doc)
        } else {
            serde_json::to_vec_pretty(&doc)
        }
        .map_err(|e| RenderError::Encode(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }
}

fn node(store: &Store, shape: LeafShape) -> Result<serde_json::Value, RenderError> {
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
            _ => records(recs),
        };
    }
    let mut obj = Map::new();
    for (key, child) in store.sorted_children() {
        obj.insert(key.to_string(), node(child, shape)?);
    }
    Ok(serde_json::Value::Object(obj))
}

fn records(recs: &[MessageValue]) -> Result<serde_json::Value, RenderError> {
    recs.iter()
        .map(message)
        .collect::<Result<Vec<_>, _>>()
        .map(serde_json::Value::Array)
}

/// Fields in declaration order; `preserve_order` keeps them that way.
pub fn message(msg: &MessageValue) -> Result<serde_json::Value, RenderError> {
    let mut obj = Map::new();
    for (field, v) in msg.iter() {
        obj.insert(field.name.clone(), value(v)?);
    }
    Ok(serde_json::Value::Object(obj))
}

pub fn value(v: &Value) -> Result<serde_json::Value, RenderError> {
    Ok(match v {
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or(RenderError::NonFinite(*f))?,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Enum(e) => serde_json::Value::from(e.number),
        Value::Message(m) => message(m)?,
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value).collect::<Result<_, _>>()?),
    })
}
