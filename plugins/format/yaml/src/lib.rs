use protoxls_api::{
    LeafShape, MessageValue, OutputFormat, RenderError, RenderOptions, Renderer, Store, StoreKey, Value,
};
use serde_yaml::{Mapping, Number};

/// Every leaf, the root included, unwraps a single record.
const LEAF: LeafShape = LeafShape::Unwrapped;

/// Structured-document renderer. `compact` has no effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlRenderer;

impl Renderer for YamlRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Yaml
    }

    fn render(&self, store: &Store, _opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let doc = node(store)?;
        serde_yaml::to_string(&doc)
            .map(String::into_bytes)
            .map_err(|e| RenderError::Encode(e.to_string()))
    }
}

fn node(store: &Store) -> Result<serde_yaml::Value, RenderError> {
    if store.is_leaf() {
        let recs = store.records();
        return match recs {
            [only] if LEAF.unwrap_single(recs.len()) => message(only),
            _ => Ok(serde_yaml::Value::Sequence(
                recs.iter().map(message).collect::<Result<_, _>>()?,
            )),
        };
    }
    let mut map = Mapping::new();
    for (key, child) in store.sorted_children() {
        map.insert(key_value(key), node(child)?);
    }
    Ok(serde_yaml::Value::Mapping(map))
}

fn key_value(key: &StoreKey) -> serde_yaml::Value {
    match key {
        StoreKey::Integer(n) => serde_yaml::Value::Number(Number::from(*n)),
        StoreKey::Text(s) => serde_yaml::Value::String(s.clone()),
    }
}

/// Fields in declaration order; `Mapping` keeps insertion order.
pub fn message(msg: &MessageValue) -> Result<serde_yaml::Value, RenderError> {
    let mut map = Mapping::new();
    for (field, v) in msg.iter() {
        map.insert(serde_yaml::Value::String(field.name.clone()), value(v)?);
    }
    Ok(serde_yaml::Value::Mapping(map))
}

pub fn value(v: &Value) -> Result<serde_yaml::Value, RenderError> {
    Ok(match v {
        Value::Integer(n) => serde_yaml::Value::Number(Number::from(*n)),
        Value::Float(f) if !f.is_finite() => return Err(RenderError::NonFinite(*f)),
        Value::Float(f) => serde_yaml::Value::Number(Number::from(*f)),
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Text(s) => serde_yaml::Value::String(s.clone()),
        Value::Enum(e) => serde_yaml::Value::Number(Number::from(e.number)),
        Value::Message(m) => message(m)?,
        Value::Array(items) => serde_yaml::Value::Sequence(items.iter().map(value).collect::<Result<_, _>>()?),
    })
}
