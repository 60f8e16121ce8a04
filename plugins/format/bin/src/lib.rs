use prost::Message;
use prost::bytes::Bytes;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MessageDescriptor};

use protoxls_api::{MessageValue, OutputFormat, RenderError, RenderOptions, Renderer, Store, Value};

/// Size of the big-endian length header in front of every entry.
pub const LENGTH_BYTES: usize = 4;

/// Native wire encoding, one length-prefixed entry per record.
///
/// A keyed store is flattened: leaves are visited in key order and their
/// records written back to back. There is no header, footer or count.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinRenderer;

impl Renderer for BinRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Bin
    }

    fn render(&self, store: &Store, _opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let schema = store.schema();
        let descriptor = schema.descriptor.as_ref().ok_or_else(|| {
            RenderError::Unsupported(format!("{} has no native descriptor", schema.full_name))
        })?;

        let mut buf = Vec::new();
        for (i, record) in store.leaves().into_iter().flat_map(Store::records).enumerate() {
            let msg = to_dynamic(record, descriptor).map_err(|e| e.with_context(format!("record {i}")))?;
            encode_frame(&msg.encode_to_vec(), &mut buf)?;
        }
        Ok(buf)
    }
}

// ════════════════════════════════════════════════════════════════
//  Framing
// ════════════════════════════════════════════════════════════════

/// Append `[u32 BE length][payload]` to `buf`.
pub fn encode_frame(payload: &[u8], buf: &mut Vec<u8>) -> Result<(), RenderError> {
    let len = u32::try_from(payload.len()).map_err(|_| RenderError::FrameTooLarge(payload.len()))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(())
}

/// Split a whole stream into payloads. Reads to the end; a partial header
/// or payload is an error.
pub fn decode_frames(mut buf: &[u8]) -> Result<Vec<&[u8]>, RenderError> {
    let total = buf.len();
    let mut frames = Vec::new();
    while !buf.is_empty() {
        let offset = total - buf.len();
        let Some((header, rest)) = buf.split_first_chunk::<LENGTH_BYTES>() else {
            return Err(RenderError::TruncatedFrame {
                offset,
                need: LENGTH_BYTES,
                have: buf.len(),
            });
        };
        let len = u32::from_be_bytes(*header) as usize;
        if rest.len() < len {
            return Err(RenderError::TruncatedFrame {
                offset,
                need: LENGTH_BYTES + len,
                have: buf.len(),
            });
        }
        let (payload, rest) = rest.split_at(len);
        frames.push(payload);
        buf = rest;
    }
    Ok(frames)
}

// ════════════════════════════════════════════════════════════════
//  Value → DynamicMessage
// ════════════════════════════════════════════════════════════════

pub fn to_dynamic(msg: &MessageValue, descriptor: &MessageDescriptor) -> Result<DynamicMessage, RenderError> {
    let mut out = DynamicMessage::new(descriptor.clone());
    for (field, value) in msg.iter() {
        let fd = descriptor.get_field(field.number).ok_or_else(|| {
            RenderError::Encode(format!(
                "field {} (#{}) not in {}",
                field.name,
                field.number,
                descriptor.full_name()
            ))
        })?;
        let native = native_value(value, &fd)?;
        out.try_set_field(&fd, native)
            .map_err(|e| RenderError::Encode(format!("field {}: {e}", fd.full_name())))?;
    }
    Ok(out)
}

fn native_value(value: &Value, fd: &FieldDescriptor) -> Result<prost_reflect::Value, RenderError> {
    match value {
        Value::Array(items) if fd.is_list() => Ok(prost_reflect::Value::List(
            items
                .iter()
                .map(|item| scalar(item, &fd.kind(), fd))
                .collect::<Result<_, _>>()?,
        )),
        _ => scalar(value, &fd.kind(), fd),
    }
}

fn scalar(value: &Value, kind: &Kind, fd: &FieldDescriptor) -> Result<prost_reflect::Value, RenderError> {
    use prost_reflect::Value as Pv;

    let out_of_range = |n: i64| RenderError::Encode(format!("{n} out of range for field {}", fd.full_name()));
    Ok(match (kind, value) {
        (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, Value::Integer(n)) => {
            Pv::I32(i32::try_from(*n).map_err(|_| out_of_range(*n))?)
        }
        (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Value::Integer(n)) => Pv::I64(*n),
        (Kind::Uint32 | Kind::Fixed32, Value::Integer(n)) => {
            Pv::U32(u32::try_from(*n).map_err(|_| out_of_range(*n))?)
        }
        (Kind::Uint64 | Kind::Fixed64, Value::Integer(n)) => {
            Pv::U64(u64::try_from(*n).map_err(|_| out_of_range(*n))?)
        }
        (Kind::Float, Value::Float(f)) => Pv::F32(*f as f32),
        (Kind::Double, Value::Float(f)) => Pv::F64(*f),
        (Kind::Bool, Value::Bool(b)) => Pv::Bool(*b),
        (Kind::String, Value::Text(s)) => Pv::String(s.clone()),
        (Kind::Bytes, Value::Text(s)) => Pv::Bytes(Bytes::from(s.clone().into_bytes())),
        (Kind::Enum(_), Value::Enum(e)) => Pv::EnumNumber(e.number),
        (Kind::Message(md), Value::Message(m)) => Pv::Message(to_dynamic(m, md)?),
        _ => {
            return Err(RenderError::Encode(format!(
                "value {value:?} does not match field {} of kind {kind:?}",
                fd.full_name()
            )));
        }
    })
}
