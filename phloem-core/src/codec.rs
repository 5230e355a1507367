//! Record value encodings
//!
//! Backends that store a whole record as one opaque value (flat key-value stores)
//! serialize the field map through a [`ValueCodec`]. The codec is chosen by name
//! at configuration time and is independent of any backend's wire format.

use crate::db::FieldMap;
use crate::{Error, Result};

/// Strategy for turning a field map into a single value and back
pub trait ValueCodec: Send + Sync {
    /// Codec name used in configuration
    fn name(&self) -> &'static str;

    fn encode(&self, fields: &FieldMap) -> Result<Vec<u8>>;

    fn decode(&self, data: &[u8]) -> Result<FieldMap>;
}

/// Binary-safe encoding: `count` then `(name_len, name, value_len, value)*`
///
/// All lengths are big-endian `u32`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LengthPrefixedCodec;

impl ValueCodec for LengthPrefixedCodec {
    fn name(&self) -> &'static str {
        "length-prefixed"
    }

    fn encode(&self, fields: &FieldMap) -> Result<Vec<u8>> {
        let payload: usize = fields.iter().map(|(k, v)| 8 + k.len() + v.len()).sum();
        let mut out = Vec::with_capacity(4 + payload);
        put_len(&mut out, fields.len())?;
        for (name, value) in fields {
            put_len(&mut out, name.len())?;
            out.extend_from_slice(name.as_bytes());
            put_len(&mut out, value.len())?;
            out.extend_from_slice(value);
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<FieldMap> {
        let mut cursor = data;
        let count = take_len(&mut cursor)?;
        let mut fields = FieldMap::new();
        for _ in 0..count {
            let name_len = take_len(&mut cursor)?;
            let name = take_bytes(&mut cursor, name_len)?;
            let name = String::from_utf8(name.to_vec())
                .map_err(|e| Error::Operation(format!("field name is not UTF-8: {e}")))?;
            let value_len = take_len(&mut cursor)?;
            let value = take_bytes(&mut cursor, value_len)?;
            fields.insert(name, value.to_vec());
        }
        if !cursor.is_empty() {
            return Err(Error::Operation(format!(
                "{} trailing bytes after encoded record",
                cursor.len()
            )));
        }
        Ok(fields)
    }
}

fn put_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Operation(format!("length {len} does not fit in u32")))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn take_len(cursor: &mut &[u8]) -> Result<usize> {
    let bytes = take_bytes(cursor, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
}

fn take_bytes<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(Error::Operation(format!(
            "truncated record: need {len} bytes, have {}",
            cursor.len()
        )));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

/// JSON object encoding; every value must be valid UTF-8
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, fields: &FieldMap) -> Result<Vec<u8>> {
        let mut object = serde_json::Map::with_capacity(fields.len());
        for (name, value) in fields {
            let text = std::str::from_utf8(value).map_err(|e| {
                Error::Operation(format!("field '{name}' is not UTF-8, cannot encode as JSON: {e}"))
            })?;
            object.insert(name.clone(), serde_json::Value::String(text.to_string()));
        }
        serde_json::to_vec(&object).map_err(|e| Error::Operation(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<FieldMap> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(data)
            .map_err(|e| Error::Operation(format!("invalid JSON record: {e}")))?;
        let mut fields = FieldMap::new();
        for (name, value) in object {
            let serde_json::Value::String(text) = value else {
                return Err(Error::Operation(format!("field '{name}' is not a JSON string")));
            };
            fields.insert(name, text.into_bytes());
        }
        Ok(fields)
    }
}

/// Names accepted by [`codec_by_name`]
pub const CODEC_NAMES: [&str; 2] = ["length-prefixed", "json"];

/// Select a codec by its configuration name
pub fn codec_by_name(name: &str) -> Result<Box<dyn ValueCodec>> {
    match name {
        "length-prefixed" => Ok(Box::new(LengthPrefixedCodec)),
        "json" => Ok(Box::new(JsonCodec)),
        other => Err(Error::Config(format!(
            "unknown value codec '{other}'. Valid options: {}",
            CODEC_NAMES.join(", ")
        ))),
    }
}
