//! The flattened-map convention.
//!
//! Maps travel as an even-length list alternating key and value. Keys go
//! out as UTF-8 byte strings; string keys are accepted on the way in.

use tracing::debug;

use crate::error::PairError;
use crate::value::{Value, ValueMap};

/// Flatten `map` into alternating key/value elements.
pub fn flatten(map: &ValueMap) -> Vec<Value> {
    let mut out = Vec::with_capacity(map.len() * 2);
    flatten_into(map, &mut out);
    out
}

/// Flatten `map`, appending to `out`. Keys come out in sorted order.
pub fn flatten_into(map: &ValueMap, out: &mut Vec<Value>) {
    for (key, value) in map {
        out.push(Value::from(key.as_bytes()));
        out.push(value.clone());
    }
}

/// Rebuild a map from alternating key/value elements.
///
/// A repeated key keeps the last value.
pub fn unflatten(values: Vec<Value>) -> Result<ValueMap, PairError> {
    if values.len() % 2 != 0 {
        return Err(PairError::OddCount(values.len()));
    }

    let mut map = ValueMap::new();
    let mut items = values.into_iter().enumerate();
    while let (Some((index, key)), Some((_, value))) = (items.next(), items.next()) {
        let key = match key {
            Value::String(s) => s,
            Value::Bytes(raw) => String::from_utf8(raw.to_vec())
                .map_err(|_| PairError::InvalidUtf8Key { index })?,
            other => {
                return Err(PairError::InvalidKey {
                    index,
                    kind: other.kind(),
                })
            }
        };
        if map.insert(key, value).is_some() {
            debug!(index, "duplicate key in flattened map, keeping last value");
        }
    }
    Ok(map)
}
