//! JSON bridge.
//!
//! Conversions read the raw data behind proxies and refs without tracking,
//! so snapshotting state inside an effect never subscribes it to anything.

use std::collections::HashSet;

use serde::{Serialize, Serializer};
use serde_json::{Map as JsonMap, Number, Value as Json};

use super::{Key, TargetId, TargetKind, Value};
use crate::error::Result;
use crate::reactive::untracked;

impl Value {
    /// Build a value tree from JSON. Objects and arrays become raw targets.
    pub fn from_json(json: Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(props) => Value::object_from(
                props
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_json(value))),
            ),
        }
    }

    pub fn from_json_str(source: &str) -> Result<Value> {
        let json: Json = serde_json::from_str(source)?;
        Ok(Value::from_json(json))
    }

    /// Snapshot as JSON.
    ///
    /// Follows `JSON.stringify` where it can: undefined, functions and symbols
    /// are dropped from objects and become `null` in arrays, and non-finite
    /// numbers become `null`. Maps become arrays of `[key, value]` pairs and
    /// Sets become arrays. A target that appears inside itself is written as
    /// `null`.
    pub fn to_json(&self) -> Json {
        untracked(|| to_json_inner(self, &mut HashSet::new()))
    }
}

fn omitted(value: &Value) -> bool {
    matches!(
        value,
        Value::Undefined | Value::Function(_) | Value::Symbol(_)
    )
}

/// Integral numbers are written without a fraction, like JavaScript does.
fn number_to_json(n: f64) -> Json {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Json::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

fn to_json_inner(value: &Value, ancestors: &mut HashSet<TargetId>) -> Json {
    let target = match value {
        Value::Undefined | Value::Null | Value::Function(_) | Value::Symbol(_) => {
            return Json::Null
        }
        Value::Bool(b) => return Json::Bool(*b),
        Value::Number(n) => return number_to_json(*n),
        Value::String(s) => return Json::String(s.to_string()),
        Value::Ref(r) => return to_json_inner(&r.value(), ancestors),
        Value::Object(_) | Value::Proxy(_) => match value.raw_target() {
            Some(target) => target,
            None => return Json::Null,
        },
    };

    if !ancestors.insert(target.id()) {
        return Json::Null;
    }

    let json = match target.kind() {
        TargetKind::Object => {
            let mut props = JsonMap::new();
            for key in target.own_keys() {
                let Some(prop) = target.get_own(&key) else {
                    continue;
                };
                if omitted(&prop) || matches!(key, Key::Symbol(_)) {
                    continue;
                }
                props.insert(key.to_string(), to_json_inner(&prop, ancestors));
            }
            Json::Object(props)
        }
        TargetKind::Array => {
            let len = target.array_len().unwrap_or(0);
            Json::Array(
                (0..len)
                    .map(|index| match target.get_own(&Key::Index(index)) {
                        Some(item) => to_json_inner(&item, ancestors),
                        None => Json::Null,
                    })
                    .collect(),
            )
        }
        TargetKind::Map => Json::Array(
            target
                .entries_snapshot()
                .iter()
                .map(|(key, value)| {
                    Json::Array(vec![
                        to_json_inner(key, ancestors),
                        to_json_inner(value, ancestors),
                    ])
                })
                .collect(),
        ),
        TargetKind::Set => Json::Array(
            target
                .entries_snapshot()
                .iter()
                .map(|(value, _)| to_json_inner(value, ancestors))
                .collect(),
        ),
        TargetKind::WeakMap | TargetKind::WeakSet => Json::Object(JsonMap::new()),
    };

    ancestors.remove(&target.id());
    json
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::from_json(json)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
