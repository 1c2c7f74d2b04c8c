//! Operations on parsed value trees: flattening to dot paths, placing values
//! at a path, canonical comparison and multi-service merging.

use crate::error::{ErrorCode, Result, ZenfigError};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Flatten a tree into `dot.path -> leaf` pairs.
///
/// Arrays are leaves. Empty objects below the root are kept as leaves so
/// they still show up in a diff.
pub fn flatten(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, key.clone(), &mut out);
            }
        }
        other => {
            out.insert(String::new(), other.clone());
        }
    }
    out
}

fn flatten_into(value: &Value, path: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(child, format!("{}.{}", path, key), out);
            }
        }
        leaf => {
            out.insert(path, leaf.clone());
        }
    }
}

/// Place `value` at `segments`, creating intermediate objects and replacing
/// any non-object found on the way.
pub fn set_path(root: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }
}

/// Look up a dot path. Matching is exact; resolve user input first.
pub fn get_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(root, |current, segment| current.as_object()?.get(segment))
}

/// Split a canonical dot path into owned segments.
pub fn segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

/// Deterministic JSON rendering: object keys sorted, integral numbers printed
/// without a fractional part. Two values are structurally equal iff their
/// canonical renderings are equal.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Number(n) => out.push_str(&format_number(n)),
        other => out.push_str(&other.to_string()),
    }
}

/// Print a number the way it is stored: integral values without `.0`.
pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Build a JSON number, collapsing integral floats to integers so `5432`
/// and `5432.0` compare equal everywhere.
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Structural equality ignoring key order and integer/float representation.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    canonical_json(a) == canonical_json(b)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Fail with VAL005 when two sources disagree on a key
    pub strict: bool,
}

/// A key whose value from one source was replaced by a later source.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub key: String,
    pub previous_source: String,
    pub source: String,
}

impl Override {
    /// VAL005 describing this conflict, as strict mode reports it.
    pub fn to_error(&self) -> ZenfigError {
        ZenfigError::validation(
            ErrorCode::MergeConflict,
            &self.key,
            format!(
                "Services '{}' and '{}' store different values",
                self.previous_source, self.source
            ),
        )
        .with_problem("Strict mode rejects conflicting values across services")
        .with_remediation("Make the values agree or drop --strict to let the later service win")
    }
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub value: Value,
    pub overrides: Vec<Override>,
}

/// Merge named trees in order; the last source wins on conflicting leaves.
pub fn merge_sources(sources: &[(String, Value)], options: MergeOptions) -> Result<Merged> {
    let mut leaves: BTreeMap<String, (Value, &str)> = BTreeMap::new();
    let mut overrides = Vec::new();

    for (source, value) in sources {
        for (key, leaf) in flatten(value) {
            if let Some((previous, previous_source)) = leaves.get(&key) {
                if !values_equal(previous, &leaf) {
                    let conflict = Override {
                        key: key.clone(),
                        previous_source: previous_source.to_string(),
                        source: source.clone(),
                    };
                    if options.strict {
                        return Err(conflict.to_error());
                    }
                    overrides.push(conflict);
                }
            }
            leaves.insert(key, (leaf, source.as_str()));
        }
    }

    let mut merged = Value::Object(Map::new());
    for (key, (leaf, _)) in leaves {
        set_path(&mut merged, &segments(&key), leaf);
    }
    Ok(Merged {
        value: merged,
        overrides,
    })
}
