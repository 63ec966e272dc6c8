//! JSON log driver.
//!
//! Each flattened key of the line is looked up in the key-indexed
//! sub-format map; matching values run through the text format driver.
//! The same walker seeds that map from the JSON format specification at
//! startup.

use serde_json::Value;

use crate::store::{ParseCtx, ParseStore};

use super::driver::parse_format;
use super::model::{LogRecord, SpecError};
use super::specifier::spec_err;

/// Walk a JSON object, flattening nested objects into dotted keys. Arrays
/// and scalars are leaves; nulls become empty strings.
fn walk<F>(value: &Value, prefix: &str, f: &mut F) -> Result<(), SpecError>
where
    F: FnMut(&str, &str) -> Result<(), SpecError>,
{
    let Value::Object(map) = value else {
        return Err(SpecError::Json("expected a top-level object".to_string()));
    };
    for (k, v) in map {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{}.{}", prefix, k)
        };
        match v {
            Value::Object(_) => walk(v, &key, f)?,
            leaf => f(&key, &leaf_to_string(leaf))?,
        }
    }
    Ok(())
}

fn leaf_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse one JSON log line. Keys without a sub-format and empty values are
/// silently skipped.
pub fn parse_json_format(
    rec: &mut LogRecord,
    line: &str,
    ctx: &ParseCtx<'_>,
) -> Result<(), SpecError> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Err(spec_err(rec, SpecError::Json(e.to_string()))),
    };

    walk(&value, "", &mut |key, val| {
        if val.is_empty() {
            return Ok(());
        }
        let Some(fmt) = ctx.store.json_logfmt(key) else {
            return Ok(());
        };
        parse_format(rec, val, &fmt, ctx)
    })
}

/// Seed the key-to-sub-format map from the JSON format specification.
pub fn cache_json_logfmt(spec: &str, store: &dyn ParseStore) -> Result<(), String> {
    let value: Value =
        serde_json::from_str(spec).map_err(|e| format!("invalid JSON log format: {}", e))?;
    walk(&value, "", &mut |key, fmt| {
        if !fmt.is_empty() {
            store.set_json_logfmt(key.to_string(), fmt.to_string());
        }
        Ok(())
    })
    .map_err(|e| e.to_string())
}
