// Input boundary: the two external sources are read here, once, fully.
//
// Failure to open or parse either file is fatal to the run. Everything
// wrong *inside* a successfully loaded source (bad lines in the VIP
// file, dirty records in the order data) is recoverable and handled
// further down the pipeline.
use crate::error::{ExtractError, ExtractResult};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load the VIP customer id set from a newline-delimited text file.
///
/// A line that is a base-10 integer (after trimming) is accepted; any
/// other line is skipped with a warning. Only the read itself can fail.
pub fn load_vip_ids(path: &Path) -> ExtractResult<HashSet<i64>> {
    let text = fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut ids = HashSet::new();
    for line in text.lines() {
        let line = line.trim();
        if !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()) {
            match line.parse::<i64>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => tracing::warn!(line, "skipping VIP id line that overflows i64"),
            }
        } else {
            tracing::warn!(line, "skipping invalid VIP id line");
        }
    }
    tracing::info!(count = ids.len(), "loaded VIP customer ids");
    Ok(ids)
}

/// Load the nested customer/order/item records.
///
/// The source is a JSON file whose top level must be an array; each
/// element is treated as an opaque mapping and validated later by the
/// flattener, so a malformed element here is not an error.
pub fn load_customers(path: &Path) -> ExtractResult<Vec<Value>> {
    let text = fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let root: Value = serde_json::from_str(&text).map_err(|source| ExtractError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    match root {
        Value::Array(customers) => {
            tracing::info!(count = customers.len(), "loaded customer records");
            Ok(customers)
        }
        other => Err(ExtractError::Shape {
            path: path.to_path_buf(),
            message: format!("expected a top-level array of records, got {}", kind(&other)),
        }),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn vip_loader_keeps_digit_lines_and_drops_the_rest() {
        let f = file_with("7\n 12 \nabc\n9x\n\n3\n");
        let ids = load_vip_ids(f.path()).unwrap();
        assert_eq!(ids, HashSet::from([7, 12, 3]));
    }

    #[test]
    fn vip_loader_missing_file_is_fatal() {
        let err = load_vip_ids(Path::new("does_not_exist.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn customer_loader_requires_a_top_level_array() {
        let f = file_with(r#"[{"id": 1}, "stray", 4]"#);
        let customers = load_customers(f.path()).unwrap();
        // Elements are not validated here; the flattener classifies them.
        assert_eq!(customers.len(), 3);

        let f = file_with(r#"{"id": 1}"#);
        assert!(matches!(
            load_customers(f.path()).unwrap_err(),
            ExtractError::Shape { .. }
        ));

        let f = file_with("not json at all");
        assert!(matches!(
            load_customers(f.path()).unwrap_err(),
            ExtractError::Json { .. }
        ));
    }
}
