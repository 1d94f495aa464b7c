//! JSON store helpers shared by the cache and the report.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Result, ScanError};

/// Read a JSON object from disk.
///
/// Missing, unreadable, unparsable or non-object content all yield an empty
/// map. Callers merge into it and overwrite the file.
pub fn read_json_object(path: &Path) -> Map<String, Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read store, treating as empty");
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(path = %path.display(), "store is not a JSON object, treating as empty");
            Map::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store is corrupt, treating as empty");
            Map::new()
        }
    }
}

/// Write pretty JSON to `path` via a sibling temp file and a rename.
///
/// Readers never observe a half-written store.
pub fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ScanError::io(parent, e))?;
        }
    }

    let mut content = serde_json::to_string_pretty(value).map_err(|e| ScanError::json(path, e))?;
    content.push('\n');

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, content).map_err(|e| ScanError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ScanError::io(path, e)
    })
}
