//! Dataset manifest loading.
//!
//! A manifest is either a JSON array of objects (`.json`) or one object per
//! line (`.jsonl`). Each record becomes a [`WorkItem`] holding the projected
//! caption columns, in column order, plus an optional time window.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use vfeat_models::{span_seconds, TimeWindow, WorkItem};

use crate::error::{WorkerError, WorkerResult};

/// Which fields to read from each record.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSpec {
    pub id_field: String,
    pub columns: Vec<String>,
    pub span_field: Option<String>,
}

impl ManifestSpec {
    /// Projected columns with the id field first and no repeats.
    pub fn projection(&self) -> Vec<&str> {
        let mut cols = vec![self.id_field.as_str()];
        for c in &self.columns {
            if !cols.contains(&c.as_str()) {
                cols.push(c);
            }
        }
        cols
    }
}

/// Load and project the manifest at `path`.
pub fn load_manifest(path: &Path, spec: &ManifestSpec) -> WorkerResult<Vec<WorkItem>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| WorkerError::malformed(format!("cannot read {}: {e}", path.display())))?;

    let is_jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jsonl"));
    let records = if is_jsonl {
        parse_jsonl(&text)?
    } else {
        parse_json_array(&text)?
    };

    let items = project(records, spec)?;
    info!(manifest = %path.display(), items = items.len(), "Manifest loaded");
    Ok(items)
}

fn parse_json_array(text: &str) -> WorkerResult<Vec<Map<String, Value>>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| WorkerError::malformed(format!("invalid JSON: {e}")))?;
    let Value::Array(entries) = value else {
        return Err(WorkerError::malformed("expected a JSON array of records"));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::Object(map) => Ok(map),
            _ => Err(WorkerError::malformed(format!("record {i} is not an object"))),
        })
        .collect()
}

fn parse_jsonl(text: &str) -> WorkerResult<Vec<Map<String, Value>>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(WorkerError::malformed(format!("line {} is not an object", n + 1))),
            Err(e) => Err(WorkerError::malformed(format!("line {}: {e}", n + 1))),
        })
        .collect()
}

/// Project raw records to work items.
pub fn project(records: Vec<Map<String, Value>>, spec: &ManifestSpec) -> WorkerResult<Vec<WorkItem>> {
    let columns = spec.projection();

    // A column must appear in at least one record
    if !records.is_empty() {
        for col in &columns {
            if !records.iter().any(|r| r.contains_key(*col)) {
                return Err(WorkerError::MissingField(col.to_string()));
            }
        }
    }

    let mut seen = HashSet::with_capacity(records.len());
    let mut items = Vec::with_capacity(records.len());

    for (i, record) in records.into_iter().enumerate() {
        let clip_id = record_id(&record, &spec.id_field)
            .ok_or_else(|| WorkerError::malformed(format!("record {i} has no usable '{}'", spec.id_field)))?;

        if !seen.insert(clip_id.clone()) {
            warn!(clip_id = %clip_id, record = i, "Duplicate clip id, keeping first occurrence");
            continue;
        }

        let window = match &spec.span_field {
            Some(field) => parse_span(record.get(field))
                .map_err(|msg| WorkerError::malformed(format!("record {i} ({clip_id}): {msg}")))?,
            None => None,
        };

        let mut captions = Map::with_capacity(columns.len());
        for col in &columns {
            let value = if *col == spec.id_field {
                Value::String(clip_id.clone())
            } else {
                record.get(*col).cloned().unwrap_or(Value::Null)
            };
            captions.insert(col.to_string(), value);
        }

        let item = WorkItem::new(clip_id, captions);
        items.push(match window {
            Some(w) => item.with_window(w),
            None => item,
        });
    }

    Ok(items)
}

/// Identifier as a string; integers are stringified.
fn record_id(record: &Map<String, Value>, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a `[start, end]` span of timestamp strings or numeric seconds.
/// A missing or null span means the whole clip.
fn parse_span(value: Option<&Value>) -> Result<Option<TimeWindow>, String> {
    let bounds = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(bounds)) if bounds.len() == 2 => bounds,
        Some(other) => return Err(format!("span must be a [start, end] pair, got {other}")),
    };

    let seconds = |v: &Value| -> Result<f64, String> {
        match v {
            Value::String(s) => span_seconds(s).map_err(|e| e.to_string()),
            Value::Number(n) => n.as_f64().ok_or_else(|| format!("invalid span bound {n}")),
            other => Err(format!("invalid span bound {other}")),
        }
    };

    let window = TimeWindow::new(seconds(&bounds[0])?, seconds(&bounds[1])?).map_err(|e| e.to_string())?;
    Ok(Some(window))
}
