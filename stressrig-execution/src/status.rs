//! Parsing and verification of the tabular status listing

use serde::Serialize;
use stressrig_core::{split_fields, ResourceId};
use stressrig_resilience::Verdict;

/// Number of fields in a status row: name, revision, desired, current, trigger
pub const STATUS_FIELDS: usize = 5;

/// One row of the status listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub name: String,
    pub revision: String,
    pub desired: String,
    pub current: String,
    pub trigger: String,
}

impl StatusRow {
    pub fn is_converged(&self) -> bool {
        self.desired == self.current
    }
}

/// A row that does not have exactly [`STATUS_FIELDS`] fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {STATUS_FIELDS} fields on line {line}, got {found}: {text:?}")]
pub struct MalformedRow {
    pub line: usize,
    pub found: usize,
    pub text: String,
}

/// Parse a status listing.
///
/// Blank lines and the header row (first field `NAME`) are skipped. Any
/// other row must have exactly five fields, otherwise the whole listing is
/// rejected.
pub fn parse_listing(output: &[u8]) -> Result<Vec<StatusRow>, MalformedRow> {
    let mut rows = Vec::new();

    for (n, line) in output.split(|b| *b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let mut fields = split_fields(line);
        if fields.is_empty() || fields[0] == "NAME" {
            continue;
        }
        if fields.len() != STATUS_FIELDS {
            return Err(MalformedRow {
                line: n + 1,
                found: fields.len(),
                text: String::from_utf8_lossy(line).trim_end().to_string(),
            });
        }

        let trigger = fields.pop().unwrap_or_default();
        let current = fields.pop().unwrap_or_default();
        let desired = fields.pop().unwrap_or_default();
        let revision = fields.pop().unwrap_or_default();
        let name = fields.pop().unwrap_or_default();
        rows.push(StatusRow {
            name,
            revision,
            desired,
            current,
            trigger,
        });
    }

    Ok(rows)
}

/// Decide whether a scale request on `target` has converged.
///
/// A missing row means the resource is not visible yet and is retried. A
/// malformed row anywhere in the listing is a hard failure.
pub fn verify_scale(output: &[u8], target: &ResourceId) -> Verdict {
    let rows = match parse_listing(output) {
        Ok(rows) => rows,
        Err(e) => return Verdict::Failed(e.to_string()),
    };

    match rows.iter().find(|row| row.name == target.as_str()) {
        Some(row) if row.is_converged() => Verdict::Converged,
        _ => Verdict::Retry,
    }
}
