//! Resource list files
//!
//! One resource per line as `kind|name|id`. Blank lines and lines starting
//! with `#` are ignored; there is no escaping, so names cannot contain `|`.
//!
//! ```text
//! # left over from run 42
//! instances|vm-a|1111
//! networks|net-a|2222
//! keypairs|ci-key|
//! ```

use super::RecordError;
use stack_sweep_common::defaults::COMMENT_MARKER;
use stack_sweep_common::{Domain, ResourceDescriptor, ResourceKind};

/// Domain that reports lines whose kind cannot be determined
///
/// Such lines belong to no domain, so they are reported exactly once, by
/// the first domain a run collects.
pub const UNATTRIBUTED_DOMAIN: Domain = Domain::ALL[0];

/// Parse one line of a resource list file
///
/// Returns `None` for lines that are skipped (blank, comment, or a valid
/// record belonging to another domain).
pub fn parse_line(
    line_number: usize,
    line: &str,
    domain: Domain,
) -> Option<Result<ResourceDescriptor, RecordError>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
        return None;
    }

    let fields: Vec<&str> = trimmed.split('|').map(str::trim).collect();
    let [kind, name, id] = fields.as_slice() else {
        return (domain == UNATTRIBUTED_DOMAIN).then(|| {
            Err(RecordError::FieldCount {
                line: line_number,
                found: fields.len(),
            })
        });
    };

    let Ok(kind) = kind.parse::<ResourceKind>() else {
        return (domain == UNATTRIBUTED_DOMAIN).then(|| {
            Err(RecordError::UnknownKind {
                line: line_number,
                kind: kind.to_string(),
            })
        });
    };

    if kind.domain() != domain {
        return None;
    }

    // Keypairs are addressed by name
    let id = match (*id, kind) {
        ("", ResourceKind::Keypair) => *name,
        (id, _) => id,
    };
    if id.is_empty() {
        return Some(Err(RecordError::EmptyId {
            line: line_number,
            kind,
        }));
    }

    Some(Ok(ResourceDescriptor::new(kind, *name, id)))
}

/// Lazily parse file content for one domain
pub fn parse_content(
    content: String,
    domain: Domain,
) -> impl Iterator<Item = Result<ResourceDescriptor, RecordError>> + Send {
    let lines: Vec<String> = content.lines().map(str::to_owned).collect();
    lines
        .into_iter()
        .enumerate()
        .filter_map(move |(index, line)| parse_line(index + 1, &line, domain))
}
