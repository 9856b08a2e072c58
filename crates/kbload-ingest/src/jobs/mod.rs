//! The concrete loads
//!
//! Each job turns its configuration and a reference snapshot into a
//! [`StagedLoad`](crate::pipeline::StagedLoad): every input parsed, resolved
//! and classified, with the report filled in and nothing written yet.

pub mod b6;
pub mod relationship;
pub mod strain_marker;
pub mod templates;

pub use relationship::RelationshipLoad;
pub use strain_marker::StrainMarkerLoad;

use std::path::Path;

/// Input file name as it appears in errors and log lines.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
