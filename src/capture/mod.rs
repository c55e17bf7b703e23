//! Capture Layer
//!
//! Units of work fed into the pipeline: individual photos and the
//! per-site groups of near-duplicate photos taken of one fixture.

pub mod frame;

pub use frame::RawImage;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A group of photos of one physical fixture
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    /// Group identifier (site / point name)
    pub group_id: String,
    /// Photos in encounter order
    pub images: Vec<RawImage>,
}

impl ProcessingJob {
    /// Create a new job
    pub fn new(group_id: impl Into<String>, images: Vec<RawImage>) -> Self {
        Self {
            group_id: group_id.into(),
            images,
        }
    }
}

/// Group photo paths into jobs.
///
/// Files found inside a directory are grouped by that directory's name;
/// loose files (`roots` entries that are files themselves) each become a
/// single-image group named after the file. Group order follows first
/// appearance, file order inside a group is preserved.
pub fn group_paths(entries: &[(PathBuf, bool)]) -> Vec<(String, Vec<PathBuf>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for (path, from_directory) in entries {
        let group_id = if *from_directory {
            parent_name(path).unwrap_or_else(|| file_name(path))
        } else {
            file_name(path)
        };

        if !groups.contains_key(&group_id) {
            order.push(group_id.clone());
        }
        groups.entry(group_id).or_default().push(path.clone());
    }

    order
        .into_iter()
        .filter_map(|id| groups.remove(&id).map(|paths| (id, paths)))
        .collect()
}

fn parent_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
