use std::path::{Path, PathBuf};

use strsim::normalized_levenshtein;
use walkdir::{DirEntry, WalkDir};

use crate::paths::display_slash;

const MIN_SIMILARITY: f64 = 0.6;

/// Find the file under `root` whose relative path most resembles `missing`.
pub fn closest_source(root: &Path, missing: &Path) -> Option<PathBuf> {
    let wanted = display_slash(missing);
    let mut best: Option<(f64, PathBuf)> = None;

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let score = normalized_levenshtein(&wanted, &display_slash(relative));
        if score < MIN_SIMILARITY {
            continue;
        }
        if best.as_ref().map_or(true, |(current, _)| score > *current) {
            best = Some((score, relative.to_path_buf()));
        }
    }

    best.map(|(_, path)| path)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
