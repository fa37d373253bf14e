//! Structure manifest loader.
//!
//! The manifest is a YAML document describing the ordered chapter tree. Two
//! shapes are accepted: a bare sequence of chapters, or a mapping carrying an
//! optional book `title` alongside its `chapters`. Both parse into the same
//! [`Manifest`].

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{BookError, BookResult};
use crate::paths::{display_slash, normalize_relative};

/// Parsed and validated structure manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub path: PathBuf,
    pub title: Option<String>,
    pub entries: Vec<ManifestEntry>,
}

/// One chapter of the manifest tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub title: String,
    /// Source path relative to the content root, already normalised.
    pub path: PathBuf,
    pub children: Vec<ManifestEntry>,
}

impl ManifestEntry {
    fn count(&self) -> usize {
        1 + self.children.iter().map(ManifestEntry::count).sum::<usize>()
    }
}

impl Manifest {
    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> BookResult<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(BookError::ManifestNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(err) => return Err(BookError::manifest_format(path, format!("unreadable: {err}"))),
        };
        Self::parse(path, &contents)
    }

    /// Parse manifest text; `path` is only used to label errors.
    pub fn parse(path: &Path, contents: &str) -> BookResult<Self> {
        let shape = RawManifest::from_str(contents)
            .map_err(|message| BookError::manifest_format(path, message))?;

        let (title, raw_entries) = match shape {
            RawManifest::Empty => (None, Vec::new()),
            RawManifest::Chapters(entries) => (None, entries),
            RawManifest::Book(book) => (book.title, book.chapters),
        };

        let title = match title {
            Some(title) if title.trim().is_empty() => {
                return Err(BookError::manifest_format(path, "book title cannot be blank"))
            }
            other => other.map(|title| title.trim().to_string()),
        };

        let entries = validate_siblings(raw_entries, None)
            .map_err(|message| BookError::manifest_format(path, message))?;

        Ok(Manifest {
            path: path.to_path_buf(),
            title,
            entries,
        })
    }

    /// Total number of entries at every nesting level.
    pub fn len(&self) -> usize {
        self.entries.iter().map(ManifestEntry::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_siblings(
    raw: Vec<RawEntry>,
    parent: Option<&str>,
) -> Result<Vec<ManifestEntry>, String> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let label = describe_entry(parent, index, &entry.title);
        let title = entry.title.trim();
        if title.is_empty() {
            return Err(format!("{label} has a blank title"));
        }

        let raw_path = entry.path.trim();
        if raw_path.is_empty() {
            return Err(format!("{label} has a blank path"));
        }
        let path = normalize_relative(Path::new(raw_path))
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| {
                format!("{label} path '{raw_path}' must stay inside the content root")
            })?;

        if !seen.insert(path.clone()) {
            let scope = match parent {
                Some(parent) => format!("under \"{parent}\""),
                None => "at the top level".to_string(),
            };
            return Err(format!(
                "duplicate path '{}' {scope}",
                display_slash(&path)
            ));
        }

        let children = validate_siblings(entry.children, Some(title))?;
        entries.push(ManifestEntry {
            title: title.to_string(),
            path,
            children,
        });
    }

    Ok(entries)
}

fn describe_entry(parent: Option<&str>, index: usize, title: &str) -> String {
    let position = match parent {
        Some(parent) => format!("entry {} under \"{parent}\"", index + 1),
        None => format!("entry {}", index + 1),
    };
    if title.trim().is_empty() {
        position
    } else {
        format!("{position} (\"{}\")", title.trim())
    }
}

/// Shape of the manifest document once the YAML has been classified.
enum RawManifest {
    Empty,
    Chapters(Vec<RawEntry>),
    Book(RawBook),
}

impl RawManifest {
    fn from_str(contents: &str) -> Result<Self, String> {
        let only_comments = contents.lines().all(|line| {
            let trimmed = line.trim();
            trimmed.is_empty() || trimmed.starts_with('#')
        });
        if only_comments {
            return Ok(RawManifest::Empty);
        }

        let value: Value = serde_yaml::from_str(contents).map_err(|err| err.to_string())?;
        match value {
            Value::Null => Ok(RawManifest::Empty),
            Value::Sequence(_) => serde_yaml::from_str(contents)
                .map(RawManifest::Chapters)
                .map_err(|err| err.to_string()),
            Value::Mapping(_) => serde_yaml::from_str(contents)
                .map(RawManifest::Book)
                .map_err(|err| err.to_string()),
            _ => Err("expected a sequence of chapters or a mapping with `chapters`".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBook {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    chapters: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    title: String,
    path: String,
    #[serde(default)]
    children: Vec<RawEntry>,
}
