//! Resolution of manifest entries into the document tree.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::slice;

use crate::error::{BookError, BookResult};
use crate::manifest::{Manifest, ManifestEntry};
use crate::paths::display_slash;
use crate::suggest::closest_source;

/// One resolved chapter. Source text is read on demand, never held by the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentNode {
    pub title: String,
    /// Path as written in the manifest, relative to the content root.
    pub path: PathBuf,
    /// Absolute location of the source file.
    pub source: PathBuf,
    /// Location of the rendered page relative to the output root.
    pub output: PathBuf,
    pub children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// Read the source text of this chapter.
    pub fn read_source(&self) -> BookResult<String> {
        let bytes = fs::read(&self.source).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => BookError::SourceNotFound {
                path: self.path.clone(),
                root: content_root_of(&self.source, &self.path),
                suggestion: None,
            },
            _ => BookError::conversion(&self.source, format!("unreadable source: {err}")),
        })?;
        String::from_utf8(bytes)
            .map_err(|_| BookError::conversion(&self.source, "source is not valid UTF-8"))
    }
}

fn content_root_of(source: &Path, relative: &Path) -> PathBuf {
    let mut root = source.to_path_buf();
    for _ in relative.components() {
        root.pop();
    }
    root
}

/// Ordered tree of resolved chapters mirroring the manifest.
#[derive(Clone, Debug)]
pub struct DocumentTree {
    roots: Vec<DocumentNode>,
}

impl DocumentTree {
    /// Resolve every manifest entry against `content_root`.
    ///
    /// Fails on the first entry whose source file does not exist; the check only
    /// looks at metadata, no contents are read.
    pub fn build(manifest: &Manifest, content_root: &Path, extension: &str) -> BookResult<Self> {
        let mut builder = TreeBuilder {
            manifest,
            content_root,
            extension,
            outputs: HashSet::new(),
        };
        let roots = builder.resolve_siblings(&manifest.entries, Path::new(""))?;
        Ok(DocumentTree { roots })
    }

    pub fn roots(&self) -> &[DocumentNode] {
        &self.roots
    }

    /// Total number of nodes at every depth.
    pub fn len(&self) -> usize {
        self.walk().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Depth-first traversal in manifest order yielding `(depth, node)`.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![self.roots.iter()],
        }
    }

    /// Map from normalised source path to output path, first occurrence wins.
    pub fn outputs_by_source(&self) -> HashMap<PathBuf, PathBuf> {
        let mut index = HashMap::new();
        for (_, node) in self.walk() {
            index
                .entry(node.path.clone())
                .or_insert_with(|| node.output.clone());
        }
        index
    }
}

/// Iterator returned by [`DocumentTree::walk`].
pub struct Walk<'a> {
    stack: Vec<slice::Iter<'a, DocumentNode>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a DocumentNode);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len().checked_sub(1)?;
            match self.stack[depth].next() {
                Some(node) => {
                    self.stack.push(node.children.iter());
                    return Some((depth, node));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    manifest: &'a Manifest,
    content_root: &'a Path,
    extension: &'a str,
    outputs: HashSet<PathBuf>,
}

impl TreeBuilder<'_> {
    fn resolve_siblings(
        &mut self,
        entries: &[ManifestEntry],
        output_dir: &Path,
    ) -> BookResult<Vec<DocumentNode>> {
        entries
            .iter()
            .map(|entry| self.resolve(entry, output_dir))
            .collect()
    }

    fn resolve(&mut self, entry: &ManifestEntry, output_dir: &Path) -> BookResult<DocumentNode> {
        let source = self.content_root.join(&entry.path);
        if !source.is_file() {
            return Err(BookError::SourceNotFound {
                path: entry.path.clone(),
                root: self.content_root.to_path_buf(),
                suggestion: closest_source(self.content_root, &entry.path),
            });
        }

        let output = output_dir.join(entry.path.with_extension(self.extension));
        if !self.outputs.insert(output.clone()) {
            return Err(BookError::manifest_format(
                &self.manifest.path,
                format!(
                    "entry \"{}\" renders to '{}', which another entry already uses",
                    entry.title,
                    display_slash(&output)
                ),
            ));
        }

        let child_dir = output_dir.join(entry.path.with_extension(""));
        let children = self.resolve_siblings(&entry.children, &child_dir)?;

        Ok(DocumentNode {
            title: entry.title.clone(),
            path: entry.path.clone(),
            source,
            output,
            children,
        })
    }
}
