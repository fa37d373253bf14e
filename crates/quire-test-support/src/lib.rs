//! Shared test harness utilities for quire crates.

use std::fs;
use std::path::{Path, PathBuf};

use quire_config::{Config, LoadOptions};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Temporary book workspace with a content root, manifest and output root.
pub struct BookFixture {
    _temp: TempDir,
    root: PathBuf,
}

impl BookFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonicalize tempdir");
        Self { _temp: temp, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default manifest location, `config/structure.yml`.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("config/structure.yml")
    }

    /// Default output root, `_book`.
    pub fn output(&self) -> PathBuf {
        self.root.join("_book")
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> &Self {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, contents).expect("write fixture file");
        self
    }

    pub fn manifest(&self, yaml: &str) -> &Self {
        self.write("config/structure.yml", yaml)
    }

    /// Configuration resolved with the fixture root as working directory.
    pub fn config(&self) -> Config {
        Config::load(LoadOptions::default().with_working_dir(&self.root)).expect("load config")
    }

    /// Sorted, slash-separated paths of every file under `dir`.
    pub fn files_under(dir: &Path) -> Vec<String> {
        if !dir.exists() {
            return Vec::new();
        }
        let mut files: Vec<String> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(dir)
                    .expect("entry under dir")
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();
        files.sort();
        files
    }

    pub fn read_output(&self, relative: &str) -> String {
        fs::read_to_string(self.output().join(relative)).expect("read rendered output")
    }
}

impl Default for BookFixture {
    fn default() -> Self {
        Self::new()
    }
}
