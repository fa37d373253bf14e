use std::path::Path;

use quire_config::{Config, RenderSettings, SampleSettings};
use tracing::debug;

use crate::error::BookResult;
use crate::manifest::Manifest;
use crate::render::{RenderReport, Renderer};
use crate::samples::{DelimiterChecker, SampleChecker};
use crate::tree::DocumentTree;

/// A loaded book: the resolved document tree plus the settings used to render it.
///
/// Loading runs the manifest loader and the tree builder; [`Book::write`] runs
/// the renderer. The two steps never overlap.
pub struct Book {
    title: Option<String>,
    tree: DocumentTree,
    render: RenderSettings,
    samples: SampleSettings,
    checker: Box<dyn SampleChecker>,
}

impl Book {
    /// Load the manifest and resolve it against `content_root`.
    pub fn load(content_root: &Path, manifest_path: &Path, config: &Config) -> BookResult<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let tree = DocumentTree::build(&manifest, content_root, &config.render.extension)?;
        debug!(
            manifest = %manifest_path.display(),
            chapters = tree.len(),
            "loaded book structure"
        );

        Ok(Book {
            title: config.book.title.clone().or(manifest.title),
            tree,
            render: config.render.clone(),
            samples: config.samples.clone(),
            checker: Box::new(DelimiterChecker),
        })
    }

    /// Load using the content root and manifest named by the configuration.
    pub fn from_config(config: &Config) -> BookResult<Self> {
        Self::load(&config.book.content_root, &config.book.manifest, config)
    }

    /// Replace the code sample checker.
    pub fn with_checker(mut self, checker: Box<dyn SampleChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// Render every chapter under `output_root`.
    pub fn write(&self, output_root: &Path) -> BookResult<RenderReport> {
        let renderer = Renderer {
            render: &self.render,
            samples: &self.samples,
            checker: self.checker.as_ref(),
        };
        renderer.render(self.title(), &self.tree, output_root)
    }
}
