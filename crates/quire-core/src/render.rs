use std::fs;
use std::path::{Path, PathBuf};

use quire_config::{RenderSettings, SampleSettings};
use serde::Serialize;
use tracing::{debug, info};

use crate::convert::{Converter, LocatedIssue};
use crate::error::{BookError, BookResult};
use crate::fs::write_atomic;
use crate::page::{render_contents, render_page, PageContext};
use crate::samples::SampleChecker;
use crate::tree::{DocumentNode, DocumentTree};

/// Summary of a completed render run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RenderReport {
    pub output_root: PathBuf,
    pub pages: Vec<RenderedPage>,
    /// Output-relative path of the contents page, when one was written.
    pub contents: Option<PathBuf>,
}

impl RenderReport {
    pub fn sample_issue_count(&self) -> usize {
        self.pages.iter().map(|page| page.sample_issues.len()).sum()
    }
}

/// One page persisted by the renderer.
#[derive(Clone, Debug, Serialize)]
pub struct RenderedPage {
    pub title: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_issues: Vec<LocatedIssue>,
}

/// Walks a document tree and writes one page per node.
pub struct Renderer<'a> {
    pub render: &'a RenderSettings,
    pub samples: &'a SampleSettings,
    pub checker: &'a dyn SampleChecker,
}

impl Renderer<'_> {
    /// Render every node of `tree` under `output_root` in depth-first manifest order.
    pub fn render(
        &self,
        book_title: Option<&str>,
        tree: &DocumentTree,
        output_root: &Path,
    ) -> BookResult<RenderReport> {
        fs::create_dir_all(output_root).map_err(|source| BookError::Write {
            path: output_root.to_path_buf(),
            source,
        })?;

        let order: Vec<(usize, &DocumentNode)> = tree.walk().collect();
        let contents = self.contents_location(&order);
        let links = tree.outputs_by_source();
        let converter = Converter::new(self.render, self.samples, self.checker, &links);

        let mut report = RenderReport {
            output_root: output_root.to_path_buf(),
            ..RenderReport::default()
        };
        let mut ancestors: Vec<&DocumentNode> = Vec::new();

        for (position, &(depth, node)) in order.iter().enumerate() {
            ancestors.truncate(depth);

            let source = node.read_source()?;
            let converted = converter.convert(node, &source)?;
            drop(source);

            let context = PageContext {
                book_title,
                node,
                ancestors: &ancestors,
                previous: position
                    .checked_sub(1)
                    .and_then(|index| order.get(index))
                    .map(|&(_, previous)| previous),
                next: order.get(position + 1).map(|&(_, next)| next),
                contents: contents.as_deref(),
            };
            let page = render_page(self.render, &context, &converted.html);
            let target = output_root.join(&node.output);
            persist(&target, &page)?;
            debug!(output = %target.display(), bytes = page.len(), "wrote page");

            report.pages.push(RenderedPage {
                title: node.title.clone(),
                source: node.source.clone(),
                output: node.output.clone(),
                bytes: page.len(),
                sample_issues: converted.sample_issues,
            });
            ancestors.push(node);
        }

        if let Some(location) = contents {
            let page = render_contents(self.render, book_title, tree, &location);
            let target = output_root.join(&location);
            persist(&target, &page)?;
            debug!(output = %target.display(), "wrote contents page");
            report.contents = Some(location);
        }

        info!(
            pages = report.pages.len(),
            output = %output_root.display(),
            "rendered book"
        );
        Ok(report)
    }

    /// Contents page location, unless disabled, the book is empty, or a chapter
    /// already renders to the same path.
    fn contents_location(&self, order: &[(usize, &DocumentNode)]) -> Option<PathBuf> {
        let location = self.render.contents_page.clone()?;
        if order.is_empty() {
            return None;
        }
        if order.iter().any(|(_, node)| node.output == location) {
            debug!(
                contents = %location.display(),
                "a chapter occupies the contents page path, skipping contents page"
            );
            return None;
        }
        Some(location)
    }
}

fn persist(target: &Path, page: &str) -> BookResult<()> {
    write_atomic(target, page.as_bytes()).map_err(|source| BookError::Write {
        path: target.to_path_buf(),
        source,
    })
}
