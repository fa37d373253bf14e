//! Loading and rendering of manifest-driven books.
//!
//! A run is a straight pipeline: [`Manifest::load`] reads the structure file,
//! [`DocumentTree::build`] resolves it against the content root, and the
//! [`Renderer`] converts and writes each chapter. [`Book`] bundles the three.

pub mod anchors;
pub mod book;
pub mod convert;
pub mod error;
pub mod fs;
pub mod manifest;
pub mod page;
pub mod paths;
pub mod render;
pub mod samples;
pub mod suggest;
pub mod tree;

pub use book::Book;
pub use convert::{ConvertedDocument, Converter, LocatedIssue};
pub use error::{BookError, BookResult, ExitCode};
pub use manifest::{Manifest, ManifestEntry};
pub use render::{RenderReport, RenderedPage, Renderer};
pub use samples::{DelimiterChecker, SampleChecker, SampleIssue};
pub use tree::{DocumentNode, DocumentTree};
