//! Markdown to HTML conversion for a single chapter.
//!
//! Conversion runs on the parsed event stream: headings are given anchors,
//! links between book sources are rewritten to point at the rendered pages,
//! and fenced samples in checked languages are handed to a [`SampleChecker`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag};
use quire_config::{RenderSettings, SampleSettings};
use tracing::warn;

use crate::anchors::{generate_anchor, AnchorRegistry};
use crate::error::{BookError, BookResult};
use crate::page::escape_html;
use crate::paths::{is_external, normalize_relative, relative_url, split_link_target};
use crate::samples::{SampleChecker, SampleIssue};
use crate::tree::DocumentNode;

/// Converted chapter body.
#[derive(Clone, Debug, Default)]
pub struct ConvertedDocument {
    pub html: String,
    /// Sample issues that were reported as warnings.
    pub sample_issues: Vec<LocatedIssue>,
}

/// Sample issue positioned within the chapter source.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LocatedIssue {
    pub language: String,
    pub line: usize,
    pub message: String,
}

/// Converts chapter sources using the book-wide link index.
pub struct Converter<'a> {
    render: &'a RenderSettings,
    samples: &'a SampleSettings,
    checker: &'a dyn SampleChecker,
    links: &'a HashMap<PathBuf, PathBuf>,
}

impl<'a> Converter<'a> {
    pub fn new(
        render: &'a RenderSettings,
        samples: &'a SampleSettings,
        checker: &'a dyn SampleChecker,
        links: &'a HashMap<PathBuf, PathBuf>,
    ) -> Self {
        Self {
            render,
            samples,
            checker,
            links,
        }
    }

    fn options(&self) -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        if self.render.smart_punctuation {
            options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }
        options
    }

    /// Convert the raw `source` text of `node` into an HTML fragment.
    pub fn convert(&self, node: &DocumentNode, source: &str) -> BookResult<ConvertedDocument> {
        let (body, skipped_lines) = strip_front_matter(source)
            .ok_or_else(|| BookError::conversion(&node.source, "unterminated front matter"))?;

        let mut events = Vec::new();
        let mut anchors = AnchorRegistry::default();
        let mut heading: Option<PendingHeading> = None;
        let mut sample: Option<PendingSample> = None;
        let mut sample_issues = Vec::new();

        for (event, range) in Parser::new_ext(body, self.options()).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading(level, id, classes)) => {
                    heading = Some(PendingHeading {
                        index: events.len(),
                        level: level as usize,
                        id: id.map(str::to_string),
                        classes: classes.iter().map(|class| class.to_string()).collect(),
                        text: String::new(),
                    });
                    events.push(Event::Start(Tag::Heading(level, id, classes)));
                }
                Event::End(Tag::Heading(level, id, classes)) => {
                    if let Some(pending) = heading.take() {
                        if let Some(opening) = self.heading_opening(&pending, &mut anchors) {
                            events[pending.index] = Event::Html(CowStr::from(opening));
                        }
                    }
                    events.push(Event::End(Tag::Heading(level, id, classes)));
                }
                Event::Start(Tag::Link(kind, destination, title)) => {
                    let destination = match self.rewrite_link(node, &destination) {
                        Some(rewritten) => CowStr::from(rewritten),
                        None => destination,
                    };
                    events.push(Event::Start(Tag::Link(kind, destination, title)));
                }
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let language = info.split_whitespace().next().unwrap_or("").to_string();
                    if !language.is_empty() && self.samples.checks_language(&language) {
                        let fence_line = skipped_lines + line_of(body, range.start);
                        sample = Some(PendingSample {
                            language,
                            first_line: fence_line + 1,
                            code: String::new(),
                        });
                    }
                    events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))));
                }
                Event::End(Tag::CodeBlock(kind)) => {
                    if let Some(pending) = sample.take() {
                        sample_issues.extend(self.check_sample(node, pending)?);
                    }
                    events.push(Event::End(Tag::CodeBlock(kind)));
                }
                Event::Text(text) => {
                    if let Some(pending) = heading.as_mut() {
                        pending.text.push_str(&text);
                    }
                    if let Some(pending) = sample.as_mut() {
                        pending.code.push_str(&text);
                    }
                    events.push(Event::Text(text));
                }
                Event::Code(code) => {
                    if let Some(pending) = heading.as_mut() {
                        pending.text.push_str(&code);
                    }
                    events.push(Event::Code(code));
                }
                other => events.push(other),
            }
        }

        let mut rendered = String::with_capacity(body.len() * 3 / 2);
        html::push_html(&mut rendered, events.into_iter());

        Ok(ConvertedDocument {
            html: rendered,
            sample_issues,
        })
    }

    /// Opening tag carrying an anchor, or `None` to keep the default markup.
    fn heading_opening(
        &self,
        pending: &PendingHeading,
        anchors: &mut AnchorRegistry,
    ) -> Option<String> {
        let anchor = match &pending.id {
            Some(explicit) => anchors.claim(explicit),
            None if self.render.heading_anchors => {
                anchors.claim(&generate_anchor(pending.text.trim()))
            }
            None => return None,
        };

        let mut opening = format!("<h{} id=\"{}\"", pending.level, escape_html(&anchor));
        if !pending.classes.is_empty() {
            opening.push_str(&format!(
                " class=\"{}\"",
                escape_html(&pending.classes.join(" "))
            ));
        }
        opening.push('>');
        Some(opening)
    }

    /// Map a link to another book source onto the URL of its rendered page.
    fn rewrite_link(&self, node: &DocumentNode, destination: &str) -> Option<String> {
        if is_external(destination) {
            return None;
        }
        let (path, fragment) = split_link_target(destination);
        if path.is_empty() {
            return None;
        }

        let decoded = percent_decode_str(path).decode_utf8().ok()?;
        let joined = match decoded.strip_prefix('/') {
            Some(rooted) => PathBuf::from(rooted),
            None => node
                .path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(&*decoded),
        };
        let target = normalize_relative(&joined)?;
        let output = self.links.get(&target)?;

        let mut url = relative_url(&node.output, output);
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }
        Some(url)
    }

    fn check_sample(
        &self,
        node: &DocumentNode,
        pending: PendingSample,
    ) -> BookResult<Vec<LocatedIssue>> {
        let issues = self.checker.check(&pending.language, &pending.code);
        let located: Vec<LocatedIssue> = issues
            .into_iter()
            .map(|SampleIssue { line, message }| LocatedIssue {
                language: pending.language.clone(),
                line: pending.first_line + line - 1,
                message,
            })
            .collect();

        if let Some(first) = located.first() {
            if self.samples.strict {
                return Err(BookError::conversion(
                    &node.source,
                    format!(
                        "{} sample at line {}: {}",
                        first.language, first.line, first.message
                    ),
                ));
            }
        }

        for issue in &located {
            warn!(
                source = %node.source.display(),
                line = issue.line,
                language = %issue.language,
                "code sample: {}",
                issue.message
            );
        }
        Ok(located)
    }
}

struct PendingHeading {
    index: usize,
    level: usize,
    id: Option<String>,
    classes: Vec<String>,
    text: String,
}

struct PendingSample {
    language: String,
    first_line: usize,
    code: String,
}

/// Split off a leading `---` front matter block. Returns the remaining body and
/// the number of lines removed, or `None` when the block never closes.
///
/// The block only counts as front matter when the line after the opening
/// fence is a `key:` entry; otherwise the `---` is a thematic break.
fn strip_front_matter(source: &str) -> Option<(&str, usize)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = source.split_inclusive('\n');
    match (lines.next(), lines.next()) {
        (Some(first), Some(second)) if first.trim() == "---" && is_yaml_key_line(second) => {}
        _ => return Some((source, 0)),
    }

    let mut offset = 0usize;
    let mut skipped = 0usize;
    for line in source.split_inclusive('\n') {
        offset += line.len();
        skipped += 1;
        let trimmed = line.trim();
        if skipped > 1 && (trimmed == "---" || trimmed == "...") {
            return Some((&source[offset..], skipped));
        }
    }
    None
}

fn is_yaml_key_line(line: &str) -> bool {
    let Some((key, rest)) = line.trim_end().split_once(':') else {
        return false;
    };
    !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
        && (rest.is_empty() || rest.starts_with(' '))
}

/// 1-based line number of byte `offset` within `text`.
fn line_of(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::DelimiterChecker;
    use pretty_assertions::assert_eq;

    fn render_settings() -> RenderSettings {
        RenderSettings {
            extension: "html".into(),
            standalone: false,
            navigation: false,
            heading_anchors: true,
            smart_punctuation: false,
            contents_page: None,
            stylesheet: None,
        }
    }

    fn sample_settings(strict: bool) -> SampleSettings {
        SampleSettings {
            languages: vec!["rust".into()],
            strict,
        }
    }

    fn node(path: &str, output: &str) -> DocumentNode {
        DocumentNode {
            title: "Test".into(),
            path: PathBuf::from(path),
            source: PathBuf::from("/book").join(path),
            output: PathBuf::from(output),
            children: Vec::new(),
        }
    }

    fn convert_with(
        render: &RenderSettings,
        samples: &SampleSettings,
        links: &HashMap<PathBuf, PathBuf>,
        node: &DocumentNode,
        source: &str,
    ) -> BookResult<ConvertedDocument> {
        Converter::new(render, samples, &DelimiterChecker, links).convert(node, source)
    }

    #[test]
    fn converts_heading_with_anchor() {
        let converted = convert_with(
            &render_settings(),
            &sample_settings(false),
            &HashMap::new(),
            &node("intro.md", "intro.html"),
            "# Hello",
        )
        .unwrap();
        assert_eq!(converted.html, "<h1 id=\"hello\">Hello</h1>\n");
    }

    #[test]
    fn deduplicates_anchors_and_honours_explicit_ids() {
        let converted = convert_with(
            &render_settings(),
            &sample_settings(false),
            &HashMap::new(),
            &node("intro.md", "intro.html"),
            "## Usage\n\n## Usage\n\n## Custom {#mine .wide}\n",
        )
        .unwrap();
        assert_eq!(
            converted.html,
            "<h2 id=\"usage\">Usage</h2>\n<h2 id=\"usage-1\">Usage</h2>\n<h2 id=\"mine\" class=\"wide\">Custom</h2>\n"
        );
    }

    #[test]
    fn leaves_headings_alone_when_anchors_disabled() {
        let mut render = render_settings();
        render.heading_anchors = false;
        let converted = convert_with(
            &render,
            &sample_settings(false),
            &HashMap::new(),
            &node("intro.md", "intro.html"),
            "# Hello",
        )
        .unwrap();
        assert_eq!(converted.html, "<h1>Hello</h1>\n");
    }

    #[test]
    fn rewrites_links_between_chapters() {
        let mut links = HashMap::new();
        links.insert(PathBuf::from("intro.md"), PathBuf::from("intro.html"));
        links.insert(
            PathBuf::from("guide/setup.md"),
            PathBuf::from("guide/setup.html"),
        );

        let converted = convert_with(
            &render_settings(),
            &sample_settings(false),
            &links,
            &node("guide/setup.md", "guide/setup.html"),
            "[back](../intro.md#top) [self](setup.md) [ext](https://x.dev/a.md) [img](diagram.png) [frag](#local)",
        )
        .unwrap();

        assert!(converted.html.contains("href=\"../intro.html#top\""), "{}", converted.html);
        assert!(converted.html.contains("href=\"setup.html\""));
        assert!(converted.html.contains("href=\"https://x.dev/a.md\""));
        assert!(converted.html.contains("href=\"diagram.png\""));
        assert!(converted.html.contains("href=\"#local\""));
    }

    #[test]
    fn strips_front_matter_and_rejects_unterminated() {
        let node = node("intro.md", "intro.html");
        let converted = convert_with(
            &render_settings(),
            &sample_settings(false),
            &HashMap::new(),
            &node,
            "---\ntitle: x\n---\n# Body\n",
        )
        .unwrap();
        assert_eq!(converted.html, "<h1 id=\"body\">Body</h1>\n");

        let err = convert_with(
            &render_settings(),
            &sample_settings(false),
            &HashMap::new(),
            &node,
            "---\ntitle: x\n# Body\n",
        )
        .unwrap_err();
        assert!(matches!(err, BookError::Conversion { .. }));
        assert!(err.to_string().contains("unterminated front matter"));
    }

    #[test]
    fn sample_issues_warn_or_fail_depending_on_strictness() {
        let node = node("intro.md", "intro.html");
        let source = "# Code\n\n```rust\nfn main() {\n```\n\n```text\n(((\n```\n";

        let converted = convert_with(
            &render_settings(),
            &sample_settings(false),
            &HashMap::new(),
            &node,
            source,
        )
        .unwrap();
        assert_eq!(
            converted.sample_issues,
            vec![LocatedIssue {
                language: "rust".into(),
                line: 4,
                message: "unclosed `{` opened on line 1".into(),
            }]
        );

        let err = convert_with(
            &render_settings(),
            &sample_settings(true),
            &HashMap::new(),
            &node,
            source,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to convert /book/intro.md: rust sample at line 4: unclosed `{` opened on line 1"
        );
    }

    #[test]
    fn leading_thematic_break_is_not_front_matter() {
        let converted = convert_with(
            &render_settings(),
            &sample_settings(false),
            &HashMap::new(),
            &node("intro.md", "intro.html"),
            "---\n\nOpening words.\n\n---\n\nMore.\n",
        )
        .unwrap();
        assert_eq!(
            converted.html,
            "<hr />\n<p>Opening words.</p>\n<hr />\n<p>More.</p>\n"
        );

        assert_eq!(
            strip_front_matter("---\nJust a rule\n"),
            Some(("---\nJust a rule\n", 0))
        );
        assert_eq!(strip_front_matter("---\n"), Some(("---\n", 0)));
    }

    #[test]
    fn front_matter_offsets_sample_lines() {
        let (body, skipped) = strip_front_matter("---\na: 1\n...\nrest\n").unwrap();
        assert_eq!(body, "rest\n");
        assert_eq!(skipped, 3);
        assert_eq!(strip_front_matter("plain\n---\n"), Some(("plain\n---\n", 0)));
        assert_eq!(line_of("a\nb\nc", 4), 3);
    }
}
