//! Fixed HTML shell wrapped around converted chapters, plus the contents page.

use std::fmt::Write as _;
use std::path::Path;

use pulldown_cmark::escape;
use quire_config::RenderSettings;

use crate::paths::{is_external, relative_url};
use crate::tree::{DocumentNode, DocumentTree};

/// Everything the shell needs to know about one chapter's surroundings.
pub struct PageContext<'a> {
    pub book_title: Option<&'a str>,
    pub node: &'a DocumentNode,
    pub ancestors: &'a [&'a DocumentNode],
    pub previous: Option<&'a DocumentNode>,
    pub next: Option<&'a DocumentNode>,
    /// Output-relative path of the contents page when one is written.
    pub contents: Option<&'a Path>,
}

/// Escape text for use in HTML bodies and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = escape::escape_html(&mut escaped, text);
    escaped
}

/// Wrap a converted chapter body according to the render settings.
pub fn render_page(settings: &RenderSettings, context: &PageContext<'_>, body: &str) -> String {
    if !settings.standalone {
        return body.to_string();
    }

    let node = context.node;
    let title = match context.book_title {
        Some(book) => format!("{} - {}", node.title, book),
        None => node.title.clone(),
    };

    let mut page = String::with_capacity(body.len() + 1024);
    open_document(&mut page, settings, &node.output, &title);

    if !context.ancestors.is_empty() || context.contents.is_some() {
        page.push_str("<nav class=\"breadcrumbs\">");
        let mut crumbs = Vec::new();
        if let Some(contents) = context.contents {
            crumbs.push(link(&node.output, contents, "Contents"));
        }
        for ancestor in context.ancestors {
            crumbs.push(link(&node.output, &ancestor.output, &ancestor.title));
        }
        page.push_str(&crumbs.join(" &rsaquo; "));
        page.push_str("</nav>\n");
    }

    page.push_str("<main>\n");
    page.push_str(body);
    if !body.ends_with('\n') {
        page.push('\n');
    }
    page.push_str("</main>\n");

    if settings.navigation && (context.previous.is_some() || context.next.is_some()) {
        page.push_str("<nav class=\"pager\">\n");
        if let Some(previous) = context.previous {
            let _ = writeln!(
                page,
                "<a rel=\"prev\" href=\"{}\">&larr; {}</a>",
                escape_html(&relative_url(&node.output, &previous.output)),
                escape_html(&previous.title)
            );
        }
        if let Some(next) = context.next {
            let _ = writeln!(
                page,
                "<a rel=\"next\" href=\"{}\">{} &rarr;</a>",
                escape_html(&relative_url(&node.output, &next.output)),
                escape_html(&next.title)
            );
        }
        page.push_str("</nav>\n");
    }

    close_document(&mut page);
    page
}

/// Render the nested chapter listing written at `location`.
pub fn render_contents(
    settings: &RenderSettings,
    book_title: Option<&str>,
    tree: &DocumentTree,
    location: &Path,
) -> String {
    let mut list = String::new();
    write_list(&mut list, tree.roots(), location, 0);

    if !settings.standalone {
        return list;
    }

    let title = book_title.unwrap_or("Contents");
    let mut page = String::with_capacity(list.len() + 512);
    open_document(&mut page, settings, location, title);
    page.push_str("<main>\n");
    let _ = writeln!(page, "<h1>{}</h1>", escape_html(title));
    page.push_str(&list);
    page.push_str("</main>\n");
    close_document(&mut page);
    page
}

fn write_list(out: &mut String, nodes: &[DocumentNode], location: &Path, depth: usize) {
    if nodes.is_empty() {
        return;
    }
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{indent}<ol class=\"chapters\">");
    for node in nodes {
        let _ = write!(out, "{indent}  <li>{}", link(location, &node.output, &node.title));
        if node.children.is_empty() {
            out.push_str("</li>\n");
        } else {
            out.push('\n');
            write_list(out, &node.children, location, depth + 2);
            let _ = writeln!(out, "{indent}  </li>");
        }
    }
    let _ = writeln!(out, "{indent}</ol>");
}

fn link(from: &Path, to: &Path, text: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape_html(&relative_url(from, to)),
        escape_html(text)
    )
}

fn open_document(page: &mut String, settings: &RenderSettings, location: &Path, title: &str) {
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(page, "<title>{}</title>", escape_html(title));
    if let Some(stylesheet) = settings.stylesheet.as_deref() {
        let href = if is_external(stylesheet) {
            stylesheet.to_string()
        } else {
            relative_url(location, Path::new(stylesheet))
        };
        let _ = writeln!(
            page,
            "<link rel=\"stylesheet\" href=\"{}\">",
            escape_html(&href)
        );
    }
    page.push_str("</head>\n<body>\n");
}

fn close_document(page: &mut String) {
    page.push_str("</body>\n</html>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn settings() -> RenderSettings {
        RenderSettings {
            extension: "html".into(),
            standalone: true,
            navigation: true,
            heading_anchors: true,
            smart_punctuation: false,
            contents_page: Some(PathBuf::from("index.html")),
            stylesheet: Some("style.css".into()),
        }
    }

    fn node(title: &str, output: &str) -> DocumentNode {
        DocumentNode {
            title: title.into(),
            path: PathBuf::from(output).with_extension("md"),
            source: PathBuf::from("/book").join(output).with_extension("md"),
            output: PathBuf::from(output),
            children: Vec::new(),
        }
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; 'Jerry'&lt;/a&gt;"
        );
    }

    #[test]
    fn standalone_page_has_breadcrumbs_and_pager() {
        let parent = node("Guide", "guide.html");
        let current = node("Setup <1>", "guide/setup.html");
        let next = node("Deploy", "guide/deploy.html");
        let ancestors = [&parent];
        let context = PageContext {
            book_title: Some("Manual"),
            node: &current,
            ancestors: &ancestors,
            previous: Some(&parent),
            next: Some(&next),
            contents: Some(Path::new("index.html")),
        };

        let page = render_page(&settings(), &context, "<p>Body</p>\n");
        assert_eq!(
            page,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
<title>Setup &lt;1&gt; - Manual</title>\n\
<link rel=\"stylesheet\" href=\"../style.css\">\n\
</head>\n<body>\n\
<nav class=\"breadcrumbs\"><a href=\"../index.html\">Contents</a> &rsaquo; <a href=\"../guide.html\">Guide</a></nav>\n\
<main>\n<p>Body</p>\n</main>\n\
<nav class=\"pager\">\n\
<a rel=\"prev\" href=\"../guide.html\">&larr; Guide</a>\n\
<a rel=\"next\" href=\"deploy.html\">Deploy &rarr;</a>\n\
</nav>\n\
</body>\n</html>\n"
        );
    }

    #[test]
    fn fragment_mode_returns_body_only() {
        let mut settings = settings();
        settings.standalone = false;
        let current = node("Intro", "intro.html");
        let context = PageContext {
            book_title: None,
            node: &current,
            ancestors: &[],
            previous: None,
            next: None,
            contents: None,
        };
        assert_eq!(render_page(&settings, &context, "<p>x</p>\n"), "<p>x</p>\n");
    }
}
