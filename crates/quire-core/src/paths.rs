use std::path::{Component, Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Return true if the provided target points to an external resource (http/mailto/etc.).
pub fn is_external(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
        || lower.starts_with("//")
}

/// Split a link target into its path and optional fragment components.
pub fn split_link_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (target, None),
    }
}

/// Normalise `.` and `..` segments of a relative path without touching the
/// filesystem. Returns `None` when the path is absolute or climbs above its
/// starting directory.
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}

/// Build the URL that leads from the page at `from` to the page at `to`.
/// Both paths are relative to the same output root.
pub fn relative_url(from: &Path, to: &Path) -> String {
    let from_dir: Vec<_> = from
        .parent()
        .map(|dir| dir.components().collect())
        .unwrap_or_default();
    let target: Vec<_> = to.components().collect();

    let mut common = 0usize;
    while common < from_dir.len()
        && common + 1 < target.len()
        && from_dir[common] == target[common]
    {
        common += 1;
    }

    let mut segments: Vec<String> = Vec::new();
    for _ in common..from_dir.len() {
        segments.push("..".to_string());
    }
    for component in &target[common..] {
        if let Component::Normal(segment) = component {
            let segment = segment.to_string_lossy();
            segments.push(utf8_percent_encode(&segment, PATH_SEGMENT).to_string());
        }
    }

    segments.join("/")
}

/// Render a relative path with forward slashes regardless of platform.
pub fn display_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_rejects_escapes() {
        assert_eq!(
            normalize_relative(Path::new("./a/b/../c.md")),
            Some(PathBuf::from("a/c.md"))
        );
        assert_eq!(normalize_relative(Path::new("../c.md")), None);
        assert_eq!(normalize_relative(Path::new("a/../../c.md")), None);
        assert_eq!(normalize_relative(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn builds_relative_urls_between_pages() {
        assert_eq!(
            relative_url(Path::new("intro.html"), Path::new("basics.html")),
            "basics.html"
        );
        assert_eq!(
            relative_url(Path::new("guide/setup.html"), Path::new("intro.html")),
            "../intro.html"
        );
        assert_eq!(
            relative_url(Path::new("guide.html"), Path::new("guide/setup.html")),
            "guide/setup.html"
        );
        assert_eq!(
            relative_url(
                Path::new("guide/setup.html"),
                Path::new("guide/setup/deep.html")
            ),
            "setup/deep.html"
        );
        assert_eq!(
            relative_url(Path::new("a/b.html"), Path::new("My Notes.html")),
            "../My%20Notes.html"
        );
    }

    #[test]
    fn splits_fragments() {
        assert_eq!(split_link_target("a.md#x"), ("a.md", Some("x")));
        assert_eq!(split_link_target("#x"), ("", Some("x")));
        assert_eq!(split_link_target("a.md"), ("a.md", None));
        assert!(is_external("HTTPS://example.com"));
        assert!(!is_external("docs/a.md"));
    }
}
