//! Configuration primitives and loader for the quire book renderer.
//!
//! Settings are resolved from a precedence stack:
//! override flag → working directory → git root → built-in defaults.
//! Each layer is parsed into optional partial settings that remember which file
//! supplied them, so relative paths resolve against the directory of the layer
//! that declared them and validation errors can point back at their origin.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = ".quire.toml";

const DEFAULT_MANIFEST: &str = "config/structure.yml";
const DEFAULT_OUTPUT: &str = "_book";
const DEFAULT_EXTENSION: &str = "html";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub book: BookSettings,
    pub render: RenderSettings,
    pub samples: SampleSettings,
    pub sources: ConfigSources,
}

/// Locations of the three inputs of a render run.
#[derive(Clone, Debug)]
pub struct BookSettings {
    /// Overrides the title declared by the manifest, if any.
    pub title: Option<String>,
    pub content_root: PathBuf,
    pub manifest: PathBuf,
    pub output: PathBuf,
}

/// Settings that shape every rendered page.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// File extension of rendered pages, without the leading dot.
    pub extension: String,
    /// Wrap each page in a full HTML document rather than emitting a fragment.
    pub standalone: bool,
    pub navigation: bool,
    pub heading_anchors: bool,
    pub smart_punctuation: bool,
    /// Output-relative path of the contents page. Off unless configured.
    pub contents_page: Option<PathBuf>,
    pub stylesheet: Option<String>,
}

/// Settings for checking fenced code samples embedded in sources.
#[derive(Clone, Debug)]
pub struct SampleSettings {
    /// Fence languages that are checked, lowercased.
    pub languages: Vec<String>,
    /// Promote sample issues from warnings to conversion failures.
    pub strict: bool,
}

impl SampleSettings {
    pub fn checks_language(&self, language: &str) -> bool {
        let language = language.trim().to_ascii_lowercase();
        self.languages.iter().any(|candidate| *candidate == language)
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/git/local/override).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl ConfigSource {
    fn default(base_dir: PathBuf) -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
            base_dir,
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ConfigSource {
            kind,
            path: Some(path),
            base_dir,
        }
    }

    fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let default_source = ConfigSource::default(working_dir.clone());
        let mut merged = PartialConfig::default();
        merged.merge(defaults_layer(default_source.clone()));

        let mut source_layers = vec![default_source];

        let git_config_path = find_git_root(&working_dir).map(|root| root.join(CONFIG_FILE_NAME));
        let local_config_path = working_dir.join(CONFIG_FILE_NAME);

        if let Some(path) = git_config_path.as_ref() {
            if path.exists() && Some(path) != override_path.as_ref() && path != &local_config_path {
                let source = ConfigSource::for_file(ConfigSourceKind::GitRoot, path.clone());
                merged.merge(load_layer(path, source.clone())?);
                source_layers.push(source);
            }
        }

        if local_config_path.exists() && Some(&local_config_path) != override_path.as_ref() {
            let source = ConfigSource::for_file(ConfigSourceKind::Local, local_config_path.clone());
            merged.merge(load_layer(&local_config_path, source.clone())?);
            source_layers.push(source);
        }

        if let Some(path) = override_path {
            let source = ConfigSource::for_file(ConfigSourceKind::Override, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            source_layers.push(source);
        }

        let resolved = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            book: resolved.book,
            render: resolved.render,
            samples: resolved.samples,
            sources: ConfigSources {
                working_directory: working_dir,
                layers: source_layers,
            },
        })
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.into(),
        source: err,
    })?;
    let raw: RawConfig = toml::from_str(&contents).map_err(|err| ConfigError::Parse {
        path: path.into(),
        source: err,
    })?;
    Ok(raw.into_partial(source))
}

fn defaults_layer(source: ConfigSource) -> PartialConfig {
    let book = BookPartial {
        title: None,
        content_root: Some(Located::new(PathBuf::from("."), source.clone())),
        manifest: Some(Located::new(PathBuf::from(DEFAULT_MANIFEST), source.clone())),
        output: Some(Located::new(PathBuf::from(DEFAULT_OUTPUT), source.clone())),
    };

    let render = RenderPartial {
        extension: Some(Located::new(DEFAULT_EXTENSION.into(), source.clone())),
        standalone: Some(true),
        navigation: Some(true),
        heading_anchors: Some(true),
        smart_punctuation: Some(false),
        contents_page: None,
        stylesheet: None,
    };

    let samples = SamplesPartial {
        languages: Some(Located::new(vec!["rust".into()], source)),
        strict: Some(false),
    };

    PartialConfig {
        book: Some(book),
        render: Some(render),
        samples: Some(samples),
    }
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

struct ResolvedConfig {
    book: BookSettings,
    render: RenderSettings,
    samples: SampleSettings,
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    book: Option<BookPartial>,
    render: Option<RenderPartial>,
    samples: Option<SamplesPartial>,
}

impl PartialConfig {
    fn merge(&mut self, mut other: PartialConfig) {
        if let Some(other_book) = other.book.take() {
            match &mut self.book {
                Some(book) => book.merge(other_book),
                None => self.book = Some(other_book),
            }
        }

        if let Some(other_render) = other.render.take() {
            match &mut self.render {
                Some(render) => render.merge(other_render),
                None => self.render = Some(other_render),
            }
        }

        if let Some(other_samples) = other.samples.take() {
            match &mut self.samples {
                Some(samples) => samples.merge(other_samples),
                None => self.samples = Some(other_samples),
            }
        }
    }

    fn finalize(self) -> Result<ResolvedConfig, ConfigValidationErrors> {
        let mut errors = Vec::new();

        let book_partial = self.book.unwrap_or_default();
        let title = book_partial.title.and_then(|title| {
            let trimmed = title.value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });
        let content_root = required_path(book_partial.content_root, ".");
        let manifest = required_path(book_partial.manifest, DEFAULT_MANIFEST);
        let output = required_path(book_partial.output, DEFAULT_OUTPUT);

        if output.value.as_os_str().is_empty() {
            errors.push(ConfigValidationError::new(
                Some(output.source.clone()),
                "book.output cannot be empty".into(),
            ));
        }

        let render_partial = self.render.unwrap_or_default();
        let extension = render_partial.extension.unwrap_or_else(|| {
            Located::new(
                DEFAULT_EXTENSION.to_string(),
                ConfigSource::default(PathBuf::from(".")),
            )
        });
        let extension_value = extension.value.trim().trim_start_matches('.').to_string();
        if extension_value.is_empty()
            || !extension_value
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            errors.push(ConfigValidationError::new(
                Some(extension.source.clone()),
                format!(
                    "render.extension must be a plain file extension (received '{}')",
                    extension.value
                ),
            ));
        }

        let contents_page = match render_partial.contents_page {
            Some(located) if located.value.trim().is_empty() => None,
            Some(located) => {
                let path = PathBuf::from(located.value.trim());
                if !is_plain_relative(&path) {
                    errors.push(ConfigValidationError::new(
                        Some(located.source.clone()),
                        format!(
                            "render.contents_page must be a relative path inside the output root (received '{}')",
                            located.value
                        ),
                    ));
                }
                Some(path)
            }
            None => None,
        };

        let samples_partial = self.samples.unwrap_or_default();
        let languages = match samples_partial.languages {
            Some(located) => {
                let mut languages = Vec::with_capacity(located.value.len());
                for language in located.value {
                    let normalized = language.trim().to_ascii_lowercase();
                    if normalized.is_empty() {
                        errors.push(ConfigValidationError::new(
                            Some(located.source.clone()),
                            "samples.languages cannot contain empty entries".into(),
                        ));
                        continue;
                    }
                    if !languages.contains(&normalized) {
                        languages.push(normalized);
                    }
                }
                languages
            }
            None => Vec::new(),
        };

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(ResolvedConfig {
            book: BookSettings {
                title,
                content_root: resolve_path(&content_root),
                manifest: resolve_path(&manifest),
                output: resolve_path(&output),
            },
            render: RenderSettings {
                extension: extension_value,
                standalone: render_partial.standalone.unwrap_or(true),
                navigation: render_partial.navigation.unwrap_or(true),
                heading_anchors: render_partial.heading_anchors.unwrap_or(true),
                smart_punctuation: render_partial.smart_punctuation.unwrap_or(false),
                contents_page,
                stylesheet: render_partial
                    .stylesheet
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty()),
            },
            samples: SampleSettings {
                languages,
                strict: samples_partial.strict.unwrap_or(false),
            },
        })
    }
}

fn required_path(located: Option<Located<PathBuf>>, fallback: &str) -> Located<PathBuf> {
    located.unwrap_or_else(|| {
        Located::new(
            PathBuf::from(fallback),
            ConfigSource::default(PathBuf::from(".")),
        )
    })
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[derive(Clone, Debug, Default)]
struct BookPartial {
    title: Option<Located<String>>,
    content_root: Option<Located<PathBuf>>,
    manifest: Option<Located<PathBuf>>,
    output: Option<Located<PathBuf>>,
}

impl BookPartial {
    fn merge(&mut self, other: BookPartial) {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.content_root.is_some() {
            self.content_root = other.content_root;
        }
        if other.manifest.is_some() {
            self.manifest = other.manifest;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
    }
}

#[derive(Clone, Debug, Default)]
struct RenderPartial {
    extension: Option<Located<String>>,
    standalone: Option<bool>,
    navigation: Option<bool>,
    heading_anchors: Option<bool>,
    smart_punctuation: Option<bool>,
    contents_page: Option<Located<String>>,
    stylesheet: Option<String>,
}

impl RenderPartial {
    fn merge(&mut self, other: RenderPartial) {
        if other.extension.is_some() {
            self.extension = other.extension;
        }
        if other.standalone.is_some() {
            self.standalone = other.standalone;
        }
        if other.navigation.is_some() {
            self.navigation = other.navigation;
        }
        if other.heading_anchors.is_some() {
            self.heading_anchors = other.heading_anchors;
        }
        if other.smart_punctuation.is_some() {
            self.smart_punctuation = other.smart_punctuation;
        }
        if other.contents_page.is_some() {
            self.contents_page = other.contents_page;
        }
        if other.stylesheet.is_some() {
            self.stylesheet = other.stylesheet;
        }
    }
}

#[derive(Clone, Debug, Default)]
struct SamplesPartial {
    languages: Option<Located<Vec<String>>>,
    strict: Option<bool>,
}

impl SamplesPartial {
    fn merge(&mut self, other: SamplesPartial) {
        if other.languages.is_some() {
            self.languages = other.languages;
        }
        if other.strict.is_some() {
            self.strict = other.strict;
        }
    }
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

fn resolve_path(located: &Located<PathBuf>) -> PathBuf {
    let path = &located.value;
    if path.is_absolute() {
        return path.clone();
    }
    let mut resolved = located.source.base_dir.clone();
    for component in path.components() {
        if component != Component::CurDir {
            resolved.push(component);
        }
    }
    resolved
}

/// Collection of validation failures reported together.
#[derive(Clone, Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

/// Validation failure with optional provenance.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: String) -> Self {
        ConfigValidationError { source, message }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source.describe())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    book: Option<RawBook>,
    #[serde(default)]
    render: Option<RawRender>,
    #[serde(default)]
    samples: Option<RawSamples>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        PartialConfig {
            book: self.book.map(|book| book.into_partial(source.clone())),
            render: self.render.map(|render| render.into_partial(source.clone())),
            samples: self.samples.map(|samples| samples.into_partial(source)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBook {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content_root: Option<PathBuf>,
    #[serde(default)]
    manifest: Option<PathBuf>,
    #[serde(default)]
    output: Option<PathBuf>,
}

impl RawBook {
    fn into_partial(self, source: ConfigSource) -> BookPartial {
        BookPartial {
            title: self.title.map(|value| Located::new(value, source.clone())),
            content_root: self
                .content_root
                .map(|value| Located::new(value, source.clone())),
            manifest: self
                .manifest
                .map(|value| Located::new(value, source.clone())),
            output: self.output.map(|value| Located::new(value, source)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRender {
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    standalone: Option<bool>,
    #[serde(default)]
    navigation: Option<bool>,
    #[serde(default)]
    heading_anchors: Option<bool>,
    #[serde(default)]
    smart_punctuation: Option<bool>,
    #[serde(default)]
    contents_page: Option<String>,
    #[serde(default)]
    stylesheet: Option<String>,
}

impl RawRender {
    fn into_partial(self, source: ConfigSource) -> RenderPartial {
        RenderPartial {
            extension: self
                .extension
                .map(|value| Located::new(value, source.clone())),
            standalone: self.standalone,
            navigation: self.navigation,
            heading_anchors: self.heading_anchors,
            smart_punctuation: self.smart_punctuation,
            contents_page: self
                .contents_page
                .map(|value| Located::new(value, source)),
            stylesheet: self.stylesheet,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSamples {
    #[serde(default)]
    languages: Option<Vec<String>>,
    #[serde(default)]
    strict: Option<bool>,
}

impl RawSamples {
    fn into_partial(self, source: ConfigSource) -> SamplesPartial {
        SamplesPartial {
            languages: self.languages.map(|value| Located::new(value, source)),
            strict: self.strict,
        }
    }
}
