//! Compile configuration and the optional configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use mdxpad_parser::{MarkdownParser, Parser};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default name given to the document being edited.
pub const DEFAULT_PATH: &str = "example.mdx";

/// Default quiet window of the compile scheduler, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Optional syntax extensions. Each toggle is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Extensions {
    /// GitHub Flavored Markdown: tables, strikethrough, task lists,
    /// footnotes and autolink literals.
    pub gfm: bool,
    /// YAML (`---`) and TOML (`+++`) frontmatter.
    pub frontmatter: bool,
    /// `$inline$` and `$$block$$` math.
    pub math: bool,
}

impl Extensions {
    /// All extensions enabled.
    pub const fn all() -> Self {
        Self {
            gfm: true,
            frontmatter: true,
            math: true,
        }
    }
}

/// How the document text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Pick from the document path: markdown extensions mean `Md`,
    /// anything else means `Mdx`.
    #[default]
    Detect,
    /// MDX: JSX and `{expressions}` are recognised, HTML is not.
    Mdx,
    /// Plain markdown.
    Md,
}

impl Format {
    /// Resolves `Detect` against a document path.
    pub fn resolve(self, path: &str) -> Format {
        match self {
            Format::Detect => {
                let extension = Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                if MarkdownParser::new().can_parse(extension) {
                    Format::Md
                } else {
                    Format::Mdx
                }
            }
            other => other,
        }
    }
}

/// Everything one compilation attempt depends on.
///
/// A new value is created for every edit or toggle change; a compile never
/// observes a configuration that changes under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub extensions: Extensions,
    #[serde(default)]
    pub format: Format,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub text: String,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

impl Configuration {
    /// Creates a configuration for the given text with all extensions off.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            extensions: Extensions::default(),
            format: Format::Detect,
            path: default_path(),
            text: text.into(),
        }
    }

    /// Sets the extensions.
    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Sets the document path (used for messages and format detection).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Returns a copy with different text and the same settings.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    /// The effective format of this document.
    pub fn resolved_format(&self) -> Format {
        self.format.resolve(&self.path)
    }
}

/// Contents of an `.mdxpad.jsonc` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdxpadConfig {
    /// Extension toggles.
    #[serde(flatten)]
    pub extensions: Extensions,

    /// Document format.
    #[serde(default)]
    pub format: Format,

    /// Scheduler quiet window.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Value of `props` inside the document.
    #[serde(default)]
    pub props: serde_json::Map<String, serde_json::Value>,

    /// Directory the file was loaded from.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl MdxpadConfig {
    /// File names searched for, in order.
    pub const CONFIG_FILES: &'static [&'static str] = &[".mdxpad.jsonc", ".mdxpad.json"];

    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            extensions: Extensions::default(),
            format: Format::Detect,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            props: serde_json::Map::new(),
            base_dir: None,
        }
    }

    /// Finds a configuration file in `dir`.
    pub fn discover(dir: impl AsRef<Path>) -> Option<PathBuf> {
        let dir = dir.as_ref();
        Self::CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let mut config = Self::from_jsonc(&content)?;
        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Parses configuration from JSON with comments.
    pub fn from_jsonc(content: &str) -> Result<Self, ConfigError> {
        let value = jsonc_parser::parse_to_serde_value(content, &jsonc_parser::ParseOptions::default())
            .map_err(|e| ConfigError::invalid(e.to_string()))?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        if !value.is_object() {
            return Err(ConfigError::invalid("root must be an object"));
        }

        serde_json::from_value(value).map_err(|e| ConfigError::invalid(e.to_string()))
    }

    /// Builds a compile configuration for `text` using these settings.
    pub fn configuration(&self, path: impl Into<String>, text: impl Into<String>) -> Configuration {
        Configuration::new(text)
            .with_path(path)
            .with_extensions(self.extensions)
            .with_format(self.format)
    }
}

impl Default for MdxpadConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_configuration_defaults() {
        let config = Configuration::new("# Title");
        assert_eq!(config.path, "example.mdx");
        assert_eq!(config.extensions, Extensions::default());
        assert_eq!(config.resolved_format(), Format::Mdx);
    }

    #[rstest]
    #[case("notes.md", Format::Detect, Format::Md)]
    #[case("README.markdown", Format::Detect, Format::Md)]
    #[case("page.mdx", Format::Detect, Format::Mdx)]
    #[case("untitled", Format::Detect, Format::Mdx)]
    #[case("notes.md", Format::Mdx, Format::Mdx)]
    fn test_format_resolution(#[case] path: &str, #[case] format: Format, #[case] expected: Format) {
        assert_eq!(format.resolve(path), expected);
    }

    #[test]
    fn test_with_text_keeps_settings() {
        let base = Configuration::new("a").with_extensions(Extensions::all());
        let next = base.with_text("b");
        assert_eq!(next.text, "b");
        assert_eq!(next.extensions, Extensions::all());
    }

    #[test]
    fn test_from_jsonc() {
        let config = MdxpadConfig::from_jsonc(
            r#"{
                // tables please
                "gfm": true,
                "math": true,
                "debounceMs": 250,
                "props": { "name": "Ada" },
            }"#,
        )
        .unwrap();

        assert!(config.extensions.gfm);
        assert!(config.extensions.math);
        assert!(!config.extensions.frontmatter);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.props["name"], "Ada");
    }

    #[test]
    fn test_from_jsonc_empty_uses_defaults() {
        let config = MdxpadConfig::from_jsonc("").unwrap();
        assert_eq!(config, MdxpadConfig::new());
    }

    #[rstest]
    #[case::not_an_object("[]")]
    #[case::type_mismatch(r#"{ "gfm": "yes" }"#)]
    #[case::syntax(r#"{ "gfm": tru }"#)]
    fn test_from_jsonc_errors(#[case] content: &str) {
        let err = MdxpadConfig::from_jsonc(content).unwrap_err();
        assert!(err.to_string().starts_with("Invalid config"), "{}", err);
    }

    #[test]
    fn test_discover_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MdxpadConfig::discover(dir.path()).is_none());

        let path = dir.path().join(".mdxpad.json");
        fs::write(&path, r#"{ "frontmatter": true }"#).unwrap();

        let found = MdxpadConfig::discover(dir.path()).unwrap();
        assert_eq!(found, path);

        let config = MdxpadConfig::from_file(&found).unwrap();
        assert!(config.extensions.frontmatter);
        assert_eq!(config.base_dir.as_deref(), Some(dir.path()));
    }
}
