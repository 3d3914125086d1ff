//! Configuration management for technote builds.
//!
//! Parses `technote.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `project.title`
//! - `toolchain.program`
//! - `bibliography.upstream[].url`

mod expand;

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override document source directory.
    pub source_dir: Option<PathBuf>,
    /// Override build output directory.
    pub build_dir: Option<PathBuf>,
    /// Override bibliography directory.
    pub bib_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "technote.toml";

/// Base URL of the LSST shared bibliography files.
const LSST_TEXMF_BIB_URL: &str =
    "https://raw.githubusercontent.com/lsst/lsst-texmf/main/texmf/bibtex/bib";

/// Bibliography files refreshed by default.
const LSST_TEXMF_BIB_FILES: [&str; 5] = [
    "lsst.bib",
    "lsst-dm.bib",
    "refs.bib",
    "books.bib",
    "refs_ads.bib",
];

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project metadata.
    pub project: ProjectConfig,
    /// Document source configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// Build output configuration.
    build: BuildConfigRaw,
    /// Isolated environment configuration.
    environment: EnvironmentConfigRaw,
    /// Documentation toolchain configuration.
    pub toolchain: ToolchainConfig,
    /// Bibliography configuration.
    bibliography: BibliographyConfigRaw,

    /// Directory containing the config file (or the working directory).
    #[serde(skip)]
    pub project_dir: PathBuf,
    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Resolved build output directory (set after loading).
    #[serde(skip)]
    pub build_dir: PathBuf,
    /// Resolved environment configuration (set after loading).
    #[serde(skip)]
    pub environment_resolved: EnvironmentConfig,
    /// Resolved bibliography configuration (set after loading).
    #[serde(skip)]
    pub bibliography_resolved: BibliographyConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Project metadata.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Title of the index page.
    pub title: String,
    /// Whether section headings get hierarchical numbers.
    pub numbered_sections: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            title: "Technote".to_owned(),
            numbered_sections: true,
        }
    }
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
    exclude: Option<Vec<String>>,
}

/// Resolved document source configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DocsConfig {
    /// Source directory for markdown files.
    pub source_dir: PathBuf,
    /// Glob patterns (relative to `source_dir`) excluded from the document set.
    pub exclude: Vec<String>,
}

/// Raw build configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BuildConfigRaw {
    dir: Option<String>,
}

/// Raw environment configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EnvironmentConfigRaw {
    dir: Option<String>,
    provision: Option<Vec<Vec<String>>>,
}

/// Resolved isolated environment configuration.
#[derive(Debug, Default)]
pub struct EnvironmentConfig {
    /// Environment directory (holds the manifest and `bin/`).
    pub dir: PathBuf,
    /// Provisioning commands run in order by `init`, as argv vectors.
    pub provision: Vec<Vec<String>>,
}

/// Which toolchain renders documents.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    /// In-process markdown renderer.
    #[default]
    Builtin,
    /// External program invoked once per target.
    External,
}

impl ToolchainKind {
    /// Name used in TOML and diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::External => "external",
        }
    }
}

/// Documentation toolchain configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain kind.
    pub kind: ToolchainKind,
    /// Program to execute (external toolchain only).
    pub program: Option<String>,
    /// Program arguments; `{target}`, `{source}`, `{output}`, `{env}` and
    /// `{bib}` are substituted before execution.
    pub args: Vec<String>,
    /// Toolchain version pinned by the project.
    pub version: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            kind: ToolchainKind::Builtin,
            program: None,
            args: ["-b", "{target}", "{source}", "{output}"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            version: String::new(),
        }
    }
}

/// Raw bibliography configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BibliographyConfigRaw {
    dir: Option<String>,
    upstream: Option<Vec<UpstreamSource>>,
    timeout_secs: Option<u64>,
}

/// A bibliography file fetched by `refresh-bib`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpstreamSource {
    /// File name written into the bibliography directory.
    pub name: String,
    /// Source URL (`http://`, `https://` or `file://`).
    pub url: String,
}

/// Resolved bibliography configuration.
#[derive(Debug)]
pub struct BibliographyConfig {
    /// Bibliography directory (`.bib` files).
    pub dir: PathBuf,
    /// Upstream sources for `refresh-bib`.
    pub upstream: Vec<UpstreamSource>,
    /// HTTP timeout for upstream fetches.
    pub timeout: Duration,
}

impl Default for BibliographyConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("bib"),
            upstream: default_upstream(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn default_upstream() -> Vec<UpstreamSource> {
    LSST_TEXMF_BIB_FILES
        .iter()
        .map(|name| UpstreamSource {
            name: (*name).to_owned(),
            url: format!("{LSST_TEXMF_BIB_URL}/{name}"),
        })
        .collect()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`toolchain.program`").
        field: String,
        /// Error message (e.g., "${`SPHINX`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Require a URL field to use a scheme the fetcher understands.
fn require_fetch_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !["http://", "https://", "file://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
    {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http://, https:// or file://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `technote.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings, &std::env::current_dir()?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text as if it were read from `config_dir/technote.toml`.
    ///
    /// Expands environment variables, resolves relative paths against
    /// `config_dir` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns error on TOML syntax errors, unset variables or invalid values.
    pub fn parse(content: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(config_dir);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    ///
    /// Relative override paths are taken relative to `cwd`, as a shell user
    /// would expect.
    fn apply_cli_settings(&mut self, settings: &CliSettings, cwd: &Path) {
        let resolve = |path: &Path| normalize(&cwd.join(path));
        if let Some(source_dir) = &settings.source_dir {
            self.docs_resolved.source_dir = resolve(source_dir);
        }
        if let Some(build_dir) = &settings.build_dir {
            self.build_dir = resolve(build_dir);
        }
        if let Some(bib_dir) = &settings.bib_dir {
            self.bibliography_resolved.dir = resolve(bib_dir);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            project: ProjectConfig::default(),
            docs: DocsConfigRaw::default(),
            build: BuildConfigRaw::default(),
            environment: EnvironmentConfigRaw::default(),
            toolchain: ToolchainConfig::default(),
            bibliography: BibliographyConfigRaw::default(),
            project_dir: PathBuf::new(),
            docs_resolved: DocsConfig::default(),
            build_dir: PathBuf::new(),
            environment_resolved: EnvironmentConfig::default(),
            bibliography_resolved: BibliographyConfig::default(),
            config_path: None,
        };
        config.resolve_paths(base);
        config
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = std::env::current_dir()?.join(path.parent().unwrap_or(Path::new("")));
        let mut config = Self::parse(&content, &config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_dirs()?;
        self.validate_toolchain()?;
        self.validate_bibliography()?;
        Ok(())
    }

    /// Build output and environment must be separate directories, and neither
    /// may contain the project, source or bibliography directory, since both
    /// get deleted by `clean`.
    fn validate_dirs(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.build.dir {
            require_non_empty(dir, "build.dir")?;
        }
        if let Some(dir) = &self.environment.dir {
            require_non_empty(dir, "environment.dir")?;
        }
        let build_dir = normalize(&self.build_dir);
        let env_dir = normalize(&self.environment_resolved.dir);
        if build_dir == env_dir {
            return Err(ConfigError::Validation(
                "build.dir and environment.dir must differ".to_owned(),
            ));
        }
        let protected = [
            normalize(&self.project_dir),
            normalize(&self.docs_resolved.source_dir),
            normalize(&self.bibliography_resolved.dir),
        ];
        for (dir, field) in [(&build_dir, "build.dir"), (&env_dir, "environment.dir")] {
            if protected.iter().any(|p| p.starts_with(dir)) {
                return Err(ConfigError::Validation(format!(
                    "{field} {} would contain the project, source or bibliography directory",
                    dir.display()
                )));
            }
        }
        for (i, step) in self.environment_resolved.provision.iter().enumerate() {
            if step.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "environment.provision[{i}] must name a program"
                )));
            }
        }
        Ok(())
    }

    /// Validate toolchain configuration.
    fn validate_toolchain(&self) -> Result<(), ConfigError> {
        if self.toolchain.kind == ToolchainKind::External {
            let program = self.toolchain.program.as_deref().ok_or_else(|| {
                ConfigError::Validation(
                    "toolchain.program is required for the external toolchain".to_owned(),
                )
            })?;
            require_non_empty(program, "toolchain.program")?;
        }
        Ok(())
    }

    /// Validate bibliography configuration.
    fn validate_bibliography(&self) -> Result<(), ConfigError> {
        let bib = &self.bibliography_resolved;
        if bib.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "bibliography.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        for source in &bib.upstream {
            let name = &source.name;
            let is_plain_name = !name.contains(['/', '\\']) && !name.starts_with('.');
            if !is_plain_name || !name.ends_with(".bib") {
                return Err(ConfigError::Validation(format!(
                    "bibliography.upstream name {name:?} must be a plain .bib file name"
                )));
            }
            require_fetch_url(&source.url, "bibliography.upstream.url")?;
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.project.title = expand::expand_env(&self.project.title, "project.title")?;

        if let Some(ref program) = self.toolchain.program {
            self.toolchain.program = Some(expand::expand_env(program, "toolchain.program")?);
        }

        if let Some(ref mut upstream) = self.bibliography.upstream {
            for source in upstream {
                source.url = expand::expand_env(&source.url, "bibliography.upstream.url")?;
            }
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let config_dir = normalize(config_dir);
        let resolve =
            |path: Option<&str>, default: &str| normalize(&config_dir.join(path.unwrap_or(default)));

        self.project_dir.clone_from(&config_dir);
        self.docs_resolved = DocsConfig {
            source_dir: resolve(self.docs.source_dir.as_deref(), "."),
            exclude: self.docs.exclude.clone().unwrap_or_default(),
        };
        self.build_dir = resolve(self.build.dir.as_deref(), "_build");
        self.environment_resolved = EnvironmentConfig {
            dir: resolve(self.environment.dir.as_deref(), ".technote"),
            provision: self.environment.provision.clone().unwrap_or_default(),
        };
        self.bibliography_resolved = BibliographyConfig {
            dir: resolve(self.bibliography.dir.as_deref(), "bib"),
            upstream: self
                .bibliography
                .upstream
                .clone()
                .unwrap_or_else(default_upstream),
            timeout: Duration::from_secs(self.bibliography.timeout_secs.unwrap_or(30)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.project.title, "Technote");
        assert!(config.project.numbered_sections);
        assert_eq!(config.docs_resolved.source_dir, PathBuf::from("/test"));
        assert_eq!(config.build_dir, PathBuf::from("/test/_build"));
        assert_eq!(
            config.environment_resolved.dir,
            PathBuf::from("/test/.technote")
        );
        assert_eq!(config.bibliography_resolved.dir, PathBuf::from("/test/bib"));
        assert_eq!(config.toolchain.kind, ToolchainKind::Builtin);
        assert!(config.environment_resolved.provision.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_upstream_points_at_lsst_texmf() {
        let config = Config::default_with_base(Path::new("/test"));
        let upstream = &config.bibliography_resolved.upstream;
        assert_eq!(upstream.len(), 5);
        assert_eq!(upstream[0].name, "lsst.bib");
        assert_eq!(
            upstream[0].url,
            "https://raw.githubusercontent.com/lsst/lsst-texmf/main/texmf/bibtex/bib/lsst.bib"
        );
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse("", Path::new("/project")).unwrap();
        assert_eq!(config.project.title, "Technote");
        assert_eq!(config.build_dir, PathBuf::from("/project/_build"));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[project]
title = "SQR-075: Vertical monorepos"
numbered_sections = false

[docs]
source_dir = "text"
exclude = ["README.md", "drafts/*"]

[build]
dir = "out"

[environment]
dir = ".env"
provision = [["python3", "-m", "venv", ".env"], ["pip", "install", "documenteer"]]

[toolchain]
kind = "external"
program = "sphinx-build"
args = ["-W", "-b", "{target}", "{source}", "{output}"]
version = "1.0"

[bibliography]
dir = "lsstbib"
timeout_secs = 5
upstream = [{ name = "refs.bib", url = "https://example.org/refs.bib" }]
"#;
        let config = Config::parse(toml, Path::new("/project")).unwrap();
        assert_eq!(config.project.title, "SQR-075: Vertical monorepos");
        assert!(!config.project.numbered_sections);
        assert_eq!(config.docs_resolved.source_dir, PathBuf::from("/project/text"));
        assert_eq!(config.docs_resolved.exclude, vec!["README.md", "drafts/*"]);
        assert_eq!(config.build_dir, PathBuf::from("/project/out"));
        assert_eq!(config.environment_resolved.dir, PathBuf::from("/project/.env"));
        assert_eq!(config.environment_resolved.provision.len(), 2);
        assert_eq!(config.toolchain.kind, ToolchainKind::External);
        assert_eq!(config.toolchain.program.as_deref(), Some("sphinx-build"));
        assert_eq!(config.toolchain.args[0], "-W");
        assert_eq!(config.bibliography_resolved.dir, PathBuf::from("/project/lsstbib"));
        assert_eq!(config.bibliography_resolved.timeout, Duration::from_secs(5));
        assert_eq!(
            config.bibliography_resolved.upstream,
            vec![UpstreamSource {
                name: "refs.bib".to_owned(),
                url: "https://example.org/refs.bib".to_owned(),
            }]
        );
    }

    #[test]
    fn test_external_toolchain_requires_program() {
        let toml = r#"
[toolchain]
kind = "external"
"#;
        let err = Config::parse(toml, Path::new("/project")).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        assert!(err.to_string().contains("toolchain.program"));
    }

    #[test]
    fn test_unknown_toolchain_kind_is_parse_error() {
        let toml = r#"
[toolchain]
kind = "latex"
"#;
        let err = Config::parse(toml, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_build_dir_cannot_equal_environment_dir() {
        let toml = r#"
[build]
dir = "work"

[environment]
dir = "work"
"#;
        let err = Config::parse(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_build_dir_cannot_be_project_dir() {
        let toml = r#"
[build]
dir = ""
"#;
        let err = Config::parse(toml, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_provision_step_requires_program() {
        let toml = r#"
[environment]
provision = [[]]
"#;
        let err = Config::parse(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("environment.provision[0]"));
    }

    #[test]
    fn test_upstream_name_must_be_plain_bib_file() {
        for name in ["../escape.bib", "refs.txt", ".hidden.bib", "dir/refs.bib"] {
            let toml = format!(
                "[bibliography]\nupstream = [{{ name = \"{name}\", url = \"https://example.org/x\" }}]\n"
            );
            let err = Config::parse(&toml, Path::new("/project")).unwrap_err();
            assert!(
                matches!(err, ConfigError::Validation(_)),
                "{name} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_upstream_url_scheme() {
        let toml = r#"
[bibliography]
upstream = [{ name = "refs.bib", url = "ftp://example.org/refs.bib" }]
"#;
        let err = Config::parse(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("file://"));

        let toml = r#"
[bibliography]
upstream = [{ name = "refs.bib", url = "file:///srv/mirror/refs.bib" }]
"#;
        assert!(Config::parse(toml, Path::new("/project")).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = r"
[bibliography]
timeout_secs = 0
";
        let err = Config::parse(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            source_dir: Some(PathBuf::from("/custom/docs")),
            bib_dir: Some(PathBuf::from("/custom/bib")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides, Path::new("/cwd"));

        assert_eq!(config.docs_resolved.source_dir, PathBuf::from("/custom/docs"));
        assert_eq!(config.bibliography_resolved.dir, PathBuf::from("/custom/bib"));
        assert_eq!(config.build_dir, PathBuf::from("/test/_build")); // Unchanged
    }

    #[test]
    fn test_relative_cli_overrides_resolve_against_cwd() {
        let mut config = Config::default_with_base(Path::new("/project"));
        let overrides = CliSettings {
            build_dir: Some(PathBuf::from("./out/../site")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides, Path::new("/project/docs"));

        assert_eq!(config.build_dir, PathBuf::from("/project/docs/site"));
    }

    #[test]
    fn test_cli_build_dir_dot_is_rejected() {
        let mut config = Config::default_with_base(Path::new("/project"));
        let overrides = CliSettings {
            build_dir: Some(PathBuf::from(".")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides, Path::new("/project"));

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_build_dir_cannot_be_bibliography_dir() {
        let err = Config::parse("[build]\ndir = \"bib\"\n", Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("bibliography"));
    }

    #[test]
    fn test_dirs_cannot_be_parents_of_project() {
        for toml in [
            "[build]\ndir = \"..\"\n",
            "[build]\ndir = \"/\"\n",
            "[environment]\ndir = \"../..\"\n",
            "[docs]\nsource_dir = \"text\"\n\n[build]\ndir = \"text/..\"\n",
        ] {
            let err = Config::parse(toml, Path::new("/home/user/project")).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{toml}");
        }
    }

    #[test]
    fn test_build_dir_inside_source_dir_is_allowed() {
        let config = Config::parse("[build]\ndir = \"./_site\"\n", Path::new("/project")).unwrap();
        assert_eq!(config.build_dir, PathBuf::from("/project/_site"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("../../x")), PathBuf::from("../../x"));
        assert_eq!(normalize(Path::new("a/..")), PathBuf::new());
    }

    #[test]
    fn test_expand_env_vars_in_upstream_url() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("TECHNOTE_TEST_BIB_HOST", "bib.example.org");
        }

        let toml = r#"
[bibliography]
upstream = [{ name = "refs.bib", url = "https://${TECHNOTE_TEST_BIB_HOST}/refs.bib" }]
"#;
        let config = Config::parse(toml, Path::new("/project")).unwrap();
        assert_eq!(
            config.bibliography_resolved.upstream[0].url,
            "https://bib.example.org/refs.bib"
        );

        unsafe {
            std::env::remove_var("TECHNOTE_TEST_BIB_HOST");
        }
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/technote.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file_records_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("technote.toml");
        std::fs::write(&path, "[project]\ntitle = \"Loaded\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.project.title, "Loaded");
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.project_dir, tmp.path());
    }
}
