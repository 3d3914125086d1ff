//! Documentation toolchains.
//!
//! The builtin toolchain renders in-process with the static site builder.
//! The external toolchain shells out to a configured program once per target.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use technote_config::{Config, ToolchainKind};
use technote_site::{SiteConfig, SiteError, StaticSiteBuilder};

use crate::environment::{Environment, diagnostic_text};
use crate::error::{EnvironmentError, ToolchainError};

/// A named build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Render the document set to HTML.
    Html,
    /// Check citations and links without producing pages.
    Lint,
}

impl Target {
    /// Target name, also the output subdirectory.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Lint => "lint",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a target into an output directory.
pub trait Toolchain {
    /// Check that the toolchain can run inside `env`.
    fn verify(&self, env: &Environment) -> Result<(), EnvironmentError>;

    /// Run `target`, writing results under `output_dir`.
    fn run(&self, target: Target, env: &Environment, output_dir: &Path)
    -> Result<(), ToolchainError>;
}

/// Select the toolchain configured by `config`.
#[must_use]
pub fn from_config(config: &Config) -> Box<dyn Toolchain> {
    match config.toolchain.kind {
        ToolchainKind::Builtin => Box::new(BuiltinToolchain::from_config(config)),
        ToolchainKind::External => Box::new(ExternalToolchain::from_config(config)),
    }
}

/// In-process Markdown renderer.
pub struct BuiltinToolchain {
    builder: StaticSiteBuilder,
}

impl BuiltinToolchain {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let builder = StaticSiteBuilder::new(SiteConfig {
            title: config.project.title.clone(),
            source_dir: config.docs_resolved.source_dir.clone(),
            bibliography_dir: config.bibliography_resolved.dir.clone(),
            exclude: config.docs_resolved.exclude.clone(),
            skip_dirs: vec![
                config.build_dir.clone(),
                config.environment_resolved.dir.clone(),
            ],
            numbered_sections: config.project.numbered_sections,
        });
        Self { builder }
    }
}

fn site_failure(target: Target) -> impl FnOnce(SiteError) -> ToolchainError {
    move |err| ToolchainError {
        target: target.as_str().to_owned(),
        status: None,
        diagnostic: err.to_string(),
    }
}

impl Toolchain for BuiltinToolchain {
    fn verify(&self, _env: &Environment) -> Result<(), EnvironmentError> {
        Ok(())
    }

    fn run(
        &self,
        target: Target,
        _env: &Environment,
        output_dir: &Path,
    ) -> Result<(), ToolchainError> {
        match target {
            Target::Html => {
                let report = self.builder.build(output_dir).map_err(site_failure(target))?;
                tracing::debug!(
                    documents = report.documents,
                    assets = report.assets,
                    "Builtin toolchain finished"
                );
                Ok(())
            }
            Target::Lint => {
                let problems = self.builder.lint().map_err(site_failure(target))?;
                if problems.is_empty() {
                    return Ok(());
                }
                let diagnostic = problems
                    .iter()
                    .map(|p| format!("{p}\n"))
                    .collect::<String>();
                Err(ToolchainError {
                    target: target.as_str().to_owned(),
                    status: None,
                    diagnostic,
                })
            }
        }
    }
}

/// External program invoked once per target.
pub struct ExternalToolchain {
    program: String,
    args: Vec<String>,
    source_dir: PathBuf,
    bib_dir: PathBuf,
}

impl ExternalToolchain {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.toolchain.program.clone().unwrap_or_default(),
            args: config.toolchain.args.clone(),
            source_dir: config.docs_resolved.source_dir.clone(),
            bib_dir: config.bibliography_resolved.dir.clone(),
        }
    }

    /// Arguments with `{target}`, `{source}`, `{output}`, `{env}` and `{bib}`
    /// substituted.
    fn expand_args(&self, target: Target, env: &Environment, output_dir: &Path) -> Vec<String> {
        let source = self.source_dir.to_string_lossy();
        let output = output_dir.to_string_lossy();
        let env_dir = env.dir().to_string_lossy();
        let bib = self.bib_dir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{target}", target.as_str())
                    .replace("{source}", &source)
                    .replace("{output}", &output)
                    .replace("{env}", &env_dir)
                    .replace("{bib}", &bib)
            })
            .collect()
    }
}

impl Toolchain for ExternalToolchain {
    fn verify(&self, env: &Environment) -> Result<(), EnvironmentError> {
        env.resolve_program(&self.program).map(|path| {
            tracing::debug!(program = %path.display(), "Toolchain program found");
        })
    }

    fn run(
        &self,
        target: Target,
        env: &Environment,
        output_dir: &Path,
    ) -> Result<(), ToolchainError> {
        let failure = |status: Option<i32>, diagnostic: String| ToolchainError {
            target: target.as_str().to_owned(),
            status,
            diagnostic,
        };

        let program = env
            .resolve_program(&self.program)
            .map_err(|e| failure(None, e.to_string()))?;
        fs::create_dir_all(output_dir).map_err(|e| {
            failure(
                None,
                format!("cannot create {}: {e}", output_dir.display()),
            )
        })?;

        let args = self.expand_args(target, env, output_dir);
        tracing::debug!(program = %program.display(), args = ?args, "Running toolchain");

        let output = env
            .command(&program)
            .args(&args)
            .env("TECHNOTE_TARGET", target.as_str())
            .output()
            .map_err(|e| failure(None, format!("cannot run {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(output = %stdout.trim_end(), "Toolchain output");
        }

        if !output.status.success() {
            return Err(failure(
                output.status.code(),
                diagnostic_text(&output.stdout, &output.stderr),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_target_names() {
        assert_eq!(Target::Html.as_str(), "html");
        assert_eq!(Target::Lint.to_string(), "lint");
    }

    #[test]
    fn test_expand_args() {
        let tmp = TempDir::new().unwrap();
        let config = Config::parse(
            r#"
[toolchain]
kind = "external"
program = "sphinx-build"
args = ["-b", "{target}", "{source}", "{output}", "-D", "env={env}", "--bib={bib}"]
"#,
            tmp.path(),
        )
        .unwrap();
        let toolchain = ExternalToolchain::from_config(&config);
        let env = Environment::from_config(&config);
        let output = tmp.path().join("_build/html");

        let args = toolchain.expand_args(Target::Html, &env, &output);
        let root = tmp.path().display();
        assert_eq!(
            args,
            vec![
                "-b".to_owned(),
                "html".to_owned(),
                root.to_string(),
                format!("{root}/_build/html"),
                "-D".to_owned(),
                format!("env={root}/.technote"),
                format!("--bib={root}/bib"),
            ]
        );
    }

    #[test]
    fn test_builtin_lint_lists_problems() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("note.md"), "See [@smith2020] and [x](gone.md).").unwrap();
        let config = Config::default_with_base(tmp.path());
        let env = Environment::from_config(&config);

        let err = BuiltinToolchain::from_config(&config)
            .run(Target::Lint, &env, &tmp.path().join("_build/lint"))
            .unwrap_err();
        assert_eq!(err.target, "lint");
        assert_eq!(
            err.diagnostic,
            "note.md: citation key 'smith2020' not found in bibliography\n\
             note.md: link to missing document 'gone.md'\n"
        );
        assert!(!tmp.path().join("_build").exists());
    }

    #[test]
    fn test_builtin_missing_include_fails_html_and_lint() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("note.md"),
            "```python {include=\"example-code/interface.py\"}\n```",
        )
        .unwrap();
        let config = Config::default_with_base(tmp.path());
        let env = Environment::from_config(&config);
        let toolchain = BuiltinToolchain::from_config(&config);

        let err = toolchain
            .run(Target::Html, &env, &tmp.path().join("_build/html"))
            .unwrap_err();
        assert_eq!(err.target, "html");
        assert!(
            err.diagnostic
                .starts_with("note.md: cannot include 'example-code/interface.py': "),
            "{}",
            err.diagnostic
        );

        let err = toolchain
            .run(Target::Lint, &env, &tmp.path().join("_build/lint"))
            .unwrap_err();
        assert!(err.diagnostic.contains("cannot include 'example-code/interface.py'"));

        fs::create_dir_all(tmp.path().join("example-code")).unwrap();
        fs::write(tmp.path().join("example-code/interface.py"), "class Interface: ...\n").unwrap();
        toolchain
            .run(Target::Html, &env, &tmp.path().join("_build/html"))
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_external_sees_target_and_env() {
        let tmp = TempDir::new().unwrap();
        let config = Config::parse(
            r#"
[toolchain]
kind = "external"
program = "sh"
args = ["-c", "echo \"$TECHNOTE_TARGET\" > \"$1/target.txt\"", "sh", "{output}"]
"#,
            tmp.path(),
        )
        .unwrap();
        let env = Environment::from_config(&config);
        let output = tmp.path().join("_build/html");

        ExternalToolchain::from_config(&config)
            .run(Target::Html, &env, &output)
            .unwrap();
        assert_eq!(
            fs::read_to_string(output.join("target.txt")).unwrap(),
            "html\n"
        );
    }

    #[test]
    fn test_external_missing_program() {
        let tmp = TempDir::new().unwrap();
        let config = Config::parse(
            "[toolchain]\nkind = \"external\"\nprogram = \"technote-no-such-builder\"\n",
            tmp.path(),
        )
        .unwrap();
        let env = Environment::from_config(&config);
        let toolchain = ExternalToolchain::from_config(&config);

        assert!(matches!(
            toolchain.verify(&env),
            Err(EnvironmentError::ToolMissing { .. })
        ));
    }
}
