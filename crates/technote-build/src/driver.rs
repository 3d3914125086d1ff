//! Named build operations: `init`, `build`, `clean` and `refresh-bib`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use technote_bib::{Fetch, RefreshReport, Source};
use technote_config::Config;

use crate::environment::{Environment, InitOutcome};
use crate::error::BuildError;
use crate::toolchain::{self, Target, Toolchain};

/// Result of a successful [`BuildDriver::build`].
#[derive(Debug, PartialEq, Eq)]
pub struct BuildReport {
    pub target: Target,
    /// Directory holding the target's output (`<build_dir>/<target>`).
    pub output_dir: PathBuf,
}

/// Result of [`BuildDriver::clean`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Directories that existed and were removed.
    pub removed: Vec<PathBuf>,
}

/// Runs the named operations against one project configuration.
pub struct BuildDriver {
    config: Config,
    environment: Environment,
    toolchain: Box<dyn Toolchain>,
}

impl BuildDriver {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let environment = Environment::from_config(&config);
        let toolchain = toolchain::from_config(&config);
        Self {
            config,
            environment,
            toolchain,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Output directory of `target`.
    #[must_use]
    pub fn output_dir(&self, target: Target) -> PathBuf {
        self.config.build_dir.join(target.as_str())
    }

    /// Provision the isolated environment. A no-op when already initialized.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Environment`] when a provisioning program is
    /// missing, a step fails, or the toolchain cannot be found afterwards.
    pub fn init_environment(&self) -> Result<InitOutcome, BuildError> {
        let toolchain = &self.toolchain;
        let outcome = self
            .environment
            .initialize(|env| toolchain.verify(env))?;
        Ok(outcome)
    }

    /// Run the toolchain for `target` in the isolated environment.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Environment`] when the environment is missing or
    /// stale, and [`BuildError::Toolchain`] when the toolchain fails.
    pub fn build(&self, target: Target) -> Result<BuildReport, BuildError> {
        self.environment.ensure_ready()?;

        let output_dir = self.output_dir(target);
        tracing::info!(target = %target, output = %output_dir.display(), "Building");
        self.toolchain
            .run(target, &self.environment, &output_dir)?;
        tracing::info!(target = %target, "Build finished");

        Ok(BuildReport { target, output_dir })
    }

    /// Remove the build output, and the environment too when `all` is set.
    ///
    /// Absent directories are skipped, so cleaning twice succeeds both times.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Remove`] when an existing directory cannot be
    /// deleted.
    pub fn clean(&self, all: bool) -> Result<CleanReport, BuildError> {
        let mut dirs = vec![self.config.build_dir.as_path()];
        if all {
            dirs.push(self.environment.dir());
        }

        let mut report = CleanReport::default();
        for dir in dirs {
            if remove_dir(dir)? {
                tracing::info!(dir = %dir.display(), "Removed");
                report.removed.push(dir.to_path_buf());
            } else {
                tracing::debug!(dir = %dir.display(), "Nothing to remove");
            }
        }
        Ok(report)
    }

    /// Fetch the configured upstream bibliography files into `dir`, or the
    /// configured bibliography directory when `dir` is `None`.
    ///
    /// Nothing is committed to version control.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Fetch`] when a source is unreachable or invalid;
    /// the bibliography directory is left untouched in that case.
    pub fn refresh_bibliography(
        &self,
        dir: Option<&Path>,
        fetcher: &dyn Fetch,
    ) -> Result<RefreshReport, BuildError> {
        let bib = &self.config.bibliography_resolved;
        let output_dir = dir.unwrap_or(&bib.dir);
        let sources: Vec<Source> = bib
            .upstream
            .iter()
            .map(|upstream| Source {
                name: upstream.name.clone(),
                url: upstream.url.clone(),
            })
            .collect();

        tracing::info!(
            sources = sources.len(),
            dir = %output_dir.display(),
            "Refreshing bibliography"
        );
        let report = technote_bib::refresh_bibliography(&sources, fetcher, output_dir)?;
        Ok(report)
    }
}

/// Remove `dir` recursively. Returns whether it existed.
fn remove_dir(dir: &Path) -> Result<bool, BuildError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(BuildError::Remove {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentState;
    use crate::error::EnvironmentError;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, HashMap};
    use technote_bib::FetchError;
    use tempfile::TempDir;

    /// Every file under `root` with its contents, keyed by relative path.
    fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
        fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    collect(root, &path, files);
                } else {
                    let rel = path.strip_prefix(root).unwrap().display().to_string();
                    files.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        let mut files = BTreeMap::new();
        collect(root, root, &mut files);
        files
    }

    const SMITH_BIB: &str = "@article{smith2020,\n  author = {Smith, Jane},\n  title = {Vertical Monorepos},\n  journal = {DMTN},\n  year = {2020}\n}\n";

    struct FakeFetcher(HashMap<String, String>);

    impl Fetch for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Unreachable {
                    url: url.to_owned(),
                    message: "connection refused".to_owned(),
                })
        }
    }

    fn project(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (path, content) in files {
            let path = tmp.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        tmp
    }

    fn driver(tmp: &TempDir, toml: &str) -> BuildDriver {
        BuildDriver::new(Config::parse(toml, tmp.path()).unwrap())
    }

    fn ready(tmp: &TempDir, toml: &str) -> BuildDriver {
        let driver = driver(tmp, toml);
        driver.init_environment().unwrap();
        driver
    }

    #[test]
    fn test_clean_is_idempotent() {
        let tmp = project(&[("note.md", "# Note\n")]);
        let driver = ready(&tmp, "");
        driver.build(Target::Html).unwrap();
        assert!(tmp.path().join("_build/html/note.html").is_file());

        let first = driver.clean(false).unwrap();
        assert_eq!(first.removed, vec![tmp.path().join("_build")]);
        assert!(!tmp.path().join("_build").exists());

        let second = driver.clean(false).unwrap();
        assert!(second.removed.is_empty());
        assert!(!tmp.path().join("_build").exists());
        assert!(tmp.path().join("note.md").is_file());
    }

    #[test]
    fn test_clean_all_resets_environment() {
        let tmp = project(&[]);
        let driver = ready(&tmp, "");
        assert_eq!(driver.environment().state(), EnvironmentState::Initialized);

        driver.clean(true).unwrap();
        assert_eq!(
            driver.environment().state(),
            EnvironmentState::Uninitialized
        );
    }

    #[test]
    fn test_build_requires_init() {
        let tmp = project(&[("note.md", "# Note\n")]);
        let err = driver(&tmp, "").build(Target::Html).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Environment(EnvironmentError::NotInitialized { .. })
        ));
        assert!(!tmp.path().join("_build").exists());
    }

    #[test]
    fn test_settings_change_makes_environment_stale() {
        let tmp = project(&[("note.md", "# Note\n")]);
        ready(&tmp, "");

        let changed = driver(&tmp, "[toolchain]\nversion = \"2.0\"\n");
        let err = changed.build(Target::Html).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Environment(EnvironmentError::Stale { .. })
        ));

        assert_eq!(changed.init_environment().unwrap(), InitOutcome::Provisioned);
        changed.build(Target::Html).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_init_runs_provisioning_once() {
        let tmp = project(&[]);
        let toml = "[environment]\nprovision = [[\"sh\", \"-c\", \"echo run >> provisioned.txt\"]]\n";
        let driver = driver(&tmp, toml);

        assert_eq!(driver.init_environment().unwrap(), InitOutcome::Provisioned);
        assert_eq!(
            driver.init_environment().unwrap(),
            InitOutcome::AlreadyInitialized
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("provisioned.txt")).unwrap(),
            "run\n"
        );
    }

    #[test]
    fn test_init_fails_when_toolchain_missing() {
        let tmp = project(&[]);
        let driver = driver(
            &tmp,
            "[toolchain]\nkind = \"external\"\nprogram = \"technote-no-such-builder\"\n",
        );
        let err = driver.init_environment().unwrap_err();
        assert!(matches!(
            err,
            BuildError::Environment(EnvironmentError::ToolMissing { .. })
        ));
        assert_eq!(
            driver.environment().state(),
            EnvironmentState::Uninitialized
        );
    }

    #[test]
    fn test_missing_citation_names_key() {
        let tmp = project(&[("note.md", "# Note\n\nAs argued in [@smith2020].\n")]);
        let driver = ready(&tmp, "");

        let err = driver.build(Target::Html).unwrap_err();
        let BuildError::Toolchain(err) = err else {
            panic!("expected ToolchainError, got {err:?}");
        };
        assert_eq!(err.target, "html");
        assert!(err.diagnostic.contains("smith2020"));
        assert!(err.to_string().contains("smith2020"));
    }

    #[test]
    fn test_citation_resolves_with_bibliography() {
        let tmp = project(&[
            ("note.md", "# Note\n\nAs argued in [@smith2020].\n"),
            ("bib/refs.bib", SMITH_BIB),
        ]);
        let driver = ready(&tmp, "");

        let report = driver.build(Target::Html).unwrap();
        assert_eq!(report.output_dir, tmp.path().join("_build/html"));
        let html = fs::read_to_string(report.output_dir.join("note.html")).unwrap();
        assert!(html.contains("href=\"#ref-smith2020\""));
        assert!(html.contains("Vertical Monorepos"));
    }

    #[test]
    fn test_empty_project_builds_index() {
        let tmp = project(&[]);
        let driver = ready(&tmp, "");

        let report = driver.build(Target::Html).unwrap();
        let index = fs::read_to_string(report.output_dir.join("index.html")).unwrap();
        assert!(index.contains("<h1>Technote</h1>"));
        assert!(index.contains("No documents."));
    }

    #[test]
    fn test_build_is_deterministic() {
        let tmp = project(&[
            ("index.md", "# Home\n\nSee [the note](guide/note.md).\n"),
            (
                "guide/note.md",
                "# Note\n\n## Context\n\nAs argued in [@smith2020].\n\n## Proposal\n",
            ),
            ("bib/refs.bib", SMITH_BIB),
        ]);
        let driver = ready(&tmp, "");

        let out = driver.build(Target::Html).unwrap().output_dir;
        let first = snapshot(&out);
        let out = driver.build(Target::Html).unwrap().output_dir;
        let second = snapshot(&out);

        assert!(first.contains_key("guide/note.html"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_lint_target_reports_broken_links() {
        let tmp = project(&[("note.md", "# Note\n\n[missing](other.md)\n")]);
        let driver = ready(&tmp, "");

        let BuildError::Toolchain(err) = driver.build(Target::Lint).unwrap_err() else {
            panic!("expected ToolchainError");
        };
        assert_eq!(err.diagnostic, "note.md: link to missing document 'other.md'\n");

        // The html target only warns about links.
        driver.build(Target::Html).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_external_failure_passes_diagnostic_through() {
        let tmp = project(&[]);
        let driver = ready(
            &tmp,
            r#"
[toolchain]
kind = "external"
program = "sh"
args = ["-c", "echo boom >&2; exit 3"]
"#,
        );

        let BuildError::Toolchain(err) = driver.build(Target::Html).unwrap_err() else {
            panic!("expected ToolchainError");
        };
        assert_eq!(err.diagnostic, "boom\n");
        assert_eq!(err.status, Some(3));
        assert_eq!(err.to_string(), "html build failed (exit status 3):\nboom");
    }

    #[cfg(unix)]
    #[test]
    fn test_external_uses_environment_bin() {
        let tmp = project(&[]);
        let toml = r#"
[environment]
provision = [
    ["sh", "-c", "printf '#!/bin/sh\nmkdir -p \"$2\" && echo built > \"$2/out.txt\"\n' > \"$TECHNOTE_ENV/bin/docbuild\""],
    ["chmod", "+x", ".technote/bin/docbuild"],
]

[toolchain]
kind = "external"
program = "docbuild"
args = ["{target}", "{output}"]
"#;
        let driver = ready(&tmp, toml);

        let report = driver.build(Target::Html).unwrap();
        assert_eq!(
            fs::read_to_string(report.output_dir.join("out.txt")).unwrap(),
            "built\n"
        );
    }

    #[test]
    fn test_refresh_then_clean_then_build() {
        let tmp = project(&[("note.md", "# Note\n\nSee [@smith2020].\n")]);
        let toml = r#"
[bibliography]
upstream = [{ name = "refs.bib", url = "https://example.org/refs.bib" }]
"#;
        let driver = ready(&tmp, toml);
        let fetcher = FakeFetcher(HashMap::from([(
            "https://example.org/refs.bib".to_owned(),
            SMITH_BIB.to_owned(),
        )]));

        let report = driver.refresh_bibliography(None, &fetcher).unwrap();
        assert_eq!(report.files, vec![tmp.path().join("bib/refs.bib")]);
        assert_eq!(report.entries, 1);

        driver.clean(false).unwrap();
        driver.build(Target::Html).unwrap();
    }

    #[test]
    fn test_refresh_failure_leaves_bibliography_untouched() {
        let tmp = project(&[("bib/refs.bib", SMITH_BIB)]);
        let toml = r#"
[bibliography]
upstream = [
    { name = "refs.bib", url = "https://example.org/refs.bib" },
    { name = "lsst.bib", url = "https://example.org/lsst.bib" },
]
"#;
        let driver = driver(&tmp, toml);
        let fetcher = FakeFetcher(HashMap::from([(
            "https://example.org/refs.bib".to_owned(),
            "@misc{other, year = 2021}".to_owned(),
        )]));

        let err = driver.refresh_bibliography(None, &fetcher).unwrap_err();
        assert!(matches!(err, BuildError::Fetch(FetchError::Unreachable { .. })));
        assert_eq!(
            fs::read_to_string(tmp.path().join("bib/refs.bib")).unwrap(),
            SMITH_BIB
        );
        assert!(!tmp.path().join("bib/lsst.bib").exists());
    }

    #[test]
    fn test_refresh_into_explicit_dir() {
        let tmp = project(&[]);
        let toml = "[bibliography]\nupstream = [{ name = \"refs.bib\", url = \"https://example.org/refs.bib\" }]\n";
        let driver = driver(&tmp, toml);
        let fetcher = FakeFetcher(HashMap::from([(
            "https://example.org/refs.bib".to_owned(),
            SMITH_BIB.to_owned(),
        )]));

        let dir = tmp.path().join("vendor-bib");
        driver.refresh_bibliography(Some(&dir), &fetcher).unwrap();
        assert!(dir.join("refs.bib").is_file());
        assert!(!tmp.path().join("bib").exists());
    }
}
