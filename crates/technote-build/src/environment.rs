//! The isolated build environment.
//!
//! An environment is a directory holding a `bin/` directory (prepended to
//! `PATH` for every child process) and an `environment.json` manifest written
//! by the last successful `init`. The manifest records a fingerprint of the
//! settings the environment was provisioned for:
//!
//! ```text
//! {env_dir}/
//! +-- environment.json   # fingerprint of toolchain + provisioning settings
//! +-- bin/               # tools installed by provisioning steps
//! ```
//!
//! When the fingerprint no longer matches the configuration, the environment
//! is stale and `init` wipes and re-provisions it.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use technote_config::{Config, ToolchainConfig};

use crate::error::EnvironmentError;

const MANIFEST_FILENAME: &str = "environment.json";

/// Lifecycle state of the environment directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    /// No manifest: `init` has never completed.
    Uninitialized,
    /// Manifest matches the current settings.
    Initialized,
    /// Manifest records different settings (or is unreadable).
    Stale,
}

/// Result of [`Environment::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Provisioning ran and the manifest was written.
    Provisioned,
    /// The environment already matched; nothing was executed.
    AlreadyInitialized,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    fingerprint: String,
    toolchain: String,
    version: String,
}

/// Settings hashed into the fingerprint.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    technote: &'a str,
    kind: &'a str,
    program: Option<&'a str>,
    args: &'a [String],
    version: &'a str,
    provision: &'a [Vec<String>],
}

/// Fingerprint of the settings an environment is provisioned for.
///
/// SHA-256 over the toolchain settings, the provisioning steps and the
/// technote version (which pins the builtin renderer).
#[must_use]
pub fn fingerprint(toolchain: &ToolchainConfig, provision: &[Vec<String>]) -> String {
    let input = FingerprintInput {
        technote: env!("CARGO_PKG_VERSION"),
        kind: toolchain.kind.as_str(),
        program: toolchain.program.as_deref(),
        args: &toolchain.args,
        version: &toolchain.version,
        provision,
    };
    // Serializing plain strings and vectors cannot fail.
    let encoded = serde_json::to_vec(&input).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hex::encode(hasher.finalize())
}

/// The isolated environment a build runs in.
#[derive(Debug, Clone)]
pub struct Environment {
    dir: PathBuf,
    project_dir: PathBuf,
    provision: Vec<Vec<String>>,
    toolchain: String,
    version: String,
    fingerprint: String,
}

impl Environment {
    /// Describe the environment configured by `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let env = &config.environment_resolved;
        Self {
            dir: env.dir.clone(),
            project_dir: config.project_dir.clone(),
            provision: env.provision.clone(),
            toolchain: config.toolchain.kind.as_str().to_owned(),
            version: config.toolchain.version.clone(),
            fingerprint: fingerprint(&config.toolchain, &env.provision),
        }
    }

    /// Environment directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory of environment-local tools, searched before `PATH`.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.dir.join("bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILENAME)
    }

    /// Inspect the manifest and classify the environment.
    #[must_use]
    pub fn state(&self) -> EnvironmentState {
        let path = self.manifest_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return EnvironmentState::Uninitialized;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read environment manifest");
                return EnvironmentState::Stale;
            }
        };

        match serde_json::from_str::<Manifest>(&content) {
            Ok(manifest) if manifest.fingerprint == self.fingerprint => {
                EnvironmentState::Initialized
            }
            Ok(_) => EnvironmentState::Stale,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid environment manifest");
                EnvironmentState::Stale
            }
        }
    }

    /// Fail unless the environment is initialized for the current settings.
    pub fn ensure_ready(&self) -> Result<(), EnvironmentError> {
        match self.state() {
            EnvironmentState::Initialized => Ok(()),
            EnvironmentState::Uninitialized => Err(EnvironmentError::NotInitialized {
                dir: self.dir.clone(),
            }),
            EnvironmentState::Stale => Err(EnvironmentError::Stale {
                dir: self.dir.clone(),
            }),
        }
    }

    /// Provision the environment.
    ///
    /// Does nothing when the environment is already initialized for the
    /// current settings. A stale environment is wiped first. Provisioning
    /// steps run in order in the project directory; `verify` runs after them
    /// and checks that the toolchain is usable. The manifest is written last,
    /// so a failed `init` leaves the environment uninitialized.
    pub fn initialize(
        &self,
        verify: impl FnOnce(&Self) -> Result<(), EnvironmentError>,
    ) -> Result<InitOutcome, EnvironmentError> {
        match self.state() {
            EnvironmentState::Initialized => {
                tracing::info!(dir = %self.dir.display(), "Environment already initialized");
                return Ok(InitOutcome::AlreadyInitialized);
            }
            EnvironmentState::Stale => {
                tracing::info!(dir = %self.dir.display(), "Environment is stale, recreating");
                fs::remove_dir_all(&self.dir).map_err(|source| EnvironmentError::Io {
                    path: self.dir.clone(),
                    source,
                })?;
            }
            EnvironmentState::Uninitialized => {}
        }

        let bin_dir = self.bin_dir();
        fs::create_dir_all(&bin_dir).map_err(|source| EnvironmentError::Io {
            path: bin_dir.clone(),
            source,
        })?;

        for step in &self.provision {
            self.run_step(step)?;
        }
        verify(self)?;

        let manifest = Manifest {
            fingerprint: self.fingerprint.clone(),
            toolchain: self.toolchain.clone(),
            version: self.version.clone(),
        };
        let json = serde_json::to_string_pretty(&manifest).unwrap_or_default();
        let path = self.manifest_path();
        fs::write(&path, json + "\n").map_err(|source| EnvironmentError::Io { path, source })?;

        tracing::info!(dir = %self.dir.display(), "Environment initialized");
        Ok(InitOutcome::Provisioned)
    }

    /// Run one provisioning step, failing on a missing program or non-zero exit.
    fn run_step(&self, step: &[String]) -> Result<(), EnvironmentError> {
        let Some((program, args)) = step.split_first() else {
            return Ok(());
        };
        let resolved = self.resolve_program(program)?;
        tracing::info!(step = %step.join(" "), "Running provisioning step");

        let output = self
            .command(&resolved)
            .args(args)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => EnvironmentError::ToolMissing {
                    program: program.clone(),
                },
                _ => EnvironmentError::ProvisionFailed {
                    step: step.join(" "),
                    status: "could not start".to_owned(),
                    diagnostic: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(EnvironmentError::ProvisionFailed {
                step: step.join(" "),
                status: output.status.to_string(),
                diagnostic: diagnostic_text(&output.stdout, &output.stderr),
            });
        }
        Ok(())
    }

    /// A command running in the project directory with the environment's
    /// `bin/` first on `PATH` and `TECHNOTE_ENV` set.
    pub(crate) fn command(&self, program: &Path) -> Command {
        let mut command = Command::new(program);
        command
            .current_dir(&self.project_dir)
            .env("PATH", self.search_path())
            .env("TECHNOTE_ENV", &self.dir)
            .stdin(Stdio::null());
        command
    }

    /// `PATH` with the environment's `bin/` prepended.
    fn search_path(&self) -> OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let paths = std::iter::once(self.bin_dir()).chain(std::env::split_paths(&inherited));
        std::env::join_paths(paths).unwrap_or(inherited)
    }

    /// Locate `program` the way the child process would.
    ///
    /// Names containing a path separator are resolved against the project
    /// directory; bare names are searched in `bin/` and then `PATH`.
    pub fn resolve_program(&self, program: &str) -> Result<PathBuf, EnvironmentError> {
        let missing = || EnvironmentError::ToolMissing {
            program: program.to_owned(),
        };

        if program.contains('/') || program.contains(std::path::MAIN_SEPARATOR) {
            let path = self.project_dir.join(program);
            return is_executable(&path).then_some(path).ok_or_else(missing);
        }

        std::env::split_paths(&self.search_path())
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(missing)
    }
}

/// Child diagnostic: stderr, or stdout when stderr is empty.
pub(crate) fn diagnostic_text(stdout: &[u8], stderr: &[u8]) -> String {
    if stderr.iter().all(u8::is_ascii_whitespace) {
        String::from_utf8_lossy(stdout).into_owned()
    } else {
        String::from_utf8_lossy(stderr).into_owned()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(project: &Path, toml: &str) -> Config {
        Config::parse(toml, project).unwrap()
    }

    fn ok(_: &Environment) -> Result<(), EnvironmentError> {
        Ok(())
    }

    #[test]
    fn test_fingerprint_tracks_settings() {
        let tmp = TempDir::new().unwrap();
        let a = config(tmp.path(), "");
        let b = config(tmp.path(), "[toolchain]\nversion = \"2\"\n");
        let c = config(tmp.path(), "[environment]\nprovision = [[\"true\"]]\n");

        let fa = Environment::from_config(&a).fingerprint;
        assert_eq!(fa.len(), 64);
        assert_eq!(fa, Environment::from_config(&a).fingerprint);
        assert_ne!(fa, Environment::from_config(&b).fingerprint);
        assert_ne!(fa, Environment::from_config(&c).fingerprint);
    }

    #[test]
    fn test_state_transitions() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::from_config(&config(tmp.path(), ""));
        assert_eq!(env.state(), EnvironmentState::Uninitialized);
        assert!(matches!(
            env.ensure_ready(),
            Err(EnvironmentError::NotInitialized { .. })
        ));

        assert_eq!(env.initialize(ok).unwrap(), InitOutcome::Provisioned);
        assert_eq!(env.state(), EnvironmentState::Initialized);
        env.ensure_ready().unwrap();
        assert!(env.bin_dir().is_dir());

        let changed =
            Environment::from_config(&config(tmp.path(), "[toolchain]\nversion = \"9\"\n"));
        assert_eq!(changed.state(), EnvironmentState::Stale);
        assert!(matches!(
            changed.ensure_ready(),
            Err(EnvironmentError::Stale { .. })
        ));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::from_config(&config(tmp.path(), ""));
        env.initialize(ok).unwrap();

        let outcome = env
            .initialize(|_| panic!("verification must not run again"))
            .unwrap();
        assert_eq!(outcome, InitOutcome::AlreadyInitialized);
    }

    #[test]
    fn test_corrupt_manifest_is_stale() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::from_config(&config(tmp.path(), ""));
        fs::create_dir_all(env.dir()).unwrap();
        fs::write(env.dir().join(MANIFEST_FILENAME), "not json").unwrap();
        assert_eq!(env.state(), EnvironmentState::Stale);
    }

    #[test]
    fn test_missing_provisioning_program() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::from_config(&config(
            tmp.path(),
            "[environment]\nprovision = [[\"technote-no-such-tool\", \"--install\"]]\n",
        ));

        let err = env.initialize(ok).unwrap_err();
        assert!(
            matches!(err, EnvironmentError::ToolMissing { ref program } if program == "technote-no-such-tool")
        );
        assert_eq!(env.state(), EnvironmentState::Uninitialized);
    }

    #[cfg(unix)]
    #[test]
    fn test_provisioning_steps_run_in_order() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::from_config(&config(
            tmp.path(),
            r#"
[environment]
provision = [
    ["sh", "-c", "echo one >> steps.txt"],
    ["sh", "-c", "echo two >> steps.txt; test -n \"$TECHNOTE_ENV\""],
]
"#,
        ));

        env.initialize(ok).unwrap();
        let steps = fs::read_to_string(tmp.path().join("steps.txt")).unwrap();
        assert_eq!(steps, "one\ntwo\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_step_reports_stderr() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::from_config(&config(
            tmp.path(),
            "[environment]\nprovision = [[\"sh\", \"-c\", \"echo broken mirror >&2; exit 3\"]]\n",
        ));

        let err = env.initialize(ok).unwrap_err();
        match err {
            EnvironmentError::ProvisionFailed { diagnostic, .. } => {
                assert_eq!(diagnostic, "broken mirror\n");
            }
            other => panic!("expected ProvisionFailed, got {other:?}"),
        }
        assert_eq!(env.state(), EnvironmentState::Uninitialized);
    }

    #[cfg(unix)]
    #[test]
    fn test_bin_dir_is_searched_first() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let env = Environment::from_config(&config(tmp.path(), ""));
        fs::create_dir_all(env.bin_dir()).unwrap();
        let tool = env.bin_dir().join("sh");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(env.resolve_program("sh").unwrap(), tool);
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        assert_eq!(diagnostic_text(b"out", b"err"), "err");
        assert_eq!(diagnostic_text(b"out", b"\n"), "out");
    }
}
