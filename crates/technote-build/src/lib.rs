//! Build driver for technotes.
//!
//! Maps a document set and a bibliography to a disposable build output by
//! running a documentation toolchain inside an isolated environment.
//!
//! # Operations
//!
//! - [`BuildDriver::init_environment`] provisions the environment
//! - [`BuildDriver::build`] runs a [`Target`] (`html` or `lint`)
//! - [`BuildDriver::clean`] removes the build output
//! - [`BuildDriver::refresh_bibliography`] fetches upstream `.bib` files
//!
//! # Example
//!
//! ```no_run
//! use technote_build::{BuildDriver, Target};
//! use technote_config::Config;
//!
//! let config = Config::load(None, None)?;
//! let driver = BuildDriver::new(config);
//! driver.init_environment()?;
//! let report = driver.build(Target::Html)?;
//! println!("{}", report.output_dir.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod driver;
mod environment;
mod error;
mod toolchain;

pub use driver::{BuildDriver, BuildReport, CleanReport};
pub use environment::{Environment, EnvironmentState, InitOutcome, fingerprint};
pub use error::{BuildError, EnvironmentError, ToolchainError};
pub use toolchain::{BuiltinToolchain, ExternalToolchain, Target, Toolchain};
