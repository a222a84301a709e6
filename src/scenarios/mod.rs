/*!
 * Scenarios
 *
 * Named end-to-end exercises of the dispatcher. Each one creates what it
 * needs under a scenario root, runs a short sequence of operations and
 * cleans up after itself.
 */

mod echo;
mod fs;
mod net;
mod runner;

pub use echo::EchoListener;
pub use runner::{run, RunReport, ScenarioReport};

use crate::core::limits::{DEFAULT_SCENARIO_ROOT, SCENARIO_SOURCE_FILE};
use crate::syscalls::{AddressingMode, Dispatcher, SyscallError, SyscallResult};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Scenario failures
#[derive(Error, Debug, Diagnostic)]
pub enum ScenarioError {
    #[error("{step} failed")]
    #[diagnostic(code(scenario::step))]
    Step {
        step: &'static str,
        #[source]
        #[diagnostic_source]
        source: SyscallError,
    },

    #[error("echo listener failed")]
    #[diagnostic(code(scenario::listener))]
    Listener(#[source] io::Error),

    #[error("{step}: {detail}")]
    #[diagnostic(code(scenario::unexpected))]
    Unexpected { step: &'static str, detail: String },

    #[error("unknown scenario {0:?}")]
    #[diagnostic(
        code(scenario::unknown),
        help("Known scenarios: openat, connect, socket, symlinkat, linkat, unlinkat, mkdirat, renameat, bind, read")
    )]
    Unknown(String),
}

pub type ScenarioResult<T = ()> = Result<T, ScenarioError>;

/// Attach the step name to an operation error
trait StepExt<T> {
    fn step(self, step: &'static str) -> ScenarioResult<T>;
}

impl<T> StepExt<T> for SyscallResult<T> {
    #[inline]
    fn step(self, step: &'static str) -> ScenarioResult<T> {
        self.map_err(|source| ScenarioError::Step { step, source })
    }
}

/// Where scenarios put their files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioContext {
    /// Directory scenario files are created in
    pub root: PathBuf,
    /// Existing file opened, read, linked and symlinked
    pub source: PathBuf,
}

impl ScenarioContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source: PathBuf::from(SCENARIO_SOURCE_FILE),
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Default for ScenarioContext {
    fn default() -> Self {
        Self::new(DEFAULT_SCENARIO_ROOT)
    }
}

/// A named scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    OpenAt,
    Connect,
    Socket,
    SymlinkAt,
    LinkAt,
    UnlinkAt,
    MkdirAt,
    RenameAt,
    Bind,
    Read,
}

impl Scenario {
    /// Every scenario, in run order
    pub const ALL: [Scenario; 10] = [
        Scenario::OpenAt,
        Scenario::Connect,
        Scenario::Socket,
        Scenario::SymlinkAt,
        Scenario::LinkAt,
        Scenario::UnlinkAt,
        Scenario::MkdirAt,
        Scenario::RenameAt,
        Scenario::Bind,
        Scenario::Read,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::OpenAt => "openat",
            Scenario::Connect => "connect",
            Scenario::Socket => "socket",
            Scenario::SymlinkAt => "symlinkat",
            Scenario::LinkAt => "linkat",
            Scenario::UnlinkAt => "unlinkat",
            Scenario::MkdirAt => "mkdirat",
            Scenario::RenameAt => "renameat",
            Scenario::Bind => "bind",
            Scenario::Read => "read",
        }
    }

    /// Why the scenario is expected to fail under `addressing`, if it is
    pub fn known_failure(&self, addressing: AddressingMode) -> Option<&'static str> {
        match (self, addressing) {
            (Scenario::Bind, AddressingMode::Indexed) => Some(
                "bind has no fixed-file form; the slot number reaches the kernel as a descriptor",
            ),
            _ => None,
        }
    }

    /// Run the scenario against `dispatcher`
    pub fn execute(&self, dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
        match self {
            Scenario::OpenAt => fs::openat(dispatcher, ctx),
            Scenario::Connect => net::connect(dispatcher),
            Scenario::Socket => net::socket(dispatcher),
            Scenario::SymlinkAt => fs::symlinkat(dispatcher, ctx),
            Scenario::LinkAt => fs::linkat(dispatcher, ctx),
            Scenario::UnlinkAt => fs::unlinkat(dispatcher, ctx),
            Scenario::MkdirAt => fs::mkdirat(dispatcher, ctx),
            Scenario::RenameAt => fs::renameat(dispatcher, ctx),
            Scenario::Bind => net::bind(dispatcher, ctx),
            Scenario::Read => fs::read(dispatcher, ctx),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| ScenarioError::Unknown(s.to_string()))
    }
}

/// Remove a leftover file or socket from an earlier run
fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed stale file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove stale file"),
    }
}
