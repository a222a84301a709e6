/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use thiserror::Error;

// Re-export the per-layer error types
pub use crate::syscalls::config::ConfigError;
pub use crate::syscalls::iouring::IoUringError;
pub use crate::syscalls::types::SyscallError;

/// Failure to build a dispatcher
#[derive(Error, Debug, Diagnostic)]
pub enum SetupError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] IoUringError),
}

impl SetupError {
    /// Whether the kernel refused to give us a ring at all
    ///
    /// Callers use this to tell a sandbox without io_uring apart from a bad
    /// configuration.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            SetupError::Engine(IoUringError::Setup { .. } | IoUringError::Registration { .. })
        )
    }
}
