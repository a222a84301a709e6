/*!
 * Syscall Error Types
 * Operation errors (kernel errno) kept apart from dispatch faults
 */

use crate::core::types::RawStatus;
use crate::syscalls::iouring::IoUringError;
use miette::Diagnostic;
use nix::errno::Errno;
use thiserror::Error;

/// Failure of a dispatched operation
///
/// `Os` means the kernel ran the operation and it failed; the errno is the
/// whole story. `Dispatch` means the request never got a kernel verdict
/// because the submission machinery itself failed.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum SyscallError {
    #[error("{op} failed: {errno}")]
    #[diagnostic(code(syscall::os))]
    Os { op: &'static str, errno: Errno },

    #[error("{op} could not be dispatched")]
    #[diagnostic(
        code(syscall::dispatch),
        help("The completion ring is unusable; the operation was never attempted.")
    )]
    Dispatch {
        op: &'static str,
        #[source]
        #[diagnostic_source]
        source: IoUringError,
    },
}

impl SyscallError {
    /// Create an operation error from a negative kernel status
    #[inline]
    pub fn from_status(op: &'static str, status: RawStatus) -> Self {
        Self::Os {
            op,
            errno: Errno::from_raw(status.saturating_neg()),
        }
    }

    /// Create an operation error from an errno
    #[inline]
    pub fn os(op: &'static str, errno: Errno) -> Self {
        Self::Os { op, errno }
    }

    /// Create a dispatch fault
    #[inline]
    pub fn dispatch(op: &'static str, source: IoUringError) -> Self {
        Self::Dispatch { op, source }
    }

    /// Name of the operation that failed
    pub fn op(&self) -> &'static str {
        match self {
            Self::Os { op, .. } | Self::Dispatch { op, .. } => op,
        }
    }

    /// Errno of an operation error
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Os { errno, .. } => Some(*errno),
            Self::Dispatch { .. } => None,
        }
    }

    /// The kernel's negative status for operation errors
    ///
    /// Dispatch faults have no kernel status and return `None`.
    pub fn raw_status(&self) -> Option<RawStatus> {
        self.errno().map(|errno| -(errno as RawStatus))
    }

    /// Whether the submission machinery, not the operation, failed
    pub fn is_dispatch_fault(&self) -> bool {
        matches!(self, Self::Dispatch { .. })
    }
}
