/*!
 * Syscall Result Types
 * Translation of the kernel's signed status into typed results
 */

use super::errors::SyscallError;
use crate::core::types::RawStatus;

/// Result of a dispatched operation
pub type SyscallResult<T = ()> = Result<T, SyscallError>;

/// Split a kernel status into its value or its errno
///
/// This is the only place the sign of a status is inspected.
#[inline]
pub fn check_status(op: &'static str, status: RawStatus) -> SyscallResult<u32> {
    if status < 0 {
        Err(SyscallError::from_status(op, status))
    } else {
        Ok(status as u32)
    }
}
