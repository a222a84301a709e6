/*!
 * Completion Entries
 * Results reaped from the io_uring completion queue
 */

use super::submission::Operation;
use crate::core::types::RawStatus;
use crate::syscalls::types::{check_status, SyscallResult};
use io_uring::cqueue;

/// Completion of a single submitted operation
#[derive(Debug)]
pub struct Completion {
    /// Correlation tag carried from the submission
    pub user_data: u64,
    /// Kernel status: `-errno` on failure
    pub status: RawStatus,
    /// The request, handed back once the kernel is done with its buffers
    pub operation: Operation,
}

impl Completion {
    pub(super) fn new(entry: &cqueue::Entry, operation: Operation) -> Self {
        Self {
            user_data: entry.user_data(),
            status: entry.result(),
            operation,
        }
    }

    /// Check if the status indicates success
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status >= 0
    }

    /// Translate the status into a typed result
    #[inline]
    pub fn into_result(&self) -> SyscallResult<u32> {
        check_status(self.operation.name(), self.status)
    }
}
