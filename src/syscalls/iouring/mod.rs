/*!
 * io_uring Completion Engine
 *
 * Submits exactly one operation at a time to a kernel io_uring instance and
 * blocks until its completion arrives. Optionally owns a registered file
 * table so operations can address fixed slots instead of descriptors.
 */

mod completion;
mod registry;
mod ring;
mod submission;

pub use completion::Completion;
pub use registry::FileTable;
pub use ring::{CompletionEngine, RingStatistics, Slot};
pub use submission::{OpKind, Operation};

use miette::Diagnostic;
use std::io;
use thiserror::Error;

/// Faults of the submission machinery itself
///
/// None of these say anything about the requested operation: the kernel
/// never produced a verdict for it.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum IoUringError {
    #[error("io_uring setup failed with {entries} entries")]
    #[diagnostic(
        code(iouring::setup),
        help("io_uring may be disabled (kernel.io_uring_disabled) or blocked by a seccomp profile.")
    )]
    Setup {
        entries: u32,
        #[source]
        source: io::Error,
    },

    #[error("registering a file table of {capacity} slots failed")]
    #[diagnostic(
        code(iouring::registration),
        help("Sparse file registration needs Linux 5.19 or newer.")
    )]
    Registration {
        capacity: u32,
        #[source]
        source: io::Error,
    },

    #[error("a file table of {capacity} slots is already registered")]
    #[diagnostic(code(iouring::already_registered))]
    AlreadyRegistered { capacity: u32 },

    #[error("{op} needs a registered file table but none is registered")]
    #[diagnostic(
        code(iouring::file_table_missing),
        help("Register a file table before submitting indexed operations.")
    )]
    FileTableMissing { op: &'static str },

    #[error("submission queue exhausted ({capacity} entries)")]
    #[diagnostic(
        code(iouring::queue_exhausted),
        help("Only one operation should be in flight; a previous completion was not reaped.")
    )]
    QueueExhausted { capacity: usize },

    #[error("publishing the submission failed")]
    #[diagnostic(code(iouring::submit_failed))]
    SubmitFailed(#[source] io::Error),

    #[error("waiting for completion {user_data} failed")]
    #[diagnostic(code(iouring::wait_failed))]
    WaitFailed {
        user_data: u64,
        #[source]
        source: io::Error,
    },
}
