/*!
 * Core Types
 * Common types used across the dispatcher
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process file descriptor
pub type Fd = std::os::fd::RawFd;

/// Slot in a registered file table
pub type FileIndex = u32;

/// Kernel status integer: negative is `-errno`, non-negative is a value
pub type RawStatus = i32;

/// Directory anchor meaning "relative to the working directory"
pub const CWD: Fd = libc::AT_FDCWD;

/// A resource returned by an allocating operation and threaded into later ones
///
/// `Fd` is a process descriptor, `Fixed` a slot in the ring's registered
/// file table. Allocating calls return the variant matching the addressing
/// mode they ran under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Handle {
    Fd(Fd),
    Fixed(FileIndex),
}

impl Handle {
    #[inline]
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    /// The bare number, whatever namespace it lives in
    #[inline]
    #[must_use]
    pub const fn number(&self) -> i64 {
        match *self {
            Self::Fd(fd) => fd as i64,
            Self::Fixed(index) => index as i64,
        }
    }

    /// The number reinterpreted as a process descriptor
    #[inline]
    #[must_use]
    pub const fn as_raw_fd(&self) -> Fd {
        match *self {
            Self::Fd(fd) => fd,
            Self::Fixed(index) => index as Fd,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fd(fd) => write!(f, "fd:{}", fd),
            Self::Fixed(index) => write!(f, "fixed:{}", index),
        }
    }
}
