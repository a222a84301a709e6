/*!
 * Registered File Table
 * Handle for the ring's sparse fixed-file table
 */

use crate::core::types::{FileIndex, Handle};

/// A registered file table of fixed capacity
///
/// Created once per engine. The kernel owns the slots: allocating
/// operations fill a free slot of its choosing and direct closes empty it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTable {
    capacity: u32,
}

impl FileTable {
    pub(super) fn new(capacity: u32) -> Self {
        Self { capacity }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether `index` names a slot of this table
    #[inline]
    pub fn contains(&self, index: FileIndex) -> bool {
        index < self.capacity
    }

    /// Whether a handle can resolve against this table
    pub fn resolves(&self, handle: Handle) -> bool {
        match handle {
            Handle::Fixed(index) => self.contains(index),
            Handle::Fd(_) => true,
        }
    }
}
