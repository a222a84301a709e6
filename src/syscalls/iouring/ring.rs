/*!
 * Completion Engine
 * Owns the kernel ring: acquire a slot, fill it, submit, block for the matching completion
 */

use super::completion::Completion;
use super::registry::FileTable;
use super::submission::{encode, OpKind, Operation};
use super::IoUringError;
use crate::syscalls::config::AddressingMode;
use ahash::RandomState;
use io_uring::{IoUring, Probe};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use tracing::{debug, info, warn};

/// A reserved submission slot
///
/// Carries the correlation tag the completion will be matched by.
#[derive(Debug)]
#[must_use = "an acquired slot should be filled and submitted"]
pub struct Slot {
    user_data: u64,
}

impl Slot {
    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }
}

/// Single-flight io_uring engine
///
/// One caller drives one engine: every method takes `&mut self`, so the
/// acquire → fill → submit_and_wait sequence cannot interleave.
pub struct CompletionEngine {
    ring: IoUring,
    sq_capacity: usize,
    file_table: Option<FileTable>,
    /// Opcodes the running kernel supports; `None` if probing failed
    probe: Option<Probe>,
    /// Requests the kernel may still dereference, keyed by correlation tag
    in_flight: HashMap<u64, Box<Operation>, RandomState>,
    next_user_data: u64,
    stats: RingStats,
}

impl CompletionEngine {
    /// Set up a ring with `entries` submission slots
    pub fn new(entries: u32) -> Result<Self, IoUringError> {
        let ring = IoUring::new(entries).map_err(|source| IoUringError::Setup { entries, source })?;
        let sq_capacity = ring.params().sq_entries() as usize;

        let mut probe = Probe::new();
        let probe = match ring.submitter().register_probe(&mut probe) {
            Ok(()) => Some(probe),
            Err(e) => {
                warn!(error = %e, "opcode probe failed; assuming every opcode is supported");
                None
            }
        };

        info!(
            entries = entries,
            sq_capacity = sq_capacity,
            cq_capacity = ring.params().cq_entries(),
            "io_uring completion engine created"
        );

        Ok(Self {
            ring,
            sq_capacity,
            file_table: None,
            probe,
            in_flight: HashMap::with_hasher(RandomState::new()),
            next_user_data: 1,
            stats: RingStats::default(),
        })
    }

    /// Register a sparse file table of `capacity` slots
    ///
    /// The table cannot grow afterwards and can only be registered once.
    pub fn register_file_table(&mut self, capacity: u32) -> Result<&FileTable, IoUringError> {
        if let Some(table) = &self.file_table {
            return Err(IoUringError::AlreadyRegistered {
                capacity: table.capacity(),
            });
        }

        self.ring
            .submitter()
            .register_files_sparse(capacity)
            .map_err(|source| IoUringError::Registration { capacity, source })?;

        info!(capacity = capacity, "registered sparse file table");
        Ok(self.file_table.insert(FileTable::new(capacity)))
    }

    /// Get the registered file table, if any
    pub fn file_table(&self) -> Option<&FileTable> {
        self.file_table.as_ref()
    }

    /// Whether the kernel implements the opcode behind `kind`
    ///
    /// Unsupported opcodes still submit; their completions carry `-EINVAL`.
    pub fn supports(&self, kind: OpKind) -> bool {
        self.probe
            .as_ref()
            .map_or(true, |probe| probe.is_supported(kind.opcode()))
    }

    /// Reserve a submission slot
    pub fn acquire_slot(&mut self) -> Result<Slot, IoUringError> {
        if self.ring.submission().is_full() {
            return Err(IoUringError::QueueExhausted {
                capacity: self.sq_capacity,
            });
        }

        let user_data = self.next_user_data;
        self.next_user_data = self.next_user_data.wrapping_add(1);
        Ok(Slot { user_data })
    }

    /// Encode `operation` into the slot and queue it for submission
    ///
    /// The engine takes ownership of the request until its completion is
    /// reaped, so paths and buffers stay valid while the kernel uses them.
    pub fn fill(
        &mut self,
        slot: &Slot,
        operation: Operation,
        mode: AddressingMode,
    ) -> Result<(), IoUringError> {
        if operation.uses_file_table(mode) && self.file_table.is_none() {
            return Err(IoUringError::FileTableMissing {
                op: operation.name(),
            });
        }

        if let (Some(table), Some(target)) = (&self.file_table, operation.target()) {
            if !table.resolves(target) {
                warn!(
                    op = operation.name(),
                    target = %target,
                    capacity = table.capacity(),
                    "fixed target outside the registered table; expect EBADF"
                );
            }
        }

        let mut operation = Box::new(operation);
        let entry = encode(&mut operation, mode, slot.user_data);

        // SAFETY: every pointer in `entry` targets heap data owned by the boxed
        // operation, which is parked in `in_flight` until the completion
        // tagged with `slot.user_data` has been reaped.
        unsafe { self.ring.submission().push(&entry) }.map_err(|_| {
            IoUringError::QueueExhausted {
                capacity: self.sq_capacity,
            }
        })?;

        debug!(
            op = operation.name(),
            user_data = slot.user_data,
            mode = ?mode,
            "submission entry filled"
        );
        self.in_flight.insert(slot.user_data, operation);
        Ok(())
    }

    /// Publish queued entries and block until the slot's completion arrives
    pub fn submit_and_wait(&mut self, slot: Slot) -> Result<Completion, IoUringError> {
        if !self.in_flight.contains_key(&slot.user_data) {
            return Err(IoUringError::SubmitFailed(io::Error::other(format!(
                "slot {} holds no filled entry",
                slot.user_data
            ))));
        }

        let submitted = self.ring.submit().map_err(IoUringError::SubmitFailed)?;
        // Zero with an empty queue means the entry went out on an earlier call.
        if submitted == 0 && !self.ring.submission().is_empty() {
            return Err(IoUringError::SubmitFailed(io::Error::other(
                "ring accepted no entries",
            )));
        }
        self.stats.submissions += submitted as u64;

        loop {
            if let Some(completion) = self.reap(slot.user_data) {
                debug!(
                    op = completion.operation.name(),
                    user_data = completion.user_data,
                    status = completion.status,
                    "completion reaped"
                );
                return Ok(completion);
            }

            self.ring
                .submit_and_wait(1)
                .map_err(|source| IoUringError::WaitFailed {
                    user_data: slot.user_data,
                    source,
                })?;
        }
    }

    /// Acquire, fill and submit in one call
    pub fn execute(
        &mut self,
        operation: Operation,
        mode: AddressingMode,
    ) -> Result<Completion, IoUringError> {
        let slot = self.acquire_slot()?;
        self.fill(&slot, operation, mode)?;
        self.submit_and_wait(slot)
    }

    /// Drain the completion queue, keeping only the entry tagged `user_data`
    ///
    /// Draining advances the queue head so reaped entries free ring capacity.
    fn reap(&mut self, user_data: u64) -> Option<Completion> {
        let mut found = None;

        for entry in self.ring.completion() {
            let tag = entry.user_data();
            let Some(operation) = self.in_flight.remove(&tag) else {
                warn!(user_data = tag, status = entry.result(), "completion with unknown tag discarded");
                self.stats.discarded += 1;
                continue;
            };

            self.stats.completions += 1;
            if tag == user_data && found.is_none() {
                found = Some(Completion::new(&entry, *operation));
            } else {
                warn!(
                    op = operation.name(),
                    user_data = tag,
                    status = entry.result(),
                    "stale completion discarded"
                );
                self.stats.discarded += 1;
            }
        }

        found
    }

    /// Number of requests submitted but not yet reaped
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Submission queue capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.sq_capacity
    }

    /// Get statistics
    pub fn stats(&self) -> RingStatistics {
        RingStatistics {
            submissions: self.stats.submissions,
            completions: self.stats.completions,
            discarded: self.stats.discarded,
            in_flight: self.in_flight.len(),
        }
    }
}

impl Drop for CompletionEngine {
    fn drop(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }

        // The kernel may still write into these buffers while the ring tears down.
        warn!(
            in_flight = self.in_flight.len(),
            "leaking buffers of unreaped operations"
        );
        for (_, operation) in self.in_flight.drain() {
            Box::leak(operation);
        }
    }
}

#[derive(Debug, Default)]
struct RingStats {
    submissions: u64,
    completions: u64,
    discarded: u64,
}

/// Public statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RingStatistics {
    pub submissions: u64,
    pub completions: u64,
    pub discarded: u64,
    pub in_flight: usize,
}
