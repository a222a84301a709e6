/*!
 * Operation Dispatcher
 *
 * One method per logical operation. The configured backend decides whether
 * the request runs as a blocking system call or as a single io_uring
 * submission; the addressing mode decides whether allocating operations
 * hand back descriptors or registered file slots.
 */

use super::config::{AddressingMode, Backend, DispatchConfig};
use super::direct;
use super::iouring::{CompletionEngine, OpKind, Operation, RingStatistics};
use super::types::{check_status, SocketAddress, SyscallError, SyscallResult};
use crate::core::errors::SetupError;
use crate::core::limits::MAX_IO_LEN;
use crate::core::types::{Fd, Handle, RawStatus};
use crate::monitoring::span_dispatch;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, warn};

/// An operation that was asked to use registered file indexes but cannot
///
/// The operation still ran, with descriptor semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub op: OpKind,
}

/// Routes operations to the configured backend
pub struct Dispatcher {
    config: DispatchConfig,
    engine: Option<CompletionEngine>,
    advisories: Vec<Advisory>,
}

impl Dispatcher {
    /// Validate the configuration and set up the backend it names
    ///
    /// The queued backend creates a ring; indexed addressing also registers
    /// a sparse file table on it.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, SetupError> {
        config.validate()?;

        let engine = match config.backend {
            Backend::Direct => None,
            Backend::Queued => {
                let mut engine = CompletionEngine::new(config.queue_depth)?;
                if config.addressing == AddressingMode::Indexed {
                    engine.register_file_table(config.file_table_size)?;
                }
                Some(engine)
            }
        };

        debug!(
            backend = %config.backend,
            addressing = %config.addressing,
            "dispatcher ready"
        );

        Ok(Self {
            config: config.clone(),
            engine,
            advisories: Vec::new(),
        })
    }

    /// Dispatch through an engine the caller already set up
    ///
    /// Indexed addressing expects the engine to carry a file table; without
    /// one, indexed operations fail as dispatch faults.
    pub fn with_engine(engine: CompletionEngine, addressing: AddressingMode) -> Self {
        Self {
            config: DispatchConfig {
                addressing,
                ..DispatchConfig::queued()
            },
            engine: Some(engine),
            advisories: Vec::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    #[inline]
    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    #[inline]
    pub fn addressing(&self) -> AddressingMode {
        self.config.addressing
    }

    /// The completion engine, when running queued
    pub fn engine(&self) -> Option<&CompletionEngine> {
        self.engine.as_ref()
    }

    /// Ring statistics, when running queued
    pub fn stats(&self) -> Option<RingStatistics> {
        self.engine.as_ref().map(CompletionEngine::stats)
    }

    /// Advisories raised since the last call
    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.advisories)
    }

    // =========================================================================
    // Resource-allocating operations
    // =========================================================================

    /// Open `path` relative to `dirfd`
    ///
    /// Returns a registered slot in indexed mode, a descriptor otherwise.
    pub fn open(
        &mut self,
        dirfd: Fd,
        path: impl AsRef<Path>,
        flags: i32,
        mode: u32,
    ) -> SyscallResult<Handle> {
        let path = c_path("openat", path.as_ref())?;
        let (value, _) = self.run(Operation::OpenAt {
            dirfd,
            path,
            flags,
            mode,
        })?;
        Ok(self.allocated(value))
    }

    /// Create a socket
    pub fn socket(&mut self, domain: i32, socket_type: i32, protocol: i32) -> SyscallResult<Handle> {
        let (value, _) = self.run(Operation::Socket {
            domain,
            socket_type,
            protocol,
        })?;
        Ok(self.allocated(value))
    }

    // =========================================================================
    // Operations on an existing resource
    // =========================================================================

    pub fn connect(&mut self, target: Handle, addr: &SocketAddress) -> SyscallResult<()> {
        addr.validate().map_err(|e| SyscallError::os("connect", e))?;
        self.run(Operation::Connect {
            target,
            addr: *addr,
        })?;
        Ok(())
    }

    /// Bind a socket
    ///
    /// The kernel takes no registered index for bind; in indexed mode the
    /// handle's number is used as a descriptor.
    pub fn bind(&mut self, target: Handle, addr: &SocketAddress) -> SyscallResult<()> {
        addr.validate().map_err(|e| SyscallError::os("bind", e))?;
        self.run(Operation::Bind {
            fd: target.as_raw_fd(),
            addr: *addr,
        })?;
        Ok(())
    }

    /// Read into `buf`, at `offset` or at the file position when `None`
    ///
    /// Returns the number of bytes read; zero means end of file.
    pub fn read(
        &mut self,
        target: Handle,
        buf: &mut [u8],
        offset: Option<u64>,
    ) -> SyscallResult<usize> {
        check_len("read", buf.len())?;

        let (value, operation) = self.run(Operation::Read {
            target,
            buf: vec![0; buf.len()],
            offset,
        })?;

        let count = value as usize;
        if let Operation::Read { buf: filled, .. } = operation {
            buf[..count].copy_from_slice(&filled[..count]);
        }
        Ok(count)
    }

    /// Write `buf`, at `offset` or at the file position when `None`
    pub fn write(&mut self, target: Handle, buf: &[u8], offset: Option<u64>) -> SyscallResult<usize> {
        check_len("write", buf.len())?;

        let (value, _) = self.run(Operation::Write {
            target,
            buf: buf.to_vec(),
            offset,
        })?;
        Ok(value as usize)
    }

    /// Close a descriptor, or release a registered slot
    pub fn close(&mut self, target: Handle) -> SyscallResult<()> {
        self.run(Operation::Close { target })?;
        Ok(())
    }

    // =========================================================================
    // Path operations
    // =========================================================================

    /// Create a symbolic link at `linkpath` pointing to `target`
    pub fn symlink(
        &mut self,
        target: impl AsRef<Path>,
        newdirfd: Fd,
        linkpath: impl AsRef<Path>,
    ) -> SyscallResult<()> {
        let target = c_path("symlinkat", target.as_ref())?;
        let linkpath = c_path("symlinkat", linkpath.as_ref())?;
        self.run(Operation::SymlinkAt {
            target,
            newdirfd,
            linkpath,
        })?;
        Ok(())
    }

    /// Create a hard link
    pub fn link(
        &mut self,
        olddirfd: Fd,
        oldpath: impl AsRef<Path>,
        newdirfd: Fd,
        newpath: impl AsRef<Path>,
        flags: i32,
    ) -> SyscallResult<()> {
        let oldpath = c_path("linkat", oldpath.as_ref())?;
        let newpath = c_path("linkat", newpath.as_ref())?;
        self.run(Operation::LinkAt {
            olddirfd,
            oldpath,
            newdirfd,
            newpath,
            flags,
        })?;
        Ok(())
    }

    /// Remove a file, or a directory with `AT_REMOVEDIR`
    pub fn unlink(&mut self, dirfd: Fd, path: impl AsRef<Path>, flags: i32) -> SyscallResult<()> {
        let path = c_path("unlinkat", path.as_ref())?;
        self.run(Operation::UnlinkAt { dirfd, path, flags })?;
        Ok(())
    }

    pub fn mkdir(&mut self, dirfd: Fd, path: impl AsRef<Path>, mode: u32) -> SyscallResult<()> {
        let path = c_path("mkdirat", path.as_ref())?;
        self.run(Operation::MkdirAt { dirfd, path, mode })?;
        Ok(())
    }

    /// Rename a path; `flags` are `renameat2` flags
    pub fn rename(
        &mut self,
        olddirfd: Fd,
        oldpath: impl AsRef<Path>,
        newdirfd: Fd,
        newpath: impl AsRef<Path>,
        flags: u32,
    ) -> SyscallResult<()> {
        let oldpath = c_path("renameat", oldpath.as_ref())?;
        let newpath = c_path("renameat", newpath.as_ref())?;
        self.run(Operation::RenameAt {
            olddirfd,
            oldpath,
            newdirfd,
            newpath,
            flags,
        })?;
        Ok(())
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Run one request on the configured backend
    ///
    /// Hands the request back alongside the non-negative status so callers
    /// can collect buffers the kernel filled.
    fn run(&mut self, operation: Operation) -> SyscallResult<(u32, Operation)> {
        let op = operation.name();
        let mode = self.effective_mode(operation.kind());
        let span = span_dispatch(op, self.config.backend.as_str(), mode.as_str());
        let _entered = span.enter();

        let (status, operation) = match self.engine.as_mut() {
            None => {
                let mut operation = operation;
                let status: RawStatus = direct::execute(&mut operation);
                (status, operation)
            }
            Some(engine) => {
                if !engine.supports(operation.kind()) {
                    warn!(op = op, "kernel does not implement this opcode; expect EINVAL");
                }
                match engine.execute(operation, mode) {
                    Ok(completion) => (completion.status, completion.operation),
                    Err(source) => {
                        span.record_fault();
                        warn!(op = op, error = %source, "dispatch fault");
                        return Err(SyscallError::dispatch(op, source));
                    }
                }
            }
        };

        span.record_status(status);
        let value = check_status(op, status)?;
        Ok((value, operation))
    }

    /// Addressing the request actually runs under
    ///
    /// Kinds without fixed-file support fall back to descriptors, raising an
    /// advisory.
    fn effective_mode(&mut self, kind: OpKind) -> AddressingMode {
        let mode = self.config.addressing;
        if mode == AddressingMode::Indexed && !kind.supports_fixed_files() {
            warn!(
                op = kind.name(),
                "operation does not support file indexes; running with descriptors"
            );
            self.advisories.push(Advisory { op: kind });
            return AddressingMode::Raw;
        }
        mode
    }

    /// Wrap a value returned by an allocating operation
    fn allocated(&self, value: u32) -> Handle {
        match self.config.addressing {
            AddressingMode::Indexed => Handle::Fixed(value),
            AddressingMode::Raw => Handle::Fd(value as Fd),
        }
    }
}

/// Convert a path for the kernel; interior NULs are `EINVAL`
fn c_path(op: &'static str, path: &Path) -> SyscallResult<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| SyscallError::os(op, Errno::EINVAL))
}

fn check_len(op: &'static str, len: usize) -> SyscallResult<()> {
    if len > MAX_IO_LEN {
        return Err(SyscallError::os(op, Errno::EINVAL));
    }
    Ok(())
}
