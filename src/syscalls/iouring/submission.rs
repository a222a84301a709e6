/*!
 * Submission Entries
 * Operation requests and their encoding into io_uring submission queue entries
 */

use crate::core::limits::CURRENT_POSITION;
use crate::core::types::{Fd, Handle};
use crate::syscalls::config::AddressingMode;
use crate::syscalls::types::SocketAddress;
use io_uring::{opcode, squeue, types};
use serde::{Deserialize, Serialize};
use std::ffi::CString;

/// Operation kinds the dispatcher knows how to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
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
    Write,
    Close,
}

impl OpKind {
    /// Get operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::OpenAt => "openat",
            OpKind::Connect => "connect",
            OpKind::Socket => "socket",
            OpKind::SymlinkAt => "symlinkat",
            OpKind::LinkAt => "linkat",
            OpKind::UnlinkAt => "unlinkat",
            OpKind::MkdirAt => "mkdirat",
            OpKind::RenameAt => "renameat",
            OpKind::Bind => "bind",
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::Close => "close",
        }
    }

    /// Whether the kernel accepts registered file indexes for this opcode
    pub fn supports_fixed_files(&self) -> bool {
        !matches!(
            self,
            OpKind::SymlinkAt
                | OpKind::LinkAt
                | OpKind::UnlinkAt
                | OpKind::MkdirAt
                | OpKind::RenameAt
                | OpKind::Bind
        )
    }

    /// io_uring opcode carrying this kind
    pub fn opcode(&self) -> u8 {
        match self {
            OpKind::OpenAt => opcode::OpenAt::CODE,
            OpKind::Connect => opcode::Connect::CODE,
            OpKind::Socket => opcode::Socket::CODE,
            OpKind::SymlinkAt => opcode::SymlinkAt::CODE,
            OpKind::LinkAt => opcode::LinkAt::CODE,
            OpKind::UnlinkAt => opcode::UnlinkAt::CODE,
            OpKind::MkdirAt => opcode::MkDirAt::CODE,
            OpKind::RenameAt => opcode::RenameAt::CODE,
            OpKind::Bind => opcode::Bind::CODE,
            OpKind::Read => opcode::Read::CODE,
            OpKind::Write => opcode::Write::CODE,
            OpKind::Close => opcode::Close::CODE,
        }
    }

    /// Whether the operation produces a new resource
    pub fn allocates(&self) -> bool {
        matches!(self, OpKind::OpenAt | OpKind::Socket)
    }
}

/// A single operation request
///
/// Owns everything the kernel dereferences so the engine can keep it alive
/// until the matching completion has been reaped.
#[derive(Debug)]
pub enum Operation {
    OpenAt {
        dirfd: Fd,
        path: CString,
        flags: i32,
        mode: u32,
    },
    Connect {
        target: Handle,
        addr: SocketAddress,
    },
    Socket {
        domain: i32,
        socket_type: i32,
        protocol: i32,
    },
    SymlinkAt {
        target: CString,
        newdirfd: Fd,
        linkpath: CString,
    },
    LinkAt {
        olddirfd: Fd,
        oldpath: CString,
        newdirfd: Fd,
        newpath: CString,
        flags: i32,
    },
    UnlinkAt {
        dirfd: Fd,
        path: CString,
        flags: i32,
    },
    MkdirAt {
        dirfd: Fd,
        path: CString,
        mode: u32,
    },
    RenameAt {
        olddirfd: Fd,
        oldpath: CString,
        newdirfd: Fd,
        newpath: CString,
        flags: u32,
    },
    Bind {
        fd: Fd,
        addr: SocketAddress,
    },
    Read {
        target: Handle,
        buf: Vec<u8>,
        offset: Option<u64>,
    },
    Write {
        target: Handle,
        buf: Vec<u8>,
        offset: Option<u64>,
    },
    Close {
        target: Handle,
    },
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::OpenAt { .. } => OpKind::OpenAt,
            Operation::Connect { .. } => OpKind::Connect,
            Operation::Socket { .. } => OpKind::Socket,
            Operation::SymlinkAt { .. } => OpKind::SymlinkAt,
            Operation::LinkAt { .. } => OpKind::LinkAt,
            Operation::UnlinkAt { .. } => OpKind::UnlinkAt,
            Operation::MkdirAt { .. } => OpKind::MkdirAt,
            Operation::RenameAt { .. } => OpKind::RenameAt,
            Operation::Bind { .. } => OpKind::Bind,
            Operation::Read { .. } => OpKind::Read,
            Operation::Write { .. } => OpKind::Write,
            Operation::Close { .. } => OpKind::Close,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// The existing resource this operation acts on, if any
    pub fn target(&self) -> Option<Handle> {
        match self {
            Operation::Connect { target, .. }
            | Operation::Read { target, .. }
            | Operation::Write { target, .. }
            | Operation::Close { target } => Some(*target),
            Operation::Bind { fd, .. } => Some(Handle::Fd(*fd)),
            _ => None,
        }
    }

    /// Whether encoding under `mode` touches the registered file table
    pub fn uses_file_table(&self, mode: AddressingMode) -> bool {
        let allocates_slot = mode == AddressingMode::Indexed && self.kind().allocates();
        let fixed_target = self.target().map_or(false, |t| t.is_fixed());
        allocates_slot || fixed_target
    }
}

/// Run `$build` with `$fd` bound to the io_uring target type matching `$target`
macro_rules! with_target {
    ($target:expr, |$fd:ident| $build:expr) => {
        match $target {
            Handle::Fd(raw) => {
                let $fd = types::Fd(raw);
                $build
            }
            Handle::Fixed(index) => {
                let $fd = types::Fixed(index);
                $build
            }
        }
    };
}

/// Encode an operation into a submission queue entry tagged with `user_data`
///
/// Raw pointers in the entry reference data owned by `op`; the caller keeps
/// `op` at a stable address until the completion is reaped.
pub(super) fn encode(op: &mut Operation, mode: AddressingMode, user_data: u64) -> squeue::Entry {
    let allocate = mode == AddressingMode::Indexed;

    let entry = match op {
        Operation::OpenAt {
            dirfd,
            path,
            flags,
            mode: file_mode,
        } => {
            let open = opcode::OpenAt::new(types::Fd(*dirfd), path.as_ptr())
                .flags(*flags)
                .mode(*file_mode);
            if allocate {
                open.file_index(Some(types::DestinationSlot::auto_target()))
                    .build()
            } else {
                open.build()
            }
        }
        Operation::Socket {
            domain,
            socket_type,
            protocol,
        } => {
            let socket = opcode::Socket::new(*domain, *socket_type, *protocol);
            if allocate {
                socket
                    .file_index(Some(types::DestinationSlot::auto_target()))
                    .build()
            } else {
                socket.build()
            }
        }
        Operation::Connect { target, addr } => with_target!(*target, |fd| {
            opcode::Connect::new(fd, addr.as_ptr(), addr.len()).build()
        }),
        Operation::Read {
            target,
            buf,
            offset,
        } => {
            let len = buf.len() as u32;
            let ptr = buf.as_mut_ptr();
            let offset = offset.unwrap_or(CURRENT_POSITION);
            with_target!(*target, |fd| {
                opcode::Read::new(fd, ptr, len).offset(offset).build()
            })
        }
        Operation::Write {
            target,
            buf,
            offset,
        } => {
            let len = buf.len() as u32;
            let ptr = buf.as_ptr();
            let offset = offset.unwrap_or(CURRENT_POSITION);
            with_target!(*target, |fd| {
                opcode::Write::new(fd, ptr, len).offset(offset).build()
            })
        }
        // A fixed target turns this into a direct close that frees the slot.
        Operation::Close { target } => with_target!(*target, |fd| opcode::Close::new(fd).build()),
        Operation::SymlinkAt {
            target,
            newdirfd,
            linkpath,
        } => opcode::SymlinkAt::new(types::Fd(*newdirfd), target.as_ptr(), linkpath.as_ptr())
            .build(),
        Operation::LinkAt {
            olddirfd,
            oldpath,
            newdirfd,
            newpath,
            flags,
        } => opcode::LinkAt::new(
            types::Fd(*olddirfd),
            oldpath.as_ptr(),
            types::Fd(*newdirfd),
            newpath.as_ptr(),
        )
        .flags(*flags)
        .build(),
        Operation::UnlinkAt { dirfd, path, flags } => {
            opcode::UnlinkAt::new(types::Fd(*dirfd), path.as_ptr())
                .flags(*flags)
                .build()
        }
        Operation::MkdirAt {
            dirfd,
            path,
            mode: dir_mode,
        } => opcode::MkDirAt::new(types::Fd(*dirfd), path.as_ptr())
            .mode(*dir_mode)
            .build(),
        Operation::RenameAt {
            olddirfd,
            oldpath,
            newdirfd,
            newpath,
            flags,
        } => opcode::RenameAt::new(
            types::Fd(*olddirfd),
            oldpath.as_ptr(),
            types::Fd(*newdirfd),
            newpath.as_ptr(),
        )
        .flags(*flags)
        .build(),
        Operation::Bind { fd, addr } => {
            opcode::Bind::new(types::Fd(*fd), addr.as_ptr(), addr.len()).build()
        }
    };

    entry.user_data(user_data)
}
