/*!
 * Direct Backend
 * Blocking system calls reporting in the kernel's signed-status convention
 */

use crate::core::types::{Fd, RawStatus};
use crate::syscalls::iouring::Operation;
use crate::syscalls::types::SocketAddress;
use nix::errno::Errno;
use std::ffi::CStr;

/// Fold a libc return value into `-errno` / value form
#[inline]
fn status(ret: libc::c_int) -> RawStatus {
    if ret < 0 {
        -(Errno::last() as RawStatus)
    } else {
        ret
    }
}

#[inline]
fn io_status(ret: libc::ssize_t) -> RawStatus {
    if ret < 0 {
        -(Errno::last() as RawStatus)
    } else {
        // Callers bound transfers by MAX_IO_LEN, which fits an i32.
        ret as RawStatus
    }
}

pub fn openat(dirfd: Fd, path: &CStr, flags: i32, mode: u32) -> RawStatus {
    // SAFETY: `path` is NUL-terminated and outlives the call.
    status(unsafe { libc::openat(dirfd, path.as_ptr(), flags, mode as libc::c_uint) })
}

pub fn socket(domain: i32, socket_type: i32, protocol: i32) -> RawStatus {
    // SAFETY: plain integer arguments.
    status(unsafe { libc::socket(domain, socket_type, protocol) })
}

pub fn connect(fd: Fd, addr: &SocketAddress) -> RawStatus {
    // SAFETY: `addr` points at `addr.len()` initialized bytes.
    status(unsafe { libc::connect(fd, addr.as_ptr(), addr.len()) })
}

pub fn bind(fd: Fd, addr: &SocketAddress) -> RawStatus {
    // SAFETY: `addr` points at `addr.len()` initialized bytes.
    status(unsafe { libc::bind(fd, addr.as_ptr(), addr.len()) })
}

/// `pread` at `offset`, or `read` at the file position when `offset` is `None`
pub fn read(fd: Fd, buf: &mut [u8], offset: Option<u64>) -> RawStatus {
    let ptr = buf.as_mut_ptr() as *mut libc::c_void;
    // SAFETY: `buf` is valid for `buf.len()` writable bytes.
    io_status(unsafe {
        match offset {
            Some(offset) => libc::pread(fd, ptr, buf.len(), offset as libc::off_t),
            None => libc::read(fd, ptr, buf.len()),
        }
    })
}

/// `pwrite` at `offset`, or `write` at the file position when `offset` is `None`
pub fn write(fd: Fd, buf: &[u8], offset: Option<u64>) -> RawStatus {
    let ptr = buf.as_ptr() as *const libc::c_void;
    // SAFETY: `buf` is valid for `buf.len()` readable bytes.
    io_status(unsafe {
        match offset {
            Some(offset) => libc::pwrite(fd, ptr, buf.len(), offset as libc::off_t),
            None => libc::write(fd, ptr, buf.len()),
        }
    })
}

pub fn close(fd: Fd) -> RawStatus {
    // SAFETY: closing a descriptor number has no memory-safety requirements.
    status(unsafe { libc::close(fd) })
}

pub fn symlinkat(target: &CStr, newdirfd: Fd, linkpath: &CStr) -> RawStatus {
    // SAFETY: both paths are NUL-terminated.
    status(unsafe { libc::symlinkat(target.as_ptr(), newdirfd, linkpath.as_ptr()) })
}

pub fn linkat(olddirfd: Fd, oldpath: &CStr, newdirfd: Fd, newpath: &CStr, flags: i32) -> RawStatus {
    // SAFETY: both paths are NUL-terminated.
    status(unsafe { libc::linkat(olddirfd, oldpath.as_ptr(), newdirfd, newpath.as_ptr(), flags) })
}

pub fn unlinkat(dirfd: Fd, path: &CStr, flags: i32) -> RawStatus {
    // SAFETY: `path` is NUL-terminated.
    status(unsafe { libc::unlinkat(dirfd, path.as_ptr(), flags) })
}

pub fn mkdirat(dirfd: Fd, path: &CStr, mode: u32) -> RawStatus {
    // SAFETY: `path` is NUL-terminated.
    status(unsafe { libc::mkdirat(dirfd, path.as_ptr(), mode as libc::mode_t) })
}

/// Run an owned request synchronously
///
/// Registered file indexes have no meaning outside a ring; a `Fixed`
/// target fails with `EBADF` without reaching the kernel.
pub fn execute(op: &mut Operation) -> RawStatus {
    if op.target().is_some_and(|target| target.is_fixed()) {
        return -libc::EBADF;
    }

    match op {
        Operation::OpenAt {
            dirfd,
            path,
            flags,
            mode,
        } => openat(*dirfd, path, *flags, *mode),
        Operation::Socket {
            domain,
            socket_type,
            protocol,
        } => socket(*domain, *socket_type, *protocol),
        Operation::Connect { target, addr } => connect(target.as_raw_fd(), addr),
        Operation::Bind { fd, addr } => bind(*fd, addr),
        Operation::Read {
            target,
            buf,
            offset,
        } => read(target.as_raw_fd(), buf, *offset),
        Operation::Write {
            target,
            buf,
            offset,
        } => write(target.as_raw_fd(), buf, *offset),
        Operation::Close { target } => close(target.as_raw_fd()),
        Operation::SymlinkAt {
            target,
            newdirfd,
            linkpath,
        } => symlinkat(target, *newdirfd, linkpath),
        Operation::LinkAt {
            olddirfd,
            oldpath,
            newdirfd,
            newpath,
            flags,
        } => linkat(*olddirfd, oldpath, *newdirfd, newpath, *flags),
        Operation::UnlinkAt { dirfd, path, flags } => unlinkat(*dirfd, path, *flags),
        Operation::MkdirAt { dirfd, path, mode } => mkdirat(*dirfd, path, *mode),
        Operation::RenameAt {
            olddirfd,
            oldpath,
            newdirfd,
            newpath,
            flags,
        } => renameat(*olddirfd, oldpath, *newdirfd, newpath, *flags),
    }
}

/// `renameat`, or the `renameat2` syscall when flags are given
pub fn renameat(olddirfd: Fd, oldpath: &CStr, newdirfd: Fd, newpath: &CStr, flags: u32) -> RawStatus {
    if flags == 0 {
        // SAFETY: both paths are NUL-terminated.
        return status(unsafe {
            libc::renameat(olddirfd, oldpath.as_ptr(), newdirfd, newpath.as_ptr())
        });
    }

    // SAFETY: argument order and types follow renameat2(2).
    let ret = unsafe {
        libc::syscall(
            libc::SYS_renameat2,
            olddirfd,
            oldpath.as_ptr(),
            newdirfd,
            newpath.as_ptr(),
            flags,
        )
    };
    status(ret as libc::c_int)
}
