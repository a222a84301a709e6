/*!
 * Backend Equivalence Tests
 * The same request succeeds or fails the same way on both backends
 */

use super::common::{direct, outcome, queued, supports, Outcome};
use io_dispatch::syscalls::OpKind;
use io_dispatch::{Dispatcher, SocketAddress, CWD};
use nix::errno::Errno;
use pretty_assertions::assert_eq;
use std::net::{Ipv4Addr, TcpListener};
use std::path::Path;
use tempfile::tempdir;

struct Case {
    name: &'static str,
    kinds: &'static [OpKind],
    run: fn(&mut Dispatcher, &Path) -> Outcome,
}

fn open_existing(d: &mut Dispatcher, dir: &Path) -> Outcome {
    let path = dir.join("existing");
    std::fs::write(&path, b"contents").unwrap();
    let handle = d.open(CWD, &path, libc::O_RDONLY, 0);
    if let Ok(handle) = handle {
        d.close(handle).unwrap();
    }
    outcome(handle)
}

fn open_missing(d: &mut Dispatcher, dir: &Path) -> Outcome {
    outcome(d.open(CWD, dir.join("missing"), libc::O_RDONLY, 0))
}

fn read_file(d: &mut Dispatcher, dir: &Path) -> Outcome {
    let path = dir.join("data");
    std::fs::write(&path, b"0123456789").unwrap();
    let handle = d.open(CWD, &path, libc::O_RDONLY, 0).unwrap();

    let mut buf = [0u8; 64];
    let read = d.read(handle, &mut buf, Some(2));
    d.close(handle).unwrap();
    assert_eq!(read.as_ref().ok(), Some(&8));
    assert_eq!(&buf[..8], b"23456789");
    outcome(read)
}

fn write_read_only(d: &mut Dispatcher, dir: &Path) -> Outcome {
    let path = dir.join("ro");
    std::fs::write(&path, b"").unwrap();
    let handle = d.open(CWD, &path, libc::O_RDONLY, 0).unwrap();
    let written = d.write(handle, b"nope", None);
    d.close(handle).unwrap();
    outcome(written)
}

fn write_appends_at_position(d: &mut Dispatcher, dir: &Path) -> Outcome {
    let path = dir.join("log");
    let handle = d
        .open(CWD, &path, libc::O_CREAT | libc::O_WRONLY, 0o600)
        .unwrap();
    d.write(handle, b"ab", None).unwrap();
    let written = d.write(handle, b"cd", None);
    d.close(handle).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"abcd");
    outcome(written)
}

fn close_bad_fd(d: &mut Dispatcher, _: &Path) -> Outcome {
    outcome(d.close(io_dispatch::Handle::Fd(-1)))
}

fn socket_inet(d: &mut Dispatcher, _: &Path) -> Outcome {
    let handle = d.socket(libc::AF_INET, libc::SOCK_STREAM, 0);
    if let Ok(handle) = handle {
        d.close(handle).unwrap();
    }
    outcome(handle)
}

fn connect_refused(d: &mut Dispatcher, _: &Path) -> Outcome {
    let addr = {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.local_addr().unwrap()
    };
    let handle = d.socket(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
    let connected = d.connect(handle, &SocketAddress::inet(addr));
    d.close(handle).unwrap();
    outcome(connected)
}

fn bind_unix(d: &mut Dispatcher, dir: &Path) -> Outcome {
    let addr = SocketAddress::unix(dir.join("sock")).unwrap();
    let handle = d.socket(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();
    let bound = d.bind(handle, &addr);
    d.close(handle).unwrap();
    outcome(bound)
}

fn symlink_twice(d: &mut Dispatcher, dir: &Path) -> Outcome {
    let link = dir.join("link");
    d.symlink("/etc/passwd", CWD, &link).unwrap();
    outcome(d.symlink("/etc/passwd", CWD, &link))
}

fn link_missing(d: &mut Dispatcher, dir: &Path) -> Outcome {
    outcome(d.link(CWD, dir.join("missing"), CWD, dir.join("new"), 0))
}

fn unlink_missing(d: &mut Dispatcher, dir: &Path) -> Outcome {
    outcome(d.unlink(CWD, dir.join("missing"), 0))
}

fn mkdir_twice(d: &mut Dispatcher, dir: &Path) -> Outcome {
    let sub = dir.join("sub");
    d.mkdir(CWD, &sub, 0o755).unwrap();
    outcome(d.mkdir(CWD, &sub, 0o755))
}

fn rename_missing(d: &mut Dispatcher, dir: &Path) -> Outcome {
    outcome(d.rename(CWD, dir.join("missing"), CWD, dir.join("new"), 0))
}

const CASES: &[Case] = &[
    Case { name: "open existing", kinds: &[OpKind::OpenAt, OpKind::Close], run: open_existing },
    Case { name: "open missing", kinds: &[OpKind::OpenAt], run: open_missing },
    Case { name: "read", kinds: &[OpKind::OpenAt, OpKind::Read, OpKind::Close], run: read_file },
    Case { name: "write read-only", kinds: &[OpKind::OpenAt, OpKind::Write, OpKind::Close], run: write_read_only },
    Case { name: "write at position", kinds: &[OpKind::OpenAt, OpKind::Write, OpKind::Close], run: write_appends_at_position },
    Case { name: "close bad fd", kinds: &[OpKind::Close], run: close_bad_fd },
    Case { name: "socket", kinds: &[OpKind::Socket, OpKind::Close], run: socket_inet },
    Case { name: "connect refused", kinds: &[OpKind::Socket, OpKind::Connect, OpKind::Close], run: connect_refused },
    Case { name: "bind unix", kinds: &[OpKind::Socket, OpKind::Bind, OpKind::Close], run: bind_unix },
    Case { name: "symlink twice", kinds: &[OpKind::SymlinkAt], run: symlink_twice },
    Case { name: "link missing", kinds: &[OpKind::LinkAt], run: link_missing },
    Case { name: "unlink missing", kinds: &[OpKind::UnlinkAt], run: unlink_missing },
    Case { name: "mkdir twice", kinds: &[OpKind::MkdirAt], run: mkdir_twice },
    Case { name: "rename missing", kinds: &[OpKind::RenameAt], run: rename_missing },
];

#[test]
fn test_direct_and_queued_agree() {
    let Some(mut queued) = queued() else { return };
    let mut direct = direct();

    for case in CASES {
        if !supports(&queued, case.kinds) {
            eprintln!("skipping {}: opcode not supported by this kernel", case.name);
            continue;
        }

        let direct_dir = tempdir().unwrap();
        let queued_dir = tempdir().unwrap();
        let expected = (case.run)(&mut direct, direct_dir.path());
        let actual = (case.run)(&mut queued, queued_dir.path());
        assert_eq!((case.name, actual), (case.name, expected));
    }
}

#[test]
fn test_expected_errnos() {
    let mut direct = direct();
    let dir = tempdir().unwrap();

    assert_eq!(open_missing(&mut direct, dir.path()), Err(Some(Errno::ENOENT)));
    assert_eq!(close_bad_fd(&mut direct, dir.path()), Err(Some(Errno::EBADF)));
    assert_eq!(write_read_only(&mut direct, dir.path()), Err(Some(Errno::EBADF)));
    assert_eq!(symlink_twice(&mut direct, dir.path()), Err(Some(Errno::EEXIST)));
    assert_eq!(mkdir_twice(&mut direct, dir.path()), Err(Some(Errno::EEXIST)));
    assert_eq!(rename_missing(&mut direct, dir.path()), Err(Some(Errno::ENOENT)));
    assert_eq!(connect_refused(&mut direct, dir.path()), Err(Some(Errno::ECONNREFUSED)));
}

#[test]
fn test_repeated_unlink_fails_on_both_backends() {
    let mut dispatchers = vec![direct()];
    dispatchers.extend(queued());

    for mut d in dispatchers {
        let dir = tempdir().unwrap();
        let path = dir.path().join("victim");
        std::fs::write(&path, b"x").unwrap();

        d.unlink(CWD, &path, 0).unwrap();
        let err = d.unlink(CWD, &path, 0).unwrap_err();
        assert_eq!(err.raw_status(), Some(-libc::ENOENT));
        assert!(!err.is_dispatch_fault());
    }
}
