/*!
 * Indexed Addressing Tests
 * Registered file slots through the queued backend
 */

use super::common::{indexed, outcome, supports};
use io_dispatch::syscalls::OpKind;
use io_dispatch::{Advisory, Handle, SocketAddress, CWD};
use nix::errno::Errno;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn test_open_read_close_round_trip() {
    let Some(mut d) = indexed() else { return };
    let dir = tempdir().unwrap();
    let path = dir.path().join("data");
    std::fs::write(&path, b"registered slots").unwrap();

    let handle = d.open(CWD, &path, libc::O_RDONLY, 0).unwrap();
    let Handle::Fixed(index) = handle else {
        panic!("indexed open returned {handle}");
    };
    assert!(index < d.config().file_table_size);

    let mut buf = [0u8; 64];
    let n = d.read(handle, &mut buf, Some(0)).unwrap();
    assert_eq!(&buf[..n], b"registered slots");

    d.close(handle).unwrap();
    // The slot is empty now.
    let err = d.read(handle, &mut buf, Some(0)).unwrap_err();
    assert_eq!(err.errno(), Some(Errno::EBADF));
    assert!(d.take_advisories().is_empty());
}

#[test]
fn test_slots_are_reused_after_close() {
    let Some(mut d) = indexed() else { return };
    let capacity = d.config().file_table_size;

    // Twice the table size only fits if closes release their slots.
    for _ in 0..capacity * 2 {
        let handle = d.open(CWD, "/etc/passwd", libc::O_RDONLY, 0).unwrap();
        d.close(handle).unwrap();
    }

    let stats = d.stats().unwrap();
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.discarded, 0);
}

#[test]
fn test_table_full() {
    let Some(mut d) = indexed() else { return };
    let capacity = d.config().file_table_size;

    let mut open = Vec::new();
    for _ in 0..capacity {
        open.push(d.open(CWD, "/etc/passwd", libc::O_RDONLY, 0).unwrap());
    }
    let err = d.open(CWD, "/etc/passwd", libc::O_RDONLY, 0).unwrap_err();
    assert_eq!(err.errno(), Some(Errno::ENFILE));
    assert!(!err.is_dispatch_fault());

    for handle in open {
        d.close(handle).unwrap();
    }
}

#[test]
fn test_rename_runs_with_advisory() {
    let Some(mut d) = indexed() else { return };
    let dir = tempdir().unwrap();
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    std::fs::write(&old, b"x").unwrap();

    d.rename(CWD, &old, CWD, &new, 0).unwrap();
    assert!(!old.exists());
    assert!(new.exists());
    assert_eq!(
        d.take_advisories(),
        vec![Advisory {
            op: OpKind::RenameAt
        }]
    );
    assert!(d.take_advisories().is_empty());
}

#[test]
fn test_path_operations_raise_advisories() {
    let Some(mut d) = indexed() else { return };
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    let link = dir.path().join("link");

    d.mkdir(CWD, &sub, 0o755).unwrap();
    d.symlink(&sub, CWD, &link).unwrap();
    d.unlink(CWD, &link, 0).unwrap();
    d.unlink(CWD, &sub, libc::AT_REMOVEDIR).unwrap();

    let kinds: Vec<OpKind> = d.take_advisories().into_iter().map(|a| a.op).collect();
    assert_eq!(
        kinds,
        vec![
            OpKind::MkdirAt,
            OpKind::SymlinkAt,
            OpKind::UnlinkAt,
            OpKind::UnlinkAt
        ]
    );
}

#[test]
fn test_socket_connect_write_through_slots() {
    let Some(mut d) = indexed() else { return };
    if !supports(&d, &[OpKind::Socket, OpKind::Connect, OpKind::Write]) {
        return;
    }

    let listener = io_dispatch::scenarios::EchoListener::spawn().unwrap();
    let socket = d.socket(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
    assert!(socket.is_fixed());

    d.connect(socket, &SocketAddress::inet(listener.addr()))
        .unwrap();
    assert_eq!(d.write(socket, b"fixed", None).unwrap(), 5);
    d.close(socket).unwrap();

    assert_eq!(listener.finish().unwrap(), b"fixed");
}

#[test]
fn test_bind_raises_advisory() {
    let Some(mut d) = indexed() else { return };
    if !supports(&d, &[OpKind::Socket]) {
        return;
    }
    let dir = tempdir().unwrap();

    let socket = d.socket(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();
    let addr = SocketAddress::unix(dir.path().join("sock")).unwrap();
    // The slot number is not a descriptor; whether bind succeeds depends on
    // what that number happens to name in this process. It must still reach
    // the kernel rather than fault in the ring.
    let bound = outcome(d.bind(socket, &addr));
    assert!(
        matches!(
            bound,
            Ok(())
                | Err(Some(
                    Errno::ENOTSOCK | Errno::EBADF | Errno::EINVAL | Errno::EAFNOSUPPORT
                ))
        ),
        "{bound:?}"
    );
    d.close(socket).unwrap();

    assert_eq!(d.take_advisories(), vec![Advisory { op: OpKind::Bind }]);
}
