/*!
 * Socket Scenarios
 */

use super::echo::EchoListener;
use super::{remove_stale, ScenarioContext, ScenarioError, ScenarioResult, StepExt};
use crate::core::limits::CONNECT_PAYLOAD;
use crate::core::types::Handle;
use crate::syscalls::{Dispatcher, SocketAddress, SyscallError};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::{error, info};

pub(super) fn socket(dispatcher: &mut Dispatcher) -> ScenarioResult {
    let handle = dispatcher
        .socket(libc::AF_INET, libc::SOCK_STREAM, 0)
        .step("socket")?;
    info!(handle = %handle, "socket created");
    dispatcher.close(handle).step("close")
}

pub(super) fn connect(dispatcher: &mut Dispatcher) -> ScenarioResult {
    let listener = EchoListener::spawn().map_err(ScenarioError::Listener)?;
    let addr = SocketAddress::inet(listener.addr());

    let handle = dispatcher
        .socket(libc::AF_INET, libc::SOCK_STREAM, 0)
        .step("socket")?;

    let sent = send(dispatcher, handle, &addr);
    let closed = dispatcher.close(handle).step("close");
    sent?;
    closed?;

    let captured = listener.finish().map_err(ScenarioError::Listener)?;
    info!(
        peer = %String::from_utf8_lossy(&captured).trim_end(),
        bytes = captured.len(),
        "listener received"
    );

    if captured != CONNECT_PAYLOAD {
        return Err(ScenarioError::Unexpected {
            step: "echo",
            detail: format!(
                "listener captured {} bytes, expected {}",
                captured.len(),
                CONNECT_PAYLOAD.len()
            ),
        });
    }
    Ok(())
}

fn send(dispatcher: &mut Dispatcher, handle: Handle, addr: &SocketAddress) -> ScenarioResult {
    dispatcher.connect(handle, addr).step("connect")?;
    let written = dispatcher
        .write(handle, CONNECT_PAYLOAD, None)
        .step("write")?;
    info!(bytes = written, "payload written");
    Ok(())
}

/// Bind one stream socket per address family
///
/// Every family is attempted; the first failure is reported.
pub(super) fn bind(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let unix_path = ctx.path("test_socket.sock");
    remove_stale(&unix_path);

    let unix = SocketAddress::unix(&unix_path).map_err(|errno| ScenarioError::Step {
        step: "unix address",
        source: SyscallError::os("bind", errno),
    })?;
    let targets = [
        (
            "inet",
            libc::AF_INET,
            SocketAddress::inet(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))),
        ),
        (
            "inet6",
            libc::AF_INET6,
            SocketAddress::inet(SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))),
        ),
        ("unix", libc::AF_UNIX, unix),
    ];

    let mut first_failure = None;
    for (family, domain, addr) in targets {
        match bind_one(dispatcher, domain, &addr) {
            Ok(()) => info!(family = family, "socket bound"),
            Err(e) => {
                error!(family = family, error = %e, "bind failed");
                first_failure.get_or_insert(e);
            }
        }
    }

    remove_stale(&unix_path);
    first_failure.map_or(Ok(()), Err)
}

fn bind_one(dispatcher: &mut Dispatcher, domain: i32, addr: &SocketAddress) -> ScenarioResult {
    let handle = dispatcher
        .socket(domain, libc::SOCK_STREAM, 0)
        .step("socket")?;
    let bound = dispatcher.bind(handle, addr).step("bind");
    let closed = dispatcher.close(handle).step("close");
    bound?;
    closed
}
