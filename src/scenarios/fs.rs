/*!
 * Filesystem Scenarios
 */

use super::{remove_stale, ScenarioContext, ScenarioError, ScenarioResult, StepExt};
use crate::core::limits::SCENARIO_READ_SIZE;
use crate::core::types::{Handle, CWD};
use crate::syscalls::Dispatcher;
use nix::errno::Errno;
use std::path::Path;
use tracing::{info, warn};

/// Create an empty file through the dispatcher
fn create(dispatcher: &mut Dispatcher, path: &Path) -> ScenarioResult {
    let handle = dispatcher
        .open(CWD, path, libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC, 0o644)
        .step("open")?;
    dispatcher.close(handle).step("close")
}

/// Close `handle` whatever `result` says, reporting the first failure
fn close_after<T>(
    dispatcher: &mut Dispatcher,
    handle: Handle,
    result: ScenarioResult<T>,
) -> ScenarioResult<T> {
    let closed = dispatcher.close(handle).step("close");
    let value = result?;
    closed?;
    Ok(value)
}

pub(super) fn openat(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let handle = dispatcher
        .open(CWD, &ctx.source, libc::O_RDONLY, 0)
        .step("open")?;
    info!(path = %ctx.source.display(), handle = %handle, "opened");
    dispatcher.close(handle).step("close")
}

pub(super) fn read(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let handle = dispatcher
        .open(CWD, &ctx.source, libc::O_RDONLY, 0)
        .step("open")?;

    let mut buf = vec![0u8; SCENARIO_READ_SIZE];
    let result = dispatcher.read(handle, &mut buf, Some(0)).step("read");
    let count = close_after(dispatcher, handle, result)?;

    info!(path = %ctx.source.display(), bytes = count, "read");
    Ok(())
}

pub(super) fn symlinkat(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let link = ctx.path("symlink_to_passwd");
    remove_stale(&link);

    dispatcher
        .symlink(&ctx.source, CWD, &link)
        .step("symlink")?;
    info!(link = %link.display(), target = %ctx.source.display(), "symlink created");
    dispatcher.unlink(CWD, &link, 0).step("unlink")
}

pub(super) fn linkat(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let link = ctx.path("link_to_passwd");
    remove_stale(&link);

    dispatcher
        .link(CWD, &ctx.source, CWD, &link, libc::AT_SYMLINK_FOLLOW)
        .step("link")?;
    info!(link = %link.display(), target = %ctx.source.display(), "hard link created");
    dispatcher.unlink(CWD, &link, 0).step("unlink")
}

pub(super) fn unlinkat(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let path = ctx.path("unlink_target");
    create(dispatcher, &path)?;
    dispatcher.unlink(CWD, &path, 0).step("unlink")?;

    match dispatcher.unlink(CWD, &path, 0) {
        Err(e) if e.errno() == Some(Errno::ENOENT) => {
            info!(path = %path.display(), "second unlink failed with ENOENT");
            Ok(())
        }
        Err(source) => Err(ScenarioError::Step {
            step: "second unlink",
            source,
        }),
        Ok(()) => Err(ScenarioError::Unexpected {
            step: "second unlink",
            detail: "removed path unlinked again".to_string(),
        }),
    }
}

pub(super) fn mkdirat(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let dir = ctx.path("tempdir");
    if let Err(e) = std::fs::remove_dir(&dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %dir.display(), error = %e, "could not remove stale directory");
        }
    }

    dispatcher.mkdir(CWD, &dir, 0o777).step("mkdir")?;
    info!(path = %dir.display(), "directory created");
    dispatcher
        .unlink(CWD, &dir, libc::AT_REMOVEDIR)
        .step("rmdir")
}

pub(super) fn renameat(dispatcher: &mut Dispatcher, ctx: &ScenarioContext) -> ScenarioResult {
    let old = ctx.path("oldfilename");
    let new = ctx.path("newfilename");
    remove_stale(&new);
    create(dispatcher, &old)?;

    if let Err(source) = dispatcher.rename(CWD, &old, CWD, &new, 0) {
        if let Err(e) = dispatcher.unlink(CWD, &old, 0) {
            warn!(path = %old.display(), error = %e, "cleanup after failed rename");
        }
        return Err(ScenarioError::Step {
            step: "rename",
            source,
        });
    }

    info!(from = %old.display(), to = %new.display(), "renamed");
    dispatcher.unlink(CWD, &new, 0).step("unlink")
}
