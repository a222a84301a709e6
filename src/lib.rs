/*!
 * io-dispatch Library
 * File and socket operations dispatched through blocking system calls or io_uring
 */

pub mod core;
pub mod monitoring;
pub mod scenarios;
pub mod syscalls;

// Re-exports
pub use crate::core::errors::SetupError;
pub use crate::core::types::{Fd, FileIndex, Handle, RawStatus, CWD};
pub use monitoring::init_tracing;
pub use scenarios::{RunReport, Scenario, ScenarioContext, ScenarioError};
pub use syscalls::{
    AddressingMode, Advisory, Backend, CompletionEngine, ConfigError, DispatchConfig, Dispatcher,
    IoUringError, SocketAddress, SyscallError, SyscallResult,
};
