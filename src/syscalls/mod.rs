/*!
 * Syscalls Module
 * Dual-backend dispatch of file and socket operations
 */

pub mod config;
pub mod direct;
mod dispatcher;
pub mod iouring;
pub mod types;

// Re-export public API
pub use config::{AddressingMode, Backend, ConfigError, DispatchConfig};
pub use dispatcher::{Advisory, Dispatcher};
pub use iouring::{CompletionEngine, IoUringError, OpKind, Operation};
pub use types::{SocketAddress, SyscallError, SyscallResult};
