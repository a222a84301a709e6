/*!
 * Syscall Types Module
 * Errors, results and socket addresses shared by both backends
 */

mod address;
mod errors;
mod results;

pub use address::SocketAddress;
pub use errors::SyscallError;
pub use results::{check_status, SyscallResult};
