/*!
 * Dispatch Configuration
 *
 * Backend and addressing selection, chosen once per run.
 */

use crate::core::limits::{
    DEFAULT_FILE_TABLE_SIZE, DEFAULT_SQ_SIZE, MAX_FILE_TABLE_SIZE, MAX_SQ_SIZE,
};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Override for the submission queue depth
pub const ENV_QUEUE_DEPTH: &str = "IO_DISPATCH_QUEUE_DEPTH";

/// Override for the registered file table size
pub const ENV_FILE_TABLE_SIZE: &str = "IO_DISPATCH_FILE_TABLE_SIZE";

/// Execution path for every operation of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Blocking system calls
    Direct,
    /// One io_uring submission per operation
    #[default]
    Queued,
}

/// How operations name the resources they act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    /// Process descriptors
    #[default]
    Raw,
    /// Slots of the ring's registered file table
    Indexed,
}

impl Backend {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Backend::Direct => "direct",
            Backend::Queued => "queued",
        }
    }
}

impl AddressingMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AddressingMode::Raw => "raw",
            AddressingMode::Indexed => "indexed",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("indexed addressing requires the queued backend")]
    #[diagnostic(
        code(config::indexed_direct),
        help("Registered file indexes only exist inside an io_uring instance; drop --use-syscalls.")
    )]
    IndexedRequiresQueued,

    #[error("queue depth {0} is outside 1..={max}", max = MAX_SQ_SIZE)]
    #[diagnostic(code(config::queue_depth))]
    QueueDepth(u32),

    #[error("file table size {0} is outside 1..={max}", max = MAX_FILE_TABLE_SIZE)]
    #[diagnostic(code(config::file_table_size))]
    FileTableSize(u32),

    #[error("{var} must be an unsigned integer, got {value:?}")]
    #[diagnostic(code(config::env))]
    InvalidEnv { var: &'static str, value: String },
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Execution path (default: queued)
    pub backend: Backend,

    /// Resource addressing (default: raw)
    pub addressing: AddressingMode,

    /// Submission queue entries (default: 8)
    pub queue_depth: u32,

    /// Registered file table slots, used in indexed mode (default: 10)
    pub file_table_size: u32,
}

impl DispatchConfig {
    /// Queued backend with raw descriptors
    pub fn queued() -> Self {
        Self {
            backend: Backend::Queued,
            addressing: AddressingMode::Raw,
            queue_depth: DEFAULT_SQ_SIZE,
            file_table_size: DEFAULT_FILE_TABLE_SIZE,
        }
    }

    /// Blocking system calls
    pub fn direct() -> Self {
        Self {
            backend: Backend::Direct,
            ..Self::queued()
        }
    }

    /// Queued backend addressing the registered file table
    pub fn indexed() -> Self {
        Self {
            addressing: AddressingMode::Indexed,
            ..Self::queued()
        }
    }

    pub fn with_queue_depth(mut self, depth: u32) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_file_table_size(mut self, size: u32) -> Self {
        self.file_table_size = size;
        self
    }

    /// Apply `IO_DISPATCH_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let parse = |var: &'static str| -> Result<Option<u32>, ConfigError> {
            match lookup(var) {
                None => Ok(None),
                Some(value) => value
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidEnv { var, value }),
            }
        };

        if let Some(depth) = parse(ENV_QUEUE_DEPTH)? {
            self.queue_depth = depth;
        }
        if let Some(size) = parse(ENV_FILE_TABLE_SIZE)? {
            self.file_table_size = size;
        }
        Ok(self)
    }

    /// Reject combinations the dispatcher cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == Backend::Direct && self.addressing == AddressingMode::Indexed {
            return Err(ConfigError::IndexedRequiresQueued);
        }
        if self.queue_depth == 0 || self.queue_depth > MAX_SQ_SIZE {
            return Err(ConfigError::QueueDepth(self.queue_depth));
        }
        if self.file_table_size == 0 || self.file_table_size > MAX_FILE_TABLE_SIZE {
            return Err(ConfigError::FileTableSize(self.file_table_size));
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::queued()
    }
}
