//! Error types for backend operations

use std::fmt;

use crate::element::ElementType;
use crate::backend::MemoryClass;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Broad classification of a [`BackendError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested configuration cannot be satisfied
    Configuration,
    /// Memory could not be obtained
    ResourceExhaustion,
    /// The caller broke the allocate/copy/submit contract
    ContractViolation,
    /// The device or its queue failed
    DeviceFault,
    /// Raised by kernel code
    Kernel,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::ResourceExhaustion => "resource exhaustion",
            ErrorKind::ContractViolation => "contract violation",
            ErrorKind::DeviceFault => "device fault",
            ErrorKind::Kernel => "kernel",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during backend execution
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No extension provides this exact width for the element type
    #[error("unsupported vector length: {width_bits} bits for {element}")]
    UnsupportedVectorLength { element: ElementType, width_bits: usize },

    /// Two extensions claim the same width for one element type
    #[error("extensions '{first}' and '{second}' both provide {width_bits}-bit vectors for {element}")]
    DuplicateExtensionWidth {
        element: ElementType,
        width_bits: usize,
        first: String,
        second: String,
    },

    /// Extension entry is malformed
    #[error("invalid extension '{name}': {reason}")]
    InvalidExtension { name: String, reason: String },

    /// Configuration could not be read or parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Allocation could not be satisfied
    #[error("allocation failed: {requested} bytes ({reason})")]
    AllocationFailed { requested: usize, reason: String },

    /// Alignment is not a power of two
    #[error("invalid alignment: {0} (must be a power of two)")]
    InvalidAlignment(usize),

    /// Handle is not (or no longer) live
    #[error("invalid buffer handle: {0}")]
    InvalidHandle(u64),

    /// Handle belongs to another executor or manager
    #[error("handle {handle} belongs to owner {owner}, not {expected}")]
    ForeignHandle { handle: u64, owner: u64, expected: u64 },

    /// Handle class does not fit the requested operation
    #[error("wrong memory class for handle {handle}: expected {expected}, got {actual}")]
    WrongMemoryClass {
        handle: u64,
        expected: MemoryClass,
        actual: MemoryClass,
    },

    /// Element count exceeds a buffer
    #[error("buffer access out of bounds: {requested} elements > buffer length {len}")]
    BufferOutOfBounds { requested: usize, len: usize },

    /// Output buffer is also passed as an input
    #[error("output buffer {0} is also an input")]
    AliasedBuffers(u64),

    /// Type mismatch
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Executor was torn down
    #[error("executor has been torn down")]
    ExecutorTornDown,

    /// Executor observed an earlier device fault
    #[error("executor is faulted: {0}")]
    ExecutorFaulted(String),

    /// Device lacks a required allocation capability
    #[error("device '{device}' is missing capability: {capability}")]
    MissingCapability { device: String, capability: String },

    /// Requested device cannot be opened
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Device reported a fault while running queued work
    #[error("device fault in '{label}': {message}")]
    DeviceFault { label: String, message: String },

    /// Command queue went away
    #[error("device lost: {0}")]
    DeviceLost(String),

    /// Kernel-raised error
    #[error("kernel '{kernel}' failed: {message}")]
    Kernel { kernel: String, message: String },
}

impl BackendError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedVectorLength { .. }
            | Self::DuplicateExtensionWidth { .. }
            | Self::InvalidExtension { .. }
            | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::AllocationFailed { .. } => ErrorKind::ResourceExhaustion,
            Self::InvalidAlignment(_)
            | Self::InvalidHandle(_)
            | Self::ForeignHandle { .. }
            | Self::WrongMemoryClass { .. }
            | Self::BufferOutOfBounds { .. }
            | Self::AliasedBuffers(_)
            | Self::TypeMismatch { .. }
            | Self::ExecutorTornDown
            | Self::ExecutorFaulted(_)
            | Self::MissingCapability { .. }
            | Self::DeviceUnavailable(_) => ErrorKind::ContractViolation,
            Self::DeviceFault { .. } | Self::DeviceLost(_) => ErrorKind::DeviceFault,
            Self::Kernel { .. } => ErrorKind::Kernel,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an allocation failure
    pub fn allocation_failed(requested: usize, reason: impl Into<String>) -> Self {
        Self::AllocationFailed {
            requested,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a kernel error
    pub fn kernel(kernel: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Kernel {
            kernel: kernel.into(),
            message: message.to_string(),
        }
    }

    /// Create a device fault
    pub fn device_fault(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceFault {
            label: label.into(),
            message: message.into(),
        }
    }
}

/// Fail-fast escape hatch for applications that treat any backend error as
/// fatal.
pub trait FailFast<T> {
    /// Return the value, or log the error, print it to stderr and abort the
    /// process.
    fn or_abort(self) -> T;
}

impl<T> FailFast<T> for Result<T> {
    fn or_abort(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(kind = %err.kind(), error = %err, "fatal_backend_error");
                eprintln!("vectorhal: fatal {} error: {err}", err.kind());
                std::process::abort();
            }
        }
    }
}
