//! Error kinds raised by the value layer.
//!
//! These are not exceptions in the host sense: they are the fixed vocabulary
//! of failures the SV/AV/HV/CV/GV operations can produce. The runtime crate
//! wires them into `die`/`eval` (see `quill_runtime::runtime`); the core
//! crate only needs to construct and describe them.

use std::fmt;

/// A failure raised by a core value operation.
#[derive(Debug, Clone, PartialEq)]
pub enum QuillError {
    /// Mutation attempted on a read-only SV.
    ReadOnly,
    /// Division where the divisor coerced to zero.
    DivisionByZero,
    /// Bit-shift with a negative count.
    NegativeShift,
    /// Dereference attempted on a non-reference SV.
    NotAReference,
    /// `bless` attempted on a non-reference SV.
    NotBlessable,
    /// A mutating array operation was attempted on a non-array SV.
    NotAnArray,
    /// A mutating hash operation was attempted on a non-hash SV.
    NotAHash,
    /// Method resolution found no matching method.
    UnknownMethod(String),
    /// A user-level `die`.
    UserDie(String),
    /// A host panic caught and converted at an eval boundary.
    HostPanic(String),
}

impl fmt::Display for QuillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuillError::ReadOnly => write!(f, "Modification of a read-only value attempted"),
            QuillError::DivisionByZero => write!(f, "Illegal division by zero"),
            QuillError::NegativeShift => write!(f, "Negative shift count"),
            QuillError::NotAReference => write!(f, "Not a reference"),
            QuillError::NotBlessable => write!(f, "Can't bless non-reference value"),
            QuillError::NotAnArray => write!(f, "Not an ARRAY reference"),
            QuillError::NotAHash => write!(f, "Not a HASH reference"),
            QuillError::UnknownMethod(name) => write!(f, "Can't locate object method \"{name}\""),
            QuillError::UserDie(msg) => write!(f, "{msg}"),
            QuillError::HostPanic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for QuillError {}

impl QuillError {
    /// The message that would be stored in `$@` if this error unwinds to an eval boundary.
    pub fn die_message(&self) -> String {
        match self {
            QuillError::UserDie(msg) | QuillError::HostPanic(msg) => msg.clone(),
            other => format!("{other}\n"),
        }
    }
}

pub type QuillResult<T> = Result<T, QuillError>;
