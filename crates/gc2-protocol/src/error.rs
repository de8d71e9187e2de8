use thiserror::Error;

/// Errors from message reassembly.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The internal buffer grew past the configured maximum. The assembler
    /// resets itself and remains usable; the offending partial data is lost.
    #[error("assembler buffer overflow ({size} bytes, maximum {max})")]
    BufferOverflow { size: usize, max: usize },
}

/// Errors from message parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty message")]
    EmptyMessage,

    /// The header line carried a tag other than `0H`/`0M`. Callers ignore
    /// these messages; the device emits tags we do not speak.
    #[error("unknown message tag {tag:?}")]
    UnknownTag { tag: String },
}

pub type Result<T> = std::result::Result<T, ParseError>;
