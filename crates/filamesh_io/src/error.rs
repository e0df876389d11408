//! # Error Types
//!
//! Every failure the decoder, the assembler and the backend boundary can
//! report. Decode and assembly errors are terminal for the call that raised
//! them: no partially decoded mesh or partially bound instance set is ever
//! returned alongside an error.

use thiserror::Error;

/// Errors produced while decoding a filamesh buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bad magic, unsupported version, or malformed string data.
    #[error("invalid filamesh format: {0}")]
    InvalidFormat(String),

    /// The header declares more data than the buffer holds.
    #[error("truncated buffer: need {required} bytes, have {available}")]
    TruncatedBuffer {
        /// Bytes the declared layout requires (saturated on overflow).
        required: usize,
        /// Bytes actually supplied.
        available: usize,
    },

    /// Flag bits or attribute layout this decoder does not understand.
    #[error("unsupported vertex layout: {0}")]
    UnsupportedLayout(String),

    /// An index references a vertex that does not exist.
    #[error("corrupt index data: index {index} at position {position} >= vertex count {vertex_count}")]
    CorruptIndexData {
        /// Position of the offending entry in the index stream.
        position: usize,
        /// The offending index value.
        index: u32,
        /// Vertex count declared by the header.
        vertex_count: u32,
    },

    /// A part record points outside the index stream or material table.
    #[error("corrupt part table: part {part}: {reason}")]
    CorruptPartTable {
        /// Index of the offending part in file order.
        part: usize,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors reported by a [`GraphicsBackend`](crate::backend::GraphicsBackend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not allocate a vertex or index buffer.
    #[error("buffer allocation failed: {0}")]
    BufferAllocation(String),

    /// The backend could not create a renderable entity.
    #[error("entity creation failed: {0}")]
    EntityCreation(String),

    /// The backend rejected a material binding.
    #[error("material binding failed: {0}")]
    MaterialBinding(String),
}

/// Errors produced while assembling renderable instances.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// Zero instances requested, or more than the assembler capacity.
    #[error("invalid instance count {requested}: must be in 1..={capacity}")]
    InstanceCountInvalid {
        /// Instance count passed by the caller.
        requested: usize,
        /// Capacity fixed when the assembler was constructed.
        capacity: usize,
    },

    /// A part could not be resolved and no fallback material was supplied.
    #[error("no material available for part {part} (material name {name:?})")]
    NoMaterialAvailable {
        /// Index of the unresolved part.
        part: usize,
        /// Material name stored for that part.
        name: String,
    },

    /// The graphics backend failed while building geometry or instances.
    #[error("graphics backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Errors from the one-call loading facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The buffer could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The decoded mesh could not be assembled.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// Errors while loading an [`AssemblerConfig`](crate::config::AssemblerConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),

    /// The parsed values are out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for assembly operations.
pub type AssembleResult<T> = Result<T, AssembleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_message() {
        let err = DecodeError::TruncatedBuffer { required: 104, available: 12 };
        assert_eq!(err.to_string(), "truncated buffer: need 104 bytes, have 12");
    }

    #[test]
    fn test_backend_error_converts() {
        let err: AssembleError = BackendError::EntityCreation("pool exhausted".into()).into();
        assert!(matches!(err, AssembleError::Backend(BackendError::EntityCreation(_))));
    }

    #[test]
    fn test_load_error_is_transparent() {
        let err: LoadError = DecodeError::InvalidFormat("bad magic".into()).into();
        assert_eq!(err.to_string(), "invalid filamesh format: bad magic");
    }
}
