use std::fmt;

/// Fatal errors raised by the recording layer.
///
/// Device object creation failures are not errors: they are reported through
/// `Option`/`bool` returns so callers can substitute fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    /// The backing allocator could not provide storage for a new arena chunk.
    OutOfMemory {
        /// Size of the failed request, in bytes.
        requested_bytes: usize,
    },
    /// The 22-bit chunk field of a [`ResourceHandle`](crate::memory::ResourceHandle)
    /// cannot address another chunk.
    HandleSpaceExhausted,
    /// A recorded count or offset does not fit the device's integer type.
    ValueOutOfRange {
        what: &'static str,
        value: u64,
    },
}

impl fmt::Display for DrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawError::OutOfMemory { requested_bytes } => {
                write!(f, "out of memory allocating an arena chunk of {requested_bytes} bytes")
            }
            DrawError::HandleSpaceExhausted => f.write_str("resource handle chunk space exhausted"),
            DrawError::ValueOutOfRange { what, value } => write!(f, "{what} {value} is out of range"),
        }
    }
}

impl std::error::Error for DrawError {}

pub type Result<T> = std::result::Result<T, DrawError>;
