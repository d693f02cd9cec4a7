// src/error.rs
//
// Unified error handling for heif-handler
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Handler misuse (no device, bad index, empty bitmap)
// - CodecError: Container/codec failures, invalid planes
// - ResourceLimit: Dimension limits, stream I/O, short writes
// - InternalBug: Library bugs (should not happen)

use crate::codecs::ItemId;
use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy shared by every handler operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Handler misuse, recoverable by the caller
    UserError,
    /// Container parse, decode and encode failures
    CodecError,
    /// Dimension limits and stream I/O
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// heif-handler error types
#[derive(Debug, Error)]
pub enum HandlerError {
    // Handler state errors
    #[error("No device attached to the handler")]
    NoDevice,

    #[error("No container loaded")]
    NotLoaded,

    #[error("Image index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    // Stream errors
    #[error("Stream contained no data")]
    EmptyStream,

    #[error("Failed to read stream: {source}")]
    StreamReadFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write stream: {source}")]
    WriteFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("Short write: {written} / {requested} bytes written")]
    ShortWrite { written: usize, requested: usize },

    // Container errors
    #[error("{library} error {code}.{subcode}: {message}")]
    Codec {
        library: Cow<'static, str>,
        code: u32,
        subcode: u32,
        message: Cow<'static, str>,
    },

    #[error("Item id list size ({listed}) does not match number of images ({declared})")]
    ItemCountMismatch { declared: i64, listed: usize },

    #[error("Primary image {id} not found in id list")]
    PrimaryItemNotFound { id: ItemId },

    // Plane errors
    #[error("Invalid image size: {width} x {height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("Pixel data not found")]
    MissingPlane,

    #[error("Invalid stride: {stride}")]
    InvalidStride { stride: i64 },

    #[error("Row of {row_bytes} bytes does not fit strides (source {src_stride}, destination {dst_stride})")]
    StrideMismatch {
        src_stride: usize,
        dst_stride: usize,
        row_bytes: usize,
    },

    #[error("Buffer too small: {len} bytes, {required} required")]
    BufferTooSmall { len: usize, required: usize },

    // Encode errors
    #[error("Source image is empty")]
    EmptyBitmap,

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Size limit errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Configuration errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl HandlerError {
    pub fn stream_read_failed(source: std::io::Error) -> Self {
        Self::StreamReadFailed { source }
    }

    pub fn write_failed(source: std::io::Error) -> Self {
        Self::WriteFailed { source }
    }

    pub fn short_write(written: usize, requested: usize) -> Self {
        Self::ShortWrite { written, requested }
    }

    pub fn codec(
        library: impl Into<Cow<'static, str>>,
        code: u32,
        subcode: u32,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Codec {
            library: library.into(),
            code,
            subcode,
            message: message.into(),
        }
    }

    pub fn index_out_of_range(index: usize, count: usize) -> Self {
        Self::IndexOutOfRange { index, count }
    }

    pub fn item_count_mismatch(declared: i64, listed: usize) -> Self {
        Self::ItemCountMismatch { declared, listed }
    }

    pub fn primary_item_not_found(id: ItemId) -> Self {
        Self::PrimaryItemNotFound { id }
    }

    pub fn invalid_dimensions(width: i64, height: i64) -> Self {
        Self::InvalidDimensions { width, height }
    }

    pub fn invalid_stride(stride: i64) -> Self {
        Self::InvalidStride { stride }
    }

    pub fn stride_mismatch(src_stride: usize, dst_stride: usize, row_bytes: usize) -> Self {
        Self::StrideMismatch {
            src_stride,
            dst_stride,
            row_bytes,
        }
    }

    pub fn buffer_too_small(len: usize, required: usize) -> Self {
        Self::BufferTooSmall { len, required }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoDevice
            | Self::NotLoaded
            | Self::IndexOutOfRange { .. }
            | Self::InvalidArgument { .. }
            | Self::EmptyBitmap => ErrorCategory::UserError,

            Self::EmptyStream
            | Self::Codec { .. }
            | Self::ItemCountMismatch { .. }
            | Self::PrimaryItemNotFound { .. }
            | Self::InvalidDimensions { .. }
            | Self::MissingPlane
            | Self::InvalidStride { .. }
            | Self::StrideMismatch { .. }
            | Self::EncodeFailed { .. } => ErrorCategory::CodecError,

            // Stream failures usually mean the device itself is unusable
            // (closed, full, not writable), which the caller can address.
            Self::StreamReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::ShortWrite { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. } => ErrorCategory::ResourceLimit,

            Self::BufferTooSmall { .. } | Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, HandlerError>;
