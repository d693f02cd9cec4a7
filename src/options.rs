// src/options.rs
//
// Handler options and configuration.
// Everything here is plain data: cheap to copy, validated on construction.

use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::HandlerError;
use std::fmt;
use std::str::FromStr;

/// Quality used when nothing else is configured.
pub const DEFAULT_QUALITY: u8 = 50;

/// Lossy encoding quality in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: Quality = Quality(0);
    pub const MAX: Quality = Quality(100);

    /// Returns `None` outside `[0, 100]`.
    pub fn new(value: i64) -> Option<Self> {
        if (0..=100).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Clamp any integer into range.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Quality {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.trim().parse().map_err(|_| {
            HandlerError::invalid_argument("quality", s.to_string(), "Expected an integer")
        })?;
        Self::new(value).ok_or_else(|| {
            HandlerError::invalid_argument("quality", s.to_string(), "Expected 0 to 100")
        })
    }
}

/// Compression format used for the encoded image item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Compression {
    /// H.265, the format HEIC files carry
    #[default]
    Hevc,
    /// AV1, for AVIF output
    Av1,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Hevc => "hevc",
            Compression::Av1 => "av1",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hevc" | "heic" | "h265" => Ok(Compression::Hevc),
            "av1" | "avif" => Ok(Compression::Av1),
            _ => Err(HandlerError::invalid_argument(
                "compression",
                s.to_string(),
                "Expected hevc or av1",
            )),
        }
    }
}

/// Options a caller may query or set on a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageOption {
    Size,
    ClipRect,
    Description,
    ScaledClipRect,
    ScaledSize,
    CompressionRatio,
    Gamma,
    Quality,
    Name,
    SubType,
    IncrementalReading,
    Endianness,
    Animation,
    BackgroundColor,
    ImageFormat,
    Transformation,
}

impl ImageOption {
    /// Only quality (read/write) and size (read-only) are handled.
    pub fn is_supported(self) -> bool {
        matches!(self, ImageOption::Quality | ImageOption::Size)
    }
}

/// Loosely typed option value, as hosts pass them around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i64),
    Text(String),
    Size { width: u32, height: u32 },
}

impl OptionValue {
    /// Integer interpretation; numeric text converts, anything else does not.
    pub fn to_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            OptionValue::Text(s) => s.trim().parse().ok(),
            OptionValue::Size { .. } => None,
        }
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

/// Dimension limits applied before decoding an item and before encoding a
/// bitmap. Guards against decompression bombs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl Limits {
    pub fn check(&self, width: u32, height: u32) -> Result<(), HandlerError> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(HandlerError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(HandlerError::pixel_count_exceeds_limit(
                pixels,
                self.max_pixels,
            ));
        }
        Ok(())
    }
}

/// Handler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerConfig {
    pub quality: Quality,
    pub compression: Compression,
    pub limits: Limits,
}

impl HandlerConfig {
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
