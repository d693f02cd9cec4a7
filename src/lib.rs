// lib.rs
//
// heif-handler: HEIF/HEIC image sequences over generic byte streams
//
// Design goals:
// - Classify containers from 12 header bytes without consuming the stream
// - Random access over multi-image sequences, loaded once per device
// - Decoded pixels handed to the caller without an extra copy when possible
// - Encoded output streamed with exact per-chunk write checks

pub mod codecs;
pub mod engine;
pub mod error;
pub mod options;

pub use codecs::{Codec, DecodeContext, ItemId, NativeImage};
pub use engine::{
    sniff, Bitmap, DecodedImage, Format, ImageHandler, RgbaView, MAX_DIMENSION, MAX_PIXELS,
};
pub use error::{ErrorCategory, HandlerError, Result};
pub use options::{Compression, HandlerConfig, ImageOption, Limits, OptionValue, Quality};

#[cfg(feature = "libheif")]
pub use codecs::libheif::LibHeif;

/// Handler backed by libheif.
#[cfg(feature = "libheif")]
pub type HeifHandler<S> = ImageHandler<S, LibHeif>;

#[cfg(feature = "libheif")]
impl<S> HeifHandler<S> {
    /// Handler over `device` using libheif, initializing the library on
    /// first use.
    pub fn open(device: S) -> Result<Self> {
        Ok(ImageHandler::with_device(LibHeif::new()?, device))
    }
}

/// Library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Container brands this crate recognizes, as format labels.
pub fn supported_formats() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = engine::BRANDS
        .iter()
        .filter_map(|(_, format)| format.label())
        .collect();
    labels.dedup();
    labels
}
