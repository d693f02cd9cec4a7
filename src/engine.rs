// src/engine.rs
//
// The core of heif-handler. A read/write pipeline that:
// 1. Sniffs the container brand without consuming the stream
// 2. Loads the container once per device and tracks the current item
// 3. Decodes items to interleaved RGBA, sharing the codec plane when possible
// 4. Encodes RGBA bitmaps and streams the result with exact write checks
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Items larger than 32768x32768 are rejected before decoding to prevent
/// decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
mod decoder;
mod encoder;
mod io;
mod loader;
mod navigator;
mod sniffer;
pub mod transcode;

pub use api::ImageHandler;
pub use decoder::{decode_item, Bitmap, DecodedImage, DecodedPlane, PlaneBuffer, SharedRgbaImage};
pub use encoder::{encode_rgba, to_rgba8, RgbaView};
pub use loader::{load_container, open_container, Container, ReadState};
pub use navigator::SequencePosition;
pub use sniffer::{sniff, Format, BRANDS, HEADER_LEN};
