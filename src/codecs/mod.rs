// src/codecs/mod.rs
//
// Codec seam. The container/codec library is consumed as a black box
// through these traits; codecs::libheif implements them over libheif-sys.

#[cfg(feature = "libheif")]
pub mod heif_safe;
#[cfg(feature = "libheif")]
pub mod libheif;
#[cfg(test)]
pub(crate) mod stub;

use crate::error::Result;
use crate::options::{Compression, Quality};
use std::fmt;
use std::sync::Arc;

/// Opaque identifier the container assigns to one of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of a native image's interleaved plane, exactly as the
/// codec reports it. `data` is `None` when the codec has no plane.
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    pub data: Option<&'a [u8]>,
    pub stride: i32,
}

/// Writable view of a native image's interleaved plane.
#[derive(Debug)]
pub struct PlaneMut<'a> {
    pub data: Option<&'a mut [u8]>,
    pub stride: i32,
}

/// An image owned by the codec, holding one interleaved RGBA plane.
///
/// Dropping the value releases the codec image. Implementations must
/// release exactly once.
///
/// # Safety
///
/// The bytes returned by [`plane`](Self::plane) must stay at the same
/// address, unchanged, for as long as the image is alive and not mutably
/// borrowed, including after the image value itself is moved. Heap or
/// codec-owned storage satisfies this; an inline array does not.
pub unsafe trait NativeImage {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn plane(&self) -> PlaneRef<'_>;
    fn plane_mut(&mut self) -> PlaneMut<'_>;
}

/// A parsed container opened over caller-owned bytes.
pub trait DecodeContext {
    type Image: NativeImage;

    /// Number of top-level items as declared by the container. May be
    /// negative if the library reports an error through the count.
    fn top_level_item_count(&self) -> i32;

    fn top_level_item_ids(&self) -> Vec<ItemId>;

    fn primary_item_id(&self) -> Result<ItemId>;

    /// Pixel dimensions of an item, read from its header without decoding.
    fn item_dimensions(&self, id: ItemId) -> Result<(u32, u32)>;

    /// Decode an item to RGB colorspace with interleaved RGBA chroma.
    fn decode_item(&self, id: ItemId) -> Result<Self::Image>;
}

/// Receives encoded bytes from the codec. Returning an error tells the
/// codec to stop writing.
pub type ChunkSink<'a> = dyn FnMut(&[u8]) -> Result<()> + 'a;

/// Entry point of a container/codec library.
pub trait Codec {
    type Image: NativeImage;
    type Context: DecodeContext<Image = Self::Image>;

    /// Library name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Open a decode context over `data` without copying it. The context
    /// keeps its own handle on the bytes for as long as it lives.
    fn open_from_memory(&self, data: Arc<Vec<u8>>) -> Result<Self::Context>;

    /// Allocate an RGB image with one interleaved RGBA plane at 32 bits
    /// per pixel.
    fn create_image(&self, width: u32, height: u32) -> Result<Self::Image>;

    /// Encode `image` into a fresh container and stream it through `sink`.
    /// The sink may be invoked any number of times.
    fn encode(
        &self,
        image: &Self::Image,
        compression: Compression,
        quality: Quality,
        sink: &mut ChunkSink<'_>,
    ) -> Result<()>;
}
