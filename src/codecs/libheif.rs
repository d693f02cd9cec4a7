// src/codecs/libheif.rs
//
// libheif backend for the codec seam.

use crate::codecs::heif_safe::{
    ensure_initialized, SafeHeifContext, SafeHeifImage, LIBRARY,
};
use crate::codecs::{ChunkSink, Codec, DecodeContext, ItemId, NativeImage, PlaneMut, PlaneRef};
use crate::error::{HandlerError, Result};
use crate::options::{Compression, Quality};
use libheif_sys::{
    heif_channel, heif_channel_heif_channel_interleaved, heif_chroma_heif_chroma_interleaved_RGBA,
    heif_colorspace_heif_colorspace_RGB, heif_compression_format,
    heif_compression_format_heif_compression_AV1, heif_compression_format_heif_compression_HEVC,
};
use std::sync::Arc;

const INTERLEAVED: heif_channel = heif_channel_heif_channel_interleaved;

fn compression_format(compression: Compression) -> heif_compression_format {
    match compression {
        Compression::Hevc => heif_compression_format_heif_compression_HEVC,
        Compression::Av1 => heif_compression_format_heif_compression_AV1,
    }
}

/// libheif as a [`Codec`].
#[derive(Debug)]
pub struct LibHeif {
    _initialized: (),
}

impl LibHeif {
    /// Initializes libheif on first use.
    pub fn new() -> Result<Self> {
        ensure_initialized()?;
        Ok(Self { _initialized: () })
    }
}

/// Decode context over an in-memory container.
pub struct HeifContext {
    inner: SafeHeifContext,
}

/// A libheif image with one interleaved RGBA plane.
pub struct HeifImage {
    inner: SafeHeifImage,
}

// SAFETY: the plane lives in libheif's heap allocation, owned by the image
// handle and freed only on drop.
unsafe impl NativeImage for HeifImage {
    fn width(&self) -> i32 {
        self.inner.width(INTERLEAVED)
    }

    fn height(&self) -> i32 {
        self.inner.height(INTERLEAVED)
    }

    fn plane(&self) -> PlaneRef<'_> {
        self.inner.plane(INTERLEAVED)
    }

    fn plane_mut(&mut self) -> PlaneMut<'_> {
        self.inner.plane_mut(INTERLEAVED)
    }
}

impl DecodeContext for HeifContext {
    type Image = HeifImage;

    fn top_level_item_count(&self) -> i32 {
        self.inner.number_of_top_level_images()
    }

    fn top_level_item_ids(&self) -> Vec<ItemId> {
        self.inner.top_level_image_ids()
    }

    fn primary_item_id(&self) -> Result<ItemId> {
        self.inner.primary_image_id()
    }

    fn item_dimensions(&self, id: ItemId) -> Result<(u32, u32)> {
        let handle = self.inner.image_handle(id)?;
        let (width, height) = (handle.width(), handle.height());
        if width <= 0 || height <= 0 {
            return Err(HandlerError::invalid_dimensions(width as i64, height as i64));
        }
        Ok((width as u32, height as u32))
    }

    fn decode_item(&self, id: ItemId) -> Result<HeifImage> {
        let handle = self.inner.image_handle(id)?;
        let inner = handle.decode(
            heif_colorspace_heif_colorspace_RGB,
            heif_chroma_heif_chroma_interleaved_RGBA,
        )?;
        Ok(HeifImage { inner })
    }
}

impl Codec for LibHeif {
    type Image = HeifImage;
    type Context = HeifContext;

    fn name(&self) -> &'static str {
        LIBRARY
    }

    fn open_from_memory(&self, data: Arc<Vec<u8>>) -> Result<HeifContext> {
        let mut inner = SafeHeifContext::new()?;
        inner.read_from_memory_without_copy(data)?;
        Ok(HeifContext { inner })
    }

    fn create_image(&self, width: u32, height: u32) -> Result<HeifImage> {
        let mut inner = SafeHeifImage::create(
            width,
            height,
            heif_colorspace_heif_colorspace_RGB,
            heif_chroma_heif_chroma_interleaved_RGBA,
        )?;
        inner.add_plane(INTERLEAVED, width, height, 32)?;
        Ok(HeifImage { inner })
    }

    fn encode(
        &self,
        image: &HeifImage,
        compression: Compression,
        quality: Quality,
        sink: &mut ChunkSink<'_>,
    ) -> Result<()> {
        let mut context = SafeHeifContext::new()?;
        let mut encoder = context
            .encoder_for_format(compression_format(compression))
            .map_err(|e| HandlerError::encode_failed(compression.as_str(), e.to_string()))?;
        encoder.set_lossy_quality(quality.value())?;
        context.encode_image(&image.inner, &mut encoder)?;
        drop(encoder);
        context.write(sink)
    }
}
