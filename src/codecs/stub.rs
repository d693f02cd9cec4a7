// src/codecs/stub.rs
//
// In-process codec for unit tests. Items are declared up front; decoding
// synthesizes a deterministic pixel pattern with optional row padding.

use crate::codecs::{ChunkSink, Codec, DecodeContext, ItemId, NativeImage, PlaneMut, PlaneRef};
use crate::error::{HandlerError, Result};
use crate::options::{Compression, Quality};
use std::cell::RefCell;
use std::sync::Arc;

pub const PAD_BYTE: u8 = 0xEE;

pub fn pixel(x: u32, y: u32, channel: u32) -> u8 {
    (x.wrapping_mul(3) + y.wrapping_mul(7) + channel.wrapping_mul(31)) as u8
}

#[derive(Debug)]
pub struct StubImage {
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub data: Option<Vec<u8>>,
}

impl StubImage {
    pub fn blank(width: u32, height: u32, pad: usize) -> Self {
        let stride = width as usize * 4 + pad;
        Self {
            width: width as i32,
            height: height as i32,
            stride: stride as i32,
            data: Some(vec![0; stride * height as usize]),
        }
    }

    pub fn patterned(width: u32, height: u32, pad: usize) -> Self {
        let mut image = Self::blank(width, height, pad);
        let stride = image.stride as usize;
        if let Some(data) = image.data.as_mut() {
            for y in 0..height {
                let row = &mut data[y as usize * stride..(y as usize + 1) * stride];
                for x in 0..width {
                    for c in 0..4 {
                        row[(x * 4 + c) as usize] = pixel(x, y, c);
                    }
                }
                row[width as usize * 4..].fill(PAD_BYTE);
            }
        }
        image
    }
}

// SAFETY: plane bytes live in a heap `Vec`.
unsafe impl NativeImage for StubImage {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn plane(&self) -> PlaneRef<'_> {
        PlaneRef {
            data: self.data.as_deref(),
            stride: self.stride,
        }
    }

    fn plane_mut(&mut self) -> PlaneMut<'_> {
        PlaneMut {
            data: self.data.as_deref_mut(),
            stride: self.stride,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StubItem {
    pub id: ItemId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct StubCodec {
    pub items: Vec<StubItem>,
    pub primary: Option<ItemId>,
    /// Overrides the declared item count.
    pub declared_count: Option<i32>,
    pub pad: usize,
    pub fail_open: bool,
    /// Decoded images report this stride instead of the real one.
    pub stride_override: Option<i32>,
    pub drop_plane: bool,
    pub chunks: Vec<Vec<u8>>,
    pub encoded: RefCell<Vec<(Compression, Quality, Vec<u8>)>>,
}

impl StubCodec {
    pub fn with_items(dims: &[(u32, u32)], primary_index: usize) -> Self {
        let items: Vec<StubItem> = dims
            .iter()
            .enumerate()
            .map(|(i, &(width, height))| StubItem {
                id: ItemId(i as u32 + 1),
                width,
                height,
            })
            .collect();
        let primary = items.get(primary_index).map(|item| item.id);
        Self {
            items,
            primary,
            ..Self::default()
        }
    }
}

pub struct StubContext {
    codec: StubCodec,
    _data: Arc<Vec<u8>>,
}

impl DecodeContext for StubContext {
    type Image = StubImage;

    fn top_level_item_count(&self) -> i32 {
        self.codec
            .declared_count
            .unwrap_or(self.codec.items.len() as i32)
    }

    fn top_level_item_ids(&self) -> Vec<ItemId> {
        self.codec.items.iter().map(|item| item.id).collect()
    }

    fn primary_item_id(&self) -> Result<ItemId> {
        self.codec
            .primary
            .ok_or_else(|| HandlerError::codec("stub", 4, 0, "no primary item"))
    }

    fn item_dimensions(&self, id: ItemId) -> Result<(u32, u32)> {
        self.codec
            .items
            .iter()
            .find(|item| item.id == id)
            .map(|item| (item.width, item.height))
            .ok_or_else(|| HandlerError::codec("stub", 4, 0, "unknown item"))
    }

    fn decode_item(&self, id: ItemId) -> Result<StubImage> {
        let (width, height) = self.item_dimensions(id)?;
        let mut image = StubImage::patterned(width, height, self.codec.pad);
        if let Some(stride) = self.codec.stride_override {
            image.stride = stride;
        }
        if self.codec.drop_plane {
            image.data = None;
        }
        Ok(image)
    }
}

impl Codec for StubCodec {
    type Image = StubImage;
    type Context = StubContext;

    fn name(&self) -> &'static str {
        "stub"
    }

    fn open_from_memory(&self, data: Arc<Vec<u8>>) -> Result<StubContext> {
        if self.fail_open {
            return Err(HandlerError::codec("stub", 2, 100, "unsupported file type"));
        }
        Ok(StubContext {
            codec: self.clone(),
            _data: data,
        })
    }

    fn create_image(&self, width: u32, height: u32) -> Result<StubImage> {
        Ok(StubImage::blank(width, height, self.pad))
    }

    fn encode(
        &self,
        image: &StubImage,
        compression: Compression,
        quality: Quality,
        sink: &mut ChunkSink<'_>,
    ) -> Result<()> {
        self.encoded.borrow_mut().push((
            compression,
            quality,
            image.data.clone().unwrap_or_default(),
        ));
        for chunk in &self.chunks {
            sink(chunk)?;
        }
        Ok(())
    }
}
