// tests/common/mod.rs
//
// In-memory codec for integration tests.
//
// Container layout (little endian):
//   0..4   box size (ignored)
//   4..8   "ftyp"
//   8..12  brand
//   12..16 "MOCK"
//   16..20 declared item count (i32)
//   20..24 primary item id
//   then per item: id, width, height (u32 each), has_pixels (u8),
//   followed by width * height * 4 RGBA bytes when has_pixels is 1.

#![allow(dead_code)]

use heif_handler::codecs::{ChunkSink, Codec, DecodeContext, ItemId, NativeImage, PlaneMut, PlaneRef};
use heif_handler::{Compression, HandlerError, Quality, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MAGIC: &[u8; 4] = b"MOCK";
pub const PAD_BYTE: u8 = 0xEE;

/// Deterministic pixel value for synthesized items.
pub fn pattern(x: u32, y: u32, channel: u32) -> u8 {
    (x.wrapping_mul(5) ^ y.wrapping_mul(11)).wrapping_add(channel * 64) as u8
}

#[derive(Debug, Clone)]
pub struct MockItem {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Option<Vec<u8>>,
}

/// Builds container bytes in the mock layout.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    brand: [u8; 4],
    items: Vec<MockItem>,
    primary: Option<u32>,
    declared: Option<i32>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            brand: *b"heic",
            items: Vec::new(),
            primary: None,
            declared: None,
        }
    }

    pub fn brand(mut self, brand: &[u8; 4]) -> Self {
        self.brand = *brand;
        self
    }

    pub fn item(mut self, id: u32, width: u32, height: u32) -> Self {
        self.items.push(MockItem {
            id,
            width,
            height,
            pixels: None,
        });
        self
    }

    pub fn item_with_pixels(mut self, id: u32, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        self.items.push(MockItem {
            id,
            width,
            height,
            pixels: Some(pixels),
        });
        self
    }

    pub fn primary(mut self, id: u32) -> Self {
        self.primary = Some(id);
        self
    }

    /// Declare a different item count than the number of items listed.
    pub fn declared_count(mut self, count: i32) -> Self {
        self.declared = Some(count);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&24u32.to_be_bytes());
        out.extend_from_slice(b"ftyp");
        out.extend_from_slice(&self.brand);
        out.extend_from_slice(MAGIC);
        let declared = self.declared.unwrap_or(self.items.len() as i32);
        out.extend_from_slice(&declared.to_le_bytes());
        let primary = self
            .primary
            .or_else(|| self.items.first().map(|item| item.id))
            .unwrap_or(0);
        out.extend_from_slice(&primary.to_le_bytes());
        for item in &self.items {
            out.extend_from_slice(&item.id.to_le_bytes());
            out.extend_from_slice(&item.width.to_le_bytes());
            out.extend_from_slice(&item.height.to_le_bytes());
            match &item.pixels {
                Some(pixels) => {
                    out.push(1);
                    out.extend_from_slice(pixels);
                }
                None => out.push(0),
            }
        }
        out
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

fn malformed(what: &'static str) -> HandlerError {
    HandlerError::codec("mock", 2, 100, what)
}

impl<'a> Parser<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| malformed("truncated container"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Parse mock container bytes.
pub fn parse(data: &[u8]) -> Result<(i32, u32, Vec<MockItem>)> {
    let mut p = Parser { data, pos: 0 };
    let header = p.take(12)?;
    if &header[4..8] != b"ftyp" {
        return Err(malformed("missing ftyp"));
    }
    if p.take(4)? != MAGIC {
        return Err(malformed("unsupported file type"));
    }
    let declared = p.u32()? as i32;
    let primary = p.u32()?;
    let mut items = Vec::new();
    while p.pos < data.len() {
        let id = p.u32()?;
        let width = p.u32()?;
        let height = p.u32()?;
        let flag = p.take(1)?[0];
        let pixels = if flag == 1 {
            let len = (width as usize)
                .checked_mul(height as usize)
                .and_then(|n| n.checked_mul(4))
                .ok_or_else(|| malformed("pixel payload too large"))?;
            Some(p.take(len)?.to_vec())
        } else {
            None
        };
        items.push(MockItem {
            id,
            width,
            height,
            pixels,
        });
    }
    Ok((declared, primary, items))
}

/// Counts live native images so tests can check release-exactly-once.
#[derive(Debug, Default)]
pub struct Tracker {
    pub created: AtomicUsize,
    pub released: AtomicUsize,
}

impl Tracker {
    pub fn live(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockImage {
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub data: Option<Vec<u8>>,
    tracker: Arc<Tracker>,
}

impl MockImage {
    fn new(width: u32, height: u32, pad: usize, tracker: &Arc<Tracker>) -> Self {
        tracker.created.fetch_add(1, Ordering::SeqCst);
        let stride = width as usize * 4 + pad;
        Self {
            width: width as i32,
            height: height as i32,
            stride: stride as i32,
            data: Some(vec![PAD_BYTE; stride * height as usize]),
            tracker: Arc::clone(tracker),
        }
    }

    fn fill(&mut self, pixels: Option<&[u8]>) {
        let (width, height, stride) = (self.width as usize, self.height as usize, self.stride as usize);
        let Some(data) = self.data.as_mut() else {
            return;
        };
        for y in 0..height {
            let row = &mut data[y * stride..y * stride + width * 4];
            match pixels {
                Some(src) => row.copy_from_slice(&src[y * width * 4..(y + 1) * width * 4]),
                None => {
                    for (i, byte) in row.iter_mut().enumerate() {
                        *byte = pattern((i / 4) as u32, y as u32, (i % 4) as u32);
                    }
                }
            }
        }
    }

    /// Packed copy of the pixel bytes, padding removed.
    pub fn packed(&self) -> Vec<u8> {
        let (width, height, stride) = (self.width as usize, self.height as usize, self.stride as usize);
        let data = self.data.as_deref().unwrap_or(&[]);
        (0..height)
            .flat_map(|y| data[y * stride..y * stride + width * 4].iter().copied())
            .collect()
    }
}

impl Drop for MockImage {
    fn drop(&mut self) {
        self.tracker.released.fetch_add(1, Ordering::SeqCst);
    }
}

// SAFETY: plane bytes live in a heap `Vec`.
unsafe impl NativeImage for MockImage {
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

/// Failure injection for decoded planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneFault {
    #[default]
    None,
    Missing,
    ZeroStride,
    ZeroWidth,
    DecodeError,
}

#[derive(Debug, Clone, Default)]
pub struct MockCodec {
    /// Row padding of decoded and created images.
    pub pad: usize,
    pub fault: PlaneFault,
    /// Encoded output is handed out in chunks of this size (0 = one chunk).
    pub chunk_size: usize,
    pub tracker: Arc<Tracker>,
    /// Compression and quality of every encode call.
    pub encodes: Arc<Mutex<Vec<(Compression, Quality)>>>,
}

impl MockCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pad(pad: usize) -> Self {
        Self {
            pad,
            ..Self::default()
        }
    }

    pub fn chunked(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }
}

pub struct MockContext {
    declared: i32,
    primary: u32,
    items: Vec<MockItem>,
    codec: MockCodec,
    _data: Arc<Vec<u8>>,
}

impl MockContext {
    fn item(&self, id: ItemId) -> Result<&MockItem> {
        self.items
            .iter()
            .find(|item| item.id == id.0)
            .ok_or_else(|| HandlerError::codec("mock", 4, 0, "no such item"))
    }
}

impl DecodeContext for MockContext {
    type Image = MockImage;

    fn top_level_item_count(&self) -> i32 {
        self.declared
    }

    fn top_level_item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| ItemId(item.id)).collect()
    }

    fn primary_item_id(&self) -> Result<ItemId> {
        Ok(ItemId(self.primary))
    }

    fn item_dimensions(&self, id: ItemId) -> Result<(u32, u32)> {
        let item = self.item(id)?;
        Ok((item.width, item.height))
    }

    fn decode_item(&self, id: ItemId) -> Result<MockImage> {
        let item = self.item(id)?;
        if self.codec.fault == PlaneFault::DecodeError {
            return Err(HandlerError::codec("mock", 5, 0, "decoder plugin failed"));
        }
        let mut image = MockImage::new(item.width, item.height, self.codec.pad, &self.codec.tracker);
        image.fill(item.pixels.as_deref());
        match self.codec.fault {
            PlaneFault::Missing => image.data = None,
            PlaneFault::ZeroStride => image.stride = 0,
            PlaneFault::ZeroWidth => image.width = 0,
            PlaneFault::None | PlaneFault::DecodeError => {}
        }
        Ok(image)
    }
}

impl Codec for MockCodec {
    type Image = MockImage;
    type Context = MockContext;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn open_from_memory(&self, data: Arc<Vec<u8>>) -> Result<MockContext> {
        let (declared, primary, items) = parse(&data)?;
        Ok(MockContext {
            declared,
            primary,
            items,
            codec: self.clone(),
            _data: data,
        })
    }

    fn create_image(&self, width: u32, height: u32) -> Result<MockImage> {
        Ok(MockImage::new(width, height, self.pad, &self.tracker))
    }

    fn encode(
        &self,
        image: &MockImage,
        compression: Compression,
        quality: Quality,
        sink: &mut ChunkSink<'_>,
    ) -> Result<()> {
        if let Ok(mut encodes) = self.encodes.lock() {
            encodes.push((compression, quality));
        }
        let brand = match compression {
            Compression::Hevc => b"heic",
            Compression::Av1 => b"avif",
        };
        let bytes = ContainerBuilder::new()
            .brand(brand)
            .item_with_pixels(1, image.width as u32, image.height as u32, image.packed())
            .build();
        let chunk_size = if self.chunk_size == 0 {
            bytes.len()
        } else {
            self.chunk_size
        };
        for chunk in bytes.chunks(chunk_size) {
            sink(chunk)?;
        }
        Ok(())
    }
}

/// Two items, primary second: the usual sequence fixture.
pub fn two_item_sequence() -> Vec<u8> {
    ContainerBuilder::new()
        .brand(b"hevc")
        .item(10, 4, 3)
        .item(20, 6, 2)
        .primary(20)
        .build()
}
