// src/engine/decoder.rs
//
// Item decode and handoff of the decoded pixels to the caller.
//
// The decoded bytes stay owned by the codec image. Callers either take the
// plane without copying (packed rows only) or copy it once into an
// `RgbaImage`, after which the codec image is released.

use crate::codecs::{DecodeContext, ItemId, NativeImage};
use crate::engine::transcode::{copy_rows, required_len};
use crate::error::{HandlerError, Result};
use crate::options::Limits;
use image::{ImageBuffer, Rgba, RgbaImage};
use std::ops::Deref;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Borrowed view of a decoded interleaved RGBA plane.
#[derive(Debug, Clone, Copy)]
pub struct DecodedPlane<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, at least `width * 4`.
    pub stride: usize,
    pub data: &'a [u8],
}

impl DecodedPlane<'_> {
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    pub fn is_packed(&self) -> bool {
        self.stride == self.row_bytes()
    }

    /// Pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.data.get(start..start + self.row_bytes())
    }
}

/// A decoded item. Owns the codec image; dropping it releases the image.
pub struct DecodedImage<I: NativeImage> {
    image: I,
    width: u32,
    height: u32,
    stride: usize,
}

impl<I: NativeImage> std::fmt::Debug for DecodedImage<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}

/// Contiguous pixel storage backed by a codec image.
///
/// The plane address is resolved once; `image` keeps it alive and is never
/// borrowed mutably while the buffer exists.
pub struct PlaneBuffer<I: NativeImage> {
    ptr: NonNull<u8>,
    len: usize,
    image: I,
}

impl<I: NativeImage> PlaneBuffer<I> {
    fn new(image: I, len: usize) -> Option<Self> {
        let data = image.plane().data?.get(..len)?;
        let ptr = NonNull::from(data).cast::<u8>();
        Some(Self { ptr, len, image })
    }
}

impl<I: NativeImage> Deref for PlaneBuffer<I> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr..ptr + len` was a valid plane slice when the buffer
        // was built, and `NativeImage` guarantees it stays valid while
        // `self.image` is alive and not mutably borrowed.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

/// Pixel buffer borrowed from a codec image without copying.
pub type SharedRgbaImage<I> = ImageBuffer<Rgba<u8>, PlaneBuffer<I>>;

/// Result of handing a decoded image to the caller.
pub enum Bitmap<I: NativeImage> {
    /// Packed rows, still owned by the codec image.
    Shared(SharedRgbaImage<I>),
    /// Padded rows, copied once; the codec image has been released.
    Owned(RgbaImage),
}

impl<I: NativeImage> Bitmap<I> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Bitmap::Shared(buf) => buf.dimensions(),
            Bitmap::Owned(buf) => buf.dimensions(),
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        match self {
            Bitmap::Shared(buf) => buf.as_raw().deref(),
            Bitmap::Owned(buf) => buf.as_raw().as_slice(),
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        match self {
            Bitmap::Shared(buf) => *buf.get_pixel(x, y),
            Bitmap::Owned(buf) => *buf.get_pixel(x, y),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Bitmap::Shared(_))
    }

    /// Copies only when the pixels are still shared.
    pub fn into_rgba_image(self) -> Result<RgbaImage> {
        match self {
            Bitmap::Owned(buf) => Ok(buf),
            Bitmap::Shared(buf) => {
                let (width, height) = buf.dimensions();
                let data = buf.as_raw().to_vec();
                let required = data.len();
                RgbaImage::from_raw(width, height, data)
                    .ok_or_else(|| HandlerError::buffer_too_small(required, required))
            }
        }
    }
}

impl<I: NativeImage> DecodedImage<I> {
    /// Validate a codec image's plane and take ownership of it.
    pub fn new(image: I) -> Result<Self> {
        let (w, h) = (image.width(), image.height());
        if w <= 0 || h <= 0 {
            return Err(HandlerError::invalid_dimensions(w as i64, h as i64));
        }
        let (width, height) = (w as u32, h as u32);

        let plane = image.plane();
        let data = plane.data.ok_or(HandlerError::MissingPlane)?;
        if plane.stride <= 0 {
            return Err(HandlerError::invalid_stride(plane.stride as i64));
        }
        let stride = plane.stride as usize;
        let row_bytes = width as usize * 4;
        if stride < row_bytes {
            return Err(HandlerError::stride_mismatch(stride, row_bytes, row_bytes));
        }
        let required = required_len(stride, row_bytes, height as usize).unwrap_or(usize::MAX);
        if data.len() < required {
            return Err(HandlerError::buffer_too_small(data.len(), required));
        }

        Ok(Self {
            image,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn plane(&self) -> DecodedPlane<'_> {
        DecodedPlane {
            width: self.width,
            height: self.height,
            stride: self.stride,
            data: self.image.plane().data.unwrap_or(&[]),
        }
    }

    pub fn is_packed(&self) -> bool {
        self.stride == self.width as usize * 4
    }

    /// Hand off the pixels, sharing the codec plane when rows are packed
    /// and copying once otherwise.
    pub fn into_bitmap(self) -> Result<Bitmap<I>> {
        if !self.is_packed() {
            return self.into_rgba_image().map(Bitmap::Owned);
        }
        let (width, height) = (self.width, self.height);
        let len = width as usize * 4 * height as usize;
        let buffer = PlaneBuffer::new(self.image, len)
            .ok_or_else(|| HandlerError::buffer_too_small(0, len))?;
        ImageBuffer::from_raw(width, height, buffer)
            .map(Bitmap::Shared)
            .ok_or_else(|| HandlerError::buffer_too_small(0, len))
    }

    /// Copy the pixels once into a packed `RgbaImage` and release the codec
    /// image.
    pub fn into_rgba_image(self) -> Result<RgbaImage> {
        let row_bytes = self.width as usize * 4;
        let mut packed = vec![0u8; row_bytes * self.height as usize];
        {
            let plane = self.plane();
            copy_rows(
                plane.data,
                plane.stride,
                &mut packed,
                row_bytes,
                row_bytes,
                self.height as usize,
            )?;
        }
        let (width, height) = (self.width, self.height);
        drop(self);
        let len = packed.len();
        RgbaImage::from_raw(width, height, packed)
            .ok_or_else(|| HandlerError::buffer_too_small(len, len))
    }
}

/// Decode `id` to interleaved RGBA, checking its dimensions against
/// `limits` first.
pub fn decode_item<X: DecodeContext>(
    context: &X,
    id: ItemId,
    limits: &Limits,
) -> Result<DecodedImage<X::Image>> {
    let (width, height) = context.item_dimensions(id).map_err(|e| {
        warn!(target: "heif_handler::decoder", %id, error = %e, "failed to get image handle");
        e
    })?;
    limits.check(width, height)?;

    let image = context.decode_item(id).map_err(|e| {
        warn!(target: "heif_handler::decoder", %id, error = %e, "failed to decode image");
        e
    })?;
    let decoded = DecodedImage::new(image).map_err(|e| {
        warn!(target: "heif_handler::decoder", %id, error = %e, "invalid decoded plane");
        e
    })?;

    debug!(
        target: "heif_handler::decoder",
        %id,
        width = decoded.width(),
        height = decoded.height(),
        stride = decoded.stride(),
        "decoded item"
    );
    Ok(decoded)
}
