// src/engine/encoder.rs
//
// Encode path: RGBA bitmap -> native codec image -> encoded container,
// streamed to a writer chunk by chunk with exact count checks.

use crate::codecs::{Codec, NativeImage};
use crate::engine::io::write_once;
use crate::engine::transcode::{copy_rows, ensure_stride_fits, required_len};
use crate::error::{HandlerError, Result};
use crate::options::HandlerConfig;
use image::{DynamicImage, RgbaImage};
use std::borrow::Cow;
use std::io::Write;
use tracing::{debug, warn};

/// Borrowed interleaved RGBA pixels with an explicit row pitch.
#[derive(Debug, Clone, Copy)]
pub struct RgbaView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> RgbaView<'a> {
    /// `stride` must cover a row of `width` pixels and `data` must reach the
    /// end of the last row.
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: usize) -> Result<Self> {
        let row_bytes = width as usize * 4;
        if stride < row_bytes {
            return Err(HandlerError::stride_mismatch(stride, stride, row_bytes));
        }
        let required = required_len(stride, row_bytes, height as usize).unwrap_or(usize::MAX);
        if data.len() < required {
            return Err(HandlerError::buffer_too_small(data.len(), required));
        }
        Ok(Self {
            data,
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

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }
}

impl<'a> From<&'a RgbaImage> for RgbaView<'a> {
    fn from(image: &'a RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.as_raw(),
            width,
            height,
            stride: width as usize * 4,
        }
    }
}

/// Normalize any bitmap to RGBA8, borrowing when it already is.
pub fn to_rgba8(image: &DynamicImage) -> Cow<'_, RgbaImage> {
    match image {
        DynamicImage::ImageRgba8(rgba) => Cow::Borrowed(rgba),
        other => Cow::Owned(other.to_rgba8()),
    }
}

/// Forwards encoded chunks to a writer. After the first failure nothing
/// more reaches the writer.
struct ChunkWriter<'w, W: Write + ?Sized> {
    writer: &'w mut W,
    error: Option<HandlerError>,
    chunks: usize,
    total: u64,
}

impl<'w, W: Write + ?Sized> ChunkWriter<'w, W> {
    fn new(writer: &'w mut W) -> Self {
        Self {
            writer,
            error: None,
            chunks: 0,
            total: 0,
        }
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if self.error.is_some() {
            return Err(HandlerError::encode_failed(
                "output",
                "writer already failed",
            ));
        }
        match write_once(&mut *self.writer, chunk) {
            Ok(()) => {
                self.chunks += 1;
                self.total += chunk.len() as u64;
                debug!(
                    target: "heif_handler::encoder",
                    chunk = chunk.len(),
                    total = self.total,
                    "wrote chunk"
                );
                Ok(())
            }
            Err(e) => {
                warn!(target: "heif_handler::encoder", error = %e, "write failed");
                let reported = match &e {
                    HandlerError::ShortWrite { written, requested } => {
                        HandlerError::short_write(*written, *requested)
                    }
                    _ => HandlerError::encode_failed("output", e.to_string()),
                };
                self.error = Some(e);
                Err(reported)
            }
        }
    }
}

/// Encode `source` with `codec` and stream the result into `writer`.
/// Returns the number of bytes written.
pub fn encode_rgba<C: Codec, W: Write + ?Sized>(
    codec: &C,
    source: RgbaView<'_>,
    config: &HandlerConfig,
    writer: &mut W,
) -> Result<u64> {
    if source.is_empty() {
        warn!(target: "heif_handler::encoder", width = source.width, height = source.height, "empty source image");
        return Err(HandlerError::EmptyBitmap);
    }
    config.limits.check(source.width, source.height)?;

    let mut native = codec.create_image(source.width, source.height)?;
    {
        let plane = native.plane_mut();
        let dst = plane.data.ok_or(HandlerError::MissingPlane)?;
        if plane.stride <= 0 {
            return Err(HandlerError::invalid_stride(plane.stride as i64));
        }
        let dst_stride = plane.stride as usize;
        ensure_stride_fits(source.stride, dst_stride).map_err(|e| {
            warn!(target: "heif_handler::encoder", src_stride = source.stride, dst_stride, "source rows do not fit image plane");
            e
        })?;
        copy_rows(
            source.data,
            source.stride,
            dst,
            dst_stride,
            source.width as usize * 4,
            source.height as usize,
        )?;
    }

    let mut sink = ChunkWriter::new(writer);
    let result = codec.encode(
        &native,
        config.compression,
        config.quality,
        &mut |chunk: &[u8]| sink.write_chunk(chunk),
    );
    if let Some(err) = sink.error.take() {
        return Err(err);
    }
    result.map_err(|e| {
        warn!(target: "heif_handler::encoder", codec = codec.name(), error = %e, "encode failed");
        e
    })?;

    debug!(
        target: "heif_handler::encoder",
        compression = %config.compression,
        quality = %config.quality,
        chunks = sink.chunks,
        bytes = sink.total,
        "encoded image"
    );
    Ok(sink.total)
}
