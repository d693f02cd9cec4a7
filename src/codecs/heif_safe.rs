// src/codecs/heif_safe.rs
//
// Safe abstractions for libheif FFI operations.
// This module provides RAII-based wrappers that hide raw pointers and
// keep unsafe blocks out of the backend in codecs::libheif.
#![deny(unsafe_op_in_unsafe_fn)]

use crate::codecs::{ChunkSink, ItemId, PlaneMut, PlaneRef};
use crate::error::HandlerError;
use libc::{c_int, c_void, size_t};
use libheif_sys::*;
use std::ffi::CStr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};
#[cfg(test)]
use std::{cell::Cell, thread_local};

#[cfg(test)]
thread_local! {
    static TRACK_DROPS: Cell<bool> = Cell::new(false);
    static LIVE_IMAGES: Cell<usize> = Cell::new(0);
    static LIVE_CONTEXTS: Cell<usize> = Cell::new(0);
}

pub const LIBRARY: &str = "libheif";

/// Convert a libheif status into a Result, copying the message out of the
/// library-owned string.
pub fn check(err: heif_error) -> Result<(), HandlerError> {
    if err.code == heif_error_code_heif_error_Ok {
        return Ok(());
    }
    let message = if err.message.is_null() {
        String::from("unknown error")
    } else {
        // SAFETY: libheif messages are static, NUL-terminated strings.
        unsafe { CStr::from_ptr(err.message) }
            .to_string_lossy()
            .into_owned()
    };
    Err(HandlerError::codec(
        LIBRARY,
        err.code as u32,
        err.subcode as u32,
        message,
    ))
}

/// Initialize libheif's plugin registry once per process.
pub fn ensure_initialized() -> Result<(), HandlerError> {
    static INIT: OnceLock<Result<(), (u32, u32, String)>> = OnceLock::new();
    let outcome = INIT.get_or_init(|| {
        let result = unsafe { heif_init(std::ptr::null_mut()) };
        check(result).map_err(|e| match e {
            HandlerError::Codec {
                code,
                subcode,
                message,
                ..
            } => (code, subcode, message.into_owned()),
            other => (0, 0, other.to_string()),
        })
    });
    outcome
        .clone()
        .map_err(|(code, subcode, message)| HandlerError::codec(LIBRARY, code, subcode, message))
}

fn int_dimension(value: u32) -> Result<c_int, HandlerError> {
    c_int::try_from(value).map_err(|_| HandlerError::invalid_dimensions(value as i64, value as i64))
}

/// Safe wrapper for heif_context.
///
/// When opened over memory, the context keeps an `Arc` to those bytes; the
/// context is freed before the bytes are released.
pub struct SafeHeifContext {
    ptr: NonNull<heif_context>,
    data: Option<Arc<Vec<u8>>>,
}

impl SafeHeifContext {
    pub fn new() -> Result<Self, HandlerError> {
        let ptr = unsafe { heif_context_alloc() };
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| HandlerError::internal_panic("Failed to allocate libheif context"))?;
        #[cfg(test)]
        TRACK_DROPS.with(|flag| {
            if flag.get() {
                LIVE_CONTEXTS.with(|c| c.set(c.get() + 1));
            }
        });
        Ok(Self { ptr, data: None })
    }

    /// Parse a container held in `data` without copying it.
    pub fn read_from_memory_without_copy(
        &mut self,
        data: Arc<Vec<u8>>,
    ) -> Result<(), HandlerError> {
        // Store first: libheif may keep pointers into the buffer even when
        // parsing fails part way.
        let bytes = self.data.insert(data);
        let result = unsafe {
            heif_context_read_from_memory_without_copy(
                self.ptr.as_ptr(),
                bytes.as_ptr() as *const c_void,
                bytes.len() as size_t,
                std::ptr::null(),
            )
        };
        check(result)
    }

    pub fn number_of_top_level_images(&self) -> c_int {
        unsafe { heif_context_get_number_of_top_level_images(self.ptr.as_ptr()) }
    }

    pub fn top_level_image_ids(&self) -> Vec<ItemId> {
        let count = self.number_of_top_level_images();
        if count <= 0 {
            return Vec::new();
        }
        let mut ids: Vec<heif_item_id> = vec![0; count as usize];
        let filled = unsafe {
            heif_context_get_list_of_top_level_image_IDs(
                self.ptr.as_ptr(),
                ids.as_mut_ptr(),
                count,
            )
        };
        ids.truncate(filled.clamp(0, count) as usize);
        ids.into_iter().map(ItemId).collect()
    }

    pub fn primary_image_id(&self) -> Result<ItemId, HandlerError> {
        let mut id: heif_item_id = 0;
        let result = unsafe { heif_context_get_primary_image_ID(self.ptr.as_ptr(), &mut id) };
        check(result)?;
        Ok(ItemId(id))
    }

    pub fn image_handle(&self, id: ItemId) -> Result<SafeHeifImageHandle, HandlerError> {
        let mut handle: *mut heif_image_handle = std::ptr::null_mut();
        let result =
            unsafe { heif_context_get_image_handle(self.ptr.as_ptr(), id.0, &mut handle) };
        check(result)?;
        NonNull::new(handle)
            .map(|ptr| SafeHeifImageHandle { ptr })
            .ok_or_else(|| HandlerError::internal_panic("libheif returned a null image handle"))
    }

    pub fn encoder_for_format(
        &mut self,
        format: heif_compression_format,
    ) -> Result<SafeHeifEncoder, HandlerError> {
        let mut encoder: *mut heif_encoder = std::ptr::null_mut();
        let result = unsafe {
            heif_context_get_encoder_for_format(self.ptr.as_ptr(), format, &mut encoder)
        };
        check(result)?;
        NonNull::new(encoder)
            .map(|ptr| SafeHeifEncoder { ptr })
            .ok_or_else(|| HandlerError::encode_failed(LIBRARY, "No encoder for format"))
    }

    /// Encode `image` as a new top-level item of this context.
    pub fn encode_image(
        &mut self,
        image: &SafeHeifImage,
        encoder: &mut SafeHeifEncoder,
    ) -> Result<(), HandlerError> {
        let result = unsafe {
            heif_context_encode_image(
                self.ptr.as_ptr(),
                image.ptr.as_ptr(),
                encoder.ptr.as_ptr(),
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        check(result)
    }

    /// Serialize the context, handing every chunk libheif produces to `sink`.
    ///
    /// An error returned by the sink stops the write and is returned as-is.
    pub fn write(&self, sink: &mut ChunkSink<'_>) -> Result<(), HandlerError> {
        let mut state = WriterState { sink, error: None };
        let mut writer = heif_writer {
            writer_api_version: 1,
            write: Some(write_callback),
        };
        let result = unsafe {
            heif_context_write(
                self.ptr.as_ptr(),
                &mut writer,
                &mut state as *mut WriterState<'_, '_> as *mut c_void,
            )
        };
        if let Some(err) = state.error.take() {
            return Err(err);
        }
        check(result)
    }
}

impl Drop for SafeHeifContext {
    fn drop(&mut self) {
        unsafe { heif_context_free(self.ptr.as_ptr()) };
        // self.data is released after this point, once libheif no longer
        // references it.
        #[cfg(test)]
        TRACK_DROPS.with(|flag| {
            if flag.get() {
                LIVE_CONTEXTS.with(|c| c.set(c.get().saturating_sub(1)));
            }
        });
    }
}

struct WriterState<'a, 'b> {
    sink: &'a mut ChunkSink<'b>,
    error: Option<HandlerError>,
}

fn write_status(code: heif_error_code, subcode: heif_suberror_code, message: &'static CStr) -> heif_error {
    heif_error {
        code,
        subcode,
        message: message.as_ptr(),
    }
}

unsafe extern "C" fn write_callback(
    _ctx: *mut heif_context,
    data: *const c_void,
    size: size_t,
    userdata: *mut c_void,
) -> heif_error {
    // SAFETY: userdata is the WriterState owned by SafeHeifContext::write,
    // which outlives the heif_context_write call that invokes us.
    let state = unsafe { &mut *(userdata as *mut WriterState<'_, '_>) };
    let chunk: &[u8] = if size == 0 {
        &[]
    } else if data.is_null() {
        state.error.get_or_insert_with(|| {
            HandlerError::internal_panic("libheif passed a null write buffer")
        });
        return write_status(
            heif_error_code_heif_error_Encoding_error,
            heif_suberror_code_heif_suberror_Cannot_write_output_data,
            c"write failed",
        );
    } else {
        // SAFETY: libheif guarantees `size` readable bytes at `data`.
        unsafe { std::slice::from_raw_parts(data as *const u8, size) }
    };

    // Never unwind across the C boundary.
    let outcome = catch_unwind(AssertUnwindSafe(|| (state.sink)(chunk)));
    match outcome {
        Ok(Ok(())) => write_status(
            heif_error_code_heif_error_Ok,
            heif_suberror_code_heif_suberror_Unspecified,
            c"ok",
        ),
        Ok(Err(err)) => {
            state.error.get_or_insert(err);
            write_status(
                heif_error_code_heif_error_Encoding_error,
                heif_suberror_code_heif_suberror_Cannot_write_output_data,
                c"write failed",
            )
        }
        Err(_) => {
            state
                .error
                .get_or_insert_with(|| HandlerError::internal_panic("write sink panicked"));
            write_status(
                heif_error_code_heif_error_Encoding_error,
                heif_suberror_code_heif_suberror_Cannot_write_output_data,
                c"write failed",
            )
        }
    }
}

/// Safe wrapper for heif_image_handle.
pub struct SafeHeifImageHandle {
    ptr: NonNull<heif_image_handle>,
}

impl SafeHeifImageHandle {
    pub fn width(&self) -> c_int {
        unsafe { heif_image_handle_get_width(self.ptr.as_ptr()) }
    }

    pub fn height(&self) -> c_int {
        unsafe { heif_image_handle_get_height(self.ptr.as_ptr()) }
    }

    pub fn decode(
        &self,
        colorspace: heif_colorspace,
        chroma: heif_chroma,
    ) -> Result<SafeHeifImage, HandlerError> {
        let mut image: *mut heif_image = std::ptr::null_mut();
        let result = unsafe {
            heif_decode_image(
                self.ptr.as_ptr(),
                &mut image,
                colorspace,
                chroma,
                std::ptr::null(),
            )
        };
        check(result)?;
        let ptr = NonNull::new(image)
            .ok_or_else(|| HandlerError::internal_panic("libheif returned a null image"))?;
        Ok(SafeHeifImage::from_raw(ptr))
    }
}

impl Drop for SafeHeifImageHandle {
    fn drop(&mut self) {
        unsafe { heif_image_handle_release(self.ptr.as_ptr()) };
    }
}

/// Safe wrapper for heif_image. Released exactly once on drop.
pub struct SafeHeifImage {
    ptr: NonNull<heif_image>,
}

impl SafeHeifImage {
    fn from_raw(ptr: NonNull<heif_image>) -> Self {
        #[cfg(test)]
        TRACK_DROPS.with(|flag| {
            if flag.get() {
                LIVE_IMAGES.with(|c| c.set(c.get() + 1));
            }
        });
        Self { ptr }
    }

    /// Create an image without planes.
    pub fn create(
        width: u32,
        height: u32,
        colorspace: heif_colorspace,
        chroma: heif_chroma,
    ) -> Result<Self, HandlerError> {
        let w = int_dimension(width)?;
        let h = int_dimension(height)?;
        let mut image: *mut heif_image = std::ptr::null_mut();
        let result = unsafe { heif_image_create(w, h, colorspace, chroma, &mut image) };
        check(result)?;
        let ptr = NonNull::new(image)
            .ok_or_else(|| HandlerError::internal_panic("libheif returned a null image"))?;
        Ok(Self::from_raw(ptr))
    }

    pub fn add_plane(
        &mut self,
        channel: heif_channel,
        width: u32,
        height: u32,
        bit_depth: c_int,
    ) -> Result<(), HandlerError> {
        let w = int_dimension(width)?;
        let h = int_dimension(height)?;
        let result = unsafe { heif_image_add_plane(self.ptr.as_ptr(), channel, w, h, bit_depth) };
        check(result)
    }

    pub fn width(&self, channel: heif_channel) -> c_int {
        unsafe { heif_image_get_width(self.ptr.as_ptr(), channel) }
    }

    pub fn height(&self, channel: heif_channel) -> c_int {
        unsafe { heif_image_get_height(self.ptr.as_ptr(), channel) }
    }

    /// Plane bytes and stride as libheif reports them. The slice covers
    /// `stride * height` bytes when both are positive, and is empty
    /// otherwise.
    pub fn plane(&self, channel: heif_channel) -> PlaneRef<'_> {
        let mut stride: c_int = 0;
        let ptr = unsafe { heif_image_get_plane_readonly(self.ptr.as_ptr(), channel, &mut stride) };
        if ptr.is_null() {
            return PlaneRef { data: None, stride };
        }
        let len = plane_len(stride, self.height(channel));
        let data = if len == 0 {
            &[][..]
        } else {
            // SAFETY: libheif allocates `stride * height` bytes for the
            // plane, owned by this image for as long as &self lives.
            unsafe { std::slice::from_raw_parts(ptr, len) }
        };
        PlaneRef {
            data: Some(data),
            stride,
        }
    }

    pub fn plane_mut(&mut self, channel: heif_channel) -> PlaneMut<'_> {
        let height = self.height(channel);
        let mut stride: c_int = 0;
        let ptr = unsafe { heif_image_get_plane(self.ptr.as_ptr(), channel, &mut stride) };
        if ptr.is_null() {
            return PlaneMut { data: None, stride };
        }
        let len = plane_len(stride, height);
        let data = if len == 0 {
            &mut [][..]
        } else {
            // SAFETY: as in plane(); &mut self guarantees exclusive access.
            unsafe { std::slice::from_raw_parts_mut(ptr, len) }
        };
        PlaneMut {
            data: Some(data),
            stride,
        }
    }

    #[cfg(test)]
    pub fn take_raw_for_test(self) -> *mut heif_image {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

fn plane_len(stride: c_int, height: c_int) -> usize {
    if stride <= 0 || height <= 0 {
        0
    } else {
        stride as usize * height as usize
    }
}

impl Drop for SafeHeifImage {
    fn drop(&mut self) {
        unsafe { heif_image_release(self.ptr.as_ptr()) };
        #[cfg(test)]
        TRACK_DROPS.with(|flag| {
            if flag.get() {
                LIVE_IMAGES.with(|c| c.set(c.get().saturating_sub(1)));
            }
        });
    }
}

/// Safe wrapper for heif_encoder.
pub struct SafeHeifEncoder {
    ptr: NonNull<heif_encoder>,
}

impl SafeHeifEncoder {
    /// Quality in `[0, 100]`.
    pub fn set_lossy_quality(&mut self, quality: u8) -> Result<(), HandlerError> {
        let quality = quality.min(100) as c_int;
        let result = unsafe { heif_encoder_set_lossy_quality(self.ptr.as_ptr(), quality) };
        check(result)
    }
}

impl Drop for SafeHeifEncoder {
    fn drop(&mut self) {
        unsafe { heif_encoder_release(self.ptr.as_ptr()) };
    }
}
