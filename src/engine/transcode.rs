// src/engine/transcode.rs
//
// Strided row copy between pixel buffers whose row pitch may differ.
// Preconditions are checked up front; a violation is an error, never a
// truncated copy.

use crate::error::{HandlerError, Result};

/// Bytes a buffer must hold for `rows` rows of `row_bytes` at `stride`.
/// The last row need not carry padding.
pub fn required_len(stride: usize, row_bytes: usize, rows: usize) -> Option<usize> {
    if rows == 0 {
        return Some(0);
    }
    stride.checked_mul(rows - 1)?.checked_add(row_bytes)
}

/// Whole source rows must fit destination rows.
pub fn ensure_stride_fits(src_stride: usize, dst_stride: usize) -> Result<()> {
    if src_stride > dst_stride {
        return Err(HandlerError::stride_mismatch(src_stride, dst_stride, src_stride));
    }
    Ok(())
}

/// Copy `rows` rows of `row_bytes` from `src` (pitch `src_stride`) into
/// `dst` (pitch `dst_stride`). Destination padding is left untouched.
pub fn copy_rows(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    row_bytes: usize,
    rows: usize,
) -> Result<()> {
    if src_stride == 0 {
        return Err(HandlerError::invalid_stride(0));
    }
    if dst_stride == 0 {
        return Err(HandlerError::invalid_stride(0));
    }
    if row_bytes > src_stride || row_bytes > dst_stride {
        return Err(HandlerError::stride_mismatch(src_stride, dst_stride, row_bytes));
    }

    let src_required = required_len(src_stride, row_bytes, rows).unwrap_or(usize::MAX);
    if src.len() < src_required {
        return Err(HandlerError::buffer_too_small(src.len(), src_required));
    }
    let dst_required = required_len(dst_stride, row_bytes, rows).unwrap_or(usize::MAX);
    if dst.len() < dst_required {
        return Err(HandlerError::buffer_too_small(dst.len(), dst_required));
    }

    if src_stride == row_bytes && dst_stride == row_bytes {
        let len = row_bytes * rows;
        dst[..len].copy_from_slice(&src[..len]);
        return Ok(());
    }

    for y in 0..rows {
        let s = y * src_stride;
        let d = y * dst_stride;
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
    Ok(())
}
