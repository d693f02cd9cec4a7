// src/engine/io.rs
//
// Stream helpers: non-consuming header peek, read-to-end, and the
// single-call exact write used by the encoder's chunk sink.

use crate::error::{HandlerError, Result};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

/// Fill as much of `buf` as the stream allows, then restore the original
/// position. Returns the number of bytes peeked.
pub fn peek<R: Read + Seek>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let start = reader.stream_position()?;
    let mut filled = 0;
    let outcome = loop {
        if filled == buf.len() {
            break Ok(filled);
        }
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break Ok(filled),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };
    // Restore even when the read failed.
    reader.seek(SeekFrom::Start(start))?;
    outcome
}

/// Read everything from the current position to the end of the stream.
pub fn read_remaining<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(HandlerError::stream_read_failed)?;
    Ok(data)
}

/// Hand `chunk` to the writer in exactly one `write` call. The reported
/// count must equal the chunk length; there is no retry.
pub fn write_once<W: Write + ?Sized>(writer: &mut W, chunk: &[u8]) -> Result<()> {
    match writer.write(chunk) {
        Ok(n) if n == chunk.len() => Ok(()),
        Ok(n) => Err(HandlerError::short_write(n, chunk.len())),
        Err(e) => Err(HandlerError::write_failed(e)),
    }
}
