// src/engine/sniffer.rs
//
// Container sniffing from the first 12 bytes of a stream:
// box size (ignored), `ftyp`, major brand.

use crate::engine::io::peek;
use std::fmt;
use std::io::{Read, Seek};
use tracing::debug;

/// Bytes needed to classify a stream.
pub const HEADER_LEN: usize = 12;

const FTYP: &[u8; 4] = b"ftyp";

/// Container sub-format, derived purely from header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    None,
    Heif,
    HeifSequence,
    Heic,
    HeicSequence,
    Avif,
}

/// Recognized major brands.
pub const BRANDS: &[(&[u8; 4], Format)] = &[
    (b"mif1", Format::Heif),
    (b"msf1", Format::HeifSequence),
    (b"heic", Format::Heic),
    (b"heix", Format::Heic),
    (b"hevc", Format::HeicSequence),
    (b"hevx", Format::HeicSequence),
    (b"avif", Format::Avif),
    (b"avis", Format::Avif),
];

impl Format {
    pub fn from_brand(brand: &[u8]) -> Format {
        BRANDS
            .iter()
            .find(|(b, _)| b.as_slice() == brand)
            .map(|&(_, format)| format)
            .unwrap_or(Format::None)
    }

    /// Classify a header. Anything shorter than [`HEADER_LEN`] or without
    /// `ftyp` at offset 4 is `None`.
    pub fn from_header(header: &[u8]) -> Format {
        if header.len() < HEADER_LEN || &header[4..8] != FTYP {
            return Format::None;
        }
        Format::from_brand(&header[8..12])
    }

    /// Lowercase format label, `None` for unrecognized streams.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Format::None => None,
            Format::Heif => Some("heif"),
            Format::HeifSequence => Some("heifs"),
            Format::Heic => Some("heic"),
            Format::HeicSequence => Some("heics"),
            Format::Avif => Some("avif"),
        }
    }

    pub fn is_recognized(self) -> bool {
        self != Format::None
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().unwrap_or("none"))
    }
}

/// Classify the stream at its current position without consuming anything.
/// I/O failures classify as `None`.
pub fn sniff<R: Read + Seek>(reader: &mut R) -> Format {
    let mut header = [0u8; HEADER_LEN];
    match peek(reader, &mut header) {
        Ok(n) => {
            let format = Format::from_header(&header[..n]);
            debug!(target: "heif_handler::sniffer", peeked = n, %format, "sniffed header");
            format
        }
        Err(e) => {
            debug!(target: "heif_handler::sniffer", error = %e, "header peek failed");
            Format::None
        }
    }
}
