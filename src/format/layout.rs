//! Byte-layout arithmetic shared by the detector, the readers and the writer
//!
//! Every formula is parameterised by the header width, so the same code
//! serves `u32` and `u64` headers.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{Container, HeaderWidth};

/// Number of records and their dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    pub count: usize,
    pub dim: usize,
}

impl Shape {
    pub fn new(count: usize, dim: usize) -> Self {
        Self { count, dim }
    }

    /// Total number of elements (`count * dim`)
    #[inline]
    pub fn len(&self) -> usize {
        self.count * self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// The first two header-width integers of a file, plus the file size
///
/// `h0` is the record count for BIGANN and the dimension for VECS; `h1` is
/// the BIGANN dimension. Fields the file is too short to contain are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub width: HeaderWidth,
    pub h0: Option<u64>,
    pub h1: Option<u64>,
    pub file_size: u64,
}

impl RawHeader {
    /// Read the leading header fields from an open file. Only the first
    /// `2 * width` bytes are touched; the payload is never read.
    pub fn read(file: &mut File, width: HeaderWidth) -> io::Result<Self> {
        let file_size = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;

        let avail = (2 * width.bytes() as u64).min(file_size) as usize;
        let mut bytes = [0u8; 16];
        file.read_exact(&mut bytes[..avail])?;

        Ok(Self::from_bytes(&bytes[..avail], width, file_size))
    }

    /// Parse from the first bytes of a file (fewer than two fields allowed)
    pub fn from_bytes(bytes: &[u8], width: HeaderWidth, file_size: u64) -> Self {
        let w = width.bytes();
        Self {
            width,
            h0: bytes.get(0..w).map(|b| decode_field(b, width)),
            h1: bytes.get(w..2 * w).map(|b| decode_field(b, width)),
            file_size,
        }
    }

    /// Whole file == two header fields + `h0` records of `h1` elements
    pub fn is_bigann(&self, elem_size: usize) -> bool {
        let (Some(count), Some(dim)) = (self.h0, self.h1) else {
            return false;
        };
        count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(elem_size as u64))
            .and_then(|n| n.checked_add(2 * self.width.bytes() as u64))
            .map_or(false, |expected| expected == self.file_size)
    }

    /// File splits evenly into `(width + h0 * elem_size)`-byte records
    pub fn is_vecs(&self, elem_size: usize) -> bool {
        match self.h0 {
            Some(dim) if dim > 0 => vecs_record_bytes(self.width, dim, elem_size)
                .map_or(false, |stride| self.file_size % stride == 0),
            _ => false,
        }
    }

    /// Shape implied by the header under `container`. No consistency check
    /// beyond overflow is made; callers detect first.
    pub fn shape(&self, container: Container, elem_size: usize) -> Option<Shape> {
        match container {
            // an empty file is a VECS dataset with no records
            Container::Vecs if self.file_size == 0 => Some(Shape::new(0, 0)),
            Container::Vecs => {
                let dim = self.h0?;
                let stride = vecs_record_bytes(self.width, dim, elem_size)?;
                Some(Shape::new(
                    usize::try_from(self.file_size / stride).ok()?,
                    usize::try_from(dim).ok()?,
                ))
            }
            Container::Bigann => Some(Shape::new(
                usize::try_from(self.h0?).ok()?,
                usize::try_from(self.h1?).ok()?,
            )),
            Container::Unknown | Container::AutoDetect => None,
        }
    }
}

fn vecs_record_bytes(width: HeaderWidth, dim: u64, elem_size: usize) -> Option<u64> {
    dim.checked_mul(elem_size as u64)?
        .checked_add(width.bytes() as u64)
}

/// Bytes before the first record
pub fn data_offset(container: Container, width: HeaderWidth) -> u64 {
    match container {
        Container::Bigann => 2 * width.bytes() as u64,
        _ => 0,
    }
}

/// Bytes occupied by one record on disk, including a VECS per-record header
pub fn record_bytes(container: Container, width: HeaderWidth, dim: usize, elem_size: usize) -> u64 {
    let payload = (dim * elem_size) as u64;
    match container {
        Container::Vecs => width.bytes() as u64 + payload,
        _ => payload,
    }
}

/// Byte position of record `index`
pub fn record_offset(
    container: Container,
    width: HeaderWidth,
    dim: usize,
    elem_size: usize,
    index: usize,
) -> u64 {
    (index as u64)
        .saturating_mul(record_bytes(container, width, dim, elem_size))
        .saturating_add(data_offset(container, width))
}

/// Bytes a dataset of `shape` occupies from the start of the file, `None`
/// when that does not fit in a `u64`
pub fn extent(container: Container, width: HeaderWidth, shape: Shape, elem_size: usize) -> Option<u64> {
    let payload = (shape.dim as u64).checked_mul(elem_size as u64)?;
    let record = match container {
        Container::Vecs => payload.checked_add(width.bytes() as u64)?,
        _ => payload,
    };
    (shape.count as u64)
        .checked_mul(record)?
        .checked_add(data_offset(container, width))
}

/// Decode one little-endian header field
pub fn decode_field(bytes: &[u8], width: HeaderWidth) -> u64 {
    match width {
        HeaderWidth::U32 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[..4]);
            u32::from_le_bytes(buf) as u64
        }
        HeaderWidth::U64 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            u64::from_le_bytes(buf)
        }
    }
}

/// Encode one little-endian header field. The caller guarantees the value
/// fits the width.
pub fn write_field<W: Write>(writer: &mut W, width: HeaderWidth, value: u64) -> io::Result<()> {
    match width {
        HeaderWidth::U32 => writer.write_all(&(value as u32).to_le_bytes()),
        HeaderWidth::U64 => writer.write_all(&value.to_le_bytes()),
    }
}
