//! Memory-mapped dataset reader
//!
//! Zero-copy access to the records of a VECS or BIGANN file. The OS handles
//! paging, so only the records actually touched are read from disk.
//! Elements are returned in on-disk (little-endian) order, which is why the
//! reader is only available on little-endian hosts.

use std::fs::File;
use std::io;
use std::marker::PhantomData;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::element::Element;
use crate::error::{DatasetError, Result};
use crate::format::detect::resolve_file;
use crate::format::layout::{self, Shape};
use crate::format::{Container, Format};

/// Read-only memory-mapped dataset
pub struct MappedDataset<T: Element> {
    mmap: Mmap,
    format: Format,
    shape: Shape,
    /// Byte position of the first element of record 0
    first: usize,
    /// Bytes between consecutive records
    stride: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> MappedDataset<T> {
    /// Map the dataset at `path`, resolving `format` like the bulk loader
    pub fn open(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        if cfg!(target_endian = "big") {
            return Err(DatasetError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "memory-mapped datasets require a little-endian host",
            )));
        }

        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| DatasetError::from_open(e, path))?;
        let resolved = resolve_file(&mut file, path, T::TYPE, format)?;
        let Shape { count, dim } = resolved.shape;
        let container = resolved.container();
        let width = resolved.width();
        let elem_size = std::mem::size_of::<T>();

        let vecs_field = if container == Container::Vecs { width.bytes() } else { 0 };
        let first = layout::data_offset(container, width) as usize + vecs_field;
        let stride = layout::record_bytes(container, width, dim, elem_size) as usize;

        // Verify file size covers every record
        let expected = layout::record_offset(container, width, dim, elem_size, count);
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(DatasetError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("File truncated: expected {} bytes, got {}", expected, actual),
            )));
        }

        let align = std::mem::align_of::<T>();
        if first % align != 0 || stride % align != 0 {
            return Err(DatasetError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} records are not aligned to {} bytes", resolved.format, align),
            )));
        }

        // SAFETY: the map is read-only; the file must not be truncated while mapped
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(Self {
            mmap,
            format: resolved.format,
            shape: resolved.shape,
            first,
            stride,
            _marker: PhantomData,
        })
    }

    /// Get a record by index (zero-copy)
    ///
    /// Returns a slice directly into the memory-mapped region.
    #[inline]
    pub fn get(&self, idx: usize) -> &[T] {
        assert!(
            idx < self.shape.count,
            "Index out of bounds: {} >= {}",
            idx,
            self.shape.count
        );

        let start = self.first + idx * self.stride;
        let bytes = &self.mmap[start..start + self.shape.dim * std::mem::size_of::<T>()];
        bytemuck::cast_slice(bytes)
    }

    /// Iterate over all records in file order
    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.shape.count).map(move |i| self.get(i))
    }

    /// Get the number of records
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.count == 0
    }

    /// Get record dimension
    #[inline]
    pub fn dimension(&self) -> usize {
        self.shape.dim
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Concrete format the file was opened with
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Get size in bytes
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.mmap.len()
    }
}
