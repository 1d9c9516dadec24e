//! Streaming dataset writer
//!
//! Records are appended in batches. In BIGANN mode the header at the start
//! of the file is rewritten with the running total on every append, so the
//! file is a valid dataset between appends.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::element::Element;
use crate::error::{DatasetError, Result};
use crate::format::layout::write_field;
use crate::format::{Container, Format, HeaderWidth};
use crate::progress::{NoProgress, Operation, Progress, Ticker};

/// Sequential-append writer for one output file
///
/// Single owner; not meant to be shared between appenders.
pub struct StreamWriter<T: Element> {
    writer: BufWriter<File>,
    path: PathBuf,
    format: Format,
    dim: usize,
    count: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> StreamWriter<T> {
    /// Create (or truncate) `path` for records of dimension `dim`
    ///
    /// The header width defaults to `u32` when `format` has none. A format
    /// without a concrete container is `InvalidFormat`.
    ///
    /// A VECS writer closed without any append leaves an empty file. It reads
    /// back as zero records only under an explicit VECS format; detection
    /// reports `FormatUnknown` for it.
    pub fn open(path: impl AsRef<Path>, dim: usize, format: Format) -> Result<Self> {
        let path = path.as_ref();

        if !matches!(format.container(), Container::Vecs | Container::Bigann) {
            return Err(DatasetError::InvalidFormat(format));
        }
        let format = match format.header() {
            Some(_) => format,
            None => {
                tracing::debug!("Header type was not specified. Set to u32.");
                format | HeaderWidth::U32
            }
        };
        check_fits(dim, format)?;

        let file = File::create(path).map_err(|e| DatasetError::from_open(e, path))?;
        let mut writer = BufWriter::new(file);

        if format.container() == Container::Bigann {
            write_bigann_header(&mut writer, format, 0, dim)?;
        }

        tracing::debug!(
            "store: path = {}, dim = {}, format = {}",
            path.display(),
            dim,
            format
        );

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            format,
            dim,
            count: 0,
            _marker: PhantomData,
        })
    }

    /// Append `count` records taken from `source` every `stride` elements
    pub fn append(&mut self, source: &[T], stride: usize, count: usize) -> Result<()> {
        self.append_with(source, stride, count, &mut NoProgress)
    }

    /// [`append`](Self::append) reporting to a progress observer
    pub fn append_with(
        &mut self,
        source: &[T],
        stride: usize,
        count: usize,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        check_source(source, stride, count, self.dim)?;

        let vecs = self.format.container() == Container::Vecs;
        let total = self.count + count;
        if !vecs {
            check_fits(total, self.format)?;
        }

        tracing::debug!(
            "{}: append size = {}, total size = {}",
            self.path.display(),
            count,
            total
        );

        let width = self.header_width();
        if !vecs {
            self.writer.seek(SeekFrom::Start(0))?;
            write_bigann_header(&mut self.writer, self.format, total, self.dim)?;
            self.writer.seek(SeekFrom::End(0))?;
        }

        progress.begin(Operation::Store, count);
        let ticker = Ticker::new(count);
        let mut scratch = Vec::new();

        for i in 0..count {
            let row = &source[i * stride..i * stride + self.dim];
            if vecs {
                write_field(&mut self.writer, width, self.dim as u64)?;
            }
            write_row(&mut self.writer, row, &mut scratch)?;

            if ticker.hit(i) {
                progress.advance(Operation::Store, i, count);
            }
        }

        self.count = total;
        progress.finish(Operation::Store, count);
        Ok(())
    }

    /// Records written so far
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Concrete format of the output (header width filled in)
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Push buffered records to the file so other readers see them
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn header_width(&self) -> HeaderWidth {
        self.format.header().unwrap_or(HeaderWidth::U32)
    }

    /// Flush, sync and close the file. Returns the number of records written.
    pub fn close(self) -> Result<usize> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        tracing::debug!("{}: closed with {} records", self.path.display(), self.count);
        Ok(self.count)
    }
}

/// Write `count` records of dimension `dim` from `source` in one go
pub fn store<T: Element>(
    path: impl AsRef<Path>,
    count: usize,
    dim: usize,
    source: &[T],
    format: Format,
) -> Result<()> {
    store_with(path, count, dim, source, format, &mut NoProgress)
}

pub fn store_with<T: Element>(
    path: impl AsRef<Path>,
    count: usize,
    dim: usize,
    source: &[T],
    format: Format,
    progress: &mut dyn Progress,
) -> Result<()> {
    // Fail before the output is truncated
    if count > 0 {
        check_source(source, dim, count, dim)?;
    }
    if format.container() == Container::Bigann {
        check_fits(count, format)?;
    }

    let mut writer = StreamWriter::<T>::open(path, dim, format)?;
    writer.append_with(source, dim, count, progress)?;
    writer.close()?;
    Ok(())
}

/// `source` must hold `count` records of `dim` elements every `stride`
fn check_source<T>(source: &[T], stride: usize, count: usize, dim: usize) -> Result<()> {
    if stride < dim {
        return Err(DatasetError::BufferTooSmall {
            required: dim,
            actual: stride,
        });
    }
    let required = (count - 1)
        .checked_mul(stride)
        .and_then(|n| n.checked_add(dim))
        .unwrap_or(usize::MAX);
    if source.len() < required {
        return Err(DatasetError::BufferTooSmall {
            required,
            actual: source.len(),
        });
    }
    Ok(())
}

fn check_fits(value: usize, format: Format) -> Result<()> {
    let width = format.header().unwrap_or(HeaderWidth::U32);
    if value as u64 > width.max_value() {
        return Err(DatasetError::HeaderOverflow { value, format });
    }
    Ok(())
}

fn write_bigann_header<W: Write>(writer: &mut W, format: Format, count: usize, dim: usize) -> io::Result<()> {
    let width = format.header().unwrap_or(HeaderWidth::U32);
    write_field(writer, width, count as u64)?;
    write_field(writer, width, dim as u64)
}

fn write_row<T: Element, W: Write>(writer: &mut W, row: &[T], scratch: &mut Vec<T>) -> io::Result<()> {
    if cfg!(target_endian = "little") {
        writer.write_all(bytemuck::cast_slice(row))
    } else {
        scratch.clear();
        scratch.extend(row.iter().map(|v| v.to_le()));
        writer.write_all(bytemuck::cast_slice(scratch.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_invalid_format() {
        let dir = tempdir().unwrap();
        for format in [Format::AUTO_DETECT, Format::UNKNOWN] {
            let err = StreamWriter::<f32>::open(dir.path().join("x.bin"), 4, format).err().unwrap();
            assert!(matches!(err, DatasetError::InvalidFormat(_)));
        }
    }

    #[test]
    fn test_default_header_width() {
        let dir = tempdir().unwrap();
        let writer = StreamWriter::<u8>::open(dir.path().join("x.bin"), 4, Format::VECS).unwrap();
        assert_eq!(writer.format(), Container::Vecs | HeaderWidth::U32);
    }

    #[test]
    fn test_bigann_header_rewritten_each_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("base.u8bin");

        let mut writer = StreamWriter::<u8>::open(&path, 2, Format::BIGANN).unwrap();
        // valid, empty dataset before the first append
        writer.flush().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0, 0, 0, 0, 2, 0, 0, 0]);

        writer.append(&[1, 2, 3, 4], 2, 2).unwrap();
        writer.flush().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], &[2, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(&bytes[8..], &[1, 2, 3, 4]);

        writer.append(&[5, 6], 2, 1).unwrap();
        assert_eq!(writer.close().unwrap(), 3);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, vec![3, 0, 0, 0, 2, 0, 0, 0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_vecs_layout_with_stride() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("base.bvecs");

        // stride 3, only the first 2 columns are stored
        let source = [1u8, 2, 99, 3, 4, 99];
        let mut writer = StreamWriter::<u8>::open(&path, 2, Container::Vecs | HeaderWidth::U64).unwrap();
        writer.append(&source, 3, 2).unwrap();
        writer.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(
            bytes,
            vec![2, 0, 0, 0, 0, 0, 0, 0, 1, 2, 2, 0, 0, 0, 0, 0, 0, 0, 3, 4]
        );
    }

    #[test]
    fn test_source_too_short() {
        let dir = tempdir().unwrap();
        let mut writer = StreamWriter::<f32>::open(dir.path().join("x.fbin"), 4, Format::BIGANN).unwrap();
        let err = writer.append(&[0.0; 7], 4, 2).unwrap_err();
        assert!(matches!(err, DatasetError::BufferTooSmall { required: 8, actual: 7 }));
        let err = writer.append(&[0.0; 8], 3, 2).unwrap_err();
        assert!(matches!(err, DatasetError::BufferTooSmall { .. }));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_store_validates_before_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.fbin");
        let err = store(&path, 3, 4, &[0.0f32; 11], Format::BIGANN).unwrap_err();
        assert!(matches!(err, DatasetError::BufferTooSmall { required: 12, actual: 11 }));
        assert!(!path.exists());

        // an existing file is left alone
        store(&path, 1, 4, &[1.0f32; 4], Format::BIGANN).unwrap();
        let before = std::fs::read(&path).unwrap();
        assert!(store(&path, 2, 4, &[0.0f32; 4], Format::BIGANN).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_record_count_overflows_u32_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.bin");
        let too_many = u32::MAX as usize + 1;

        // zero-dimensional records need no source elements
        let mut writer = StreamWriter::<u8>::open(&path, 0, Format::BIGANN).unwrap();
        let err = writer.append(&[], 0, too_many).unwrap_err();
        assert!(matches!(err, DatasetError::HeaderOverflow { value, .. } if value == too_many));
        assert!(writer.is_empty());

        // the one-shot store refuses it up front
        let err = store::<u8>(&path, too_many, 0, &[], Format::BIGANN).unwrap_err();
        assert!(matches!(err, DatasetError::HeaderOverflow { .. }));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_dimension_overflows_u32_header() {
        let dir = tempdir().unwrap();
        let dim = u32::MAX as usize + 1;
        let err = StreamWriter::<u8>::open(dir.path().join("x.bin"), dim, Format::BIGANN).err().unwrap();
        assert!(matches!(err, DatasetError::HeaderOverflow { .. }));
    }
}
