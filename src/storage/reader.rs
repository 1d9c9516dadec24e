//! Size inspection and bulk loading
//!
//! Both resolve the format first (see [`crate::format::resolve`]) and only
//! then touch the payload. `inspect` reads nothing past the header.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::element::{CastInto, Element, ElementType};
use crate::error::{DatasetError, Result};
use crate::format::detect::{resolve_file, Resolved};
use crate::format::layout::{self, Shape};
use crate::format::{Container, Format};
use crate::progress::{NoProgress, Operation, Progress, Ticker};

/// Contiguous block of records. `size == 0` means "up to the end of the file".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub offset: usize,
    pub size: usize,
}

impl Range {
    /// The whole file
    pub const ALL: Range = Range { offset: 0, size: 0 };

    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// Number of records selected from a file of `count` records
    pub fn len_for(&self, count: usize) -> usize {
        if self.size == 0 {
            count.saturating_sub(self.offset)
        } else {
            self.size
        }
    }
}

/// Format request and record range for one load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    pub format: Format,
    pub range: Range,
}

impl LoadOptions {
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }
}

/// Number of records and dimension of the dataset at `path`
///
/// Only the header is read, so the cost does not depend on the file size.
/// An undetectable file is `FormatUnknown`, never an empty shape.
pub fn inspect<T: Element>(path: impl AsRef<Path>, format: Format) -> Result<Shape> {
    inspect_element(path, T::TYPE, format)
}

/// Runtime-typed [`inspect`]
pub fn inspect_element(path: impl AsRef<Path>, elem: ElementType, format: Format) -> Result<Shape> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| DatasetError::from_open(e, path))?;
    Ok(resolve_file(&mut file, path, elem, format)?.shape)
}

/// Load records stored as `T` into `dest` (row-major, stride = dimension).
///
/// Returns the shape of the block that was loaded.
pub fn load<T: Element>(dest: &mut [T], path: impl AsRef<Path>, options: LoadOptions) -> Result<Shape> {
    load_with::<T, T>(dest, path, options, &mut NoProgress)
}

/// Load records stored as `T` into a buffer of `M`, casting every element
pub fn load_as<M: Element, T: CastInto<M>>(
    dest: &mut [M],
    path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<Shape> {
    load_with::<M, T>(dest, path, options, &mut NoProgress)
}

/// [`load_as`] reporting to a progress observer
pub fn load_with<M: Element, T: CastInto<M>>(
    dest: &mut [M],
    path: impl AsRef<Path>,
    options: LoadOptions,
    progress: &mut dyn Progress,
) -> Result<Shape> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| DatasetError::from_open(e, path))?;
    let resolved = resolve_file(&mut file, path, T::TYPE, options.format)?;
    load_resolved::<M, T>(file, &resolved, dest, options.range, progress)
}

/// Allocate a buffer and load into it
pub fn load_vec<T: Element>(path: impl AsRef<Path>, options: LoadOptions) -> Result<(Vec<T>, Shape)> {
    load_vec_with(path, options, &mut NoProgress)
}

pub fn load_vec_with<T: Element>(
    path: impl AsRef<Path>,
    options: LoadOptions,
    progress: &mut dyn Progress,
) -> Result<(Vec<T>, Shape)> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| DatasetError::from_open(e, path))?;
    let resolved = resolve_file(&mut file, path, T::TYPE, options.format)?;

    let n = options.range.len_for(resolved.shape.count);
    let mut data = vec![T::zeroed(); element_count(n, resolved.shape.dim)?];
    let shape = load_resolved::<T, T>(file, &resolved, &mut data, options.range, progress)?;
    Ok((data, shape))
}

fn element_count(records: usize, dim: usize) -> Result<usize> {
    records.checked_mul(dim).ok_or_else(|| {
        DatasetError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} records of dimension {} overflow the address space", records, dim),
        ))
    })
}

fn load_resolved<M: Element, T: CastInto<M>>(
    mut file: File,
    resolved: &Resolved,
    dest: &mut [M],
    range: Range,
    progress: &mut dyn Progress,
) -> Result<Shape> {
    let Shape { count, dim } = resolved.shape;
    let container = resolved.container();
    let width = resolved.width();
    let elem_size = std::mem::size_of::<T>();

    let n = range.len_for(count);
    debug_assert!(
        range.offset.saturating_add(n) <= count,
        "range [{}, {}) exceeds {} records",
        range.offset,
        range.offset + n,
        count
    );

    let required = element_count(n, dim)?;
    if dest.len() < required {
        return Err(DatasetError::BufferTooSmall {
            required,
            actual: dest.len(),
        });
    }
    if n == 0 || dim == 0 {
        return Ok(Shape::new(n, dim));
    }

    tracing::debug!(
        "loading {} records from offset {} (dim = {}, {})",
        n,
        range.offset,
        dim,
        resolved.format
    );

    let start = layout::record_offset(container, width, dim, elem_size, range.offset);
    file.seek(SeekFrom::Start(start))?;
    let mut reader = BufReader::new(file);

    // Only used when the on-disk and in-memory types differ
    let mut scratch: Vec<T> = if M::TYPE == T::TYPE {
        Vec::new()
    } else {
        vec![T::zeroed(); dim]
    };
    let mut dim_field = [0u8; 8];

    progress.begin(Operation::Load, n);
    let ticker = Ticker::new(n);

    for (i, row) in dest[..required].chunks_exact_mut(dim).enumerate() {
        if container == Container::Vecs {
            let field = &mut dim_field[..width.bytes()];
            reader.read_exact(field)?;
            let found = layout::decode_field(field, width);
            if found != dim as u64 {
                return Err(DatasetError::InconsistentDimension {
                    record: range.offset + i,
                    expected: dim,
                    found: found as usize,
                });
            }
        }

        if scratch.is_empty() {
            reader.read_exact(bytemuck::cast_slice_mut(row))?;
            for v in row.iter_mut() {
                *v = v.from_le();
            }
        } else {
            reader.read_exact(bytemuck::cast_slice_mut(&mut scratch[..]))?;
            for (d, s) in row.iter_mut().zip(&scratch) {
                *d = s.from_le().cast_into();
            }
        }

        if ticker.hit(i) {
            progress.advance(Operation::Load, i, n);
        }
    }

    progress.finish(Operation::Load, n);
    Ok(Shape::new(n, dim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::HeaderWidth;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vecs_u32_f32(rows: &[[f32; 3]]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for row in rows {
            file.write_all(&3u32.to_le_bytes()).unwrap();
            for v in row {
                file.write_all(&v.to_le_bytes()).unwrap();
            }
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_inspect_vecs() {
        let file = vecs_u32_f32(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let shape = inspect::<f32>(file.path(), Format::AUTO_DETECT).unwrap();
        assert_eq!(shape, Shape::new(2, 3));
    }

    #[test]
    fn test_load_vecs_range() {
        let file = vecs_u32_f32(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        let mut dest = vec![0.0f32; 3];
        let shape = load(&mut dest, file.path(), LoadOptions::default().range(Range::new(1, 1))).unwrap();
        assert_eq!(shape, Shape::new(1, 3));
        assert_eq!(dest, vec![4.0, 5.0, 6.0]);

        // size 0 runs to the end of the file
        let mut dest = vec![0.0f32; 6];
        load(&mut dest, file.path(), LoadOptions::default().range(Range::new(1, 0))).unwrap();
        assert_eq!(dest, vec![4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_load_as_casts() {
        let file = vecs_u32_f32(&[[1.5, -2.0, 300.0]]);
        let mut dest = vec![0u8; 3];
        load_as::<u8, f32>(&mut dest, file.path(), LoadOptions::default()).unwrap();
        assert_eq!(dest, vec![1, 0, 255]);
    }

    #[test]
    fn test_buffer_too_small() {
        let file = vecs_u32_f32(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let mut dest = vec![0.0f32; 5];
        let err = load(&mut dest, file.path(), LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::BufferTooSmall {
                required: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_inconsistent_record_dimension() {
        let mut file = NamedTempFile::new().unwrap();
        // two u8 records of dim 2, the second one claims dim 9
        file.write_all(&[2, 0, 0, 0, 1, 2, 9, 0, 0, 0, 3, 4]).unwrap();
        file.flush().unwrap();

        let mut dest = vec![0u8; 4];
        let err = load(
            &mut dest,
            file.path(),
            LoadOptions::default().format(Container::Vecs | HeaderWidth::U32),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InconsistentDimension {
                record: 1,
                expected: 2,
                found: 9
            }
        ));
    }

    #[test]
    fn test_missing_file() {
        let mut dest = vec![0u8; 4];
        let err = load(&mut dest, "/nonexistent/base.u8bin", LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::FileNotFound { .. }));
    }

    #[test]
    fn test_undetectable_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        file.flush().unwrap();

        assert!(matches!(
            inspect::<f32>(file.path(), Format::AUTO_DETECT).unwrap_err(),
            DatasetError::FormatUnknown { .. }
        ));
        let mut dest = vec![0.0f32; 4];
        assert!(matches!(
            load(&mut dest, file.path(), LoadOptions::default()).unwrap_err(),
            DatasetError::FormatUnknown { .. }
        ));
    }

    #[test]
    fn test_explicit_format_on_other_layout() {
        let file = vecs_u32_f32(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let bigann = Container::Bigann | HeaderWidth::U64;

        assert!(matches!(
            inspect::<f32>(file.path(), bigann).unwrap_err(),
            DatasetError::FormatUnknown { .. }
        ));
        let mut dest = vec![0.0f32; 6];
        assert!(matches!(
            load(&mut dest, file.path(), LoadOptions::default().format(bigann)).unwrap_err(),
            DatasetError::FormatUnknown { .. }
        ));
        assert!(matches!(
            load_vec::<f32>(file.path(), LoadOptions::default().format(bigann)).unwrap_err(),
            DatasetError::FormatUnknown { .. }
        ));
    }

    #[test]
    fn test_element_count_overflow() {
        assert_eq!(element_count(1000, 15).unwrap(), 15000);
        match element_count(usize::MAX, 2).unwrap_err() {
            DatasetError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidInput),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_vecs_file_with_explicit_format() {
        let file = NamedTempFile::new().unwrap();
        let format = Container::Vecs | HeaderWidth::U32;
        assert_eq!(inspect::<f32>(file.path(), format).unwrap(), Shape::new(0, 0));
        let (data, shape) = load_vec::<f32>(file.path(), LoadOptions::default().format(format)).unwrap();
        assert!(data.is_empty());
        assert!(shape.is_empty());

        // nothing to detect from
        assert!(matches!(
            inspect::<f32>(file.path(), Format::AUTO_DETECT).unwrap_err(),
            DatasetError::FormatUnknown { .. }
        ));
    }
}
