//! Format detection from the file size and the leading header fields

use std::fs::File;
use std::path::Path;

use super::layout::{self, RawHeader, Shape};
use super::{Container, Format, HeaderWidth};
use crate::element::{Element, ElementType};
use crate::error::{DatasetError, Result};

/// A concrete format together with the header it was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub format: Format,
    pub header: RawHeader,
    pub shape: Shape,
}

impl Resolved {
    #[inline]
    pub fn container(&self) -> Container {
        self.format.container()
    }

    #[inline]
    pub fn width(&self) -> HeaderWidth {
        self.header.width
    }
}

/// Detect the format of the dataset at `path`, assuming elements of type
/// `T`. Tries `u32` headers first, then `u64`.
///
/// Returns [`Format::UNKNOWN`] when neither layout fits; only an unopenable
/// file is an error.
pub fn detect<T: Element>(path: impl AsRef<Path>) -> Result<Format> {
    detect_element(path, T::TYPE, None)
}

/// Like [`detect`], but only considers one header width
pub fn detect_with_header<T: Element>(path: impl AsRef<Path>, width: HeaderWidth) -> Result<Format> {
    detect_element(path, T::TYPE, Some(width))
}

/// Runtime-typed detection used by the CLI and the bindings
pub fn detect_element(
    path: impl AsRef<Path>,
    elem: ElementType,
    width: Option<HeaderWidth>,
) -> Result<Format> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| DatasetError::from_open(e, path))?;
    let format = detect_file(&mut file, elem, width)?;
    tracing::debug!("{}: detected format = {}", path.display(), format);
    Ok(format)
}

pub(crate) fn detect_file(
    file: &mut File,
    elem: ElementType,
    width: Option<HeaderWidth>,
) -> Result<Format> {
    let widths: &[HeaderWidth] = match width {
        Some(ref w) => std::slice::from_ref(w),
        None => &HeaderWidth::PROBE_ORDER,
    };

    for &w in widths {
        let header = RawHeader::read(file, w)?;
        // BIGANN wins ties: it is the stricter test
        if header.is_bigann(elem.size()) {
            return Ok(Container::Bigann | w);
        }
        if header.is_vecs(elem.size()) {
            return Ok(Container::Vecs | w);
        }
    }
    Ok(Format::UNKNOWN)
}

/// Turn a requested format into a concrete one and compute the shape.
///
/// * `AutoDetect` / `Unknown`: detect, honouring a header width if given.
/// * concrete container and width: used as-is.
/// * concrete container, no width: the first width under which the file is
///   consistent with that container.
pub fn resolve(path: impl AsRef<Path>, elem: ElementType, requested: Format) -> Result<Resolved> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| DatasetError::from_open(e, path))?;
    resolve_file(&mut file, path, elem, requested)
}

pub(crate) fn resolve_file(
    file: &mut File,
    path: &Path,
    elem: ElementType,
    requested: Format,
) -> Result<Resolved> {
    let unknown = || DatasetError::FormatUnknown {
        path: path.to_path_buf(),
    };

    let format = match (requested.container(), requested.header()) {
        (Container::AutoDetect | Container::Unknown, width) => {
            let detected = detect_file(file, elem, width)?;
            if detected.is_unknown() {
                return Err(unknown());
            }
            detected
        }
        (_, Some(_)) => requested,
        (container, None) => {
            let mut found = None;
            for w in HeaderWidth::PROBE_ORDER {
                let header = RawHeader::read(file, w)?;
                let fits = match container {
                    Container::Bigann => header.is_bigann(elem.size()),
                    _ => header.is_vecs(elem.size()),
                };
                if fits {
                    found = Some(container | w);
                    break;
                }
            }
            found.ok_or_else(unknown)?
        }
    };

    let width = format.header().unwrap_or(HeaderWidth::U32);
    let header = RawHeader::read(file, width)?;
    let shape = header
        .shape(format.container(), elem.size())
        .ok_or_else(unknown)?;

    // An explicit format is taken on trust; its header must still describe
    // records that lie inside the file
    let inside = layout::extent(format.container(), width, shape, elem.size())
        .map_or(false, |end| end <= header.file_size);
    if !inside {
        tracing::debug!(
            "{}: {} header claims {} x {} records, file has {} bytes",
            path.display(),
            format,
            shape.count,
            shape.dim,
            header.file_size
        );
        return Err(unknown());
    }

    tracing::debug!(
        "{}: format = {}{} count = {} dim = {}",
        path.display(),
        format,
        if requested.container() == Container::AutoDetect { " (auto detected)" } else { "" },
        shape.count,
        shape.dim
    );

    Ok(Resolved {
        format,
        header,
        shape,
    })
}
