//! Python bindings using PyO3
//!
//! Exposes `load`, `store`, `get_shape` and `detect` for the five element
//! types. Datasets cross the boundary as 2-D numpy arrays `(count, dim)`.
//!
//! Build with: maturin develop --release --features python
//! Import in Python: import anns_dataset

#![cfg(feature = "python")]

use std::borrow::Cow;

use numpy::ndarray::{Array2, ArrayView2};
use numpy::{IntoPyArray, PyReadonlyArray2};
use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::dispatch_element;
use crate::element::{Element, ElementType};
use crate::error::DatasetError;
use crate::format::layout::Shape;
use crate::format::Format;
use crate::progress::{LogProgress, NoProgress, Progress};
use crate::storage::{self, LoadOptions};

fn to_py_err(err: DatasetError) -> PyErr {
    match err {
        DatasetError::FileNotFound { .. } => PyFileNotFoundError::new_err(err.to_string()),
        DatasetError::FormatUnknown { .. }
        | DatasetError::InvalidFormat(_)
        | DatasetError::BufferTooSmall { .. }
        | DatasetError::HeaderOverflow { .. } => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn parse_dtype(dtype: &str) -> PyResult<ElementType> {
    dtype.parse::<ElementType>().map_err(PyValueError::new_err)
}

fn observer(log: bool, label: &str) -> Box<dyn Progress> {
    if log {
        Box::new(LogProgress::new(label.to_string()))
    } else {
        Box::new(NoProgress)
    }
}

/// Row-major `(count, dim)` array over loaded records
fn to_array2<T: Element>(data: Vec<T>, shape: Shape) -> PyResult<Array2<T>> {
    Array2::from_shape_vec((shape.count, shape.dim), data)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Contiguous row-major elements of `view`, copied only when the array is
/// strided or column-major
fn row_major<'a, T: Element>(view: &'a ArrayView2<'a, T>) -> Cow<'a, [T]> {
    match view.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(view.iter().copied().collect()),
    }
}

fn load_array<T: Element + numpy::Element>(py: Python<'_>, path: &str, log: bool) -> PyResult<PyObject> {
    let (data, shape) = py
        .allow_threads(|| {
            let mut progress = observer(log, path);
            storage::load_vec_with::<T>(path, LoadOptions::default(), progress.as_mut())
        })
        .map_err(to_py_err)?;

    Ok(to_array2(data, shape)?.into_pyarray(py).to_object(py))
}

fn store_array<T: Element + numpy::Element>(
    py: Python<'_>,
    path: &str,
    array: PyReadonlyArray2<'_, T>,
    format: Format,
    log: bool,
) -> PyResult<()> {
    let view = array.as_array();
    let (count, dim) = view.dim();
    let data = row_major(&view);

    py.allow_threads(|| {
        let mut progress = observer(log, path);
        storage::store_with(path, count, dim, &data, format, progress.as_mut())
    })
    .map_err(to_py_err)
}

/// Load a dataset as a 2-D numpy array of shape (count, dim)
///
/// Args:
///     path: Dataset file (VECS or BIGANN, detected automatically)
///     dtype: Element type - "i8", "u8", "i32", "u32" or "f32"
///     log: Log progress through the tracing subscriber (default: False)
#[pyfunction]
#[pyo3(signature = (path, dtype, log=false))]
fn load(py: Python, path: &str, dtype: &str, log: bool) -> PyResult<PyObject> {
    let dtype = parse_dtype(dtype)?;
    dispatch_element!(dtype, T => load_array::<T>(py, path, log))
}

/// Store a 2-D numpy array of shape (count, dim)
///
/// Args:
///     path: Output file (truncated)
///     data: 2-D array of int8, uint8, int32, uint32 or float32
///     format: "vecs", "bigann", optionally with ":u32" / ":u64" (default: "bigann")
///     dtype: Element type; taken from the array when omitted
///     log: Log progress through the tracing subscriber (default: False)
#[pyfunction]
#[pyo3(signature = (path, data, format="bigann", dtype=None, log=false))]
fn store(
    py: Python,
    path: &str,
    data: &PyAny,
    format: &str,
    dtype: Option<&str>,
    log: bool,
) -> PyResult<()> {
    let format = format.parse::<Format>().map_err(PyValueError::new_err)?;

    let candidates = match dtype {
        Some(name) => vec![parse_dtype(name)?],
        None => ElementType::ALL.to_vec(),
    };
    for dtype in candidates {
        let stored = dispatch_element!(dtype, T => match data.extract::<PyReadonlyArray2<T>>() {
            Ok(array) => Some(store_array::<T>(py, path, array, format, log)),
            Err(_) => None,
        });
        if let Some(result) = stored {
            return result;
        }
    }

    Err(PyValueError::new_err(format!(
        "data must be a 2-D numpy array of {}",
        dtype.unwrap_or("int8, uint8, int32, uint32 or float32")
    )))
}

/// Return (record_count, dimension) without reading the payload
#[pyfunction]
fn get_shape(path: &str, dtype: &str) -> PyResult<(usize, usize)> {
    let dtype = parse_dtype(dtype)?;
    let shape = storage::inspect_element(path, dtype, Format::AUTO_DETECT).map_err(to_py_err)?;
    Ok((shape.count, shape.dim))
}

/// Detect the format of a file, e.g. "BIGANN(u32)"
#[pyfunction]
fn detect(path: &str, dtype: &str) -> PyResult<String> {
    let dtype = parse_dtype(dtype)?;
    let format = crate::format::detect_element(path, dtype, None).map_err(to_py_err)?;
    Ok(format.to_string())
}

/// Python module definition
#[pymodule]
fn anns_dataset(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(load, m)?)?;
    m.add_function(wrap_pyfunction!(store, m)?)?;
    m.add_function(wrap_pyfunction!(get_shape, m)?)?;
    m.add_function(wrap_pyfunction!(detect, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
