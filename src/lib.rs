//! anns-dataset - Reader and writer for ANN benchmark vector datasets
//!
//! Supports the two layouts used by the common benchmark suites:
//! VECS (`.fvecs` / `.bvecs` / `.ivecs`, dimension repeated per record) and
//! BIGANN (`.fbin` / `.u8bin` / `.i8bin`, a single `(count, dim)` header),
//! each with `u32` or `u64` header fields. The format of a file is detected
//! from its size and its first two header fields.

pub mod element;
pub mod error;
pub mod format;
pub mod merge;
pub mod progress;
pub mod stats;
pub mod storage;

// Python bindings (only compiled with python feature)
#[cfg(feature = "python")]
pub mod python_bindings;

// Re-export commonly used types
pub use element::{CastInto, Element, ElementType};
pub use error::{DatasetError, Result};
pub use format::detect::{detect_element, Resolved};
pub use format::layout::Shape;
pub use format::{detect, detect_with_header, resolve, Container, Format, HeaderWidth};
pub use merge::{merge, MergeSummary};
pub use progress::{LogProgress, NoProgress, Operation, Progress};
pub use stats::DimensionStats;
pub use storage::{
    inspect, inspect_element, load, load_as, load_vec, load_vec_with, load_with, store,
    store_with, LoadOptions, MappedDataset, Range, StreamWriter,
};
