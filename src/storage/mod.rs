//! Reading and writing dataset files
//!
//! - [`reader`]: size inspection and bulk loads (whole file or a record range)
//! - [`writer`]: streaming appends and one-shot stores
//! - [`mmap`]: zero-copy random access to records

pub mod mmap;
pub mod reader;
pub mod writer;

pub use mmap::MappedDataset;
pub use reader::{
    inspect, inspect_element, load, load_as, load_vec, load_vec_with, load_with, LoadOptions, Range,
};
pub use writer::{store, store_with, StreamWriter};
