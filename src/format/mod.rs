//! Dataset file formats
//!
//! # Layouts
//!
//! ```text
//! VECS   : [dim:H][record_0][dim:H][record_1]...        (dim repeated per record)
//! BIGANN : [count:H][dim:H][record_0][record_1]...      (single header)
//! ```
//!
//! `H` is the header field width (`u32` or `u64`, little-endian). The element
//! type of the records is independent of `H`.

pub mod detect;
pub mod layout;

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

pub use detect::{detect, detect_with_header, resolve};
pub use layout::RawHeader;

/// Container kind of a dataset file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Unknown,
    Vecs,
    Bigann,
    /// Request only: ask the reader to detect the container
    AutoDetect,
}

/// Width of the integer header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderWidth {
    U32,
    U64,
}

impl HeaderWidth {
    /// Detection order when the width is not given
    pub const PROBE_ORDER: [HeaderWidth; 2] = [HeaderWidth::U32, HeaderWidth::U64];

    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            HeaderWidth::U32 => 4,
            HeaderWidth::U64 => 8,
        }
    }

    /// Largest value a header field of this width can hold
    pub fn max_value(self) -> u64 {
        match self {
            HeaderWidth::U32 => u32::MAX as u64,
            HeaderWidth::U64 => u64::MAX,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HeaderWidth::U32 => "u32",
            HeaderWidth::U64 => "u64",
        }
    }
}

/// Format descriptor: container kind plus (optional) header width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    container: Container,
    header: Option<HeaderWidth>,
}

impl Format {
    pub const UNKNOWN: Format = Format::new(Container::Unknown, None);
    pub const AUTO_DETECT: Format = Format::new(Container::AutoDetect, None);
    pub const VECS: Format = Format::new(Container::Vecs, None);
    pub const BIGANN: Format = Format::new(Container::Bigann, None);

    pub const fn new(container: Container, header: Option<HeaderWidth>) -> Self {
        Self { container, header }
    }

    #[inline]
    pub fn container(&self) -> Container {
        self.container
    }

    #[inline]
    pub fn header(&self) -> Option<HeaderWidth> {
        self.header
    }

    /// Same container, header width replaced
    pub fn with_header(self, header: HeaderWidth) -> Self {
        Self {
            header: Some(header),
            ..self
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.container == Container::Unknown
    }

    /// Both a concrete container and a header width are present
    pub fn is_concrete(&self) -> bool {
        matches!(self.container, Container::Vecs | Container::Bigann) && self.header.is_some()
    }
}

impl Default for Format {
    fn default() -> Self {
        Format::AUTO_DETECT
    }
}

impl From<Container> for Format {
    fn from(container: Container) -> Self {
        Format::new(container, None)
    }
}

impl BitOr<HeaderWidth> for Container {
    type Output = Format;

    fn bitor(self, header: HeaderWidth) -> Format {
        Format::new(self, Some(header))
    }
}

impl BitOr<HeaderWidth> for Format {
    type Output = Format;

    fn bitor(self, header: HeaderWidth) -> Format {
        self.with_header(header)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.container {
            Container::Unknown => return f.write_str("UNKNOWN"),
            Container::AutoDetect => return f.write_str("AUTO_DETECT"),
            Container::Vecs => "VECS",
            Container::Bigann => "BIGANN",
        };
        let header = self.header.map(HeaderWidth::name).unwrap_or("Unknown");
        write!(f, "{}({})", name, header)
    }
}

impl FromStr for Format {
    type Err = String;

    /// Accepts `auto`, `vecs`, `bigann`, optionally suffixed with a header
    /// width: `vecs-u64`, `bigann:u32`, `bigann_u64`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower == "auto-detect" || lower == "auto_detect" {
            return Ok(Format::AUTO_DETECT);
        }
        let (name, width) = match lower.find(|c: char| c == '-' || c == ':' || c == '_') {
            Some(pos) => (&lower[..pos], Some(&lower[pos + 1..])),
            None => (lower.as_str(), None),
        };

        let container = match name {
            "auto" => Container::AutoDetect,
            "vecs" | "fvecs" | "bvecs" | "ivecs" => Container::Vecs,
            "bigann" | "bin" => Container::Bigann,
            _ => return Err(format!("Unknown format '{}'. Use vecs, bigann or auto", s)),
        };

        let header = match width {
            None => None,
            Some("u32") => Some(HeaderWidth::U32),
            Some("u64") => Some(HeaderWidth::U64),
            Some(other) => {
                return Err(format!(
                    "Unknown header width '{}'. Use u32 or u64",
                    other
                ))
            }
        };

        Ok(Format::new(container, header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_project() {
        let f = Container::Bigann | HeaderWidth::U64;
        assert_eq!(f.container(), Container::Bigann);
        assert_eq!(f.header(), Some(HeaderWidth::U64));
        assert!(f.is_concrete());

        let g = Format::VECS | HeaderWidth::U32;
        assert_eq!(g, Container::Vecs | HeaderWidth::U32);
        assert!(!Format::VECS.is_concrete());
    }

    #[test]
    fn test_display() {
        assert_eq!((Container::Bigann | HeaderWidth::U32).to_string(), "BIGANN(u32)");
        assert_eq!((Container::Vecs | HeaderWidth::U64).to_string(), "VECS(u64)");
        assert_eq!(Format::VECS.to_string(), "VECS(Unknown)");
        assert_eq!(Format::UNKNOWN.to_string(), "UNKNOWN");
        assert_eq!(Format::AUTO_DETECT.to_string(), "AUTO_DETECT");
        // header bits are ignored for the non-concrete kinds
        assert_eq!(
            (Container::Unknown | HeaderWidth::U64).to_string(),
            "UNKNOWN"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("bigann".parse::<Format>().unwrap(), Format::BIGANN);
        assert_eq!(
            "vecs-u64".parse::<Format>().unwrap(),
            Container::Vecs | HeaderWidth::U64
        );
        assert_eq!(
            "BIGANN:u32".parse::<Format>().unwrap(),
            Container::Bigann | HeaderWidth::U32
        );
        assert_eq!("auto".parse::<Format>().unwrap(), Format::AUTO_DETECT);
        assert!("hdf5".parse::<Format>().is_err());
        assert!("vecs-u16".parse::<Format>().is_err());
    }

    #[test]
    fn test_header_width() {
        assert_eq!(HeaderWidth::U32.bytes(), 4);
        assert_eq!(HeaderWidth::U64.bytes(), 8);
        assert_eq!(HeaderWidth::U32.max_value(), u32::MAX as u64);
    }
}
