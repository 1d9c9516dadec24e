//! Scalar element types stored in dataset files
//!
//! The set is closed: `i8`, `u8`, `i32`, `u32` and `f32`. Generic code is
//! written against [`Element`]; the CLI and the Python shim pick an
//! instantiation at runtime through [`ElementType`].

use std::fmt;
use std::str::FromStr;

use bytemuck::Pod;

mod sealed {
    pub trait Sealed {}
}

/// Runtime tag for an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I8,
    U8,
    I32,
    U32,
    F32,
}

impl ElementType {
    pub const ALL: [ElementType; 5] = [
        ElementType::I8,
        ElementType::U8,
        ElementType::I32,
        ElementType::U32,
        ElementType::F32,
    ];

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::I8 => "i8",
            ElementType::U8 => "u8",
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::F32 => "f32",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "i8" | "int8" => Ok(ElementType::I8),
            "u8" | "uint8" => Ok(ElementType::U8),
            "i32" | "int32" => Ok(ElementType::I32),
            "u32" | "uint32" => Ok(ElementType::U32),
            "f32" | "float" | "float32" => Ok(ElementType::F32),
            _ => Err(format!(
                "Unknown element type '{}'. Use i8, u8, i32, u32 or f32",
                s
            )),
        }
    }
}

/// A scalar type that can be stored in a dataset file
///
/// Implementations exist only for the closed set listed in [`ElementType`].
pub trait Element: Pod + PartialOrd + fmt::Debug + Send + Sync + sealed::Sealed {
    const TYPE: ElementType;

    /// Lossless widening used by the statistics reporter
    fn to_f64(self) -> f64;

    /// Convert a value read from disk (little-endian) to native order
    fn from_le(self) -> Self;

    /// Convert a native value to on-disk (little-endian) order
    fn to_le(self) -> Self;
}

macro_rules! impl_byte_element {
    ($($t:ty => $tag:ident),*) => {$(
        impl sealed::Sealed for $t {}
        impl Element for $t {
            const TYPE: ElementType = ElementType::$tag;
            #[inline]
            fn to_f64(self) -> f64 { self as f64 }
            #[inline]
            fn from_le(self) -> Self { self }
            #[inline]
            fn to_le(self) -> Self { self }
        }
    )*};
}

macro_rules! impl_word_element {
    ($($t:ty => $tag:ident),*) => {$(
        impl sealed::Sealed for $t {}
        impl Element for $t {
            const TYPE: ElementType = ElementType::$tag;
            #[inline]
            fn to_f64(self) -> f64 { self as f64 }
            #[inline]
            fn from_le(self) -> Self { <$t>::from_le(self) }
            #[inline]
            fn to_le(self) -> Self { <$t>::to_le(self) }
        }
    )*};
}

impl_byte_element!(i8 => I8, u8 => U8);
impl_word_element!(i32 => I32, u32 => U32);

impl sealed::Sealed for f32 {}
impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_le(self) -> Self {
        f32::from_bits(u32::from_le(self.to_bits()))
    }
    #[inline]
    fn to_le(self) -> Self {
        f32::from_bits(self.to_bits().to_le())
    }
}

/// `as`-style conversion between two element types
///
/// Integer narrowing wraps, float to integer saturates.
pub trait CastInto<M: Element>: Element {
    fn cast_into(self) -> M;
}

macro_rules! impl_cast_row {
    ($src:ty => $($dst:ty),*) => {$(
        impl CastInto<$dst> for $src {
            #[inline]
            fn cast_into(self) -> $dst { self as $dst }
        }
    )*};
}

impl<T: Element> CastInto<T> for T {
    #[inline]
    fn cast_into(self) -> T {
        self
    }
}

impl_cast_row!(i8 => u8, i32, u32, f32);
impl_cast_row!(u8 => i8, i32, u32, f32);
impl_cast_row!(i32 => i8, u8, u32, f32);
impl_cast_row!(u32 => i8, u8, i32, f32);
impl_cast_row!(f32 => i8, u8, i32, u32);

/// Run `$body` with `$t` bound to the Rust type named by an [`ElementType`].
///
/// ```ignore
/// let shape = dispatch_element!(dtype, T => inspect::<T>(&path, Format::AUTO_DETECT))?;
/// ```
#[macro_export]
macro_rules! dispatch_element {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::ElementType::I8 => {
                type $t = i8;
                $body
            }
            $crate::ElementType::U8 => {
                type $t = u8;
                $body
            }
            $crate::ElementType::I32 => {
                type $t = i32;
                $body
            }
            $crate::ElementType::U32 => {
                type $t = u32;
                $body
            }
            $crate::ElementType::F32 => {
                type $t = f32;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("float".parse::<ElementType>().unwrap(), ElementType::F32);
        assert_eq!("int8".parse::<ElementType>().unwrap(), ElementType::I8);
        assert_eq!("UINT8".parse::<ElementType>().unwrap(), ElementType::U8);
        assert_eq!("u32".parse::<ElementType>().unwrap(), ElementType::U32);
        assert!("f64".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_sizes_match_rust_types() {
        assert_eq!(ElementType::I8.size(), std::mem::size_of::<i8>());
        assert_eq!(ElementType::U32.size(), std::mem::size_of::<u32>());
        assert_eq!(<f32 as Element>::TYPE.size(), std::mem::size_of::<f32>());
    }

    #[test]
    fn test_casts_follow_as_semantics() {
        let a: u8 = CastInto::<u8>::cast_into(-1i8);
        assert_eq!(a, 255);
        let b: i8 = CastInto::<i8>::cast_into(300i32);
        assert_eq!(b, 44);
        let c: u8 = CastInto::<u8>::cast_into(1000.0f32);
        assert_eq!(c, 255);
        let d: f32 = CastInto::<f32>::cast_into(127u8);
        assert_eq!(d, 127.0);
    }

    fn same_type<T: Element>(values: &[T]) -> Vec<T> {
        values.iter().map(|&v| CastInto::<T>::cast_into(v)).collect()
    }

    #[test]
    fn test_identity_cast_for_any_element() {
        assert_eq!(same_type(&[-3i8, 4]), vec![-3i8, 4]);
        assert_eq!(same_type(&[u32::MAX]), vec![u32::MAX]);
        assert_eq!(same_type(&[1.5f32, -0.25]), vec![1.5f32, -0.25]);
    }

    #[test]
    fn test_dispatch_element() {
        for dtype in ElementType::ALL {
            let size = dispatch_element!(dtype, T => std::mem::size_of::<T>());
            assert_eq!(size, dtype.size());
        }
    }
}
