//! The closed set of scalar types a PLY property can have.

use std::{
    error,
    fmt,
    str::FromStr,
};

use byteorder::ByteOrder;
use num_traits::{NumCast, ToPrimitive};


/// A primitive PLY type. There are 10 in total: 2 floating point types and
/// signed and unsigned integers with 8, 16, 32 and 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
}

impl ScalarType {
    /// All scalar types.
    pub const ALL: [ScalarType; 10] = [
        ScalarType::Char,
        ScalarType::UChar,
        ScalarType::Short,
        ScalarType::UShort,
        ScalarType::Int,
        ScalarType::UInt,
        ScalarType::Long,
        ScalarType::ULong,
        ScalarType::Float,
        ScalarType::Double,
    ];

    /// Returns the number of bytes this type occupies.
    pub fn len(&self) -> usize {
        match self {
            ScalarType::Char | ScalarType::UChar => 1,
            ScalarType::Short | ScalarType::UShort => 2,
            ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
            ScalarType::Long | ScalarType::ULong | ScalarType::Double => 8,
        }
    }

    /// Returns the canonical type name used in the header (e.g. `short` for
    /// `i16`).
    pub fn ply_type_name(&self) -> &'static str {
        match self {
            ScalarType::Char => "char",
            ScalarType::UChar => "uchar",
            ScalarType::Short => "short",
            ScalarType::UShort => "ushort",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Long => "int64",
            ScalarType::ULong => "uint64",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    /// Returns `true` if and only if the type is either `float` or `double`.
    pub fn is_floating_point(&self) -> bool {
        *self == ScalarType::Float || *self == ScalarType::Double
    }

    /// Returns `true` if and only if the type is one of `uchar`, `ushort`,
    /// `uint` or `uint64`.
    pub fn is_unsigned_integer(&self) -> bool {
        match self {
            ScalarType::UChar | ScalarType::UShort | ScalarType::UInt | ScalarType::ULong => true,
            _ => false,
        }
    }

    /// Returns `true` if and only if the type is one of `char`, `short`, `int`
    /// or `int64`.
    pub fn is_signed_integer(&self) -> bool {
        match self {
            ScalarType::Char | ScalarType::Short | ScalarType::Int | ScalarType::Long => true,
            _ => false,
        }
    }

    pub fn is_integer(&self) -> bool {
        !self.is_floating_point()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.ply_type_name().fmt(f)
    }
}

/// The error emitted when the `FromStr` implementation for `ScalarType` cannot
/// parse the given string.
#[derive(Clone, PartialEq, Eq)]
pub struct ScalarTypeParseError(pub String);

impl fmt::Display for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\" is not a valid PLY scalar type", self.0)
    }
}

impl fmt::Debug for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl error::Error for ScalarTypeParseError {}

impl FromStr for ScalarType {
    type Err = ScalarTypeParseError;

    /// Parses canonical type names and the sized aliases (`int8`, `float32`,
    /// ...) that many exporters write instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "char" | "int8" => Ok(ScalarType::Char),
            "uchar" | "uint8" => Ok(ScalarType::UChar),
            "short" | "int16" => Ok(ScalarType::Short),
            "ushort" | "uint16" => Ok(ScalarType::UShort),
            "int" | "int32" => Ok(ScalarType::Int),
            "uint" | "uint32" => Ok(ScalarType::UInt),
            "int64" | "long" => Ok(ScalarType::Long),
            "uint64" | "ulong" => Ok(ScalarType::ULong),
            "float" | "float32" => Ok(ScalarType::Float),
            "double" | "float64" => Ok(ScalarType::Double),
            other => Err(ScalarTypeParseError(other.to_string())),
        }
    }
}


mod internal {
    pub trait Sealed {}
}

/// Abstracts over the Rust types corresponding to the PLY scalar types.
///
/// This trait is implemented exactly for `i8`, `u8`, `i16`, `u16`, `i32`,
/// `u32`, `i64`, `u64`, `f32` and `f64`. It's sealed, so you can't implement
/// it for your own types.
pub trait PlyScalar:
    Copy + fmt::Display + FromStr + NumCast + ToPrimitive + internal::Sealed
{
    /// The PLY type of `Self`.
    const TYPE: ScalarType;

    /// Reads a value from the first `Self::TYPE.len()` bytes of `buf`.
    fn read<B: ByteOrder>(buf: &[u8]) -> Self;

    /// Writes `self` into the first `Self::TYPE.len()` bytes of `buf`.
    fn write<B: ByteOrder>(self, buf: &mut [u8]);
}

macro_rules! impl_scalar {
    ($ty:ident, $variant:ident, |$buf:ident| $read:expr, |$wbuf:ident, $v:ident| $write:expr) => {
        impl internal::Sealed for $ty {}
        impl PlyScalar for $ty {
            const TYPE: ScalarType = ScalarType::$variant;

            #[inline(always)]
            fn read<B: ByteOrder>($buf: &[u8]) -> Self {
                $read
            }

            #[inline(always)]
            fn write<B: ByteOrder>(self, $wbuf: &mut [u8]) {
                let $v = self;
                $write
            }
        }
    };
    ($ty:ident, $variant:ident, $read_fn:ident, $write_fn:ident) => {
        impl_scalar!($ty, $variant, |buf| B::$read_fn(buf), |buf, v| B::$write_fn(buf, v));
    };
}

impl_scalar!(i8, Char, |buf| buf[0] as i8, |buf, v| buf[0] = v as u8);
impl_scalar!(u8, UChar, |buf| buf[0], |buf, v| buf[0] = v);
impl_scalar!(i16, Short, read_i16, write_i16);
impl_scalar!(u16, UShort, read_u16, write_u16);
impl_scalar!(i32, Int, read_i32, write_i32);
impl_scalar!(u32, UInt, read_u32, write_u32);
impl_scalar!(i64, Long, read_i64, write_i64);
impl_scalar!(u64, ULong, read_u64, write_u64);
impl_scalar!(f32, Float, read_f32, write_f32);
impl_scalar!(f64, Double, read_f64, write_f64);

/// Evaluates `$body` with `$t` being the Rust type that corresponds to the
/// given `ScalarType`.
macro_rules! with_scalar_type {
    ($ty:expr, |$t:ident| $body:expr) => {
        match $ty {
            $crate::ScalarType::Char => { type $t = i8; $body }
            $crate::ScalarType::UChar => { type $t = u8; $body }
            $crate::ScalarType::Short => { type $t = i16; $body }
            $crate::ScalarType::UShort => { type $t = u16; $body }
            $crate::ScalarType::Int => { type $t = i32; $body }
            $crate::ScalarType::UInt => { type $t = u32; $body }
            $crate::ScalarType::Long => { type $t = i64; $body }
            $crate::ScalarType::ULong => { type $t = u64; $body }
            $crate::ScalarType::Float => { type $t = f32; $body }
            $crate::ScalarType::Double => { type $t = f64; $body }
        }
    };
}
