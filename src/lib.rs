//! Reading and writing PLY files (Polygon File Format, also known as Stanford
//! Triangle Format).
//!
//! PLY files consist of an ASCII header that declares a number of *element
//! groups* (e.g. `vertex` or `face`), each with a row count and an ordered
//! list of typed *properties*, followed by a body that stores all rows in
//! either ASCII or binary (little or big endian) encoding.
//!
//! This crate treats the file as structured data: it does not know that `x`,
//! `y` and `z` form a position. You tell the [`Reader`] which properties you
//! are interested in and receive densely packed byte buffers ([`PlyData`]) in
//! native endianness, which you then convert into your own types. Writing
//! works the other way around: you hand byte buffers to a [`Writer`] which
//! generates the header and encodes the body.
//!
//! # Reading
//!
//! ```
//! use loxply::{Error, Reader};
//!
//! # fn main() -> Result<(), Error> {
//! let file = b"ply\n\
//!     format ascii 1.0\n\
//!     element vertex 2\n\
//!     property float x\n\
//!     property float y\n\
//!     end_header\n\
//!     1 2\n\
//!     3 4\n";
//!
//! let mut reader = Reader::from_bytes(file)?;
//! let xy = reader.request("vertex", &["x", "y"])?;
//! reader.read()?;
//!
//! let data = reader.take(xy).unwrap();
//! assert_eq!(data.count(), 2);
//! assert_eq!(data.values::<f32>(), Some(vec![1.0, 2.0, 3.0, 4.0]));
//! # Ok(())
//! # }
//! ```
//!
//! # Writing
//!
//! ```
//! use loxply::{Config, Error, ScalarType};
//!
//! # fn main() -> Result<(), Error> {
//! let positions = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
//! let triangles = [0u32, 1, 2];
//!
//! let mut writer = Config::ascii().add_comment("a single triangle").into_writer();
//! writer.provide_values("vertex", &["x", "y", "z"], &positions)?;
//! writer.provide_values_list("face", "vertex_indices", ScalarType::UChar, 3, &triangles)?;
//!
//! let out = writer.write_to_memory()?;
//! assert!(out.ends_with(b"end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n"));
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    io,
};

use failure::Fail;


#[macro_use]
mod types;

mod ascii;
mod binary;
mod body;
mod header;
mod parse;
mod progress;
mod read;
mod write;



pub use self::{
    header::{ElementDef, Header, PropertyDef, PropertyType},
    progress::ProgressInfo,
    read::{ListRows, PlyData, Reader, RequestId},
    types::{PlyScalar, ScalarType, ScalarTypeParseError},
    write::{Config, Writer},
};


/// The encoding of the body of a PLY file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Ascii,
    BinaryBigEndian,
    BinaryLittleEndian,
}

impl Format {
    /// The binary format with the endianness of the target platform.
    pub fn binary_native() -> Self {
        #[cfg(target_endian = "big")]
        { Format::BinaryBigEndian }

        #[cfg(target_endian = "little")]
        { Format::BinaryLittleEndian }
    }

    /// The name used in the `format` header line.
    pub fn ply_name(&self) -> &'static str {
        match self {
            Format::Ascii => "ascii",
            Format::BinaryBigEndian => "binary_big_endian",
            Format::BinaryLittleEndian => "binary_little_endian",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.ply_name().fmt(f)
    }
}

/// Everything that can go wrong while reading or writing a PLY file.
#[derive(Debug, Fail)]
pub enum Error {
    /// The input does not start with the magic line `ply`.
    #[fail(display = "not a valid PLY file (does not start with \"ply\\n\")")]
    NotAPlyFile,

    /// A header line is out of place or cannot be parsed.
    #[fail(display = "malformed PLY header (line {}): {}", line, msg)]
    MalformedHeader {
        line: usize,
        msg: String,
    },

    /// A property in the header uses a type name that is not known.
    #[fail(display = "unknown PLY type \"{}\" in header (line {})", name, line)]
    UnknownType {
        line: usize,
        name: String,
    },

    /// A request names an element that does not exist in the header.
    #[fail(display = "no element '{}' in PLY header", _0)]
    UnknownElement(String),

    /// A request names a property that does not exist in its element.
    #[fail(display = "element '{}' has no property '{}'", element, property)]
    UnknownProperty {
        element: String,
        property: String,
    },

    /// A request cannot be satisfied by a single result buffer (e.g. the
    /// requested properties have different types).
    #[fail(display = "invalid property request: {}", _0)]
    InvalidRequest(String),

    /// Properties provided for the same element disagree on the number of
    /// rows.
    #[fail(
        display = "row count mismatch for element '{}': properties with {} rows were \
            provided before, but now {} rows were provided",
        element,
        expected,
        found
    )]
    RowCountMismatch {
        element: String,
        expected: usize,
        found: usize,
    },

    /// Data provided for writing is inconsistent (e.g. the buffer is too
    /// small for the given row count).
    #[fail(display = "invalid property data: {}", _0)]
    InvalidBinding(String),

    /// The body ended before all rows declared in the header were read.
    #[fail(display = "unexpected end of PLY body (at byte {})", offset)]
    TruncatedBody {
        offset: usize,
    },

    /// The body contains data that cannot be parsed (e.g. an invalid ASCII
    /// number).
    #[fail(display = "malformed PLY body (at byte {}): {}", offset, msg)]
    MalformedBody {
        offset: usize,
        msg: String,
    },

    /// `Reader::read` was already called.
    #[fail(display = "the body of this PLY file was already read")]
    AlreadyRead,

    #[fail(display = "IO error: {}", _0)]
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Self {
        Error::Io(src)
    }
}

/// Errors from the parse input while reading the body.
impl From<parse::Error> for Error {
    fn from(src: parse::Error) -> Self {
        match src {
            parse::Error::Io(e) => Error::Io(e),
            parse::Error::UnexpectedEof(offset) => Error::TruncatedBody { offset },
            parse::Error::LookAheadTooBig(offset) => Error::MalformedBody {
                offset,
                msg: "value too long".into(),
            },
            parse::Error::NotAscii(span) => Error::MalformedBody {
                offset: span.lo(),
                msg: "unexpected non-ASCII data".into(),
            },
            parse::Error::Custom(msg, span) => Error::MalformedBody {
                offset: span.lo(),
                msg,
            },
        }
    }
}
