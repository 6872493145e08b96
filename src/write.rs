//! Everything related to writing a PLY file.
//!
//! # Random notes on the format
//!
//! - The header always ends its lines with `'\n'` and uses version `1.0`.
//! - For ASCII encoding we simply use the `fmt::Display` impl of all types.
//!   Every value it produces is parsed back to the same value by `FromStr`.
//! - List properties are always written with the same length in every row.

use std::{
    borrow::Cow,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use byteorder::{BigEndian, LittleEndian, NativeEndian};
use log::{debug, trace};
use num_traits::NumCast;

use crate::{
    Error, Format, PlyScalar, ScalarType,
    ascii::AsciiEncoder,
    binary::BinaryEncoder,
    body::Encoder,
    header::{ElementDef, Header, PropertyDef, PropertyType},
};



// ===============================================================================================
// ===== PLY Config
// ===============================================================================================

/// Used to configure and create a [`Writer`].
///
/// This is used to configure basic settings for the file to be written. Most
/// importantly, this is the file format. Additionally, you can add comments
/// and `obj_info` lines to the file header.
#[derive(Clone, Debug)]
pub struct Config {
    format: Format,
    comments: Vec<String>,
    obj_info: Vec<String>,
}

impl Config {
    /// Creates a new configuration with binary encoding (native endianness).
    pub fn binary() -> Self {
        Self::new(Format::binary_native())
    }

    /// Creates a new configuration with ASCII encoding.
    ///
    /// ASCII encoding is usually a lot less space efficient and a lot slower
    /// to read and write. Therefore you should prefer binary encoding where
    /// possible. The PLY file header is always ASCII.
    pub fn ascii() -> Self {
        Self::new(Format::Ascii)
    }

    /// Creates a new configuration with the given format.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            comments: vec![],
            obj_info: vec![],
        }
    }

    /// Adds a `comment` line to the file header.
    ///
    /// The given string must not contain `'\n'`, otherwise writing fails with
    /// `Error::InvalidBinding`.
    pub fn add_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    /// Adds an `obj_info` line to the file header. Same rules as for
    /// [`Config::add_comment`] apply.
    pub fn add_obj_info(mut self, info: impl Into<String>) -> Self {
        self.obj_info.push(info.into());
        self
    }

    /// Creates a writer with `self` as configuration.
    pub fn into_writer<'a>(self) -> Writer<'a> {
        Writer {
            config: self,
            elements: vec![],
        }
    }
}


// ===============================================================================================
// ===== PLY Writer
// ===============================================================================================

/// A writer able to write binary and ASCII PLY files.
///
/// Data is handed to the writer as densely packed bytes in native endianness
/// via [`Writer::provide`] and friends. The writer borrows the data until it
/// is dropped. Elements are written in the order in which they were first
/// provided, and properties of an element in the order in which they were
/// provided.
///
/// All data is validated when it is provided, so once the writer has accepted
/// it, writing only fails because of IO errors.
#[derive(Debug)]
pub struct Writer<'a> {
    config: Config,
    elements: Vec<ElementSource<'a>>,
}

#[derive(Debug)]
struct ElementSource<'a> {
    name: String,
    count: usize,
    groups: Vec<PropGroup<'a>>,
}

/// Properties provided with one call. If there is more than one property,
/// the values of each row are interleaved.
#[derive(Debug)]
pub(crate) struct PropGroup<'a> {
    pub(crate) names: Vec<String>,
    pub(crate) ty: ScalarType,

    /// Length type and length of the list in each row.
    pub(crate) list: Option<(ScalarType, usize)>,

    pub(crate) data: Cow<'a, [u8]>,
}

impl<'a> Writer<'a> {
    /// Creates a new PLY writer with the given config.
    pub fn new(config: Config) -> Self {
        config.into_writer()
    }

    pub fn format(&self) -> Format {
        self.config.format
    }

    /// Changes the format of the file to be written.
    pub fn set_format(&mut self, format: Format) -> &mut Self {
        self.config.format = format;
        self
    }

    /// Provides scalar properties of the element `element`. `data` holds
    /// `count` rows of `names.len()` values of type `ty` each (interleaved, in
    /// native endianness).
    pub fn provide(
        &mut self,
        element: &str,
        names: &[&str],
        ty: ScalarType,
        count: usize,
        data: &'a [u8],
    ) -> Result<&mut Self, Error> {
        self.add_group(element, names, ty, None, count, Cow::Borrowed(data))
    }

    /// Provides list properties of the element `element`. Each row contains a
    /// list of exactly `list_len` values of type `ty` for each property. The
    /// length is stored as `len_type` in the file.
    pub fn provide_list(
        &mut self,
        element: &str,
        names: &[&str],
        ty: ScalarType,
        count: usize,
        data: &'a [u8],
        len_type: ScalarType,
        list_len: usize,
    ) -> Result<&mut Self, Error> {
        let list = Some((len_type, list_len));
        self.add_group(element, names, ty, list, count, Cow::Borrowed(data))
    }

    /// Like [`Writer::provide`], but takes typed values. The row count is
    /// `values.len() / names.len()`.
    pub fn provide_values<T: PlyScalar>(
        &mut self,
        element: &str,
        names: &[&str],
        values: &[T],
    ) -> Result<&mut Self, Error> {
        let count = rows_of(values.len(), names.len(), element)?;
        self.add_group(element, names, T::TYPE, None, count, Cow::Owned(to_bytes(values)))
    }

    /// Like [`Writer::provide_list`] for a single property, but takes typed
    /// values. The row count is `values.len() / list_len`.
    pub fn provide_values_list<T: PlyScalar>(
        &mut self,
        element: &str,
        name: &str,
        len_type: ScalarType,
        list_len: usize,
        values: &[T],
    ) -> Result<&mut Self, Error> {
        let count = rows_of(values.len(), list_len, element)?;
        let list = Some((len_type, list_len));
        self.add_group(element, &[name], T::TYPE, list, count, Cow::Owned(to_bytes(values)))
    }

    fn add_group(
        &mut self,
        element: &str,
        names: &[&str],
        ty: ScalarType,
        list: Option<(ScalarType, usize)>,
        count: usize,
        data: Cow<'a, [u8]>,
    ) -> Result<&mut Self, Error> {
        fn invalid<T>(msg: String) -> Result<T, Error> {
            Err(Error::InvalidBinding(msg))
        }

        // ----- Names ------------------------------------------------------
        check_name(element)?;
        if names.is_empty() {
            return invalid(format!("no property names given for element '{}'", element));
        }

        let existing = self.elements.iter().position(|e| e.name == element);
        for (i, &name) in names.iter().enumerate() {
            check_name(name)?;

            let provided_before = existing
                .map(|idx| self.elements[idx].groups.iter().any(|g| g.names.iter().any(|n| n == name)))
                .unwrap_or(false);
            if names[..i].contains(&name) || provided_before {
                return invalid(format!(
                    "property '{}' of element '{}' provided twice",
                    name,
                    element,
                ));
            }
        }

        // ----- List length ------------------------------------------------
        let values_per_row = match list {
            None => 1,
            Some((len_type, list_len)) => {
                if !len_type.is_integer() {
                    return invalid(format!("list length type '{}' is not an integer", len_type));
                }
                if list_len == 0 {
                    return invalid("list length has to be at least 1".into());
                }

                let fits = with_scalar_type!(len_type, |T| <T as NumCast>::from(list_len).is_some());
                if !fits {
                    return invalid(format!(
                        "list length {} does not fit into '{}'",
                        list_len,
                        len_type,
                    ));
                }

                list_len
            }
        };

        // ----- Data size --------------------------------------------------
        let required = count
            .checked_mul(names.len())
            .and_then(|n| n.checked_mul(values_per_row))
            .and_then(|n| n.checked_mul(ty.len()));
        match required {
            Some(required) if required <= data.len() => {}
            _ => return invalid(format!(
                "{} bytes provided for properties {:?} of element '{}', but {} rows need more",
                data.len(),
                names,
                element,
                count,
            )),
        }

        // ----- Row count --------------------------------------------------
        let group = PropGroup {
            names: names.iter().map(|&n| n.to_string()).collect(),
            ty,
            list,
            data,
        };

        match existing {
            Some(idx) => {
                let elem = &mut self.elements[idx];
                if elem.count != count {
                    return Err(Error::RowCountMismatch {
                        element: element.into(),
                        expected: elem.count,
                        found: count,
                    });
                }
                elem.groups.push(group);
            }
            None => self.elements.push(ElementSource {
                name: element.into(),
                count,
                groups: vec![group],
            }),
        }

        Ok(self)
    }

    /// Returns the header that describes all data provided so far.
    pub fn header(&self) -> Header {
        let elements = self.elements.iter().map(|elem| {
            let property_defs = elem.groups.iter()
                .flat_map(|group| {
                    let ty = match group.list {
                        None => PropertyType::Scalar(group.ty),
                        Some((len_type, _)) => PropertyType::List {
                            len_type,
                            scalar_type: group.ty,
                        },
                    };

                    group.names.iter().map(move |name| PropertyDef { ty, name: name.clone() })
                })
                .collect();

            ElementDef {
                name: elem.name.clone(),
                count: elem.count as u64,
                property_defs,
            }
        }).collect();

        Header {
            format: self.config.format,
            version: "1.0".into(),
            comments: self.config.comments.clone(),
            obj_info: self.config.obj_info.clone(),
            elements,
        }
    }

    /// Writes the file to the given `io::Write` instance. For files, you
    /// should use a `BufWriter` (or rather use [`Writer::write_to_file`]).
    pub fn write_to(&self, mut w: impl Write) -> Result<(), Error> {
        for line in self.config.comments.iter().chain(&self.config.obj_info) {
            if line.contains('\n') {
                return Err(Error::InvalidBinding(format!(
                    "header line {:?} must not contain '\\n'",
                    line,
                )));
            }
        }

        // ===================================================================
        // ===== Write header (this part is always ASCII)
        // ===================================================================
        let header = self.header();
        debug!(
            "writing PLY file ({:?}): {}",
            header.format,
            header.elements.iter()
                .map(|e| format!("{} x{}", e.name, e.count))
                .collect::<Vec<_>>()
                .join(", "),
        );
        header.write_to(&mut w)?;


        // ===================================================================
        // ===== Write body
        // ===================================================================
        match self.config.format {
            Format::Ascii => self.write_body(&mut AsciiEncoder::new(&mut w))?,
            Format::BinaryBigEndian => {
                self.write_body(&mut BinaryEncoder::<_, BigEndian>::new(&mut w))?;
            }
            Format::BinaryLittleEndian => {
                self.write_body(&mut BinaryEncoder::<_, LittleEndian>::new(&mut w))?;
            }
        }

        w.flush()?;
        Ok(())
    }

    /// Creates the file at `path` (truncating it if it exists) and writes to
    /// it.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    pub fn write_to_stdout(&self) -> Result<(), Error> {
        let stdout = io::stdout();
        let lock = stdout.lock();
        self.write_to(lock)
    }

    /// Writes the file into a new `Vec<u8>`.
    pub fn write_to_memory(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    fn write_body(&self, encoder: &mut impl Encoder) -> Result<(), Error> {
        for elem in &self.elements {
            encoder.encode_element(elem.count, &elem.groups)?;
            trace!("encoded PLY element '{}' ({} rows)", elem.name, elem.count);
        }

        Ok(())
    }
}

/// Element and property names end up as words in the header.
fn check_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(Error::InvalidBinding(format!(
            "{:?} is not a valid PLY name (must be non-empty and without whitespace)",
            name,
        )));
    }

    Ok(())
}

fn rows_of(num_values: usize, per_row: usize, element: &str) -> Result<usize, Error> {
    if per_row == 0 || num_values % per_row != 0 {
        return Err(Error::InvalidBinding(format!(
            "{} values for element '{}' cannot be split into rows of {} values",
            num_values,
            element,
            per_row,
        )));
    }

    Ok(num_values / per_row)
}

fn to_bytes<T: PlyScalar>(values: &[T]) -> Vec<u8> {
    let len = T::TYPE.len();
    let mut out = vec![0; values.len() * len];
    for (&v, chunk) in values.iter().zip(out.chunks_exact_mut(len)) {
        v.write::<NativeEndian>(chunk);
    }

    out
}
