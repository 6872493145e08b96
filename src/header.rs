//! The PLY header: data model, parser and serializer.
//!
//! # Random notes on the format
//!
//! The PLY format is terribly underspecified. Here are a few notes on how this
//! implementation deals with it:
//!
//! - The specs say "The header is a series of carriage-return terminated
//!   lines", but basically all files in the wild use `'\n'`. We split lines at
//!   `'\n'` and strip a trailing `'\r'`, so both work.
//! - Blank header lines are ignored.
//! - The version in the format line is recorded but not checked. Everyone
//!   writes `1.0` anyway.
//! - `comment` and `obj_info` lines may appear anywhere between the magic line
//!   and `end_header`. Their text starts after the keyword and exactly one
//!   space (or tab); everything else is kept as is.

use std::io::{self, Write};

use log::debug;

use crate::{
    Error, Format, ScalarType,
    parse::{self, Input, debug_fmt_bytes},
};


/// The parsed header of a PLY file.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub format: Format,

    /// The version string from the `format` line (usually `1.0`).
    pub version: String,

    /// All `comment` lines in order (without the `comment` keyword).
    pub comments: Vec<String>,

    /// All `obj_info` lines in order (without the `obj_info` keyword).
    pub obj_info: Vec<String>,

    /// All element groups in the order they are stored in the body.
    pub elements: Vec<ElementDef>,
}

/// The header definition of one element group.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub name: String,

    /// Number of elements (rows) in this group.
    pub count: u64,

    /// Definitions for all properties of elements in this group, in the order
    /// in which they are stored.
    pub property_defs: Vec<PropertyDef>,
}

static_assertions::assert_impl_all!(Header: Send, Sync);

impl ElementDef {
    /// Returns the index of the property with the given name.
    pub fn prop_pos(&self, prop_name: &str) -> Option<usize> {
        self.property_defs.iter().position(|p| p.name == prop_name)
    }
}

/// The header definition of one property of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub ty: PropertyType,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Scalar(ScalarType),
    List {
        len_type: ScalarType,
        scalar_type: ScalarType,
    }
}

impl PropertyType {
    /// The type of the list length or `None` for scalar properties.
    pub fn len_type(&self) -> Option<ScalarType> {
        match self {
            PropertyType::Scalar(_) => None,
            PropertyType::List { len_type, .. } => Some(*len_type),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match *self {
            PropertyType::Scalar(scalar_type) => scalar_type,
            PropertyType::List { scalar_type, .. } => scalar_type,
        }
    }

    pub fn is_list(&self) -> bool {
        self.len_type().is_some()
    }
}

impl Header {
    /// Returns `true` if the body is stored in one of the binary encodings.
    pub fn is_binary(&self) -> bool {
        self.format != Format::Ascii
    }

    /// Returns `true` if the body is stored in binary big endian encoding.
    pub fn is_big_endian(&self) -> bool {
        self.format == Format::BinaryBigEndian
    }

    /// Returns the element group with the given name.
    pub fn element(&self, name: &str) -> Option<&ElementDef> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub(crate) fn element_pos(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Parses the header from `buf`. Afterwards, `buf` is positioned at the
    /// first byte of the body.
    pub(crate) fn parse(buf: &mut impl Input) -> Result<Self, Error> {
        // ===== Magic number ================================================
        // PLY files always start with `ply\n`. A file that does not even
        // start with "ply" is rejected without reading any further.
        let magic_ok = buf.is_next(b"ply").map_err(|e| header_error(e, 1))?
            && next_line(buf, 1)?.map(|l| l.trim() == "ply").unwrap_or(false);
        if !magic_ok {
            return Err(Error::NotAPlyFile);
        }


        // ===== Everything else, line by line ===============================
        let mut format = None;
        let mut comments = Vec::new();
        let mut obj_info = Vec::new();
        let mut elements: Vec<ElementDef> = Vec::new();

        let mut line_no = 1;
        loop {
            line_no += 1;
            let malformed = move |msg: String| Error::MalformedHeader { line: line_no, msg };

            let line = next_line(buf, line_no)?.ok_or_else(|| {
                malformed("unexpected end of file before 'end_header'".into())
            })?;

            let mut words = line.split_whitespace();
            let keyword = match words.next() {
                Some(w) => w,
                None => continue,
            };

            match keyword {
                "end_header" => break,

                // Format line, e.g. `format binary_little_endian 1.0`
                "format" => {
                    if format.is_some() {
                        return Err(malformed("duplicate 'format' line".into()));
                    }

                    let (encoding, version) = match (words.next(), words.next(), words.next()) {
                        (Some(e), Some(v), None) => (e, v),
                        _ => return Err(malformed(
                            "expected 'format <encoding> <version>'".into()
                        )),
                    };

                    let encoding = match encoding {
                        "ascii" => Format::Ascii,
                        "binary_little_endian" => Format::BinaryLittleEndian,
                        "binary_big_endian" => Format::BinaryBigEndian,
                        other => return Err(malformed(format!(
                            "expected \"ascii\", \"binary_little_endian\" or \
                                \"binary_big_endian\", found {:?}",
                            other,
                        ))),
                    };

                    format = Some((encoding, version.to_string()));
                }

                "comment" => comments.push(rest_of_line(&line, "comment")),
                "obj_info" => obj_info.push(rest_of_line(&line, "obj_info")),

                // Element definition, e.g. `element vertex 8`
                "element" => {
                    let (name, count) = match (words.next(), words.next(), words.next()) {
                        (Some(n), Some(c), None) => (n, c),
                        _ => return Err(malformed("expected 'element <name> <count>'".into())),
                    };

                    let count = count.parse::<u64>().map_err(|e| {
                        malformed(format!("invalid integer as element count ({})", e))
                    })?;

                    elements.push(ElementDef {
                        name: name.to_string(),
                        count,
                        property_defs: vec![],
                    });
                }

                // Property definition, e.g. `property float x` or
                // `property list uchar int vertex_index`
                "property" => {
                    // Get last element or error if there wasn't a preceeding
                    // `element` line.
                    let elem = elements.last_mut().ok_or_else(|| {
                        malformed("property definition without preceding element definition"
                            .into())
                    })?;

                    let parse_type = move |name: &str| {
                        name.parse::<ScalarType>().map_err(|e| Error::UnknownType {
                            line: line_no,
                            name: e.0,
                        })
                    };

                    let rest: Vec<_> = words.collect();
                    let def = match *rest.as_slice() {
                        ["list", len_type, scalar_type, name] => {
                            let len_type = parse_type(len_type)?;
                            let scalar_type = parse_type(scalar_type)?;

                            // Floating point list lengths don't make any
                            // sense.
                            if !len_type.is_integer() {
                                return Err(malformed(format!(
                                    "only integers can be used to store list lengths \
                                        (property '{}')",
                                    name,
                                )));
                            }

                            PropertyDef {
                                ty: PropertyType::List { len_type, scalar_type },
                                name: name.to_string(),
                            }
                        }
                        ["list", ..] => return Err(malformed(
                            "expected 'property list <len_type> <type> <name>'".into()
                        )),
                        [ty, name] => PropertyDef {
                            ty: PropertyType::Scalar(parse_type(ty)?),
                            name: name.to_string(),
                        },
                        _ => return Err(malformed("expected 'property <type> <name>'".into())),
                    };

                    elem.property_defs.push(def);
                }

                // Something else...
                other => {
                    return Err(malformed(format!(
                        "expected line starting with \"format\", \"comment\", \"obj_info\", \
                            \"element\", \"property\" or \"end_header\", found {:?}",
                        other,
                    )));
                }
            }
        }

        let (format, version) = format.ok_or_else(|| Error::MalformedHeader {
            line: line_no,
            msg: "no 'format' line in header".into(),
        })?;

        let header = Self { format, version, comments, obj_info, elements };
        debug!(
            "parsed PLY header ({:?}): {}",
            header.format,
            header.elements.iter()
                .map(|e| format!("{} x{}", e.name, e.count))
                .collect::<Vec<_>>()
                .join(", "),
        );

        Ok(header)
    }

    /// Writes the header (including the `end_header` line) to `w`.
    pub(crate) fn write_to(&self, w: &mut impl Write) -> Result<(), io::Error> {
        // Magic signature
        w.write_all(b"ply\n")?;

        // The line defining the format of the file
        writeln!(w, "format {} {}", self.format.ply_name(), self.version)?;

        for comment in &self.comments {
            writeln!(w, "comment {}", comment)?;
        }
        for info in &self.obj_info {
            writeln!(w, "obj_info {}", info)?;
        }

        // Define all elements with their properties
        for element_def in &self.elements {
            writeln!(w, "element {} {}", element_def.name, element_def.count)?;
            for prop in &element_def.property_defs {
                match prop.ty {
                    PropertyType::Scalar(ty) => {
                        writeln!(w, "property {} {}", ty.ply_type_name(), prop.name)?;
                    }
                    PropertyType::List { len_type, scalar_type } => {
                        writeln!(
                            w,
                            "property list {} {} {}",
                            len_type.ply_type_name(),
                            scalar_type.ply_type_name(),
                            prop.name,
                        )?;
                    }
                }
            }
        }

        w.write_all(b"end_header\n")
    }
}

/// Reads one header line including the `'\n'` (which is not part of the
/// returned string). A trailing `'\r'` is stripped as well. Returns `None` if
/// the input is already exhausted.
fn next_line(buf: &mut impl Input, line_no: usize) -> Result<Option<String>, Error> {
    if buf.is_eof().map_err(|e| header_error(e, line_no))? {
        return Ok(None);
    }

    let line = buf.take_until(b'\n', |sd| {
        let s = std::str::from_utf8(sd.data).map_err(|_| {
            let len = sd.data.len().min(50); // limit size of error string
            sd.error(format!("header line is not valid UTF-8: {}", debug_fmt_bytes(&sd.data[..len])))
        })?;

        Ok(s.strip_suffix('\r').unwrap_or(s).to_string())
    }).map_err(|e| header_error(e, line_no))?;

    // Consume the linebreak (if the line was not ended by EOF).
    if !buf.is_eof().map_err(|e| header_error(e, line_no))? {
        buf.consume(1);
    }

    Ok(Some(line))
}

/// Returns everything after `keyword` and the single separator following it.
/// The rest is kept verbatim, so that comments survive a round trip.
fn rest_of_line(line: &str, keyword: &str) -> String {
    let rest = &line.trim_start()[keyword.len()..];
    rest.strip_prefix(|c| c == ' ' || c == '\t').unwrap_or(rest).to_string()
}

fn header_error(e: parse::Error, line: usize) -> Error {
    match e {
        parse::Error::Io(e) => Error::Io(e),
        parse::Error::UnexpectedEof(_) => Error::MalformedHeader {
            line,
            msg: "unexpected end of file".into(),
        },
        other => Error::MalformedHeader { line, msg: other.to_string() },
    }
}
