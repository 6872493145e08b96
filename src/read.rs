use std::{
    convert::TryFrom,
    fmt,
    fs::File,
    io::Read,
    mem,
    path::Path,
    slice,
};

use byteorder::{BigEndian, LittleEndian, NativeEndian};
use derive_more::Display;
use log::{debug, trace};
use smallvec::SmallVec;

use crate::{
    Error, Format, PlyScalar, ProgressInfo, ScalarType,
    ascii::AsciiDecoder,
    binary::BinaryDecoder,
    body::{Decoder, Targets},
    header::{ElementDef, Header},
    parse::{Input, buf::Buffer},
    progress::Progress,
};


/// Requests never reserve more than this many bytes up front. Counts in the
/// header are untrusted: buffers for bigger data grow while decoding, i.e.
/// only as far as the file actually contains data.
pub(crate) const MAX_EAGER_RESERVE: u64 = 256 * 1024 * 1024;


// ===========================================================================
// ===== Definition of `Reader`
// ===========================================================================

/// A reader able to read PLY files.
///
/// Reading happens in three steps:
///
/// 1. Create a reader with [`Reader::open`], [`Reader::from_bytes`] or
///    [`Reader::new`]. This parses the header, which you can then inspect via
///    [`Reader::header`].
/// 2. Say which properties you are interested in with [`Reader::request`].
///    Each request returns a [`RequestId`].
/// 3. Call [`Reader::read`], which decodes the whole body in one pass. After
///    that, the data can be obtained with [`Reader::data`] or
///    [`Reader::take`].
pub struct Reader<R: Read> {
    buf: Buffer<R>,
    header: Header,

    /// `requests[i]` produces `results[i]`. They are stored separately so
    /// that the decoders can get all result buffers as one slice.
    requests: Vec<Request>,
    results: Vec<PlyData>,

    progress: Option<Progress>,
    input_len: Option<u64>,
    body_read: bool,
}

/// Identifies a request made with [`Reader::request`]. Only meaningful for
/// the reader that returned it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display(fmt = "request #{}", _0)]
pub struct RequestId(usize);

#[derive(Debug)]
struct Request {
    /// Index of the element in the header.
    element: usize,

    /// Indices of the requested properties in header order.
    props: SmallVec<[usize; 4]>,

    /// Whether all rows of the element have been decoded.
    complete: bool,
}

impl Reader<File> {
    /// Tries to open the file specified by the given path and creates a new
    /// `Reader` from that file. The file size is used for progress reporting.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        // We don't need a `BufReader` here, because we will use our internal
        // parse buffer anyway.
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(file)?.with_input_len(len))
    }
}

impl<'a> Reader<&'a [u8]> {
    /// Creates a reader for a file that is already completely in memory.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, Error> {
        Ok(Self::new(bytes)?.with_input_len(bytes.len() as u64))
    }
}

impl<R: Read> Reader<R> {
    /// Creates a new `Reader` from the given `io::Read` instance and parses
    /// the header of the given input.
    ///
    /// If you want to open a file, rather use [`Reader::open`].
    pub fn new(reader: R) -> Result<Self, Error> {
        let mut buf = Buffer::new(reader);
        let header = Header::parse(&mut buf)?;

        Ok(Self {
            buf,
            header,
            requests: Vec::new(),
            results: Vec::new(),
            progress: None,
            input_len: None,
            body_read: false,
        })
    }

    /// Sets the total input size in bytes, which is then passed to the
    /// progress callback.
    pub fn with_input_len(mut self, len: u64) -> Self {
        self.input_len = Some(len);
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn format(&self) -> Format {
        self.header.format
    }

    pub fn comments(&self) -> &[String] {
        &self.header.comments
    }

    pub fn obj_info(&self) -> &[String] {
        &self.header.obj_info
    }

    pub fn elements(&self) -> &[ElementDef] {
        &self.header.elements
    }

    /// Requests the given properties of the given element. Equivalent to
    /// `request_with_hint(element, names, 0)`.
    pub fn request(&mut self, element: &str, names: &[&str]) -> Result<RequestId, Error> {
        self.request_with_hint(element, names, 0)
    }

    /// Requests the given properties of the given element. After
    /// [`Reader::read`], their values are available as one [`PlyData`].
    ///
    /// All properties need to have the same type. If more than one property
    /// is requested, the values of each row are stored interleaved, in the
    /// order in which the properties appear in the header (not in the order
    /// of `names`). A list property can only be requested on its own;
    /// `list_size_hint` is the expected number of values per list and is
    /// used to reserve memory (0 means no reservation).
    ///
    /// A failed request has no effect on other requests.
    pub fn request_with_hint(
        &mut self,
        element: &str,
        names: &[&str],
        list_size_hint: usize,
    ) -> Result<RequestId, Error> {
        if self.body_read {
            return Err(Error::AlreadyRead);
        }

        let (request, data) = resolve(&self.header, element, names, list_size_hint)
            .map_err(|e| {
                debug!("PLY request for {:?} of element '{}' failed: {}", names, element, e);
                e
            })?;

        let id = RequestId(self.requests.len());
        self.requests.push(request);
        self.results.push(data);

        Ok(id)
    }

    /// Sets a callback that is invoked during [`Reader::read`] every time the
    /// number of consumed bytes crosses a multiple of `byte_interval`.
    ///
    /// The check happens after each decoded row. A single row that spans
    /// several multiples (e.g. a huge list) leads to only one invocation, with
    /// the offset of the end of that row.
    pub fn set_progress_callback(
        &mut self,
        byte_interval: u64,
        callback: impl FnMut(ProgressInfo) + 'static,
    ) {
        self.progress = Some(Progress::new(byte_interval, Box::new(callback)));
    }

    /// Decodes the body and fills all requested buffers. Can only be called
    /// once.
    ///
    /// If an error occurs, the data of all elements that were completely
    /// decoded before the error is still available.
    pub fn read(&mut self) -> Result<(), Error> {
        if self.body_read {
            return Err(Error::AlreadyRead);
        }
        self.body_read = true;

        let Self { buf, header, requests, results, progress, input_len, .. } = self;
        if let Some(progress) = progress.as_mut() {
            progress.start(buf.offset(), *input_len);
        }

        let progress = progress.as_mut();
        match header.format {
            Format::Ascii => {
                let mut decoder = AsciiDecoder::new(buf);
                read_body(&mut decoder, header, requests, results, progress)
            }
            Format::BinaryBigEndian => {
                let mut decoder = BinaryDecoder::<_, BigEndian>::new(buf);
                read_body(&mut decoder, header, requests, results, progress)
            }
            Format::BinaryLittleEndian => {
                let mut decoder = BinaryDecoder::<_, LittleEndian>::new(buf);
                read_body(&mut decoder, header, requests, results, progress)
            }
        }
    }

    /// Returns the data of the given request if its element was completely
    /// read (and the data was not taken yet).
    pub fn data(&self, id: RequestId) -> Option<&PlyData> {
        match self.requests.get(id.0) {
            Some(req) if req.complete => Some(&self.results[id.0]),
            _ => None,
        }
    }

    /// Like [`Reader::data`], but moves the data out of the reader. Further
    /// calls for the same request return `None`.
    pub fn take(&mut self, id: RequestId) -> Option<PlyData> {
        match self.requests.get_mut(id.0) {
            Some(req) if req.complete => {
                req.complete = false;
                let empty = self.results[id.0].empty_like();
                Some(mem::replace(&mut self.results[id.0], empty))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
impl<R: Read> Reader<R> {
    /// Capacities of the value and list length buffers of a request, in
    /// bytes and entries.
    pub(crate) fn reserved(&self, id: RequestId) -> (usize, usize) {
        let data = &self.results[id.0];
        (data.bytes.capacity(), data.list_lengths.capacity())
    }
}

impl<R: Read> fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("buf", &self.buf)
            .field("header", &self.header)
            .field("requests", &self.requests)
            .field("progress", &self.progress)
            .field("input_len", &self.input_len)
            .field("body_read", &self.body_read)
            .finish()
    }
}

/// Checks a request against the header and creates the (empty) result
/// buffer for it.
fn resolve(
    header: &Header,
    element: &str,
    names: &[&str],
    list_size_hint: usize,
) -> Result<(Request, PlyData), Error> {
    let element_idx = header.element_pos(element)
        .ok_or_else(|| Error::UnknownElement(element.into()))?;
    let def = &header.elements[element_idx];

    if names.is_empty() {
        return Err(Error::InvalidRequest("no property names given".into()));
    }

    let mut props = SmallVec::<[usize; 4]>::new();
    for (i, &name) in names.iter().enumerate() {
        if names[..i].contains(&name) {
            return Err(Error::InvalidRequest(format!("property '{}' requested twice", name)));
        }

        let pos = def.prop_pos(name).ok_or_else(|| Error::UnknownProperty {
            element: element.into(),
            property: name.into(),
        })?;
        props.push(pos);
    }
    props.sort_unstable();

    // All properties have to end up in one buffer with a single type.
    let prop_ty = def.property_defs[props[0]].ty;
    if let Some(other) = props.iter().map(|&p| &def.property_defs[p]).find(|p| p.ty != prop_ty) {
        return Err(Error::InvalidRequest(format!(
            "properties of one request need to have the same type, but '{}' and '{}' differ",
            def.property_defs[props[0]].name,
            other.name,
        )));
    }
    if prop_ty.is_list() && props.len() > 1 {
        return Err(Error::InvalidRequest(format!(
            "list property '{}' has to be requested on its own",
            def.property_defs[props[0]].name,
        )));
    }

    // Reserve memory.
    let ty = prop_ty.scalar_type();
    let values_per_row = if prop_ty.is_list() { list_size_hint } else { props.len() };
    let reserve_bytes = def.count
        .saturating_mul(values_per_row as u64)
        .saturating_mul(ty.len() as u64)
        .min(MAX_EAGER_RESERVE);
    let reserve_lengths = if prop_ty.is_list() {
        def.count.min(MAX_EAGER_RESERVE / 4)
    } else {
        0
    };

    let data = PlyData {
        ty,
        count: usize::try_from(def.count).unwrap_or(usize::max_value()),
        property_names: props.iter().map(|&p| def.property_defs[p].name.clone()).collect(),
        is_list: prop_ty.is_list(),
        list_lengths: Vec::with_capacity(reserve_lengths as usize),
        bytes: Vec::with_capacity(reserve_bytes as usize),
    };
    let request = Request {
        element: element_idx,
        props,
        complete: false,
    };

    Ok((request, data))
}

/// Decodes all elements with the given decoder. Requests are marked as
/// complete as soon as their element is done.
fn read_body(
    decoder: &mut impl Decoder,
    header: &Header,
    requests: &mut [Request],
    results: &mut [PlyData],
    mut progress: Option<&mut Progress>,
) -> Result<(), Error> {
    for (element_idx, def) in header.elements.iter().enumerate() {
        let mut targets = vec![Targets::new(); def.property_defs.len()];
        for (req_idx, req) in requests.iter().enumerate() {
            if req.element == element_idx {
                for &prop in &req.props {
                    targets[prop].push(req_idx);
                }
            }
        }

        decoder.decode_element(def, &targets, results, progress.as_deref_mut())?;

        for req in requests.iter_mut().filter(|r| r.element == element_idx) {
            req.complete = true;
        }
        trace!(
            "decoded PLY element '{}' ({} rows), now at byte {}",
            def.name,
            def.count,
            decoder.offset(),
        );
    }

    Ok(())
}


// ===========================================================================
// ===== Definition of `PlyData`
// ===========================================================================

/// The decoded values of one request.
///
/// All values are stored densely packed in native endianness in one byte
/// buffer. For list properties, the length of each row's list is stored
/// separately.
#[derive(Debug, Clone, PartialEq)]
pub struct PlyData {
    pub(crate) ty: ScalarType,
    pub(crate) count: usize,
    pub(crate) property_names: Vec<String>,
    pub(crate) is_list: bool,
    pub(crate) list_lengths: Vec<u32>,
    pub(crate) bytes: Vec<u8>,
}

static_assertions::assert_impl_all!(PlyData: Send, Sync);

impl PlyData {
    fn empty_like(&self) -> Self {
        Self {
            ty: self.ty,
            count: 0,
            property_names: Vec::new(),
            is_list: self.is_list,
            list_lengths: Vec::new(),
            bytes: Vec::new(),
        }
    }

    /// The type of all values (for lists: the type of the list items).
    pub fn ty(&self) -> ScalarType {
        self.ty
    }

    /// Number of rows, i.e. number of elements in the element group.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Names of the properties stored in this buffer, in the order in which
    /// they are interleaved.
    pub fn property_names(&self) -> &[String] {
        &self.property_names
    }

    pub fn is_list(&self) -> bool {
        self.is_list
    }

    /// The length of the list in each row. Empty for scalar properties.
    pub fn list_lengths(&self) -> &[u32] {
        &self.list_lengths
    }

    /// The raw values in native endianness.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The total number of values stored in this buffer.
    pub fn num_values(&self) -> usize {
        self.bytes.len() / self.ty.len()
    }

    /// Returns all values as `Vec<T>` or `None` if `T` does not match the
    /// type of the values.
    pub fn values<T: PlyScalar>(&self) -> Option<Vec<T>> {
        if T::TYPE != self.ty {
            return None;
        }

        let values = self.bytes.chunks_exact(self.ty.len())
            .map(|chunk| T::read::<NativeEndian>(chunk))
            .collect();
        Some(values)
    }

    /// Returns an iterator over the raw bytes of each row's list. Yields
    /// nothing for scalar properties.
    pub fn list_rows(&self) -> ListRows<'_> {
        ListRows {
            lengths: self.list_lengths.iter(),
            bytes: &self.bytes,
            value_len: self.ty.len(),
        }
    }
}

/// Iterator over the lists of a list property. See [`PlyData::list_rows`].
#[derive(Debug, Clone)]
pub struct ListRows<'a> {
    lengths: slice::Iter<'a, u32>,
    bytes: &'a [u8],
    value_len: usize,
}

impl<'a> Iterator for ListRows<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.lengths.next()? as usize * self.value_len;
        let (row, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.lengths.size_hint()
    }
}

impl ExactSizeIterator for ListRows<'_> {}
