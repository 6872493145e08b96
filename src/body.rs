//! The encoding-independent part of reading and writing the body.
//!
//! The body is a sequence of element groups, each a sequence of rows, each a
//! sequence of property values in header order. Walking this structure is the
//! same for all encodings; only reading/writing single values differs. The
//! `Decoder` and `Encoder` traits abstract over that and are implemented once
//! for ASCII and once for binary (generic over the byte order).

use smallvec::SmallVec;

use crate::{
    Error, ScalarType,
    header::{ElementDef, PropertyType},
    progress::Progress,
    read::PlyData,
    write::PropGroup,
};


/// For each property of an element: indices of the result buffers that want
/// the values of that property.
pub(crate) type Targets = SmallVec<[usize; 2]>;

/// Reads values from the body of a PLY file.
pub(crate) trait Decoder {
    /// The current byte offset in the input.
    fn offset(&self) -> usize;

    /// Reads `n` values of type `ty` and appends them in native byte order to
    /// `out`.
    fn read_values(&mut self, ty: ScalarType, n: usize, out: &mut Vec<u8>) -> Result<(), Error>;

    /// Skips `n` values of type `ty`.
    fn skip_values(&mut self, ty: ScalarType, n: usize) -> Result<(), Error>;

    /// Reads the length of a list, stored as `ty`.
    fn read_len(&mut self, ty: ScalarType) -> Result<u32, Error>;

    /// Decodes all rows of the element group `def`. The values of the
    /// property with index `i` are appended to all `sinks[t]` with `t` in
    /// `targets[i]`. Values of properties without targets are skipped.
    fn decode_element(
        &mut self,
        def: &ElementDef,
        targets: &[Targets],
        sinks: &mut [PlyData],
        mut progress: Option<&mut Progress>,
    ) -> Result<(), Error> {
        // Rows without properties occupy no bytes, so there is nothing to
        // read, no matter how large the count is.
        if def.property_defs.is_empty() {
            return Ok(());
        }

        // Keep this vector on the outside to retain allocations
        let mut scratch = Vec::new();

        // Just read as many elements as specified in the header. A faulty
        // number in the header won't lead to any DOS dangerous things: the
        // time and memory we use here is still limited by the file size.
        for _ in 0..def.count {
            for (prop, targets) in def.property_defs.iter().zip(targets) {
                match prop.ty {
                    PropertyType::Scalar(ty) => {
                        self.read_into(ty, 1, targets, sinks, &mut scratch)?;
                    }
                    PropertyType::List { len_type, scalar_type } => {
                        let len = self.read_len(len_type)?;
                        for &t in targets {
                            sinks[t].list_lengths.push(len);
                        }
                        self.read_into(scalar_type, len as usize, targets, sinks, &mut scratch)?;
                    }
                }
            }

            if let Some(progress) = &mut progress {
                progress.update(self.offset());
            }
        }

        Ok(())
    }

    /// Reads `n` values into all given targets or skips them if there are
    /// none.
    fn read_into(
        &mut self,
        ty: ScalarType,
        n: usize,
        targets: &[usize],
        sinks: &mut [PlyData],
        scratch: &mut Vec<u8>,
    ) -> Result<(), Error> {
        match *targets {
            [] => self.skip_values(ty, n),
            [single] => self.read_values(ty, n, &mut sinks[single].bytes),
            _ => {
                scratch.clear();
                self.read_values(ty, n, scratch)?;
                for &t in targets {
                    sinks[t].bytes.extend_from_slice(scratch);
                }
                Ok(())
            }
        }
    }
}

/// Writes values into the body of a PLY file.
pub(crate) trait Encoder {
    /// Writes all values of type `ty` stored in native byte order in `src`.
    fn write_values(&mut self, ty: ScalarType, src: &[u8]) -> Result<(), Error>;

    /// Writes a list length as type `ty`.
    fn write_len(&mut self, ty: ScalarType, len: usize) -> Result<(), Error>;

    /// Finishes one row.
    fn end_row(&mut self) -> Result<(), Error>;

    /// Encodes `count` rows of an element group whose properties are given as
    /// `groups` (in that order).
    fn encode_element(&mut self, count: usize, groups: &[PropGroup<'_>]) -> Result<(), Error> {
        // Each group has its own running offset into its data.
        let mut offsets = vec![0; groups.len()];

        for _ in 0..count {
            for (group, offset) in groups.iter().zip(&mut offsets) {
                let value_len = group.ty.len();
                match group.list {
                    None => {
                        let n = group.names.len() * value_len;
                        self.write_values(group.ty, &group.data[*offset..*offset + n])?;
                        *offset += n;
                    }
                    Some((len_type, list_len)) => {
                        let n = list_len * value_len;
                        for _ in &group.names {
                            self.write_len(len_type, list_len)?;
                            self.write_values(group.ty, &group.data[*offset..*offset + n])?;
                            *offset += n;
                        }
                    }
                }
            }

            self.end_row()?;
        }

        Ok(())
    }
}
