//! EBML (Extensible Binary Meta Language) reading.
//!
//! Variable-size integers use a leading-1 encoding:
//! - 1 byte:  `1xxx xxxx`                (7 data bits)
//! - 2 bytes: `01xx xxxx xxxx xxxx`       (14 data bits)
//! - ...
//! - 8 bytes: `0000 0001 ...`             (56 data bits)
//!
//! Element IDs are at most 4 bytes wide; data sizes may use all 8.

use std::io::{Read, Seek, SeekFrom};
use vl_common::DemuxError;

/// An EBML element header: the ID, data size, and position info.
#[derive(Clone, Debug)]
pub struct EbmlElement {
    pub id: u32,
    /// The data size in bytes (`u64::MAX` when unknown).
    pub size: u64,
    /// How many bytes the header (ID + size) consumed.
    pub header_size: u64,
    /// Byte position in the stream where this element header starts.
    pub position: u64,
}

impl EbmlElement {
    pub fn data_offset(&self) -> u64 {
        self.position + self.header_size
    }

    /// Returns `None` if the element has unknown size.
    pub fn end_offset(&self) -> Option<u64> {
        if self.size == u64::MAX {
            None
        } else {
            Some(self.position + self.header_size + self.size)
        }
    }
}

/// Read a variable-size EBML ID. The marker bit is kept as part of the ID.
pub fn read_vint_id<R: Read>(reader: &mut R) -> Result<u32, DemuxError> {
    let first = read_one_byte(reader)?;
    let width = vint_width(first, 4)?;

    let mut id = first as u32;
    for _ in 1..width {
        id = (id << 8) | read_one_byte(reader)? as u32;
    }
    Ok(id)
}

/// Read a variable-size EBML data size with the marker bit stripped.
/// Returns `u64::MAX` for the all-ones "unknown size" sentinel.
pub fn read_vint_size<R: Read>(reader: &mut R) -> Result<u64, DemuxError> {
    let first = read_one_byte(reader)?;
    let width = vint_width(first, 8)?;

    let mask = if width == 8 { 0 } else { 0xFFu8 >> width };
    let mut value = (first & mask) as u64;
    for _ in 1..width {
        value = (value << 8) | read_one_byte(reader)? as u64;
    }

    let max_for_width: u64 = (1u64 << (7 * width as u32)) - 1;
    if value == max_for_width {
        return Ok(u64::MAX);
    }
    Ok(value)
}

/// Read a complete element header at the current position.
pub fn read_element<R: Read + Seek>(reader: &mut R) -> Result<EbmlElement, DemuxError> {
    let position = reader.stream_position()?;
    let id = read_vint_id(reader)?;
    let size = read_vint_size(reader)?;
    let header_size = reader.stream_position()? - position;

    Ok(EbmlElement {
        id,
        size,
        header_size,
        position,
    })
}

/// Read an unsigned integer element value (1-8 bytes, big-endian).
pub fn read_uint<R: Read>(reader: &mut R, size: u64) -> Result<u64, DemuxError> {
    if size == 0 || size > 8 {
        return Err(DemuxError::InvalidStructure {
            offset: 0,
            reason: format!("Invalid uint size: {size}"),
        });
    }
    let mut val: u64 = 0;
    for _ in 0..size {
        val = (val << 8) | read_one_byte(reader)? as u64;
    }
    Ok(val)
}

/// Read a string element value, stripping trailing nulls.
pub fn read_string<R: Read>(reader: &mut R, size: u64) -> Result<String, DemuxError> {
    if size == 0 {
        return Ok(String::new());
    }
    if size > 4096 {
        return Err(DemuxError::InvalidStructure {
            offset: 0,
            reason: format!("String element too large: {size} bytes"),
        });
    }
    let mut data = vec![0u8; size as usize];
    reader.read_exact(&mut data)?;

    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8(data[..end].to_vec()).map_err(|e| DemuxError::InvalidStructure {
        offset: 0,
        reason: format!("Invalid UTF-8 string: {e}"),
    })
}

/// Seek past the element's data.
pub fn skip_element<R: Read + Seek>(reader: &mut R, element: &EbmlElement) -> Result<(), DemuxError> {
    let end = element.end_offset().ok_or_else(|| DemuxError::InvalidStructure {
        offset: element.position,
        reason: format!("Cannot skip element 0x{:X} with unknown size", element.id),
    })?;
    reader.seek(SeekFrom::Start(end))?;
    Ok(())
}

// ─── Internal helpers ────────────────────────────────────────────────

fn read_one_byte<R: Read>(reader: &mut R) -> Result<u8, DemuxError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Width in bytes of a VINT from its first byte, up to `max`.
fn vint_width(first: u8, max: u8) -> Result<u8, DemuxError> {
    let width = first.leading_zeros() as u8 + 1;
    if width > max {
        return Err(DemuxError::InvalidStructure {
            offset: 0,
            reason: format!("Invalid VINT leading byte: 0x{first:02X} (wider than {max} bytes)"),
        });
    }
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_vint_id_4byte() {
        let mut cursor = Cursor::new(vec![0x1A, 0x45, 0xDF, 0xA3]);
        assert_eq!(read_vint_id(&mut cursor).unwrap(), 0x1A45DFA3);
    }

    #[test]
    fn test_read_vint_id_too_wide() {
        let mut cursor = Cursor::new(vec![0x08, 0, 0, 0, 0]);
        assert!(read_vint_id(&mut cursor).is_err());
    }

    #[test]
    fn test_read_vint_size_1byte() {
        let mut cursor = Cursor::new(vec![0x85]);
        assert_eq!(read_vint_size(&mut cursor).unwrap(), 5);
    }

    #[test]
    fn test_read_vint_size_8byte() {
        let mut cursor = Cursor::new(vec![0x01, 0, 0, 0, 0, 0, 0x01, 0x00]);
        assert_eq!(read_vint_size(&mut cursor).unwrap(), 256);
    }

    #[test]
    fn test_read_vint_size_unknown() {
        let mut cursor = Cursor::new(vec![0xFF]);
        assert_eq!(read_vint_size(&mut cursor).unwrap(), u64::MAX);

        let mut cursor = Cursor::new(vec![0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(read_vint_size(&mut cursor).unwrap(), u64::MAX);
    }

    #[test]
    fn test_read_vint_size_zero_byte_invalid() {
        let mut cursor = Cursor::new(vec![0x00]);
        assert!(read_vint_size(&mut cursor).is_err());
    }

    #[test]
    fn test_read_uint() {
        let mut cursor = Cursor::new(vec![0x03, 0xE8]);
        assert_eq!(read_uint(&mut cursor, 2).unwrap(), 1000);
        assert!(read_uint(&mut cursor, 9).is_err());
    }

    #[test]
    fn test_read_string_null_terminated() {
        let mut cursor = Cursor::new(vec![b'V', b'_', b'V', b'P', b'9', 0x00]);
        assert_eq!(read_string(&mut cursor, 6).unwrap(), "V_VP9");
    }

    #[test]
    fn test_read_element() {
        let data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x85, 0, 0, 0, 0, 0];
        let mut cursor = Cursor::new(data);
        let elem = read_element(&mut cursor).unwrap();
        assert_eq!(elem.id, 0x1A45DFA3);
        assert_eq!(elem.size, 5);
        assert_eq!(elem.data_offset(), 5);
        assert_eq!(elem.end_offset(), Some(10));

        skip_element(&mut cursor, &elem).unwrap();
        assert_eq!(cursor.stream_position().unwrap(), 10);
    }
}
