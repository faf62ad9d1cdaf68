//! ISO BMFF box (atom) header reading.
//!
//! Only what the track scan needs: box headers, the container boxes on the
//! path to `stsd`, and the handler type in `hdlr`.
//!
//! Reference: ISO 14496-12 (ISO Base Media File Format).

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};
use tracing::trace;
use vl_common::DemuxError;

// ─── Box FourCC constants ────────────────────────────────────────────

/// Convert 4 ASCII bytes to a u32 FourCC code.
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | (d as u32)
}

pub const FTYP: u32 = fourcc(b'f', b't', b'y', b'p');
pub const MOOV: u32 = fourcc(b'm', b'o', b'o', b'v');
pub const TRAK: u32 = fourcc(b't', b'r', b'a', b'k');
pub const MDIA: u32 = fourcc(b'm', b'd', b'i', b'a');
pub const HDLR: u32 = fourcc(b'h', b'd', b'l', b'r');
pub const MINF: u32 = fourcc(b'm', b'i', b'n', b'f');
pub const STBL: u32 = fourcc(b's', b't', b'b', b'l');
pub const STSD: u32 = fourcc(b's', b't', b's', b'd');
pub const MDAT: u32 = fourcc(b'm', b'd', b'a', b't');
pub const VIDE: u32 = fourcc(b'v', b'i', b'd', b'e');
pub const SOUN: u32 = fourcc(b's', b'o', b'u', b'n');

// Video sample entries.
pub const AVC1: u32 = fourcc(b'a', b'v', b'c', b'1');
pub const AVC3: u32 = fourcc(b'a', b'v', b'c', b'3');
pub const HEV1: u32 = fourcc(b'h', b'e', b'v', b'1');
pub const HVC1: u32 = fourcc(b'h', b'v', b'c', b'1');
pub const VP08: u32 = fourcc(b'v', b'p', b'0', b'8');
pub const VP09: u32 = fourcc(b'v', b'p', b'0', b'9');
pub const AV01: u32 = fourcc(b'a', b'v', b'0', b'1');
pub const APCH: u32 = fourcc(b'a', b'p', b'c', b'h');
pub const APCN: u32 = fourcc(b'a', b'p', b'c', b'n');
pub const APCS: u32 = fourcc(b'a', b'p', b'c', b's');
pub const APCO: u32 = fourcc(b'a', b'p', b'c', b'o');
pub const AP4H: u32 = fourcc(b'a', b'p', b'4', b'h');
pub const AP4X: u32 = fourcc(b'a', b'p', b'4', b'x');
pub const MP4V: u32 = fourcc(b'm', b'p', b'4', b'v');
pub const JPEG: u32 = fourcc(b'j', b'p', b'e', b'g');
pub const MJPA: u32 = fourcc(b'm', b'j', b'p', b'a');

/// Convert a FourCC u32 to a human-readable string for logging.
pub fn fourcc_to_string(cc: u32) -> String {
    cc.to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}

// ─── Box Header ─────────────────────────────────────────────────────

/// A parsed ISO BMFF box header.
#[derive(Clone, Debug)]
pub struct BoxHeader {
    /// FourCC type code.
    pub box_type: u32,
    /// Total box size (including header). 0 means "extends to EOF".
    pub size: u64,
    /// Offset of the box start in the file.
    pub offset: u64,
    /// Size of the header itself (8 or 16 bytes).
    pub header_size: u8,
}

impl BoxHeader {
    pub fn content_offset(&self) -> u64 {
        self.offset + self.header_size as u64
    }

    /// Returns None if the box extends to EOF.
    pub fn end_offset(&self) -> Option<u64> {
        if self.size == 0 {
            None
        } else {
            Some(self.offset + self.size)
        }
    }
}

/// Read a box header from the current position. Returns None at EOF.
pub fn read_box_header<R: Read + Seek>(reader: &mut R) -> Result<Option<BoxHeader>, DemuxError> {
    let offset = reader.stream_position()?;

    let size32 = match reader.read_u32::<BigEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(DemuxError::Io(e)),
    };
    let box_type = reader.read_u32::<BigEndian>()?;

    let (size, header_size) = match size32 {
        0 => (0u64, 8u8),
        1 => (reader.read_u64::<BigEndian>()?, 16u8),
        _ => (size32 as u64, 8u8),
    };

    if size != 0 && size < header_size as u64 {
        return Err(DemuxError::InvalidStructure {
            offset,
            reason: format!(
                "Box '{}' has invalid size {} (less than header)",
                fourcc_to_string(box_type),
                size
            ),
        });
    }

    trace!(
        "Box '{}' at offset {}, size {}",
        fourcc_to_string(box_type),
        offset,
        size
    );

    Ok(Some(BoxHeader {
        box_type,
        size,
        offset,
        header_size,
    }))
}

/// Skip past the current box (seek to its end).
pub fn skip_box<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> Result<(), DemuxError> {
    match header.end_offset() {
        Some(end) => reader.seek(SeekFrom::Start(end))?,
        None => reader.seek(SeekFrom::End(0))?,
    };
    Ok(())
}

/// Visit each direct child of `parent`. The reader is left at the parent's end.
///
/// `visit` may read any part of the child; the walk re-seeks to the child's
/// end afterwards. A child claiming to extend past its parent is an error.
pub fn for_each_child<R, F>(
    reader: &mut R,
    parent: &BoxHeader,
    mut visit: F,
) -> Result<(), DemuxError>
where
    R: Read + Seek,
    F: FnMut(&mut R, &BoxHeader) -> Result<(), DemuxError>,
{
    let end = parent.end_offset();
    reader.seek(SeekFrom::Start(parent.content_offset()))?;

    loop {
        let pos = reader.stream_position()?;
        if matches!(end, Some(end) if pos + 8 > end) {
            break;
        }
        let Some(child) = read_box_header(reader)? else {
            if let Some(end) = end {
                if pos < end {
                    return Err(DemuxError::TruncatedData {
                        expected: (end - pos) as usize,
                        got: 0,
                    });
                }
            }
            break;
        };
        if let (Some(end), Some(child_end)) = (end, child.end_offset()) {
            if child_end > end {
                return Err(DemuxError::InvalidStructure {
                    offset: child.offset,
                    reason: format!(
                        "Box '{}' overruns its parent '{}'",
                        fourcc_to_string(child.box_type),
                        fourcc_to_string(parent.box_type)
                    ),
                });
            }
        }
        visit(reader, &child)?;
        if child.size == 0 {
            break;
        }
        skip_box(reader, &child)?;
    }

    skip_box(reader, parent)
}

// ─── hdlr / stsd ────────────────────────────────────────────────────

/// Read the handler type of an hdlr box. Reader must be at content start.
pub fn read_handler_type<R: Read>(reader: &mut R) -> Result<u32, DemuxError> {
    // version (1) + flags (3) + pre_defined (4)
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let _pre_defined = reader.read_u32::<BigEndian>()?;
    Ok(reader.read_u32::<BigEndian>()?)
}

/// Read the sample entry FourCCs of an stsd box. Reader must be at content start.
pub fn read_sample_entry_types<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> Result<Vec<u32>, DemuxError> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let entry_count = reader.read_u32::<BigEndian>()?;

    let mut types = Vec::new();
    for _ in 0..entry_count.min(16) {
        let pos = reader.stream_position()?;
        if matches!(header.end_offset(), Some(end) if pos + 8 > end) {
            break;
        }
        let Some(entry) = read_box_header(reader)? else {
            break;
        };
        types.push(entry.box_type);
        if entry.size == 0 {
            break;
        }
        skip_box(reader, &entry)?;
    }
    Ok(types)
}

// ─── Tests ──────────────────────────────────────────────────────────
