//! MKV/WebM (Matroska) track scan.
//!
//! Reads the EBML header for the DocType, then walks the Segment's
//! top-level elements until `Tracks`. Scanning stops at the first `Cluster`;
//! a file whose tracks come after its media data reports no tracks.

pub mod ebml;
pub mod elements;

use ebml::{read_element, read_string, read_uint, skip_element, EbmlElement};
use elements::*;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;
use vl_common::{ContainerFormat, DemuxError};

use crate::tracks::{codec_from_matroska_id, TrackScan};

/// Scan a Matroska/WebM file for its track codecs.
pub fn scan_tracks<R: Read + Seek>(reader: &mut R) -> Result<TrackScan, DemuxError> {
    let header = read_element(reader)?;
    if header.id != EBML_HEADER {
        return Err(DemuxError::UnsupportedContainer);
    }
    let container = read_doc_type(reader, &header)?;
    let mut scan = TrackScan::new(container);

    let segment = read_element(reader)?;
    if segment.id != SEGMENT {
        return Err(DemuxError::InvalidStructure {
            offset: segment.position,
            reason: format!("Expected Segment, found element 0x{:X}", segment.id),
        });
    }

    loop {
        if matches!(segment.end_offset(), Some(end) if reader.stream_position()? >= end) {
            break;
        }
        let element = match read_element(reader) {
            Ok(e) => e,
            Err(DemuxError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };
        match element.id {
            TRACKS => {
                read_tracks(reader, &element, &mut scan)?;
                break;
            }
            CLUSTER => break,
            _ => skip_element(reader, &element)?,
        }
    }

    debug!(
        container = ?scan.container,
        video = ?scan.video_codecs,
        has_audio = scan.has_audio,
        "Matroska track scan complete"
    );
    Ok(scan)
}

fn read_doc_type<R: Read + Seek>(
    reader: &mut R,
    header: &EbmlElement,
) -> Result<ContainerFormat, DemuxError> {
    let end = known_end(header)?;
    let mut container = ContainerFormat::Mkv;
    while reader.stream_position()? < end {
        let child = read_element(reader)?;
        if child.id == DOC_TYPE && read_string(reader, child.size)? == "webm" {
            container = ContainerFormat::WebM;
        }
        skip_element(reader, &child)?;
    }
    reader.seek(SeekFrom::Start(end))?;
    Ok(container)
}

fn read_tracks<R: Read + Seek>(
    reader: &mut R,
    tracks: &EbmlElement,
    scan: &mut TrackScan,
) -> Result<(), DemuxError> {
    let end = known_end(tracks)?;
    while reader.stream_position()? < end {
        let entry = read_element(reader)?;
        if entry.id == TRACK_ENTRY {
            read_track_entry(reader, &entry, scan)?;
        }
        skip_element(reader, &entry)?;
    }
    Ok(())
}

fn read_track_entry<R: Read + Seek>(
    reader: &mut R,
    entry: &EbmlElement,
    scan: &mut TrackScan,
) -> Result<(), DemuxError> {
    let end = known_end(entry)?;
    let mut track_type = None;
    let mut codec_id = None;

    while reader.stream_position()? < end {
        let child = read_element(reader)?;
        match child.id {
            TRACK_TYPE => track_type = Some(read_uint(reader, child.size)?),
            CODEC_ID => codec_id = Some(read_string(reader, child.size)?),
            _ => {}
        }
        skip_element(reader, &child)?;
    }

    match (track_type, codec_id) {
        (Some(TRACK_TYPE_VIDEO), Some(id)) => scan.video_codecs.push(codec_from_matroska_id(&id)),
        (Some(TRACK_TYPE_AUDIO), _) => scan.has_audio = true,
        _ => {}
    }
    Ok(())
}

fn known_end(element: &EbmlElement) -> Result<u64, DemuxError> {
    element.end_offset().ok_or_else(|| DemuxError::InvalidStructure {
        offset: element.position,
        reason: format!("Element 0x{:X} has unknown size", element.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vl_common::VideoCodec;

    fn id_bytes(id: u32) -> Vec<u8> {
        let bytes = id.to_be_bytes();
        let skip = bytes.iter().position(|&b| b != 0).unwrap_or(3);
        bytes[skip..].to_vec()
    }

    fn element(id: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = id_bytes(id);
        assert!(payload.len() < 0x3FFF);
        if payload.len() < 0x7F {
            out.push(0x80 | payload.len() as u8);
        } else {
            out.push(0x40 | (payload.len() >> 8) as u8);
            out.push(payload.len() as u8);
        }
        out.extend_from_slice(payload);
        out
    }

    fn track(track_type: u8, codec: &str) -> Vec<u8> {
        let mut payload = element(TRACK_TYPE, &[track_type]);
        payload.extend_from_slice(&element(CODEC_ID, codec.as_bytes()));
        element(TRACK_ENTRY, &payload)
    }

    fn file(doc_type: &str, tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = element(EBML_HEADER, &element(DOC_TYPE, doc_type.as_bytes()));
        // Segment with unknown size
        out.extend_from_slice(&id_bytes(SEGMENT));
        out.extend_from_slice(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        out.extend_from_slice(&element(0x1549A966, &[0u8; 10])); // Info
        out.extend_from_slice(&element(TRACKS, &tracks.concat()));
        out.extend_from_slice(&element(CLUSTER, &[0u8; 32]));
        out
    }

    #[test]
    fn finds_vp9_in_webm() {
        let data = file("webm", &[track(1, "V_VP9"), track(2, "A_OPUS")]);
        let scan = scan_tracks(&mut Cursor::new(data)).unwrap();
        assert_eq!(scan.container, ContainerFormat::WebM);
        assert_eq!(scan.video_codecs, vec![VideoCodec::Vp9]);
        assert!(scan.has_audio);
    }

    #[test]
    fn matroska_doc_type() {
        let data = file("matroska", &[track(1, "V_MPEG4/ISO/AVC")]);
        let scan = scan_tracks(&mut Cursor::new(data)).unwrap();
        assert_eq!(scan.container, ContainerFormat::Mkv);
        assert_eq!(scan.video_codecs, vec![VideoCodec::H264]);
    }

    #[test]
    fn not_ebml_is_unsupported() {
        let data = element(SEGMENT, &[]);
        assert!(matches!(
            scan_tracks(&mut Cursor::new(data)),
            Err(DemuxError::UnsupportedContainer)
        ));
    }

    #[test]
    fn truncated_tracks_is_error() {
        let mut data = file("webm", &[track(1, "V_VP9")]);
        let tracks_at = data
            .windows(4)
            .position(|w| w == TRACKS.to_be_bytes())
            .unwrap();
        data.truncate(tracks_at + 8);
        assert!(scan_tracks(&mut Cursor::new(data)).is_err());
    }
}
