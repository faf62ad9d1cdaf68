//! File probing: detect the container format and scan its track codecs.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;
use vl_common::{ContainerFormat, DemuxError};

use crate::tracks::TrackScan;
use crate::{mkv, mp4};

/// Magic bytes for Matroska/WebM files (EBML header element ID).
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Detect container format from file extension.
pub fn detect_format(path: &Path) -> Result<ContainerFormat, DemuxError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" | "mov" => Ok(ContainerFormat::Mp4),
        "mkv" => Ok(ContainerFormat::Mkv),
        "webm" => Ok(ContainerFormat::WebM),
        _ => Err(DemuxError::UnsupportedContainer),
    }
}

/// Detect container format from the first bytes of the file.
///
/// EBML files report `Mkv`; the track scan refines this to `WebM` from the
/// DocType.
pub fn detect_format_from_magic<R: Read>(reader: &mut R) -> Result<ContainerFormat, DemuxError> {
    let mut header = Vec::with_capacity(12);
    reader.by_ref().take(12).read_to_end(&mut header)?;

    if header.len() < 4 {
        return Err(DemuxError::UnsupportedContainer);
    }
    if header[..4] == EBML_MAGIC {
        return Ok(ContainerFormat::Mkv);
    }
    if header.len() >= 8 {
        // MOV files may open with boxes other than ftyp.
        let box_type = &header[4..8];
        if matches!(
            box_type,
            b"ftyp" | b"moov" | b"mdat" | b"wide" | b"free" | b"skip"
        ) {
            return Ok(ContainerFormat::Mp4);
        }
    }
    Err(DemuxError::UnsupportedContainer)
}

/// Sniff and scan from any seekable reader.
pub fn scan_reader<R: Read + Seek>(reader: &mut R) -> Result<TrackScan, DemuxError> {
    let format = detect_format_from_magic(reader)?;
    reader.seek(SeekFrom::Start(0))?;
    match format {
        ContainerFormat::Mp4 => mp4::scan_tracks(reader),
        ContainerFormat::Mkv | ContainerFormat::WebM => mkv::scan_tracks(reader),
    }
}

/// Open a local file and scan its track codecs.
pub fn scan_file(path: &Path) -> Result<TrackScan, DemuxError> {
    debug!(path = %path.display(), "Scanning container tracks");
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    scan_reader(&mut reader)
}
