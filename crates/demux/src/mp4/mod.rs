//! ISO BMFF track scan: `moov/trak/mdia/{hdlr, minf/stbl/stsd}`.
//!
//! Sample tables and media data are never read; `mdat` is skipped by size.

pub mod boxes;

use std::io::{Read, Seek};
use tracing::debug;
use vl_common::{ContainerFormat, DemuxError};

use crate::tracks::{codec_from_fourcc, TrackScan};
use boxes::{
    for_each_child, fourcc_to_string, read_box_header, read_handler_type,
    read_sample_entry_types, skip_box, BoxHeader, HDLR, MDIA, MINF, MOOV, SOUN, STBL, STSD, TRAK,
    VIDE,
};

/// Handler type and first sample entry of one `trak`.
#[derive(Default)]
struct TrakInfo {
    handler: Option<u32>,
    sample_entry: Option<u32>,
}

/// Scan an ISO BMFF file for its track codecs.
pub fn scan_tracks<R: Read + Seek>(reader: &mut R) -> Result<TrackScan, DemuxError> {
    let mut scan = TrackScan::new(ContainerFormat::Mp4);
    let mut found_moov = false;

    while let Some(header) = read_box_header(reader)? {
        if header.box_type == MOOV {
            scan_moov(reader, &header, &mut scan)?;
            found_moov = true;
            break;
        }
        if header.size == 0 {
            break;
        }
        skip_box(reader, &header)?;
    }

    if !found_moov {
        return Err(DemuxError::InvalidStructure {
            offset: 0,
            reason: "No moov box found".into(),
        });
    }

    debug!(
        video = ?scan.video_codecs,
        has_audio = scan.has_audio,
        "MP4 track scan complete"
    );
    Ok(scan)
}

fn scan_moov<R: Read + Seek>(
    reader: &mut R,
    moov: &BoxHeader,
    scan: &mut TrackScan,
) -> Result<(), DemuxError> {
    for_each_child(reader, moov, |reader, child| {
        if child.box_type != TRAK {
            return Ok(());
        }
        let mut info = TrakInfo::default();
        scan_trak(reader, child, &mut info)?;
        match info.handler {
            Some(VIDE) => {
                if let Some(entry) = info.sample_entry {
                    scan.video_codecs.push(codec_from_fourcc(entry));
                }
            }
            Some(SOUN) => scan.has_audio = true,
            Some(other) => debug!("Skipping '{}' track", fourcc_to_string(other)),
            None => {}
        }
        Ok(())
    })
}

fn scan_trak<R: Read + Seek>(
    reader: &mut R,
    box_header: &BoxHeader,
    info: &mut TrakInfo,
) -> Result<(), DemuxError> {
    for_each_child(reader, box_header, |reader, child| match child.box_type {
        MDIA | MINF | STBL => scan_trak(reader, child, info),
        HDLR => {
            info.handler = Some(read_handler_type(reader)?);
            Ok(())
        }
        STSD => {
            info.sample_entry = read_sample_entry_types(reader, child)?.first().copied();
            Ok(())
        }
        _ => Ok(()),
    })
}
