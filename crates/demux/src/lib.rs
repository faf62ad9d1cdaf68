//! `vl-demux`: Container sniffing and track codec scanning.
//!
//! Reads just enough of an MP4/MOV or MKV/WebM header to list the codec of
//! every video track. No sample tables, no packet extraction; decoding is
//! the active backend's job.

pub mod mkv;
pub mod mp4;
pub mod probe;
pub mod tracks;

pub use probe::{detect_format, detect_format_from_magic, scan_file, scan_reader};
pub use tracks::{codec_from_fourcc, codec_from_matroska_id, TrackScan};
