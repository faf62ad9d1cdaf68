//! Matroska element IDs used by the track scan.

// ─── EBML Header ─────────────────────────────────────────────────────

pub const EBML_HEADER: u32 = 0x1A45DFA3;
/// Document type string ("matroska" or "webm").
pub const DOC_TYPE: u32 = 0x4282;

// ─── Segment ─────────────────────────────────────────────────────────

pub const SEGMENT: u32 = 0x18538067;
pub const CLUSTER: u32 = 0x1F43B675;

// ─── Track Information ───────────────────────────────────────────────

pub const TRACKS: u32 = 0x1654AE6B;
pub const TRACK_ENTRY: u32 = 0xAE;
/// Track type (1=video, 2=audio, 17=subtitle).
pub const TRACK_TYPE: u32 = 0x83;
/// Codec ID string (e.g., "V_MPEG4/ISO/AVC").
pub const CODEC_ID: u32 = 0x86;

pub const TRACK_TYPE_VIDEO: u64 = 1;
pub const TRACK_TYPE_AUDIO: u64 = 2;
