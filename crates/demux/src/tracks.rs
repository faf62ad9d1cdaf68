//! Track scan results and codec descriptor mapping.

use vl_common::{ContainerFormat, VideoCodec};

use crate::mp4::boxes::{
    fourcc_to_string, AP4H, AP4X, APCH, APCN, APCO, APCS, AV01, AVC1, AVC3, HEV1, HVC1, JPEG,
    MJPA, MP4V, VP08, VP09,
};

/// Codec descriptors of every track found in a container header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackScan {
    pub container: ContainerFormat,
    /// One entry per video track, in file order.
    pub video_codecs: Vec<VideoCodec>,
    pub has_audio: bool,
}

impl TrackScan {
    pub fn new(container: ContainerFormat) -> Self {
        Self {
            container,
            video_codecs: Vec::new(),
            has_audio: false,
        }
    }
}

/// Map an ISO BMFF video sample entry FourCC.
pub fn codec_from_fourcc(cc: u32) -> VideoCodec {
    match cc {
        AVC1 | AVC3 => VideoCodec::H264,
        HVC1 | HEV1 => VideoCodec::H265,
        VP08 => VideoCodec::Vp8,
        VP09 => VideoCodec::Vp9,
        AV01 => VideoCodec::Av1,
        APCH | APCN | APCS | APCO | AP4H | AP4X => VideoCodec::ProRes,
        MP4V => VideoCodec::Mpeg4Part2,
        JPEG | MJPA => VideoCodec::MotionJpeg,
        other => VideoCodec::Other(fourcc_to_string(other)),
    }
}

/// Map a Matroska `CodecID` string.
pub fn codec_from_matroska_id(id: &str) -> VideoCodec {
    match id {
        "V_MPEG4/ISO/AVC" => VideoCodec::H264,
        "V_MPEGH/ISO/HEVC" => VideoCodec::H265,
        "V_VP8" => VideoCodec::Vp8,
        "V_VP9" => VideoCodec::Vp9,
        "V_AV1" => VideoCodec::Av1,
        "V_PRORES" => VideoCodec::ProRes,
        "V_MJPEG" => VideoCodec::MotionJpeg,
        id if id.starts_with("V_MPEG4/ISO/") => VideoCodec::Mpeg4Part2,
        other => VideoCodec::Other(other.to_string()),
    }
}
