//! Video codec and container format enums.

use serde::{Deserialize, Serialize};

/// Video codec identifier, as found in a track's sample description.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
    ProRes,
    Mpeg4Part2,
    MotionJpeg,
    /// Unrecognized descriptor (raw FourCC or Matroska CodecID).
    Other(String),
}

impl VideoCodec {
    pub fn display_name(&self) -> &str {
        match self {
            Self::H264 => "H.264/AVC",
            Self::H265 => "H.265/HEVC",
            Self::Vp8 => "VP8",
            Self::Vp9 => "VP9",
            Self::Av1 => "AV1",
            Self::ProRes => "Apple ProRes",
            Self::Mpeg4Part2 => "MPEG-4 Part 2",
            Self::MotionJpeg => "Motion JPEG",
            Self::Other(raw) => raw,
        }
    }

    /// Stable lowercase token used in capability reasons (`codec:vp9`).
    pub fn reason_name(&self) -> String {
        match self {
            Self::H264 => "h264".into(),
            Self::H265 => "hevc".into(),
            Self::Vp8 => "vp8".into(),
            Self::Vp9 => "vp9".into(),
            Self::Av1 => "av1".into(),
            Self::ProRes => "prores".into(),
            Self::Mpeg4Part2 => "mpeg4".into(),
            Self::MotionJpeg => "mjpeg".into(),
            Self::Other(raw) => raw.trim().to_ascii_lowercase(),
        }
    }

    /// Parse a reason token back into a codec. Used for config deny-lists.
    pub fn from_reason_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" => Self::H264,
            "hevc" | "h265" => Self::H265,
            "vp8" => Self::Vp8,
            "vp9" => Self::Vp9,
            "av1" => Self::Av1,
            "prores" => Self::ProRes,
            "mpeg4" => Self::Mpeg4Part2,
            "mjpeg" => Self::MotionJpeg,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Container format, as sniffed from the first bytes of a file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// ISO BMFF (MP4, MOV, M4V).
    Mp4,
    /// Matroska (MKV).
    Mkv,
    /// WebM (Matroska subset).
    WebM,
}

impl ContainerFormat {
    pub fn file_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["mp4", "m4v", "mov"],
            Self::Mkv => &["mkv"],
            Self::WebM => &["webm"],
        }
    }
}
