//! 코덱/컨테이너 식별자.
//!
//! 원본 FourCC 태그와 ffmpeg 인코더 이름, 파일 확장자를 매핑한다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 비디오 코덱
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// MPEG-4 Part 2 (XVID FourCC)
    Xvid,
    /// MPEG-4 Part 2 (mp4v FourCC)
    Mp4v,
    /// Motion JPEG
    Mjpeg,
    /// H.264 (libx264)
    H264,
}

impl VideoCodec {
    /// FourCC 태그
    pub fn fourcc(&self) -> &'static str {
        match self {
            VideoCodec::Xvid => "XVID",
            VideoCodec::Mp4v => "mp4v",
            VideoCodec::Mjpeg => "MJPG",
            VideoCodec::H264 => "avc1",
        }
    }

    /// ffmpeg `-c:v` 인코더 이름
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            VideoCodec::Xvid | VideoCodec::Mp4v => "mpeg4",
            VideoCodec::Mjpeg => "mjpeg",
            VideoCodec::H264 => "libx264",
        }
    }

    /// 컨테이너 호환 여부
    pub fn supports(&self, container: Container) -> bool {
        matches!(
            (self, container),
            (VideoCodec::Xvid, Container::Avi | Container::Mkv)
                | (VideoCodec::Mp4v, Container::Mp4 | Container::Avi | Container::Mkv)
                | (VideoCodec::Mjpeg, Container::Avi | Container::Mkv)
                | (VideoCodec::H264, Container::Mp4 | Container::Mkv)
        )
    }

    /// 문자열(FourCC 또는 이름) 파싱
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.to_ascii_lowercase().as_str() {
            "xvid" => Ok(VideoCodec::Xvid),
            "mp4v" => Ok(VideoCodec::Mp4v),
            "mjpg" | "mjpeg" => Ok(VideoCodec::Mjpeg),
            "h264" | "avc1" | "x264" => Ok(VideoCodec::H264),
            other => Err(CoreError::Validation {
                field: "recording.codec".to_string(),
                message: format!("알 수 없는 코덱: {other}"),
            }),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fourcc())
    }
}

/// 컨테이너 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Avi,
    Mp4,
    Mkv,
}

impl Container {
    /// 파일 확장자 (점 제외)
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Avi => "avi",
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "avi" => Ok(Container::Avi),
            "mp4" => Ok(Container::Mp4),
            "mkv" => Ok(Container::Mkv),
            other => Err(CoreError::Validation {
                field: "recording.container".to_string(),
                message: format!("알 수 없는 컨테이너: {other}"),
            }),
        }
    }
}
