//! 캡처 프레임 모델.
//!
//! 캡처 장치가 생성하고 감지기/싱크가 읽기 전용으로 소비하는
//! 불변 RGB24 프레임과 해상도를 정의.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 픽셀당 바이트 수 (RGB24)
pub const BYTES_PER_PIXEL: usize = 3;

/// 프레임 해상도 (width, height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 전체 픽셀 수
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// RGB24 프레임 바이트 크기
    pub fn frame_len(&self) -> usize {
        self.pixel_count() * BYTES_PER_PIXEL
    }

    /// "640x480" 형식 파싱
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| CoreError::Validation {
                field: "resolution".to_string(),
                message: format!("'WxH' 형식이 아님: {s}"),
            })?;
        let parse_dim = |v: &str| {
            v.trim().parse::<u32>().map_err(|_| CoreError::Validation {
                field: "resolution".to_string(),
                message: format!("숫자가 아님: {v}"),
            })
        };
        Ok(Self::new(parse_dim(w)?, parse_dim(h)?))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 캡처된 프레임 (불변)
///
/// 픽셀 데이터는 `Arc<[u8]>`로 공유되므로 복제 비용이 낮다.
/// 생성 이후 어떤 컴포넌트도 내용을 변경하지 않는다.
#[derive(Debug, Clone)]
pub struct Frame {
    resolution: Resolution,
    timestamp: DateTime<Utc>,
    sequence: u64,
    data: Arc<[u8]>,
}

impl Frame {
    /// RGB24 바이트로 프레임 생성. 길이가 해상도와 맞지 않으면 에러.
    pub fn new(
        resolution: Resolution,
        timestamp: DateTime<Utc>,
        sequence: u64,
        data: Vec<u8>,
    ) -> Result<Self, CoreError> {
        if data.len() != resolution.frame_len() {
            return Err(CoreError::Validation {
                field: "frame.data".to_string(),
                message: format!(
                    "{resolution} RGB24 프레임은 {}바이트여야 함 (실제 {})",
                    resolution.frame_len(),
                    data.len()
                ),
            });
        }
        Ok(Self {
            resolution,
            timestamp,
            sequence,
            data: data.into(),
        })
    }

    /// 단색 프레임 (테스트/합성 소스용)
    pub fn filled(
        resolution: Resolution,
        timestamp: DateTime<Utc>,
        sequence: u64,
        rgb: [u8; 3],
    ) -> Self {
        let data: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take(resolution.frame_len())
            .collect();
        Self {
            resolution,
            timestamp,
            sequence,
            data: data.into(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    /// 캡처 시각
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// 소스 내 단조 증가 순번
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// RGB24 픽셀 데이터 (행 우선)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 동일 픽셀 데이터에 다른 시각/순번을 부여한 프레임
    pub fn restamped(&self, timestamp: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            resolution: self.resolution,
            timestamp,
            sequence,
            data: Arc::clone(&self.data),
        }
    }
}
