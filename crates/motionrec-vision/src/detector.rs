//! 움직임 감지기.
//!
//! 연속된 두 프레임의 블러 휘도 차이를 이진화해 변경 픽셀 수를 세고,
//! 임계값을 엄격히 초과하면 움직임으로 판정한다.
//! 직전 프레임은 감지기 인스턴스가 소유하며 인스턴스 간 공유되지 않는다.

use motionrec_core::config::{AppConfig, MotionConfig};
use motionrec_core::error::CoreError;
use motionrec_core::models::frame::{Frame, Resolution};
use motionrec_core::models::motion::MotionVerdict;
use tracing::{debug, trace};

use crate::preprocess::{box_blur, count_changed, luma};

/// 감지기 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorSettings {
    /// 움직임 판정 최소 변경 픽셀 수 (엄격한 초과)
    pub threshold: u64,
    /// 픽셀 이진화 임계값
    pub pixel_threshold: u8,
    /// 블러 커널 크기 (홀수)
    pub blur_kernel: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold: 500,
            pixel_threshold: 25,
            blur_kernel: 21,
        }
    }
}

impl From<&MotionConfig> for DetectorSettings {
    fn from(config: &MotionConfig) -> Self {
        Self {
            threshold: config.threshold,
            pixel_threshold: config.pixel_threshold,
            blur_kernel: config.blur_kernel,
        }
    }
}

/// 직전 프레임 (블러 적용 휘도)
struct Retained {
    resolution: Resolution,
    blurred: Vec<u8>,
}

/// 프레임 차분 기반 움직임 감지기
pub struct MotionDetector {
    settings: DetectorSettings,
    /// 설정으로 고정된 해상도
    configured: Option<Resolution>,
    /// 현재 기준 해상도 (설정값 또는 첫 프레임)
    geometry: Option<Resolution>,
    retained: Option<Retained>,
}

impl MotionDetector {
    /// 새 감지기. `resolution`이 None이면 첫 프레임 해상도를 기준으로 삼는다.
    pub fn new(settings: DetectorSettings, resolution: Option<Resolution>) -> Self {
        Self {
            settings,
            configured: resolution,
            geometry: resolution,
            retained: None,
        }
    }

    /// 애플리케이션 설정에서 생성 (캡처 해상도 고정)
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DetectorSettings::from(&config.motion),
            Some(config.capture.resolution),
        )
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// 비교 기준 프레임 보유 여부
    pub fn has_baseline(&self) -> bool {
        self.retained.is_some()
    }

    /// 프레임 관찰 → 판정
    ///
    /// 첫 프레임(또는 `reset` 직후)은 비교 없이 `score = 0` 판정을 반환하고 보관한다.
    /// 기준 해상도와 다른 프레임은 `MalformedFrame`으로 거부하며, 점수 계산도
    /// 보관도 하지 않는다.
    pub fn observe(&mut self, frame: &Frame) -> Result<MotionVerdict, CoreError> {
        let actual = frame.resolution();
        if let Some(expected) = self.geometry {
            if expected != actual {
                debug!(
                    "해상도 불일치 프레임 거부: 예상 {}, 실제 {} (seq={})",
                    expected,
                    actual,
                    frame.sequence()
                );
                return Err(CoreError::MalformedFrame { expected, actual });
            }
        }

        let blurred = box_blur(
            &luma(frame),
            actual.width as usize,
            actual.height as usize,
            self.settings.blur_kernel as usize,
        );

        let verdict = match self.retained.take() {
            None => {
                self.geometry = Some(actual);
                debug!("움직임 감지 기준 프레임 설정: {} (seq={})", actual, frame.sequence());
                MotionVerdict::baseline(frame.timestamp())
            }
            Some(prev) => {
                let score = count_changed(&prev.blurred, &blurred, self.settings.pixel_threshold);
                MotionVerdict::from_score(frame.timestamp(), score, self.settings.threshold)
            }
        };

        self.retained = Some(Retained {
            resolution: actual,
            blurred,
        });

        trace!(
            seq = frame.sequence(),
            score = verdict.score,
            motion = verdict.is_motion,
            "프레임 판정"
        );
        Ok(verdict)
    }

    /// 보관 프레임 폐기. 다음 프레임은 다시 기준 프레임이 된다.
    pub fn reset(&mut self) {
        if let Some(prev) = self.retained.take() {
            debug!("움직임 감지기 리셋 (직전 {})", prev.resolution);
        }
        self.geometry = self.configured;
    }
}
