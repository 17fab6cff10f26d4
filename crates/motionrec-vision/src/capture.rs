//! 스크린 캡처 / 리플레이 프레임 소스.
//!
//! - [`ScreenCapture`]: xcap 기반 모니터 캡처, 요청 해상도로 리사이즈, fps 페이싱
//! - [`ReplaySource`]: 준비된 프레임을 순서대로 내보낸 뒤 스트림 종료

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use image::DynamicImage;
use motionrec_core::error::CoreError;
use motionrec_core::models::frame::{Frame, Resolution};
use motionrec_core::ports::capture::FrameSource;
use tracing::debug;
use xcap::Monitor;

use crate::resize::resize_rgb;

/// 스크린 캡처: xcap 기반
pub struct ScreenCapture {
    /// 모니터 인덱스 (None이면 주 모니터)
    monitor: Option<usize>,
    resolution: Resolution,
    interval: Duration,
    last_capture: Option<Instant>,
    sequence: u64,
}

impl ScreenCapture {
    /// 새 캡처 인스턴스 생성
    pub fn new(monitor: Option<usize>, resolution: Resolution, fps: f64) -> Self {
        Self {
            monitor,
            resolution,
            interval: Duration::from_secs_f64(1.0 / fps),
            last_capture: None,
            sequence: 0,
        }
    }

    /// 장치 문자열("0", "1", ...)에서 모니터 인덱스 파싱
    pub fn parse_monitor(device: Option<&str>) -> Result<Option<usize>, CoreError> {
        device
            .map(|d| {
                d.trim()
                    .parse::<usize>()
                    .map_err(|_| CoreError::Device(format!("잘못된 모니터 인덱스: {d}")))
            })
            .transpose()
    }

    /// 사용 가능한 모니터 수
    pub fn monitor_count() -> Result<usize, CoreError> {
        Monitor::all()
            .map(|m| m.len())
            .map_err(|e| CoreError::Device(format!("모니터 목록 조회 실패: {e}")))
    }

    fn find_monitor(&self) -> Result<Monitor, CoreError> {
        let monitors = Monitor::all()
            .map_err(|e| CoreError::Device(format!("모니터 목록 조회 실패: {e}")))?;

        match self.monitor {
            Some(index) => monitors
                .into_iter()
                .nth(index)
                .ok_or_else(|| CoreError::Device(format!("모니터 인덱스 {index} 없음"))),
            None => {
                let mut fallback = None;
                for m in monitors {
                    if m.is_primary().unwrap_or(false) {
                        return Ok(m);
                    }
                    if fallback.is_none() {
                        fallback = Some(m);
                    }
                }
                fallback.ok_or_else(|| CoreError::Device("모니터를 찾을 수 없음".to_string()))
            }
        }
    }

    /// 다음 캡처 시각까지 대기
    fn pace(&mut self) {
        if let Some(last) = self.last_capture {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_capture = Some(Instant::now());
    }
}

impl FrameSource for ScreenCapture {
    fn next_frame(&mut self) -> Result<Option<Frame>, CoreError> {
        self.pace();

        let monitor = self.find_monitor()?;
        let image = monitor
            .capture_image()
            .map_err(|e| CoreError::Device(format!("스크린 캡처 실패: {e}")))?;
        let timestamp = Utc::now();

        let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
        let data = resize_rgb(rgb, self.resolution)?;

        let frame = Frame::new(self.resolution, timestamp, self.sequence, data)?;
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn describe(&self) -> String {
        match self.monitor {
            Some(i) => format!("screen monitor #{i} @ {}", self.resolution),
            None => format!("screen primary @ {}", self.resolution),
        }
    }
}

/// 리플레이 소스: 준비된 프레임 재생 (테스트/벤치/드라이런)
pub struct ReplaySource {
    resolution: Resolution,
    frames: VecDeque<Frame>,
    /// 프레임 소진 후 반환할 장치 에러 (None이면 스트림 종료)
    trailing_fault: Option<String>,
}

impl ReplaySource {
    pub fn new(resolution: Resolution, frames: Vec<Frame>) -> Self {
        Self {
            resolution,
            frames: frames.into(),
            trailing_fault: None,
        }
    }

    /// 프레임 소진 후 스트림 종료 대신 장치 에러를 반환
    pub fn ending_with_fault(mut self, message: impl Into<String>) -> Self {
        self.trailing_fault = Some(message.into());
        self
    }

    /// 남은 프레임 수
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CoreError> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        match self.trailing_fault.take() {
            Some(message) => Err(CoreError::Device(message)),
            None => {
                debug!("리플레이 소스 종료");
                Ok(None)
            }
        }
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn describe(&self) -> String {
        format!("replay {} ({} frames)", self.resolution, self.frames.len())
    }
}
