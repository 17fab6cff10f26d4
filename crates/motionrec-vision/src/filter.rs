//! 프레임 필터 체인.
//!
//! 싱크 기록 직전에 프레임마다 순서대로 적용되는 변환 목록.
//! 감지기는 항상 원본 프레임을 본다.

use std::sync::Arc;

use motionrec_core::error::CoreError;
use motionrec_core::models::frame::{Frame, BYTES_PER_PIXEL};
use motionrec_core::ports::filter::FrameFilter;
use tracing::debug;

use crate::preprocess::luma;

/// 회색조 (BT.601 휘도를 세 채널에 복사)
pub struct Grayscale;

impl FrameFilter for Grayscale {
    fn name(&self) -> &str {
        "grayscale"
    }

    fn apply(&self, frame: &Frame) -> Result<Frame, CoreError> {
        let data = luma(frame).into_iter().flat_map(|y| [y; 3]).collect();
        Frame::new(frame.resolution(), frame.timestamp(), frame.sequence(), data)
    }
}

/// 좌우 반전
pub struct Mirror;

impl FrameFilter for Mirror {
    fn name(&self) -> &str {
        "mirror"
    }

    fn apply(&self, frame: &Frame) -> Result<Frame, CoreError> {
        let stride = frame.width() as usize * BYTES_PER_PIXEL;
        // 폭 0 프레임은 뒤집을 열이 없다
        if stride == 0 {
            return Ok(frame.clone());
        }
        let mut data = Vec::with_capacity(frame.data().len());
        for row in frame.data().chunks_exact(stride) {
            for px in row.chunks_exact(BYTES_PER_PIXEL).rev() {
                data.extend_from_slice(px);
            }
        }
        Frame::new(frame.resolution(), frame.timestamp(), frame.sequence(), data)
    }
}

/// 색 반전
pub struct Invert;

impl FrameFilter for Invert {
    fn name(&self) -> &str {
        "invert"
    }

    fn apply(&self, frame: &Frame) -> Result<Frame, CoreError> {
        let data = frame.data().iter().map(|v| 255 - v).collect();
        Frame::new(frame.resolution(), frame.timestamp(), frame.sequence(), data)
    }
}

/// 이름으로 내장 필터 생성
pub fn builtin(name: &str) -> Result<Arc<dyn FrameFilter>, CoreError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "grayscale" | "gray" => Ok(Arc::new(Grayscale)),
        "mirror" => Ok(Arc::new(Mirror)),
        "invert" => Ok(Arc::new(Invert)),
        other => Err(CoreError::Validation {
            field: "recording.filters".to_string(),
            message: format!("알 수 없는 필터: {other}"),
        }),
    }
}

/// 순서가 있는 필터 목록
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn FrameFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정의 필터 이름 목록으로 체인 구성
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, CoreError> {
        let filters = names
            .iter()
            .map(|n| builtin(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    /// 필터 추가 (빌더)
    pub fn with(mut self, filter: Arc<dyn FrameFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// 필터 이름 목록
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// 모든 필터를 순서대로 적용. 빈 체인이면 프레임을 그대로 복제한다.
    ///
    /// 필터가 해상도를 바꾸면 `MalformedFrame`.
    pub fn apply(&self, frame: &Frame) -> Result<Frame, CoreError> {
        let mut current = frame.clone();
        for filter in &self.filters {
            let next = filter.apply(&current)?;
            if next.resolution() != current.resolution() {
                debug!("필터 {}가 해상도를 변경함", filter.name());
                return Err(CoreError::MalformedFrame {
                    expected: current.resolution(),
                    actual: next.resolution(),
                });
            }
            current = next;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
