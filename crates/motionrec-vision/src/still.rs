//! 스틸 이미지.
//!
//! 프레임 JPEG 인코딩과 저조도 촬영용 다중 프레임 평균.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use motionrec_core::error::CoreError;
use motionrec_core::models::frame::Frame;
use tracing::debug;

/// 프레임을 JPEG 바이트로 인코딩
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| CoreError::Internal(format!("JPEG 인코딩 실패: {e}")))?;
    Ok(buf)
}

/// 프레임을 JPEG 파일로 저장 (예약된 경로에 덮어쓰기)
pub fn save_jpeg(frame: &Frame, path: &Path, quality: u8) -> Result<(), CoreError> {
    let bytes = encode_jpeg(frame, quality)?;
    let file = File::create(path).map_err(|e| {
        CoreError::Storage(format!("스틸 이미지 파일 열기 실패: {}: {e}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&bytes)
        .and_then(|_| writer.flush())
        .map_err(|e| {
            CoreError::Storage(format!("스틸 이미지 저장 실패: {}: {e}", path.display()))
        })?;
    debug!("스틸 이미지 저장: {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// 픽셀별 평균 프레임 (노이즈 감소)
///
/// 타임스탬프와 순번은 마지막 프레임 것을 사용한다.
/// 해상도가 섞여 있으면 `MalformedFrame`.
pub fn average_frames(frames: &[Frame]) -> Result<Frame, CoreError> {
    let last = frames
        .last()
        .ok_or_else(|| CoreError::Internal("평균할 프레임이 없음".to_string()))?;
    let resolution = last.resolution();

    let mut sums = vec![0u32; resolution.frame_len()];
    for frame in frames {
        if frame.resolution() != resolution {
            return Err(CoreError::MalformedFrame {
                expected: resolution,
                actual: frame.resolution(),
            });
        }
        for (acc, &v) in sums.iter_mut().zip(frame.data()) {
            *acc += v as u32;
        }
    }

    let n = frames.len() as u32;
    let data = sums.into_iter().map(|s| ((s + n / 2) / n) as u8).collect();
    Frame::new(resolution, last.timestamp(), last.sequence(), data)
}
