//! 움직임 감지 전처리.
//!
//! RGB24 → 휘도(BT.601) 변환, 박스 블러, 절대차 이진화 카운트.
//! 모든 버퍼는 행 우선 단일 채널 `u8`.

use motionrec_core::models::frame::{Frame, BYTES_PER_PIXEL};

/// RGB24 프레임을 단일 채널 휘도로 변환
///
/// ITU-R BT.601 가중치 (0.299, 0.587, 0.114), 정수 연산 + 반올림.
pub fn luma(frame: &Frame) -> Vec<u8> {
    frame
        .data()
        .chunks_exact(BYTES_PER_PIXEL)
        .map(|px| {
            let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
            ((y + 500) / 1000) as u8
        })
        .collect()
}

/// `kernel × kernel` 박스 블러
///
/// 경계에서는 창을 이미지 안쪽으로 잘라내고 실제 포함된 픽셀 수로 평균한다.
/// 가로/세로 누적합 두 번으로 계산하므로 커널 크기와 무관하게 O(w·h).
/// `kernel <= 1`이면 입력을 그대로 복사한다.
pub fn box_blur(gray: &[u8], width: usize, height: usize, kernel: usize) -> Vec<u8> {
    debug_assert_eq!(gray.len(), width * height);
    if kernel <= 1 || width == 0 || height == 0 {
        return gray.to_vec();
    }
    let radius = kernel / 2;

    // 1단계: 가로 창 합 (평균하지 않고 합만 유지)
    let mut row_sums = vec![0u32; width * height];
    let mut prefix = vec![0u32; width + 1];
    for y in 0..height {
        let row = &gray[y * width..(y + 1) * width];
        for (x, &v) in row.iter().enumerate() {
            prefix[x + 1] = prefix[x] + v as u32;
        }
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius + 1).min(width);
            row_sums[y * width + x] = prefix[hi] - prefix[lo];
        }
    }

    // 2단계: 세로 창 합 → 잘린 사각형 면적으로 나눔
    let mut out = vec![0u8; width * height];
    let mut col_prefix = vec![0u32; height + 1];
    for x in 0..width {
        for y in 0..height {
            col_prefix[y + 1] = col_prefix[y] + row_sums[y * width + x];
        }
        let span_x = (x + radius + 1).min(width) - x.saturating_sub(radius);
        for y in 0..height {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius + 1).min(height);
            let area = (span_x * (hi - lo)) as u32;
            let sum = col_prefix[hi] - col_prefix[lo];
            out[y * width + x] = ((sum + area / 2) / area) as u8;
        }
    }
    out
}

/// 두 휘도 버퍼에서 `|a - b| > pixel_threshold`인 픽셀 수
pub fn count_changed(prev: &[u8], curr: &[u8], pixel_threshold: u8) -> u64 {
    debug_assert_eq!(prev.len(), curr.len());
    prev.iter()
        .zip(curr)
        .filter(|(&a, &b)| a.abs_diff(b) > pixel_threshold)
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use motionrec_core::models::frame::Resolution;

    #[test]
    fn luma_weights() {
        let white = Frame::filled(Resolution::new(1, 1), Utc::now(), 0, [255, 255, 255]);
        assert_eq!(luma(&white), vec![255]);

        let red = Frame::filled(Resolution::new(1, 1), Utc::now(), 0, [255, 0, 0]);
        assert_eq!(luma(&red), vec![76]);

        let green = Frame::filled(Resolution::new(1, 1), Utc::now(), 0, [0, 255, 0]);
        assert_eq!(luma(&green), vec![150]);
    }

    #[test]
    fn blur_of_uniform_image_is_uniform() {
        let gray = vec![80u8; 12 * 9];
        assert_eq!(box_blur(&gray, 12, 9, 5), gray);
    }

    #[test]
    fn blur_averages_clipped_window() {
        // 3x3, 중앙만 90
        let mut gray = vec![0u8; 9];
        gray[4] = 90;
        let out = box_blur(&gray, 3, 3, 3);
        // 중앙: 창 전체(9픽셀) 평균 = 10
        assert_eq!(out[4], 10);
        // 모서리: 잘린 2x2 창 평균 = 90/4 = 22.5 → 23
        assert_eq!(out[0], 23);
        // 변 중앙: 잘린 3x2 창 평균 = 15
        assert_eq!(out[1], 15);
    }

    #[test]
    fn kernel_one_is_identity() {
        let gray: Vec<u8> = (0..20).collect();
        assert_eq!(box_blur(&gray, 5, 4, 1), gray);
    }

    #[test]
    fn changed_count_is_strict() {
        let prev = [0u8, 0, 0, 0];
        let curr = [25u8, 26, 200, 0];
        assert_eq!(count_changed(&prev, &curr, 25), 2);
    }
}
