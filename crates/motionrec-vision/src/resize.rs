//! 프레임 리사이즈.
//!
//! fast_image_resize 기반 RGB24 리사이즈. 스크린 캡처 결과를
//! 요청 캡처 해상도에 맞출 때 사용한다.

use fast_image_resize::{images::Image as FirImage, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbImage;
use motionrec_core::error::CoreError;
use motionrec_core::models::frame::Resolution;
use tracing::trace;

/// RGB 이미지를 목표 해상도로 리사이즈 → RGB24 바이트
///
/// 동일 크기면 복사 없이 원본 버퍼를 반환한다.
pub fn resize_rgb(image: RgbImage, target: Resolution) -> Result<Vec<u8>, CoreError> {
    let (src_w, src_h) = image.dimensions();

    if src_w == target.width && src_h == target.height {
        return Ok(image.into_raw());
    }
    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Internal("소스 이미지 크기 0".to_string()));
    }
    if target.width == 0 || target.height == 0 {
        return Err(CoreError::Internal("목표 이미지 크기 0".to_string()));
    }

    let src_image = FirImage::from_vec_u8(src_w, src_h, image.into_raw(), PixelType::U8x3)
        .map_err(|e| CoreError::Internal(format!("소스 이미지 생성 실패: {e}")))?;

    let mut dst_image = FirImage::new(target.width, target.height, PixelType::U8x3);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));

    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Internal(format!("리사이즈 실패: {e}")))?;

    trace!("프레임 리사이즈: {}x{} → {}", src_w, src_h, target);
    Ok(dst_image.into_vec())
}
