//! ffmpeg 카메라 프레임 소스.
//!
//! 플랫폼 캡처 장치(v4l2 / avfoundation / dshow)를 ffmpeg로 열고
//! stdout으로 rawvideo rgb24 프레임을 받아 한 프레임씩 읽는다.

use std::io::{BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use chrono::Utc;
use motionrec_core::config::AppConfig;
use motionrec_core::error::CoreError;
use motionrec_core::models::frame::{Frame, Resolution};
use motionrec_core::ports::capture::FrameSource;
use tracing::{debug, info, warn};

/// 카메라 열기 파라미터
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// ffmpeg 실행 파일
    pub ffmpeg_path: PathBuf,
    /// 장치 식별자 (None이면 플랫폼 기본 장치)
    pub device: Option<String>,
    /// 출력 해상도
    pub resolution: Resolution,
    /// 요청 fps
    pub fps: f64,
}

impl CameraSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ffmpeg_path: config.capture.ffmpeg_path.clone(),
            device: config.capture.device.clone(),
            resolution: config.capture.resolution,
            fps: config.capture.fps,
        }
    }

    /// ffmpeg 인자 목록 (입력 장치 → rawvideo rgb24 stdout)
    pub fn ffmpeg_args(&self) -> Result<Vec<String>, CoreError> {
        let (format, input) = platform_input(self.device.as_deref())?;
        let res = self.resolution;
        Ok(vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostdin".to_string(),
            "-f".to_string(),
            format.to_string(),
            "-framerate".to_string(),
            format_fps(self.fps),
            "-i".to_string(),
            input,
            "-vf".to_string(),
            format!("scale={}:{}", res.width, res.height),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-".to_string(),
        ])
    }
}

/// 플랫폼별 ffmpeg 입력 포맷과 장치 이름
fn platform_input(device: Option<&str>) -> Result<(&'static str, String), CoreError> {
    if cfg!(target_os = "linux") {
        Ok(("v4l2", device.unwrap_or("/dev/video0").to_string()))
    } else if cfg!(target_os = "macos") {
        Ok(("avfoundation", device.unwrap_or("0").to_string()))
    } else if cfg!(target_os = "windows") {
        // dshow는 장치 이름이 필수
        let name = device.ok_or_else(|| {
            CoreError::Device("Windows에서는 --device로 카메라 이름을 지정해야 함".to_string())
        })?;
        Ok(("dshow", format!("video={name}")))
    } else {
        Err(CoreError::Device(
            "지원하지 않는 플랫폼의 카메라 캡처".to_string(),
        ))
    }
}

fn format_fps(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as u64)
    } else {
        format!("{fps:.3}")
    }
}

/// ffmpeg 파이프 기반 카메라
pub struct FfmpegCamera {
    process: Child,
    stdout: BufReader<ChildStdout>,
    resolution: Resolution,
    device: String,
    sequence: u64,
}

impl FfmpegCamera {
    /// ffmpeg 프로세스를 띄워 카메라 열기
    pub fn open(settings: &CameraSettings) -> Result<Self, CoreError> {
        let args = settings.ffmpeg_args()?;
        let device = settings
            .device
            .clone()
            .unwrap_or_else(|| "default".to_string());

        debug!("ffmpeg 카메라 실행: {} {}", settings.ffmpeg_path.display(), args.join(" "));

        let mut process = Command::new(&settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                CoreError::Device(format!(
                    "ffmpeg 실행 실패 ({}): {e}",
                    settings.ffmpeg_path.display()
                ))
            })?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| CoreError::Device("ffmpeg stdout 연결 실패".to_string()))?;

        let frame_len = settings.resolution.frame_len();
        info!(
            "카메라 열림: {} @ {} {}fps",
            device,
            settings.resolution,
            format_fps(settings.fps)
        );

        Ok(Self {
            process,
            stdout: BufReader::with_capacity(frame_len * 2, stdout),
            resolution: settings.resolution,
            device,
            sequence: 0,
        })
    }
}

impl FrameSource for FfmpegCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CoreError> {
        let mut buffer = vec![0u8; self.resolution.frame_len()];

        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {
                let frame = Frame::new(self.resolution, Utc::now(), self.sequence, buffer)?;
                self.sequence += 1;
                Ok(Some(frame))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                // 장치 분리 또는 ffmpeg 종료. 잘린 프레임은 버린다.
                warn!("카메라 스트림 종료: {} ({}프레임)", self.device, self.sequence);
                Ok(None)
            }
            Err(e) => Err(CoreError::Device(format!(
                "카메라 프레임 읽기 실패 ({}): {e}",
                self.device
            ))),
        }
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn describe(&self) -> String {
        format!("camera {} @ {}", self.device, self.resolution)
    }
}

impl Drop for FfmpegCamera {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(device: Option<&str>) -> CameraSettings {
        CameraSettings {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            device: device.map(str::to_string),
            resolution: Resolution::new(640, 480),
            fps: 20.0,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_args_use_v4l2() {
        let args = settings(None).ffmpeg_args().unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-f v4l2 -framerate 20 -i /dev/video0"));
        assert!(joined.contains("-vf scale=640:480"));
        assert!(joined.ends_with("-f rawvideo -pix_fmt rgb24 -"));

        let custom = settings(Some("/dev/video2")).ffmpeg_args().unwrap();
        assert!(custom.contains(&"/dev/video2".to_string()));
    }

    #[test]
    fn fractional_fps_formatting() {
        assert_eq!(format_fps(20.0), "20");
        assert_eq!(format_fps(29.97), "29.970");
    }

    #[test]
    fn missing_binary_is_device_error() {
        let mut s = settings(Some("0"));
        s.ffmpeg_path = PathBuf::from("/nonexistent/motionrec-ffmpeg");
        if cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
            let result = FfmpegCamera::open(&s);
            assert!(matches!(result, Err(CoreError::Device(_))));
        }
    }

    #[test]
    fn from_config_copies_capture_section() {
        let mut config = AppConfig::default_config();
        config.capture.device = Some("cam0".to_string());
        let s = CameraSettings::from_config(&config);
        assert_eq!(s.device.as_deref(), Some("cam0"));
        assert_eq!(s.resolution, Resolution::new(640, 480));
    }
}
