//! ffmpeg 비디오 싱크.
//!
//! rawvideo rgb24 프레임을 ffmpeg stdin으로 밀어 넣어 세션 파일로 인코딩한다.
//! `close`는 stdin을 닫아 EOF를 알리고 프로세스 종료를 기다린다.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use motionrec_core::error::CoreError;
use motionrec_core::models::codec::VideoCodec;
use motionrec_core::models::frame::Frame;
use motionrec_core::ports::sink::{SinkSpec, VideoSink, VideoSinkFactory};
use tracing::{debug, info, warn};

/// 오류 메시지용으로 보관하는 ffmpeg stderr 꼬리 크기
const STDERR_TAIL_BYTES: usize = 4096;

/// ffmpeg 인코더 인자 (stdin rawvideo → `path`)
pub fn encoder_args(path: &Path, spec: &SinkSpec) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        spec.resolution.to_string(),
        "-r".to_string(),
        format!("{}", spec.fps),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        spec.codec.ffmpeg_encoder().to_string(),
    ];

    match spec.codec {
        VideoCodec::Xvid => {
            args.extend(["-vtag".to_string(), "xvid".to_string()]);
            args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
        }
        VideoCodec::Mjpeg => {
            args.extend(["-pix_fmt".to_string(), "yuvj420p".to_string()]);
        }
        VideoCodec::Mp4v | VideoCodec::H264 => {
            args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
        }
    }

    args.push(path.display().to_string());
    args
}

/// ffmpeg 싱크 생성기
#[derive(Debug, Clone)]
pub struct FfmpegSinkFactory {
    ffmpeg_path: PathBuf,
}

impl FfmpegSinkFactory {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl VideoSinkFactory for FfmpegSinkFactory {
    fn open(&self, path: &Path, spec: &SinkSpec) -> Result<Box<dyn VideoSink>, CoreError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command.args(encoder_args(path, spec));
        debug!("ffmpeg 인코더 실행: {:?}", command);
        let sink = FfmpegVideoSink::spawn(command, path, *spec)?;
        Ok(Box::new(sink))
    }
}

/// ffmpeg 프로세스에 바인딩된 비디오 싱크
pub struct FfmpegVideoSink {
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_tail: Option<JoinHandle<String>>,
    spec: SinkSpec,
    path: PathBuf,
    frames_written: u64,
    closed: bool,
}

impl FfmpegVideoSink {
    /// 준비된 커맨드로 인코더 프로세스 실행
    pub(crate) fn spawn(
        mut command: Command,
        path: &Path,
        spec: SinkSpec,
    ) -> Result<Self, CoreError> {
        let mut process = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::Encoder(format!("ffmpeg 실행 실패: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| CoreError::Encoder("ffmpeg stdin 연결 실패".to_string()))?;

        // stderr를 계속 비우지 않으면 파이프가 차서 ffmpeg가 stdin 읽기를 멈춘다
        let stderr_tail = match process.stderr.take().map(spawn_stderr_drain).transpose() {
            Ok(tail) => tail,
            Err(e) => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(e);
            }
        };

        info!(
            "비디오 싱크 열림: {} ({} {} {}fps)",
            path.display(),
            spec.codec,
            spec.resolution,
            spec.fps
        );

        Ok(Self {
            process: Some(process),
            stdin: Some(stdin),
            stderr_tail,
            spec,
            path: path.to_path_buf(),
            frames_written: 0,
            closed: false,
        })
    }

    /// 출력 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoSink for FfmpegVideoSink {
    fn write(&mut self, frame: &Frame) -> Result<(), CoreError> {
        if self.closed {
            return Err(CoreError::SinkClosed);
        }
        if frame.resolution() != self.spec.resolution {
            return Err(CoreError::MalformedFrame {
                expected: self.spec.resolution,
                actual: frame.resolution(),
            });
        }

        let stdin = self.stdin.as_mut().ok_or(CoreError::SinkClosed)?;
        stdin.write_all(frame.data()).map_err(|e| {
            CoreError::Encoder(format!(
                "프레임 기록 실패 ({}): {e}",
                self.path.display()
            ))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // stdin을 닫아 EOF 전달
        drop(self.stdin.take());

        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        let status = process
            .wait()
            .map_err(|e| CoreError::Encoder(format!("ffmpeg 종료 대기 실패: {e}")))?;
        let stderr = self
            .stderr_tail
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            if self.frames_written > 0 {
                return Err(CoreError::Encoder(format!(
                    "ffmpeg 비정상 종료 ({status}): {}",
                    stderr.trim()
                )));
            }
            // 프레임 없이 닫힌 세션은 ffmpeg가 실패해도 정상 해제로 본다
            warn!(
                "빈 세션 인코더 종료 코드 무시: {} ({status})",
                self.path.display()
            );
        }

        info!(
            "비디오 싱크 닫힘: {} ({}프레임)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// stderr를 끝까지 읽고 마지막 `STDERR_TAIL_BYTES`만 남긴다
fn spawn_stderr_drain(mut stderr: ChildStderr) -> Result<JoinHandle<String>, CoreError> {
    std::thread::Builder::new()
        .name("motionrec-ffmpeg-stderr".to_string())
        .spawn(move || {
            let mut tail: Vec<u8> = Vec::with_capacity(STDERR_TAIL_BYTES);
            let mut buf = [0u8; 4096];
            loop {
                match stderr.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        tail.extend_from_slice(&buf[..n]);
                        if tail.len() > STDERR_TAIL_BYTES {
                            let excess = tail.len() - STDERR_TAIL_BYTES;
                            tail.drain(..excess);
                        }
                    }
                }
            }
            String::from_utf8_lossy(&tail).into_owned()
        })
        .map_err(|e| CoreError::Internal(format!("stderr 수집 스레드 생성 실패: {e}")))
}

impl Drop for FfmpegVideoSink {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("비디오 싱크 drop 중 종료 실패: {e}");
            }
        }
    }
}
