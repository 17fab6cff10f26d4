//! 녹화 경로 레이아웃.
//!
//! `<root>/<YYYYMMDD>/<HHMMSS>.<ext>` 경로를 만들고 파일을 `create_new`로
//! 예약한다. 같은 초에 두 번째 세션이 열리면 기존 파일을 덮어쓰지 않고
//! `PathCollision`으로 실패한다.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use motionrec_core::config::{AppConfig, TimeZonePolicy};
use motionrec_core::error::CoreError;
use motionrec_core::models::codec::Container;
use tracing::{debug, warn};

/// 날짜 폴더 이름 형식
pub const DATE_DIR_FORMAT: &str = "%Y%m%d";
/// 파일 시각 형식
pub const TIME_FILE_FORMAT: &str = "%H%M%S";

/// 날짜별 녹화 경로 레이아웃
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    container: Container,
    time_zone: TimeZonePolicy,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>, container: Container, time_zone: TimeZonePolicy) -> Self {
        Self {
            root: root.into(),
            container,
            time_zone,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.storage.output_root.clone(),
            config.recording.container,
            config.storage.time_zone,
        )
    }

    /// 녹화 루트
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 세션 파일 확장자
    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }

    /// 설정 시간대 기준 달력 날짜
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        match self.time_zone {
            TimeZonePolicy::Local => now.with_timezone(&Local).date_naive(),
            TimeZonePolicy::Utc => now.date_naive(),
        }
    }

    /// (날짜 폴더 이름, 시각 문자열)
    fn render(&self, now: DateTime<Utc>) -> (String, String) {
        match self.time_zone {
            TimeZonePolicy::Local => {
                let local = now.with_timezone(&Local);
                (
                    local.format(DATE_DIR_FORMAT).to_string(),
                    local.format(TIME_FILE_FORMAT).to_string(),
                )
            }
            TimeZonePolicy::Utc => (
                now.format(DATE_DIR_FORMAT).to_string(),
                now.format(TIME_FILE_FORMAT).to_string(),
            ),
        }
    }

    /// `now`가 속한 날짜 폴더 경로 (생성하지 않음)
    pub fn day_dir(&self, now: DateTime<Utc>) -> PathBuf {
        self.root.join(self.render(now).0)
    }

    /// 새 세션 파일 경로 예약
    ///
    /// 날짜 폴더는 없으면 만들고(이미 있으면 그대로), 파일은 새로 생성해
    /// 예약한다. 같은 경로가 이미 있으면 `PathCollision`.
    pub fn session_path(&self, now: DateTime<Utc>) -> Result<PathBuf, CoreError> {
        let (date, time) = self.render(now);
        let path = self
            .root
            .join(&date)
            .join(format!("{time}.{}", self.extension()));
        self.reserve(&path)?;
        debug!("세션 경로 예약: {}", path.display());
        Ok(path)
    }

    /// 스틸 이미지 경로 예약 (`<prefix>_HHMMSS.<ext>`)
    pub fn snapshot_path(
        &self,
        now: DateTime<Utc>,
        prefix: &str,
        ext: &str,
    ) -> Result<PathBuf, CoreError> {
        let (date, time) = self.render(now);
        let path = self.root.join(&date).join(format!("{prefix}_{time}.{ext}"));
        self.reserve(&path)?;
        debug!("스틸 이미지 경로 예약: {}", path.display());
        Ok(path)
    }

    /// 사용되지 않은 예약 파일 제거 (싱크 열기 실패 시)
    pub fn discard(&self, path: &Path) {
        match fs::metadata(path) {
            Ok(meta) if meta.len() == 0 => {
                if let Err(e) = fs::remove_file(path) {
                    warn!("예약 파일 삭제 실패: {}: {e}", path.display());
                }
            }
            _ => {}
        }
    }

    fn reserve(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                CoreError::Storage(format!("날짜 폴더 생성 실패: {}: {e}", dir.display()))
            })?;
        }

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(|_| ())
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => CoreError::PathCollision(path.to_path_buf()),
                _ => CoreError::Storage(format!("녹화 파일 생성 실패: {}: {e}", path.display())),
            })
    }
}
