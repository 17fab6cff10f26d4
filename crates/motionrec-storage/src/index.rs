//! 녹화 목록 / 보존 정책.
//!
//! 녹화 루트 아래의 `YYYYMMDD` 날짜 폴더를 스캔한다.
//! 날짜 형식이 아닌 폴더는 무시한다.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use motionrec_core::error::CoreError;
use serde::Serialize;
use tracing::{info, warn};

use crate::layout::DATE_DIR_FORMAT;

/// 녹화 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// 비디오 세션
    Video,
    /// 스틸 이미지 (스냅샷, 저조도 사진)
    Still,
    /// 기타 파일
    Other,
}

impl EntryKind {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("avi" | "mp4" | "mkv") => EntryKind::Video,
            Some("jpg" | "jpeg" | "png") => EntryKind::Still,
            _ => EntryKind::Other,
        }
    }
}

/// 녹화 파일 항목
#[derive(Debug, Clone, Serialize)]
pub struct RecordingEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub kind: EntryKind,
}

/// 날짜 폴더 하나의 녹화 목록
#[derive(Debug, Clone, Serialize)]
pub struct DayRecordings {
    pub date: NaiveDate,
    pub dir: PathBuf,
    pub entries: Vec<RecordingEntry>,
}

impl DayRecordings {
    /// 폴더 총 용량
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }
}

/// 보존 정책 적용 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// 삭제된 날짜 폴더 수
    pub dirs_removed: usize,
    /// 삭제된 파일 수
    pub files_removed: usize,
}

/// 보존 기간(일)에서 삭제 기준 날짜 계산. 0이면 무제한(None).
pub fn retention_cutoff(today: NaiveDate, retention_days: u32) -> Option<NaiveDate> {
    if retention_days == 0 {
        return None;
    }
    today.checked_sub_signed(Duration::days(retention_days as i64))
}

/// 날짜 폴더 목록 (오래된 순)
fn list_date_dirs(root: &Path) -> Result<Vec<(NaiveDate, PathBuf)>, CoreError> {
    let mut dirs = Vec::new();
    if !root.exists() {
        return Ok(dirs);
    }

    let entries = fs::read_dir(root).map_err(|e| {
        CoreError::Storage(format!("녹화 루트 읽기 실패: {}: {e}", root.display()))
    })?;

    for entry in entries {
        let entry =
            entry.map_err(|e| CoreError::Storage(format!("디렉토리 항목 읽기 실패: {e}")))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.len() != 8 {
            continue;
        }
        if let Ok(date) = NaiveDate::parse_from_str(name, DATE_DIR_FORMAT) {
            dirs.push((date, path));
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// 날짜별 녹화 목록 (날짜 오름차순, 폴더 내 파일명 오름차순)
pub fn list_recordings(root: &Path) -> Result<Vec<DayRecordings>, CoreError> {
    let mut days = Vec::new();

    for (date, dir) in list_date_dirs(root)? {
        let mut entries = Vec::new();
        let read = fs::read_dir(&dir).map_err(|e| {
            CoreError::Storage(format!("날짜 폴더 읽기 실패: {}: {e}", dir.display()))
        })?;
        for entry in read {
            let entry =
                entry.map_err(|e| CoreError::Storage(format!("디렉토리 항목 읽기 실패: {e}")))?;
            let path = entry.path();
            let meta = entry
                .metadata()
                .map_err(|e| CoreError::Storage(format!("파일 정보 읽기 실패: {e}")))?;
            if !meta.is_file() {
                continue;
            }
            entries.push(RecordingEntry {
                kind: EntryKind::from_path(&path),
                path,
                size_bytes: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        days.push(DayRecordings { date, dir, entries });
    }

    Ok(days)
}

/// `cutoff`보다 엄격히 이전인 날짜 폴더 삭제
pub fn prune_before(root: &Path, cutoff: NaiveDate) -> Result<PruneReport, CoreError> {
    let mut report = PruneReport::default();

    for (date, dir) in list_date_dirs(root)? {
        if date >= cutoff {
            break;
        }
        let files = fs::read_dir(&dir).map(|r| r.count()).unwrap_or(0);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                report.dirs_removed += 1;
                report.files_removed += files;
            }
            Err(e) => warn!("오래된 녹화 폴더 삭제 실패: {}: {e}", dir.display()),
        }
    }

    if report.dirs_removed > 0 {
        info!(
            "녹화 보존 정책: 폴더 {}개, 파일 {}개 삭제 (< {})",
            report.dirs_removed, report.files_removed, cutoff
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed(root: &Path) {
        for (dir, files) in [
            ("20240101", vec!["080000.avi", "screenshot_080500.jpg"]),
            ("20240102", vec!["120000.avi"]),
            ("20240105", vec!["090000.mp4", "093000.mp4"]),
        ] {
            let d = root.join(dir);
            fs::create_dir_all(&d).unwrap();
            for f in files {
                fs::write(d.join(f), b"0123").unwrap();
            }
        }
        // 날짜 형식이 아닌 폴더
        fs::create_dir_all(root.join("exports")).unwrap();
        fs::write(root.join("exports").join("a.avi"), b"x").unwrap();
    }

    #[test]
    fn list_groups_by_day_in_order() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());

        let days = list_recordings(tmp.path()).unwrap();
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 5)]);

        assert_eq!(days[0].entries.len(), 2);
        assert_eq!(days[0].entries[0].kind, EntryKind::Video);
        assert_eq!(days[0].entries[1].kind, EntryKind::Still);
        assert_eq!(days[2].total_bytes(), 8);
    }

    #[test]
    fn missing_root_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(list_recordings(&tmp.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn prune_removes_strictly_older_dirs() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());

        let report = prune_before(tmp.path(), day(2024, 1, 2)).unwrap();
        assert_eq!(
            report,
            PruneReport {
                dirs_removed: 1,
                files_removed: 2
            }
        );
        assert!(!tmp.path().join("20240101").exists());
        assert!(tmp.path().join("20240102").exists());
        assert!(tmp.path().join("exports").exists());
    }

    #[test]
    fn retention_zero_keeps_everything() {
        assert_eq!(retention_cutoff(day(2024, 1, 10), 0), None);
        assert_eq!(
            retention_cutoff(day(2024, 1, 10), 7),
            Some(day(2024, 1, 3))
        );
    }
}
