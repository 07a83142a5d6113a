//! Spreadsheet Extractor
//!
//! Turns downloaded xlsx exports into typed jobs:
//! - 진행 중 입법예고 목록 → [`NoticeListing`]
//! - 입법예고 등록의견 목록 → [`OpinionJob`], filtered by the stored watermark
//!
//! Opinion files are named `<bill_id>,<yyMMddHHmm>.xlsx`; the bill id comes
//! from the file name because the export itself does not carry it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{LegislativeStore, NoticeListing, OpinionJob};
use crate::infrastructure::{SpreadsheetError, SpreadsheetReader};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("cannot derive bill id from file name {0}")]
    FileName(String),

    #[error("cannot list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub const NOTICE_FILE_PREFIX: &str = "legislation_notice_";
const XLSX_EXTENSION: &str = "xlsx";

/// 의견 엑셀 컬럼: 0 순번, 1 의견번호, 2 제목, 3 작성자, 4 의견제출기관, 5 등록일
const OPINION_MIN_CELLS: usize = 6;
/// 입법예고 엑셀 컬럼: 0 순번, 1 의안번호, 2 의견수, ...
const NOTICE_MIN_CELLS: usize = 3;

fn has_cells(row: &[String], min_cells: usize, source: &str) -> bool {
    if row.len() < min_cells {
        warn!(
            "⚠️ {} row dropped: {} of {} cells {:?}",
            source,
            row.len(),
            min_cells,
            row
        );
        return false;
    }
    true
}

/// Notice rows with a bill number. Short rows are dropped with a warning.
#[must_use]
pub fn notice_listings(rows: &[Vec<String>]) -> Vec<NoticeListing> {
    rows.iter()
        .filter(|row| has_cells(row, NOTICE_MIN_CELLS, "notice"))
        .filter_map(|row| {
            let bill_no = row[1].trim();
            if bill_no.is_empty() {
                warn!("⚠️ notice row without bill number skipped: {:?}", row);
                return None;
            }
            let comment_count = row[2].trim().replace(',', "").parse().unwrap_or_else(|_| {
                debug!("Invalid comment count: {}", row[2]);
                0
            });
            Some(NoticeListing {
                bill_no: bill_no.to_string(),
                comment_count,
            })
        })
        .collect()
}

/// Opinion rows for `bill_id`. Short rows and non-numeric opinion numbers
/// are dropped with a warning.
#[must_use]
pub fn opinion_jobs(bill_id: &str, rows: &[Vec<String>]) -> Vec<OpinionJob> {
    let source = format!("opinion {bill_id}");
    rows.iter()
        .filter(|row| has_cells(row, OPINION_MIN_CELLS, &source))
        .filter_map(|row| match row[1].trim().parse::<u64>() {
            Ok(opinion_no) => Some(OpinionJob {
                bill_id: bill_id.to_string(),
                opinion_no,
                subject: row[2].trim().to_string(),
                author: row[3].trim().to_string(),
                created_at: row[5].trim().to_string(),
            }),
            Err(e) => {
                warn!("⚠️ invalid opinion number {:?} for {}: {}", row[1], bill_id, e);
                None
            }
        })
        .collect()
}

/// Keep jobs strictly above the watermark.
#[must_use]
pub fn above_watermark(jobs: Vec<OpinionJob>, watermark: u64) -> Vec<OpinionJob> {
    jobs.into_iter().filter(|job| job.opinion_no > watermark).collect()
}

/// `PRC_X1Y2,2501021530.xlsx` → `PRC_X1Y2`
#[must_use]
pub fn bill_id_from_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (bill_id, _) = stem.split_once(',')?;
    let bill_id = bill_id.trim();
    (!bill_id.is_empty()).then(|| bill_id.to_string())
}

fn xlsx_files(dir: &Path) -> Result<Vec<(PathBuf, std::fs::Metadata)>, ExtractError> {
    let io_error = |source| ExtractError::Io {
        path: dir.display().to_string(),
        source,
    };
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(io_error)?;
        if metadata.is_file() && path.extension().is_some_and(|ext| ext == XLSX_EXTENSION) {
            files.push((path, metadata));
        }
    }
    Ok(files)
}

/// Most recently modified `legislation_notice_*.xlsx` in `dir`.
pub fn latest_notice_file(dir: &Path) -> Result<Option<PathBuf>, ExtractError> {
    Ok(xlsx_files(dir)?
        .into_iter()
        .filter(|(path, _)| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(NOTICE_FILE_PREFIX))
        })
        .filter_map(|(path, metadata)| metadata.modified().ok().map(|modified| (modified, path)))
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path))
}

/// Every `*.xlsx` in `dir`, sorted by name.
pub fn opinion_files(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut files: Vec<PathBuf> = xlsx_files(dir)?.into_iter().map(|(path, _)| path).collect();
    files.sort();
    Ok(files)
}

/// Jobs extracted from one opinion file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpinionBatch {
    pub bill_id: String,
    pub watermark: u64,
    pub jobs: Vec<OpinionJob>,
    /// rows at or below the watermark
    pub skipped: usize,
}

pub struct SpreadsheetExtractor<R> {
    reader: R,
    store: Arc<dyn LegislativeStore>,
}

impl<R: SpreadsheetReader> SpreadsheetExtractor<R> {
    pub fn new(reader: R, store: Arc<dyn LegislativeStore>) -> Self {
        Self { reader, store }
    }

    pub fn read_notice_file(&self, path: &Path) -> Result<Vec<NoticeListing>, ExtractError> {
        let rows = self.reader.open(path)?;
        let listings = notice_listings(&rows);
        info!("📄 {}: {} notices", path.display(), listings.len());
        Ok(listings)
    }

    /// Read an opinion file and drop rows already persisted.
    pub async fn read_opinion_file(&self, path: &Path) -> Result<OpinionBatch, ExtractError> {
        let bill_id = bill_id_from_file_name(path)
            .ok_or_else(|| ExtractError::FileName(path.display().to_string()))?;
        let rows = self.reader.open(path)?;
        let all = opinion_jobs(&bill_id, &rows);
        let total = all.len();

        let watermark = self.store.max_opinion_no(&bill_id).await.unwrap_or_else(|e| {
            warn!("⚠️ watermark lookup failed for {}, starting from 0: {}", bill_id, e);
            0
        });
        let jobs = above_watermark(all, watermark);
        let skipped = total - jobs.len();
        info!(
            "📄 {}: {} new opinions (watermark {}, {} skipped)",
            bill_id,
            jobs.len(),
            watermark,
            skipped
        );

        Ok(OpinionBatch {
            bill_id,
            watermark,
            jobs,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn warnings_during<T>(f: impl FnOnce() -> T) -> (T, String) {
        let log = CapturedLog::default();
        let writer = {
            let log = log.clone();
            move || log.clone()
        };
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let value = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        (value, text)
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    fn opinion_row(no: &str) -> Vec<String> {
        row(&["1", no, "찬성합니다", "홍길동", "", "2025-03-02"])
    }

    #[test]
    fn watermark_keeps_only_newer_rows() {
        let rows: Vec<_> = ["103", "104", "105", "106", "107"].iter().map(|n| opinion_row(n)).collect();
        let jobs = above_watermark(opinion_jobs("PRC_A", &rows), 105);
        let numbers: Vec<u64> = jobs.iter().map(|j| j.opinion_no).collect();
        assert_eq!(numbers, vec![106, 107]);
    }

    #[test]
    fn short_and_non_numeric_opinion_rows_are_dropped() {
        let rows = vec![
            opinion_row("12"),
            row(&["1", "13", "제목", "작성자"]),
            opinion_row("abc"),
        ];
        let (jobs, warnings) = warnings_during(|| opinion_jobs("PRC_A", &rows));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].subject, "찬성합니다");
        assert_eq!(jobs[0].created_at, "2025-03-02");

        assert!(warnings.contains("opinion PRC_A row dropped: 4 of 6 cells"));
        assert!(warnings.contains(r#""13""#));
        assert!(warnings.contains("invalid opinion number \"abc\" for PRC_A"));
    }

    #[test]
    fn notice_rows_need_three_cells() {
        let rows = vec![
            row(&["1", "2201234", "15", "법률안"]),
            row(&["2", "2201235"]),
            row(&["3", "2201236", "n/a"]),
        ];
        let listings = notice_listings(&rows);
        assert_eq!(
            listings,
            vec![
                NoticeListing { bill_no: "2201234".into(), comment_count: 15 },
                NoticeListing { bill_no: "2201236".into(), comment_count: 0 },
            ]
        );
    }

    #[test]
    fn bill_id_comes_from_file_name_prefix() {
        assert_eq!(
            bill_id_from_file_name(Path::new("downloads/opinion/PRC_Z9,2503021200.xlsx")).as_deref(),
            Some("PRC_Z9")
        );
        assert_eq!(bill_id_from_file_name(Path::new("downloads/opinion/other.xlsx")), None);
    }

    #[test]
    fn latest_notice_file_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let older = dir.path().join("legislation_notice_2501010000.xlsx");
        let newer = dir.path().join("legislation_notice_2412310000.xlsx");
        std::fs::write(&older, b"a").unwrap();
        std::fs::write(dir.path().join("unrelated.xlsx"), b"c").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(&newer, b"b").unwrap();

        assert_eq!(latest_notice_file(dir.path()).unwrap(), Some(newer));
        assert_eq!(latest_notice_file(&dir.path().join("missing")).unwrap(), None);
        assert_eq!(opinion_files(dir.path()).unwrap().len(), 3);
    }
}
