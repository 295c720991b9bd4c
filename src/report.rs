//! バッチ結果の保存と読み込み
//!
//! 1回の書き込みで必ず新しいファイルを1つ作る。既存ファイルは上書きしない。

use crate::error::{FuelVisionError, Result};
use chrono::{DateTime, Local};
use fuel_vision_common::{parse_stamp, results_file_name, BatchReport};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const MAX_SUFFIX: u32 = 1000;

#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// `results_<YYYYMMDD_HHMMSS>.json` を作成して書き込んだパスを返す
    ///
    /// 同じ秒に複数回書いた場合は `_1`, `_2` ... を付ける。
    pub fn write(&self, report: &BatchReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|source| persistence_error(&self.output_dir, source))?;

        let json = report.to_json()?;
        let base = results_file_name(&report.generated_at());
        let stem = base.trim_end_matches(".json");

        // 同じフォルダの一時ファイルに書き切ってから名前を付ける。失敗時は一時ファイルごと消える
        let mut tmp = NamedTempFile::new_in(&self.output_dir)
            .map_err(|source| persistence_error(&self.output_dir, source))?;
        let tmp_path = tmp.path().to_path_buf();
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.write_all(b"\n"))
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| persistence_error(&tmp_path, source))?;

        for n in 0..MAX_SUFFIX {
            let name = if n == 0 {
                base.clone()
            } else {
                format!("{}_{}.json", stem, n)
            };
            let path = self.output_dir.join(name);

            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!("結果を保存: {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
                Err(e) => return Err(FuelVisionError::Persistence { path, source: e.error }),
            }
        }

        Err(FuelVisionError::Persistence {
            path: self.output_dir.join(base),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "空いているファイル名がありません"),
        })
    }
}

fn persistence_error(path: &Path, source: std::io::Error) -> FuelVisionError {
    FuelVisionError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

/// 結果ファイルを読み込む
///
/// 生成時刻はファイル名のタイムスタンプから復元し、無ければ更新日時を使う。
pub fn load_report(path: &Path) -> Result<BatchReport> {
    let content = std::fs::read_to_string(path)?;

    let stamp = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| parse_stamp(n).ok());
    let generated_at = match stamp {
        Some(at) => at,
        None => modified_time(path)?,
    };

    Ok(BatchReport::from_json(&content, generated_at)?)
}

fn modified_time(path: &Path) -> Result<DateTime<Local>> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified))
}
