//! 出力ファイル名の規則
//!
//! - バッチ結果: `results_<YYYYMMDD_HHMMSS>.json`
//! - 正解ラベル: `ground_truth_labels.json` と `ground_truth_labels_<YYYYMMDD_HHMMSS>.json`

use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const STAMP_LEN: usize = 15;

pub const RESULTS_PREFIX: &str = "results_";
pub const LABELS_STEM: &str = "ground_truth_labels";

pub fn format_stamp(at: &DateTime<Local>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

/// `results_20250118_093000.json` 形式のファイル名
pub fn results_file_name(at: &DateTime<Local>) -> String {
    format!("{}{}.json", RESULTS_PREFIX, format_stamp(at))
}

/// `None` なら最新版のファイル名、`Some` ならタイムスタンプ付きのスナップショット名
pub fn labels_file_name(at: Option<&DateTime<Local>>) -> String {
    match at {
        Some(at) => format!("{}_{}.json", LABELS_STEM, format_stamp(at)),
        None => format!("{}.json", LABELS_STEM),
    }
}

/// ファイル名からタイムスタンプを取り出す
///
/// 重複回避用の連番（`results_20250118_093000_1.json`）が付いていても読める。
pub fn parse_stamp(file_name: &str) -> Result<DateTime<Local>> {
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let rest = stem
        .strip_prefix(RESULTS_PREFIX)
        .or_else(|| stem.strip_prefix(&format!("{}_", LABELS_STEM)))
        .ok_or_else(|| Error::Parse(format!("タイムスタンプ付きのファイル名ではありません: {}", file_name)))?;

    let stamp = rest
        .get(..STAMP_LEN)
        .ok_or_else(|| Error::Parse(format!("タイムスタンプが短すぎます: {}", file_name)))?;

    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
        .map_err(|e| Error::Parse(format!("{}: {}", file_name, e)))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::Parse(format!("ローカル時刻に変換できません: {}", file_name)))
}
