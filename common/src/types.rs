//! バッチ結果の型定義
//!
//! - ImageRecord: 列挙時に作られる画像ごとの状態
//! - QueryResult: 1画像分の問い合わせ結果（成功なら回答、失敗ならエラーメッセージ）
//! - BatchReport: 実行全体の結果と集計
//! - GenerationParams: 推論バックエンドへ渡す生成パラメータ

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// 画像ごとの処理状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemStatus {
    #[default]
    Pending,
    Success,
    Error,
}

/// 列挙された入力画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    path: String,
    status: ItemStatus,
}

impl ImageRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: ItemStatus::Pending,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Pendingからの遷移は一度だけ。確定済みなら false を返して何もしない。
    pub fn complete(&mut self, status: QueryStatus) -> bool {
        if self.status != ItemStatus::Pending {
            return false;
        }
        self.status = match status {
            QueryStatus::Success => ItemStatus::Success,
            QueryStatus::Error => ItemStatus::Error,
        };
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

/// 1画像分の結果
///
/// `answer`（成功時）と `error_message`（失敗時）のどちらか一方だけが入る。
/// JSONでは回答を `result` キーで書き出し、読み込み時は `answer` も受け付ける。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryResultEntry", into = "QueryResultEntry")]
pub struct QueryResult {
    image_path: String,
    answer: Option<String>,
    status: QueryStatus,
    error_message: Option<String>,
}

impl QueryResult {
    pub fn success(image_path: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            answer: Some(answer.into()),
            status: QueryStatus::Success,
            error_message: None,
        }
    }

    pub fn error(image_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            answer: None,
            status: QueryStatus::Error,
            error_message: Some(message.into()),
        }
    }

    pub fn image_path(&self) -> &str {
        &self.image_path
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }
}

/// 結果ファイル上の1エントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueryResultEntry {
    image_path: String,
    #[serde(rename = "result", alias = "answer", default)]
    answer: Option<String>,
    status: QueryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl TryFrom<QueryResultEntry> for QueryResult {
    type Error = String;

    fn try_from(entry: QueryResultEntry) -> Result<Self, Self::Error> {
        match (entry.status, entry.answer, entry.error_message) {
            (QueryStatus::Success, Some(answer), None) => Ok(Self::success(entry.image_path, answer)),
            (QueryStatus::Error, None, Some(message)) => Ok(Self::error(entry.image_path, message)),
            (status, _, _) => Err(format!(
                "{}: status {:?} と result/error_message の組み合わせが不正です",
                entry.image_path, status
            )),
        }
    }
}

impl From<QueryResult> for QueryResultEntry {
    fn from(result: QueryResult) -> Self {
        Self {
            image_path: result.image_path,
            answer: result.answer,
            status: result.status,
            error_message: result.error_message,
        }
    }
}

/// バッチ実行全体の結果
///
/// 件数は `results` から算出するので `total == succeeded + failed == results.len()` が常に成り立つ。
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    generated_at: DateTime<Local>,
    results: Vec<QueryResult>,
    total: usize,
    succeeded: usize,
    failed: usize,
}

impl BatchReport {
    pub fn new(results: Vec<QueryResult>, generated_at: DateTime<Local>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let total = results.len();
        Self {
            generated_at,
            results,
            total,
            succeeded,
            failed: total - succeeded,
        }
    }

    pub fn empty(generated_at: DateTime<Local>) -> Self {
        Self::new(Vec::new(), generated_at)
    }

    pub fn generated_at(&self) -> DateTime<Local> {
        self.generated_at
    }

    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// 結果ファイルの形（エントリの配列）にシリアライズ
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.results)
    }

    /// 結果ファイルの内容から復元。生成時刻はファイル側に無いので呼び出し元が渡す。
    pub fn from_json(json: &str, generated_at: DateTime<Local>) -> serde_json::Result<Self> {
        let results: Vec<QueryResult> = serde_json::from_str(json)?;
        Ok(Self::new(results, generated_at))
    }
}

/// 推論バックエンドに渡す生成パラメータ。効果はバックエンド側の責務。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_output_length: u32,
    pub sampling_enabled: bool,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_output_length: 128,
            sampling_enabled: false,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}
