use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuelVisionError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("フォルダが見つかりません: {0}")]
    DirectoryNotFound(String),

    #[error("画像が見つかりません: {0}")]
    DirectoryEmpty(String),

    #[error("結果を保存できません ({path}): {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("画像ファイルが不正: {0}")]
    InvalidImage(String),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),

    #[error(transparent)]
    Common(#[from] fuel_vision_common::Error),
}

pub type Result<T> = std::result::Result<T, FuelVisionError>;

/// 1画像分の推論失敗。バッチを止めずに結果へ記録される。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{cause}")]
pub struct InferenceError {
    pub cause: String,
}

impl InferenceError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self { cause: cause.into() }
    }
}
