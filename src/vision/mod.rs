//! 画像への問い合わせ（外部モデル）
//!
//! モデル本体はプロセス外にあり、ここでは `ask(image, question) -> answer` という
//! 1回の呼び出しとしてだけ扱う。ハンドルは起動時に一度作ってバッチ実行と
//! HTTPサーバへ渡す。

mod command;
mod openai;
pub mod preprocess;

pub use command::CommandVisionService;
pub use openai::OpenAiVisionService;
pub use preprocess::ImagePreprocessor;

use crate::backend::VisionBackend;
use crate::config::Config;
use crate::error::{InferenceError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub type InferenceResult<T> = std::result::Result<T, InferenceError>;

/// バックエンドの識別情報（ヘルスチェック用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub backend: String,
    pub model: String,
}

#[async_trait]
pub trait VisionQueryService: Send + Sync {
    /// 画像のバイト列と質問文から回答テキストを得る。生成が終わるまで戻らない。
    async fn ask(&self, image: &[u8], question: &str) -> InferenceResult<String>;

    fn info(&self) -> ServiceInfo;
}

pub type SharedVisionService = Arc<dyn VisionQueryService>;

/// 設定からバックエンドを初期化
pub fn connect(config: &Config) -> Result<SharedVisionService> {
    let service: SharedVisionService = match config.backend {
        VisionBackend::OpenAi => Arc::new(OpenAiVisionService::from_config(config)?),
        VisionBackend::Command => Arc::new(CommandVisionService::from_config(config)),
    };

    let info = service.info();
    tracing::info!(backend = %info.backend, model = %info.model, "vision backend ready");

    Ok(service)
}
